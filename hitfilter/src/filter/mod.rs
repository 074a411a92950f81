/// The concurrent filtering pipeline.
///
/// ```text
/// raw buffer -> split_lines -> { scan_record -> Evaluator::judge } per line, on a rayon pool
///            -> Collector (mutex-guarded) -> barrier -> sort by sequence -> FilterOutput
/// ```
///
/// Workers share the range table and the browser regex read-only. The only
/// mutable shared state is the collector, touched once per passing record.
/// Completion order is not defined; output order is restored after the pool
/// has drained.
pub mod dispatcher;
pub mod engine;

pub use dispatcher::{split_lines, Dispatcher};
pub use engine::{filter_buffer, run};
