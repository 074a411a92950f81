pub mod config;
pub mod errors;
pub mod evaluator;
pub mod filter;
pub mod metrics;
pub mod network;
pub mod results;
pub mod scanner;

pub use config::{ErrorPolicy, FilterConfig};
pub use errors::{FilterError, FilterResult};
pub use evaluator::{Evaluator, Verdict};
pub use filter::{filter_buffer, run};
pub use metrics::{FilterMetrics, FilterStats};
pub use network::{Address, Range, RangeTable};
pub use results::{FilterOutput, ResultRow};
pub use scanner::{scan_record, Record};
