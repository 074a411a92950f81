/// Result types for a filter run.
///
/// Workers hand finished rows to a [`Collector`], which owns them until the
/// batch is done. Completion order is arbitrary, so the collector is drained
/// with [`Collector::into_sorted`], which restores input order by sequence
/// number before anything is written.
use std::io::Write;
use std::sync::Mutex;

use crate::metrics::FilterStats;

/// One accepted record, already formatted for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    /// 1-based position of the record in the input
    pub sequence: usize,
    /// Output bytes including the trailing newline
    pub line: Vec<u8>,
}

impl ResultRow {
    pub fn new(sequence: usize, line: Vec<u8>) -> Self {
        Self { sequence, line }
    }
}

/// Thread-safe accumulator for rows produced by concurrent workers
#[derive(Debug, Default)]
pub struct Collector {
    rows: Mutex<Vec<ResultRow>>,
}

impl Collector {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends under the lock; the lock is held only for the push.
    pub fn push(&self, row: ResultRow) {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the collector once all workers are done, in input order.
    pub fn into_sorted(self) -> Vec<ResultRow> {
        let mut rows = self.rows.into_inner().unwrap_or_else(|e| e.into_inner());
        rows.sort_unstable_by_key(|row| row.sequence);
        rows
    }
}

/// The complete outcome of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutput {
    /// Accepted rows in ascending sequence order
    pub rows: Vec<ResultRow>,
    /// Number of input lines dispatched
    pub lines_processed: usize,
    /// Per-gate counters gathered while the batch ran
    pub stats: FilterStats,
}

impl FilterOutput {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of records that passed both thresholds
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    /// Writes the `Total:` header followed by every row.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "Total: {}", self.total())?;
        for row in &self.rows {
            out.write_all(&row.line)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn render(output: &FilterOutput) -> String {
        let mut buf = Vec::new();
        output.write_to(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn row(sequence: usize, name: &str) -> ResultRow {
        ResultRow::new(sequence, format!("[{}] {} <x>\n", sequence, name).into_bytes())
    }

    #[test]
    fn test_output_empty() {
        let output = FilterOutput::new();
        assert_eq!(output.total(), 0);
        assert_eq!(render(&output), "Total: 0\n");
    }

    #[test]
    fn test_output_format() {
        let output = FilterOutput {
            rows: vec![row(2, "Ann"), row(5, "Bob")],
            lines_processed: 6,
            stats: FilterStats::default(),
        };
        assert_eq!(output.total(), 2);
        assert_eq!(
            render(&output),
            "Total: 2\n[2] Ann <x>\n[5] Bob <x>\n"
        );
    }

    #[test]
    fn test_collector_restores_order() {
        let collector = Collector::new();
        for seq in [9, 3, 7, 1, 5] {
            collector.push(row(seq, "n"));
        }
        assert_eq!(collector.len(), 5);

        let sequences: Vec<_> = collector.into_sorted().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_collector_concurrent_pushes() {
        let collector = Arc::new(Collector::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    // Thread t owns sequences t+1, t+9, t+17, ...
                    for i in (0..100).rev() {
                        collector.push(row(t + 1 + i * 8, "n"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let collector = Arc::try_unwrap(collector).unwrap();
        let rows = collector.into_sorted();
        assert_eq!(rows.len(), 800);
        assert!(rows.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(rows[0].sequence, 1);
        assert_eq!(rows[799].sequence, 800);
    }
}
