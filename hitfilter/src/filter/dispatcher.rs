use rayon::prelude::*;
use tracing::{trace, warn};

use crate::config::{ErrorPolicy, FilterConfig};
use crate::errors::FilterResult;
use crate::evaluator::Evaluator;
use crate::metrics::FilterMetrics;
use crate::network::RangeTable;
use crate::results::Collector;
use crate::scanner::scan_record;

/// Splits the input into `(sequence, line)` pairs, numbering from 1.
///
/// A final newline does not start another line; a missing one is fine.
pub fn split_lines(buf: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    let body = buf.strip_suffix(b"\n").unwrap_or(buf);
    let lines = if buf.is_empty() {
        None
    } else {
        Some(body.split(|&c| c == b'\n'))
    };
    lines
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
}

/// Runs scan and evaluation for each line and feeds passing rows to a collector
#[derive(Debug, Clone)]
pub struct Dispatcher<'t> {
    evaluator: Evaluator<'t>,
    policy: ErrorPolicy,
    metrics: FilterMetrics,
}

impl<'t> Dispatcher<'t> {
    pub fn new(table: &'t RangeTable, config: &FilterConfig) -> Self {
        Self {
            evaluator: Evaluator::with_thresholds(
                table,
                config.hits_threshold,
                config.browsers_threshold,
            ),
            policy: config.error_policy,
            metrics: FilterMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &FilterMetrics {
        &self.metrics
    }

    /// Handles one line. Only a malformed line under [`ErrorPolicy::FailFast`]
    /// returns an error.
    pub fn process_line(
        &self,
        sequence: usize,
        line: &[u8],
        collector: &Collector,
    ) -> FilterResult<()> {
        let record = match scan_record(line) {
            Ok(record) => record,
            Err(e) => {
                let e = e.at_line(sequence);
                return match self.policy {
                    ErrorPolicy::FailFast => Err(e),
                    ErrorPolicy::Skip => {
                        warn!("Skipping {}", e);
                        self.metrics.record_skipped();
                        Ok(())
                    }
                };
            }
        };
        self.metrics.record_scanned();

        let (verdict, row) = self.evaluator.evaluate(&record, sequence);
        self.metrics.record_verdict(verdict);
        trace!("Line {}: {:?}", sequence, verdict);

        if let Some(row) = row {
            collector.push(row);
        }
        Ok(())
    }

    /// Evaluates every line in parallel on the current rayon pool. Returns once
    /// all lines are done, or with the first error under fail-fast.
    pub fn dispatch(&self, lines: &[(usize, &[u8])], collector: &Collector) -> FilterResult<()> {
        self.dispatch_with(lines, collector, |_| {})
    }

    fn dispatch_with<F>(
        &self,
        lines: &[(usize, &[u8])],
        collector: &Collector,
        before_line: F,
    ) -> FilterResult<()>
    where
        F: Fn(usize) + Sync,
    {
        lines.par_iter().try_for_each(|&(sequence, line)| {
            before_line(sequence);
            self.process_line(sequence, line, collector)
        })
    }
}
