use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::evaluator::Verdict;

/// Counters shared by every worker in a run
#[derive(Debug, Clone)]
pub struct FilterMetrics {
    lines_scanned: Arc<AtomicU64>,
    lines_skipped: Arc<AtomicU64>,
    rejected_hits: Arc<AtomicU64>,
    rejected_browsers: Arc<AtomicU64>,
    accepted: Arc<AtomicU64>,
}

impl FilterMetrics {
    pub fn new() -> Self {
        Self {
            lines_scanned: Arc::new(AtomicU64::new(0)),
            lines_skipped: Arc::new(AtomicU64::new(0)),
            rejected_hits: Arc::new(AtomicU64::new(0)),
            rejected_browsers: Arc::new(AtomicU64::new(0)),
            accepted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a line that scanned cleanly
    pub fn record_scanned(&self) {
        self.lines_scanned.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a malformed line dropped under the skip policy
    pub fn record_skipped(&self) {
        self.lines_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Accepted => &self.accepted,
            Verdict::TooFewHits => &self.rejected_hits,
            Verdict::TooFewBrowsers => &self.rejected_browsers,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> FilterStats {
        FilterStats {
            lines_scanned: self.lines_scanned.load(Ordering::Relaxed),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
            rejected_hits: self.rejected_hits.load(Ordering::Relaxed),
            rejected_browsers: self.rejected_browsers.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Filter stats:\n\
             Lines scanned: {}\n\
             Lines skipped: {}\n\
             Rejected (hits/browsers): {}/{}\n\
             Accepted: {}",
            stats.lines_scanned,
            stats.lines_skipped,
            stats.rejected_hits,
            stats.rejected_browsers,
            stats.accepted
        );
    }
}

impl Default for FilterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`FilterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub lines_scanned: u64,
    pub lines_skipped: u64,
    pub rejected_hits: u64,
    pub rejected_browsers: u64,
    pub accepted: u64,
}
