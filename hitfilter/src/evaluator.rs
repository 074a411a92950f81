use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tracing::trace;

use crate::network::{Address, RangeTable};
use crate::results::ResultRow;
use crate::scanner::Record;

/// Minimum number of hits inside a configured network
pub const HITS_THRESHOLD: usize = 3;

/// Minimum number of recognised user agents
pub const BROWSERS_THRESHOLD: usize = 3;

/// The three Chrome builds a browser entry has to mention somewhere.
///
/// The dots are regex wildcards, so `Chrome/60x0.3112.90` matches too.
pub const BROWSER_PATTERN: &str = r"Chrome/(60.0.3112.90|52.0.2743.116|57.0.2987.133)";

static BROWSER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(BROWSER_PATTERN).expect("browser pattern is a valid regex"));

/// Outcome of checking one record against both gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Rejected at the hit gate; browsers were never looked at
    TooFewHits,
    TooFewBrowsers,
}

/// Applies the hit and browser thresholds to decoded records.
///
/// Holds only shared references, so one evaluator is used by every worker.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'t> {
    ranges: &'t RangeTable,
    hits_threshold: usize,
    browsers_threshold: usize,
}

impl<'t> Evaluator<'t> {
    pub fn new(ranges: &'t RangeTable) -> Self {
        Self::with_thresholds(ranges, HITS_THRESHOLD, BROWSERS_THRESHOLD)
    }

    pub fn with_thresholds(
        ranges: &'t RangeTable,
        hits_threshold: usize,
        browsers_threshold: usize,
    ) -> Self {
        Self {
            ranges,
            hits_threshold,
            browsers_threshold,
        }
    }

    /// Counts hits inside the range table, stopping once `limit` is reached.
    pub fn count_hits(&self, record: &Record<'_>, limit: usize) -> usize {
        let mut count = 0;
        for hit in &record.hits {
            if count >= limit {
                break;
            }
            if self.ranges.contains(Address::parse_lenient(hit)) {
                count += 1;
            }
        }
        count
    }

    /// Counts browser entries matching [`BROWSER_PATTERN`], stopping at `limit`.
    pub fn count_browsers(&self, record: &Record<'_>, limit: usize) -> usize {
        let mut count = 0;
        for browser in &record.browsers {
            if count >= limit {
                break;
            }
            if BROWSER_RE.is_match(browser) {
                count += 1;
            }
        }
        count
    }

    /// Hit gate first, browser gate only for records that clear it.
    pub fn judge(&self, record: &Record<'_>) -> Verdict {
        if self.count_hits(record, self.hits_threshold) < self.hits_threshold {
            return Verdict::TooFewHits;
        }
        if self.count_browsers(record, self.browsers_threshold) < self.browsers_threshold {
            return Verdict::TooFewBrowsers;
        }
        Verdict::Accepted
    }

    /// Judges the record and formats its output row when it passes both gates.
    pub fn evaluate(&self, record: &Record<'_>, sequence: usize) -> (Verdict, Option<ResultRow>) {
        match self.judge(record) {
            Verdict::Accepted => (Verdict::Accepted, Some(result_row(record, sequence))),
            verdict => {
                trace!("Line {} rejected: {:?}", sequence, verdict);
                (verdict, None)
            }
        }
    }
}

/// Formats an accepted record as an output row.
fn result_row(record: &Record<'_>, sequence: usize) -> ResultRow {
    ResultRow::new(sequence, format_line(sequence, record.name, record.email))
}

/// `[<sequence>] <name> <<email>>\n` with the first `@` of the email spelled out.
pub fn format_line(sequence: usize, name: &[u8], email: &[u8]) -> Vec<u8> {
    let mut line = Vec::with_capacity(name.len() + email.len() + 32);
    line.extend_from_slice(format!("[{}] ", sequence).as_bytes());
    line.extend_from_slice(name);
    line.extend_from_slice(b" <");
    match email.iter().position(|&c| c == b'@') {
        Some(at) => {
            line.extend_from_slice(&email[..at]);
            line.extend_from_slice(b" [at] ");
            line.extend_from_slice(&email[at + 1..]);
        }
        None => line.extend_from_slice(email),
    }
    line.extend_from_slice(b">\n");
    line
}
