use rayon::ThreadPoolBuilder;
use std::io::{Read, Write};
use tracing::{debug, info};

use super::dispatcher::{split_lines, Dispatcher};
use crate::config::FilterConfig;
use crate::errors::{FilterError, FilterResult};
use crate::network::RangeTable;
use crate::results::{Collector, FilterOutput};

/// Filters an in-memory batch against an already built range table.
///
/// Lines are evaluated on a pool of `config.thread_count` workers. The call
/// returns after every line has been handled; rows come back in input order.
pub fn filter_buffer(
    buf: &[u8],
    table: &RangeTable,
    config: &FilterConfig,
) -> FilterResult<FilterOutput> {
    let lines: Vec<(usize, &[u8])> = split_lines(buf).collect();
    info!(
        "Filtering {} lines against {} networks",
        lines.len(),
        table.len()
    );

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.thread_count.get())
        .thread_name(|i| format!("hitfilter-{}", i))
        .build()
        .map_err(|e| FilterError::config_error(format!("cannot start worker pool: {}", e)))?;
    debug!("Dispatching on {} worker threads", pool.current_num_threads());

    let dispatcher = Dispatcher::new(table, config);
    let collector = Collector::new();

    pool.install(|| dispatcher.dispatch(&lines, &collector))?;

    let stats = dispatcher.metrics().get_stats();
    dispatcher.metrics().log_stats();

    let output = FilterOutput {
        rows: collector.into_sorted(),
        lines_processed: lines.len(),
        stats,
    };

    info!(
        "Filter complete. {} of {} records passed",
        output.total(),
        output.lines_processed
    );

    Ok(output)
}

/// Reads the whole input, filters it and writes the report.
///
/// The range table is built from `config.networks` before any input is read,
/// so a bad network fails the run without touching either stream. Nothing is
/// written unless the whole batch succeeds.
pub fn run<R: Read, W: Write>(
    mut input: R,
    mut output: W,
    config: &FilterConfig,
) -> FilterResult<FilterOutput> {
    let table = RangeTable::build(&config.networks)?;

    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    debug!("Read {} bytes of input", buf.len());

    let result = filter_buffer(&buf, &table, config)?;
    result.write_to(&mut output)?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErrorPolicy;
    use std::num::NonZeroUsize;

    const LINE: &str = r#"{"browsers":["Chrome/60.0.3112.90","Chrome/52.0.2743.116","Chrome/57.0.2987.133"],"company":"A","country":"X","email":"a@b.com","hits":["10.0.0.1","10.0.0.2","10.0.0.3"],"job":"Y","name":"Ann","phone":"1"}"#;

    fn config() -> FilterConfig {
        FilterConfig {
            thread_count: NonZeroUsize::new(2).unwrap(),
            ..FilterConfig::with_networks(["10.0.0.0/24"])
        }
    }

    #[test]
    fn test_run_single_passing_record() {
        let mut out = Vec::new();
        let result = run(LINE.as_bytes(), &mut out, &config()).unwrap();
        assert_eq!(result.total(), 1);
        assert_eq!(result.lines_processed, 1);
        assert_eq!(result.stats.lines_scanned, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Total: 1\n[1] Ann <a [at] b.com>\n");
    }

    #[test]
    fn test_run_empty_input() {
        let mut out = Vec::new();
        let result = run(&b""[..], &mut out, &config()).unwrap();
        assert_eq!(result.lines_processed, 0);
        assert_eq!(out, b"Total: 0\n");
    }

    #[test]
    fn test_bad_network_fails_before_output() {
        let mut out = Vec::new();
        let config = FilterConfig::with_networks(["10.0.0.0"]);
        let err = run(LINE.as_bytes(), &mut out, &config).unwrap_err();
        assert!(matches!(err, FilterError::InvalidNetwork(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_malformed_line_aborts_without_output() {
        let input = format!("{LINE}\n{{\"oops\"}}\n{LINE}\n");
        let mut out = Vec::new();
        let err = run(input.as_bytes(), &mut out, &config()).unwrap_err();
        assert!(matches!(err, FilterError::MalformedRecord { line: 2, .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_malformed_line_skipped_under_skip_policy() {
        let input = format!("{LINE}\n{{\"oops\"}}\n{LINE}\n");
        let config = FilterConfig {
            error_policy: ErrorPolicy::Skip,
            ..config()
        };
        let mut out = Vec::new();
        let result = run(input.as_bytes(), &mut out, &config).unwrap();
        assert_eq!(result.stats.lines_skipped, 1);
        assert_eq!(result.stats.accepted, 2);
        assert_eq!(result.lines_processed, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Total: 2\n[1] Ann <a [at] b.com>\n[3] Ann <a [at] b.com>\n"
        );
    }
}
