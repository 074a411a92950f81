use clap::Parser;
use colored::Colorize;
use hitfilter::{
    config::{load_networks_file, CliOverrides},
    filter_buffer, ErrorPolicy, FilterConfig, FilterError, FilterOutput, RangeTable,
};
use memmap2::Mmap;
use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    num::NonZeroUsize,
    ops::Deref,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Result<T> = std::result::Result<T, FilterError>;

// Inputs at least this large are memory mapped instead of read
const MMAP_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Filter newline-delimited JSON records by network range and user agent",
    long_about = None
)]
struct Cli {
    /// Input file, one JSON record per line (default: stdin, also "-")
    input: Option<PathBuf>,

    /// Network a hit must fall in, as A.B.C.D/N (can be specified multiple times)
    #[arg(short = 'n', long = "network")]
    networks: Vec<String>,

    /// File with one A.B.C.D/N network per line
    #[arg(short = 'N', long)]
    networks_file: Option<PathBuf>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Drop malformed records instead of aborting
    #[arg(long)]
    skip_malformed: bool,

    /// Print run statistics to stderr
    #[arg(short, long)]
    stats: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

/// The raw input batch, either owned or mapped from disk
enum Input {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for Input {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Input::Owned(buf) => buf.as_slice(),
            Input::Mapped(mmap) => &mmap[..],
        }
    }
}

impl Input {
    fn open(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) if p != Path::new("-") => p,
            _ => {
                debug!("Reading input from stdin");
                let mut buf = Vec::new();
                io::stdin().lock().read_to_end(&mut buf)?;
                return Ok(Input::Owned(buf));
            }
        };

        let mut file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                FilterError::config_error(format!("input file not found: {}", path.display()))
            }
            _ => FilterError::IoError(e),
        })?;

        let size = file.metadata()?.len();
        if size >= MMAP_THRESHOLD {
            debug!("Memory mapping {} ({} bytes)", path.display(), size);
            let mmap = unsafe { Mmap::map(&file) }?;
            Ok(Input::Mapped(mmap))
        } else {
            debug!("Reading {} ({} bytes)", path.display(), size);
            let mut buf = Vec::with_capacity(size as usize);
            file.read_to_end(&mut buf)?;
            Ok(Input::Owned(buf))
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut networks = cli.networks.clone();
    if let Some(path) = &cli.networks_file {
        networks.extend(load_networks_file(path)?);
    }

    let config = FilterConfig::load_from(cli.config.as_deref())?.merge_with_cli(CliOverrides {
        networks,
        thread_count: cli.threads,
        log_level: cli.log_level.clone(),
        error_policy: cli.skip_malformed.then_some(ErrorPolicy::Skip),
    });

    init_logging(&config.log_level);

    // Bad networks fail here, before any input is read
    let table = RangeTable::build(&config.networks)?;
    if table.is_empty() && config.hits_threshold > 0 {
        warn!("No networks configured; no record can pass the hit threshold");
    }

    let input = Input::open(cli.input.as_deref())?;
    let result = filter_buffer(&input, &table, &config)?;

    match &cli.output {
        Some(path) => {
            info!("Writing report to {}", path.display());
            let mut out = BufWriter::new(File::create(path)?);
            result.write_to(&mut out)?;
        }
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            result.write_to(&mut out)?;
        }
    }

    if cli.stats {
        print_stats(&result)?;
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn print_stats(result: &FilterOutput) -> Result<()> {
    let stats = &result.stats;
    let mut err = io::stderr().lock();
    writeln!(
        err,
        "{} lines processed, {} passed, {} skipped",
        result.lines_processed.to_string().blue(),
        result.total().to_string().green(),
        stats.lines_skipped.to_string().yellow()
    )?;
    writeln!(err, "  scanned:           {}", stats.lines_scanned)?;
    writeln!(err, "  skipped:           {}", stats.lines_skipped)?;
    writeln!(err, "  rejected (hits):   {}", stats.rejected_hits)?;
    writeln!(err, "  rejected (agents): {}", stats.rejected_browsers)?;
    writeln!(err, "  accepted:          {}", stats.accepted)?;
    Ok(())
}
