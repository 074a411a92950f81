use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{FilterError, FilterResult};
use crate::evaluator::{BROWSERS_THRESHOLD, HITS_THRESHOLD};

/// What the dispatcher does with a line the scanner rejects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// The first malformed line aborts the run
    #[default]
    FailFast,
    /// Malformed lines are logged, counted and dropped
    Skip,
}

/// Configuration for a filter run.
///
/// # Configuration Locations
///
/// Loaded in order of precedence (later wins):
/// 1. Global `$CONFIG_DIR/hitfilter/config.yaml`
/// 2. Local `.hitfilter.yaml` in the current directory
/// 3. A file passed with `--config`
///
/// ```yaml
/// # Networks a hit must fall in (A.B.C.D/N)
/// networks:
///   - "10.0.0.0/8"
///   - "192.168.0.0/16"
///
/// # Worker threads (default: CPU cores)
/// thread_count: 4
///
/// # fail_fast or skip
/// error_policy: "skip"
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Command-line values override file values, see [`FilterConfig::merge_with_cli`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Address ranges in `A.B.C.D/N` form
    #[serde(default)]
    pub networks: Vec<String>,

    /// Number of worker threads
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Hits inside a network needed to pass
    #[serde(default = "default_hits_threshold")]
    pub hits_threshold: usize,

    /// Matching browser entries needed to pass
    #[serde(default = "default_browsers_threshold")]
    pub browsers_threshold: usize,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_hits_threshold() -> usize {
    HITS_THRESHOLD
}

fn default_browsers_threshold() -> usize {
    BROWSERS_THRESHOLD
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            error_policy: ErrorPolicy::default(),
            hits_threshold: default_hits_threshold(),
            browsers_threshold: default_browsers_threshold(),
        }
    }
}

impl FilterConfig {
    /// Config with the given networks and defaults for everything else
    pub fn with_networks<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            networks: networks.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Loads configuration, layering an explicit file over the default locations.
    /// An explicit path that does not exist is an error.
    pub fn load_from(config_path: Option<&Path>) -> FilterResult<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(FilterError::config_error(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("hitfilter/config.yaml")),
            Some(PathBuf::from(".hitfilter.yaml")),
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments over configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if !cli.networks.is_empty() {
            self.networks = cli.networks;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if let Some(policy) = cli.error_policy {
            self.error_policy = policy;
        }
        self
    }
}

/// Values given on the command line; `None`/empty means "not given"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub networks: Vec<String>,
    pub thread_count: Option<NonZeroUsize>,
    pub log_level: Option<String>,
    pub error_policy: Option<ErrorPolicy>,
}

/// Reads a networks file: one `A.B.C.D/N` per line, `#` comments and blank
/// lines ignored.
pub fn load_networks_file(path: &Path) -> FilterResult<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_networks_list(&contents))
}

fn parse_networks_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
