/// Error types for hitfilter.
///
/// Every failure the pipeline can hit is a value of [`FilterError`]. The scanner
/// and the range table return these instead of aborting, and the dispatcher
/// decides (through [`crate::config::ErrorPolicy`]) whether a malformed record
/// stops the batch or is counted and skipped.
///
/// ```rust,ignore
/// match hitfilter::run(input, output, &config) {
///     Ok(out) => eprintln!("{} records passed", out.total()),
///     Err(FilterError::MalformedRecord { line, message }) => // bad input line,
///     Err(FilterError::InvalidNetwork(spec)) => // bad range in config,
///     Err(e) => // anything else
/// }
/// ```
use thiserror::Error;

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors that can occur while building the range table or filtering records
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Malformed record on line {line}: {message}")]
    MalformedRecord { line: usize, message: String },
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FilterError {
    /// A scanner failure. `line` is the 1-based input position, 0 when unknown.
    pub fn malformed_record(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            message: message.into(),
        }
    }

    pub fn invalid_network(spec: impl Into<String>) -> Self {
        Self::InvalidNetwork(spec.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Attaches a line number to a malformed-record error raised without one.
    pub fn at_line(self, sequence: usize) -> Self {
        match self {
            Self::MalformedRecord { message, .. } => Self::MalformedRecord {
                line: sequence,
                message,
            },
            other => other,
        }
    }
}

impl From<::config::ConfigError> for FilterError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = FilterError::malformed_record(3, "unknown section: foo");
        assert!(matches!(err, FilterError::MalformedRecord { line: 3, .. }));

        let err = FilterError::invalid_network("10.0.0.0");
        assert!(matches!(err, FilterError::InvalidNetwork(_)));

        let err = FilterError::config_error("thread_count must be positive");
        assert!(matches!(err, FilterError::ConfigError(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = FilterError::malformed_record(7, "expected ':' got ','");
        assert_eq!(
            err.to_string(),
            "Malformed record on line 7: expected ':' got ','"
        );

        let err = FilterError::invalid_network("10.0.0.0/33");
        assert_eq!(err.to_string(), "Invalid network: 10.0.0.0/33");

        let err = FilterError::config_error("Missing required field");
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field"
        );
    }

    #[test]
    fn test_at_line_only_touches_record_errors() {
        let err = FilterError::malformed_record(0, "unterminated string").at_line(42);
        assert_eq!(
            err.to_string(),
            "Malformed record on line 42: unterminated string"
        );

        let err = FilterError::invalid_network("x").at_line(42);
        assert_eq!(err.to_string(), "Invalid network: x");
    }
}
