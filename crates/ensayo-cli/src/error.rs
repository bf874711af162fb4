//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// One or more scenarios failed
    #[error("{failed} of {total} scenarios failed")]
    ScenariosFailed {
        /// Failed scenarios
        failed: usize,
        /// Scenarios that ran
        total: usize,
    },

    /// Scenario files did not load or validate
    #[error("{invalid} of {total} scenario files are invalid")]
    InvalidScenarios {
        /// Invalid files
        invalid: usize,
        /// Files checked
        total: usize,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ensayo library error
    #[error("{0}")]
    Ensayo(#[from] ensayo::EnsayoError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Report generation error
    #[error("Report generation failed: {message}")]
    ReportGeneration {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a report generation error
    #[must_use]
    pub fn report_generation(message: impl Into<String>) -> Self {
        Self::ReportGeneration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad yaml");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("bad yaml"));
    }

    #[test]
    fn test_scenarios_failed() {
        let err = CliError::ScenariosFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 scenarios failed");
    }

    #[test]
    fn test_invalid_argument() {
        let err = CliError::invalid_argument("no scenarios");
        assert!(err.to_string().contains("Invalid argument"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err: CliError = io.into();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn test_from_ensayo_error_keeps_message() {
        let err: CliError = ensayo::EnsayoError::BrowserNotFound.into();
        assert!(err.to_string().starts_with("Browser not found"));
    }
}
