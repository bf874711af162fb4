//! Result and error types for Ensayo.

use std::time::Duration;
use thiserror::Error;

/// Result type for Ensayo operations
pub type EnsayoResult<T> = Result<T, EnsayoError>;

/// Errors that can occur in Ensayo
#[derive(Debug, Error)]
pub enum EnsayoError {
    /// Browser executable not found
    #[error("Browser not found. Install Chromium or set CHROMIUM_PATH")]
    BrowserNotFound,

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Browser context (session) could not be created or disposed
    #[error("Session error: {message}")]
    SessionError {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// No element matched the locator before the timeout elapsed
    #[error("Timed out after {}ms waiting for {locator}", .timeout.as_millis())]
    LocateTimeout {
        /// Locator in short form
        locator: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Element was found but the action never completed
    #[error("Timed out after {}ms trying to {action} {locator}: {reason}", .timeout.as_millis())]
    ActionTimeout {
        /// Action name (click, fill)
        action: String,
        /// Locator in short form
        locator: String,
        /// Timeout that elapsed
        timeout: Duration,
        /// Last reason the element was not actionable
        reason: String,
    },

    /// Generic operation timeout
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// The run deadline elapsed before a stage finished
    #[error("Deadline exceeded during {stage}")]
    DeadlineExceeded {
        /// Stage that was interrupted
        stage: String,
    },

    /// Script evaluation inside the page failed
    #[error("Script evaluation failed: {message}")]
    ScriptError {
        /// Error message
        message: String,
    },

    /// Input simulation error
    #[error("Input simulation failed: {message}")]
    InputError {
        /// Error message
        message: String,
    },

    /// Assertion failed
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Invalid locator expression
    #[error("Invalid locator '{input}': {message}")]
    InvalidLocator {
        /// Raw input
        input: String,
        /// Error message
        message: String,
    },

    /// Scenario failed validation
    #[error("Invalid scenario '{name}': {message}")]
    InvalidScenario {
        /// Scenario name
        name: String,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl EnsayoError {
    /// Whether this error is one of the timeout variants
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::LocateTimeout { .. }
                | Self::ActionTimeout { .. }
                | Self::Timeout { .. }
                | Self::DeadlineExceeded { .. }
        )
    }
}
