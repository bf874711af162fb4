//! CLI configuration
//!
//! The effective [`RunConfig`] is layered, lowest priority first:
//!
//! ```text
//! defaults ──► --config file ──► ENSAYO_* / CHROMIUM_PATH ──► CLI flags
//! ```

use crate::commands::OverrideArgs;
use crate::error::{CliError, CliResult};
use ensayo::{FailureMode, RunConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Derive verbosity from `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "ensayo=warn,ensayo_cli=warn,error",
            Self::Verbose => "ensayo=info,ensayo_cli=info,warn",
            Self::Debug => "ensayo=debug,ensayo_cli=debug,info",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// JSON log lines instead of compact text
    pub log_json: bool,
    /// Configuration file
    pub config_file: Option<PathBuf>,
    /// Stop scheduling scenarios after the first failure
    pub fail_fast: bool,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set JSON logging
    #[must_use]
    pub const fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }

    /// Set the configuration file
    #[must_use]
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Set fail fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Failure mode for the suite
    #[must_use]
    pub const fn failure_mode(&self) -> FailureMode {
        if self.fail_fast {
            FailureMode::AndonCord
        } else {
            FailureMode::CollectAll
        }
    }

    /// Build the effective run configuration
    pub fn run_config(&self, overrides: &OverrideArgs) -> CliResult<RunConfig> {
        let base = load_file(self.config_file.as_deref())?;
        let config = apply_overrides(base.apply_env()?, overrides);
        config.validate()?;
        Ok(config)
    }
}

fn load_file(path: Option<&Path>) -> CliResult<RunConfig> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };
    if !path.exists() {
        return Err(CliError::config(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    tracing::debug!(path = %path.display(), "Loading config file");
    Ok(RunConfig::from_file(path)?)
}

/// Apply CLI flags on top of `config`
#[must_use]
pub fn apply_overrides(mut config: RunConfig, overrides: &OverrideArgs) -> RunConfig {
    if let Some(url) = &overrides.base_url {
        config.base_url.clone_from(url);
    }
    if overrides.headed {
        config.launch.headless = false;
    }
    if let Some(ms) = overrides.timeout {
        config.action_timeout_ms = ms;
    }
    if let Some(ms) = overrides.expect_timeout {
        config.expect_timeout_ms = ms;
    }
    if let Some(ms) = overrides.action_delay {
        config.action_delay_ms = ms;
    }
    if let Some(ms) = overrides.linger {
        config.linger_ms = ms;
    }
    if let Some(jobs) = overrides.jobs {
        config.concurrency = jobs;
    }
    if overrides.no_sandbox {
        config.launch.sandbox = false;
    }
    if let Some(path) = &overrides.chromium {
        config.launch.chromium_path = Some(path.clone());
    }
    config
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(3, false), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
        }

        #[test]
        fn test_predicates() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
            assert!(Verbosity::Debug.is_debug());
            assert!(!Verbosity::Normal.is_verbose());
        }

        #[test]
        fn test_filter_directive_parses() {
            for verbosity in [
                Verbosity::Quiet,
                Verbosity::Normal,
                Verbosity::Verbose,
                Verbosity::Debug,
            ] {
                let directive = verbosity.filter_directive();
                assert!(tracing_subscriber::EnvFilter::try_new(directive).is_ok());
            }
        }
    }

    mod color_tests {
        use super::*;

        #[test]
        fn test_explicit_choices() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod cli_config_tests {
        use super::*;
        use std::io::Write;

        #[test]
        fn test_builders() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Verbose)
                .with_color(ColorChoice::Never)
                .with_log_json(true)
                .with_fail_fast(true);
            assert_eq!(config.verbosity, Verbosity::Verbose);
            assert_eq!(config.color, ColorChoice::Never);
            assert!(config.log_json);
            assert_eq!(config.failure_mode(), FailureMode::AndonCord);
            assert_eq!(CliConfig::new().failure_mode(), FailureMode::CollectAll);
        }

        #[test]
        fn test_overrides_win() {
            let overrides = OverrideArgs {
                base_url: Some("http://localhost:8080".to_string()),
                headed: true,
                timeout: Some(2_000),
                jobs: Some(3),
                no_sandbox: true,
                ..OverrideArgs::default()
            };
            let config = apply_overrides(RunConfig::default(), &overrides);
            assert_eq!(config.base_url, "http://localhost:8080");
            assert!(!config.launch.headless);
            assert_eq!(config.action_timeout_ms, 2_000);
            assert_eq!(config.concurrency, 3);
            assert!(!config.launch.sandbox);
            assert_eq!(config.expect_timeout_ms, 5_000);
        }

        #[test]
        fn test_no_overrides_keeps_config() {
            let config = apply_overrides(RunConfig::default(), &OverrideArgs::default());
            assert_eq!(config, RunConfig::default());
        }

        #[test]
        fn test_file_then_flags() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "action_timeout_ms: 7000\nconcurrency: 2").unwrap();

            let cli = CliConfig::new().with_config_file(Some(file.path().to_path_buf()));
            let overrides = OverrideArgs {
                jobs: Some(4),
                ..OverrideArgs::default()
            };
            let config = cli.run_config(&overrides).unwrap();
            assert_eq!(config.action_timeout_ms, 7_000);
            assert_eq!(config.concurrency, 4);
        }

        #[test]
        fn test_missing_file() {
            let cli = CliConfig::new().with_config_file(Some(PathBuf::from("/nonexistent/ensayo.yaml")));
            let err = cli.run_config(&OverrideArgs::default()).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_zero_jobs_rejected() {
            let overrides = OverrideArgs {
                jobs: Some(0),
                ..OverrideArgs::default()
            };
            let err = CliConfig::new().run_config(&overrides).unwrap_err();
            assert!(err.to_string().contains("concurrency"));
        }
    }
}
