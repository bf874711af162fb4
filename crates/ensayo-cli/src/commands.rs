//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ensayador: run declarative browser scenarios against a web application
#[derive(Parser, Debug)]
#[command(name = "ensayador")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (YAML)
    #[arg(short, long, global = true, env = "ENSAYO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios in a browser
    Run(RunArgs),

    /// Check scenario files without launching a browser
    Validate(ValidateArgs),

    /// List the scenarios in the given files
    List(ListArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Overrides applied on top of the configuration file and environment
#[derive(Args, Debug, Default, Clone)]
pub struct OverrideArgs {
    /// Base URL relative navigations resolve against
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Default locate + act timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Terminal expectation timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub expect_timeout: Option<u64>,

    /// Pause before every interaction in milliseconds
    #[arg(long, value_name = "MS")]
    pub action_delay: Option<u64>,

    /// Pause after the expectations pass in milliseconds
    #[arg(long, value_name = "MS")]
    pub linger: Option<u64>,

    /// Number of scenarios to run at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Launch chromium without its sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Path to a chromium binary
    #[arg(long, value_name = "PATH")]
    pub chromium: Option<String>,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario files or directories of `.yaml` files
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Only run scenarios carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: FormatArg,

    /// Write the report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop starting scenarios after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Configuration overrides
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario files or directories of `.yaml` files
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Scenario files or directories of `.yaml` files
    #[arg(required = true)]
    pub scenarios: Vec<PathBuf>,

    /// Only list scenarios carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Configuration overrides
    #[command(flatten)]
    pub overrides: OverrideArgs,
}

/// Report format argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON document
    Json,
    /// JUnit XML
    Junit,
}

impl From<FormatArg> for ensayo::ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
            FormatArg::Junit => Self::Junit,
        }
    }
}

/// Output format for the config command
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    #[default]
    Yaml,
    /// JSON
    Json,
}

/// Color argument
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_verify_cli() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }

        #[test]
        fn test_run_with_flags() {
            let cli = Cli::try_parse_from([
                "ensayador",
                "run",
                "scenarios/registration.yaml",
                "--base-url",
                "http://localhost:8080",
                "--headed",
                "--timeout",
                "2000",
                "-j",
                "4",
                "--format",
                "junit",
                "--output",
                "report.xml",
                "--fail-fast",
            ])
            .unwrap();

            let Commands::Run(args) = cli.command else {
                panic!("expected run");
            };
            assert_eq!(args.scenarios.len(), 1);
            assert_eq!(
                args.overrides.base_url.as_deref(),
                Some("http://localhost:8080")
            );
            assert!(args.overrides.headed);
            assert_eq!(args.overrides.timeout, Some(2000));
            assert_eq!(args.overrides.jobs, Some(4));
            assert_eq!(args.format, FormatArg::Junit);
            assert!(args.fail_fast);
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let cli = Cli::try_parse_from(["ensayador", "list", "a.yaml", "-vv", "--log-json"])
                .unwrap();
            assert_eq!(cli.verbose, 2);
            assert!(cli.log_json);
        }

        #[test]
        fn test_run_requires_files() {
            assert!(Cli::try_parse_from(["ensayador", "run"]).is_err());
        }

        #[test]
        fn test_config_defaults() {
            let cli = Cli::try_parse_from(["ensayador", "config"]).unwrap();
            let Commands::Config(args) = cli.command else {
                panic!("expected config");
            };
            assert_eq!(args.format, ConfigFormat::Yaml);
            assert!(args.overrides.base_url.is_none());
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_format_arg_conversion() {
            assert_eq!(
                ensayo::ReportFormat::from(FormatArg::Junit),
                ensayo::ReportFormat::Junit
            );
            assert_eq!(
                ensayo::ReportFormat::from(FormatArg::Text),
                ensayo::ReportFormat::Text
            );
        }

        #[test]
        fn test_color_arg_conversion() {
            use crate::config::ColorChoice;
            assert_eq!(ColorChoice::from(ColorArg::Never), ColorChoice::Never);
            assert_eq!(ColorChoice::from(ColorArg::Always), ColorChoice::Always);
        }
    }
}
