//! ensayador: command-line front end for Ensayo
//!
//! Loads configuration and scenario files, runs them against a browser,
//! prints progress and writes reports.

#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{
    Cli, ColorArg, Commands, ConfigArgs, ConfigFormat, FormatArg, ListArgs, OverrideArgs,
    RunArgs, ValidateArgs,
};
pub use config::{apply_overrides, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::LoadedScenario;
