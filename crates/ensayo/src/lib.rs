//! Ensayo: declarative browser scenario runner
//!
//! Ensayo (Spanish: "rehearsal") runs end-to-end scenarios written as data
//! against a real browser. A scenario navigates, clicks and fills through
//! semantic locators, then checks that the expected text is on screen.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ENSAYO Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Scenario   │    │ Session    │            │
//! │   │ (YAML)     │───►│ Runner     │───►│ (waits,    │            │
//! │   │            │    │            │    │ teardown)  │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           │                 │                   │
//! │                     ┌─────▼──────┐    ┌─────▼──────┐            │
//! │                     │ Reporter   │    │ Driver     │            │
//! │                     │ text/json/ │    │ chromium / │            │
//! │                     │ junit      │    │ mock       │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use ensayo::prelude::*;
//! use std::sync::Arc;
//!
//! let scenario = Scenario::from_file("scenarios/registration.yaml".as_ref())?;
//! let config = RunConfig::new().with_base_url("http://localhost:3000");
//! let runner = ScenarioRunner::new(Arc::new(ChromiumDriver::new()), config);
//! let outcome = runner.run(&scenario).await;
//! println!("{outcome}");
//! ```

#![warn(missing_docs)]

/// Run configuration and browser launch options
pub mod config;

/// Engine drivers: the browser-automation contract, Chromium and mock
#[allow(clippy::missing_errors_doc)]
pub mod driver;

mod locator;
mod outcome;
mod reporter;
mod result;
mod runner;
mod scenario;
mod session;

/// Load states and polling
pub mod wait;

pub use config::{LaunchOptions, RunConfig};
#[cfg(feature = "browser")]
pub use driver::ChromiumDriver;
pub use driver::{Driver, MockApp, MockDocument, MockDriver, MockEffect, MockElement};
pub use locator::{Locator, Selector, Target};
pub use outcome::{Failure, FailureKind, Outcome, StepRecord, StepStatus, Verdict};
pub use reporter::{FailureMode, ReportFormat, Reporter, SuiteReport};
pub use result::{EnsayoError, EnsayoResult};
pub use runner::{run, ScenarioRunner};
pub use scenario::{ElementState, Expectation, Scenario, Step};
pub use session::{Session, SessionBuilder, SetupFailure, TeardownReport};
pub use wait::{LoadState, Poller};

/// Common imports
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::ChromiumDriver;
    pub use super::{
        Driver, ElementState, EnsayoError, EnsayoResult, Expectation, FailureKind, FailureMode,
        LoadState, Locator, MockDriver, Outcome, ReportFormat, Reporter, RunConfig, Scenario,
        ScenarioRunner, Step, Target,
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;

        #[test]
        fn test_ensayo_error_display() {
            let err = EnsayoError::BrowserNotFound;
            assert!(err.to_string().contains("Browser"));
        }

        #[test]
        fn test_ensayo_error_timeout() {
            let err = EnsayoError::Timeout { ms: 5000 };
            assert!(err.to_string().contains("5000"));
            assert!(err.is_timeout());
        }
    }

    mod reexport_tests {
        #[test]
        fn test_prelude_builds_a_scenario() {
            use crate::prelude::*;
            let scenario = Scenario::new("smoke").step(Step::Navigate {
                url: "/".to_string(),
                wait_until: LoadState::Commit,
                timeout_ms: None,
            });
            assert!(scenario.validate().is_ok());
            assert_eq!(Locator::parse("text=Sign In").unwrap().to_string(), "text=Sign In");
        }
    }
}
