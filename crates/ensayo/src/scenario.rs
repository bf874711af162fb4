//! Scenario YAML schema.
//!
//! A scenario is data: a name, an ordered list of steps and the terminal
//! expectations that decide pass or fail.
//!
//! ```yaml
//! name: registration
//! steps:
//!   - action: navigate
//!     url: /
//!   - action: click
//!     locator: role=button[name="Get Started"]
//!   - action: fill
//!     locator: label=Email
//!     value: newuser@example.com
//! expect:
//!   - "Registration Complete! Welcome New User"
//!   - visible: role=heading[name="Dashboard"]
//!     timeout_ms: 1000
//! failure_reason: Registration did not complete
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::locator::{Locator, Target};
use crate::result::{EnsayoError, EnsayoResult};
use crate::wait::LoadState;

/// Element state awaited by a `wait_for` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    /// Present and visible
    #[default]
    Visible,
    /// Absent or hidden
    Hidden,
}

const fn commit() -> LoadState {
    LoadState::Commit
}

/// One scenario step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Load a URL in the current page
    Navigate {
        /// Absolute URL or path relative to the base URL
        url: String,
        /// Load state that completes the navigation
        #[serde(default = "commit")]
        wait_until: LoadState,
        /// Override of the navigation timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Click an element
    Click {
        /// Element to click
        locator: Locator,
        /// Override of the action timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Replace an input's value; an empty value clears it
    Fill {
        /// Input to fill
        locator: Locator,
        /// New value
        value: String,
        /// Override of the action timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Unconditional pause
    Wait {
        /// Pause length
        ms: u64,
    },
    /// Wait for an element to become visible or hidden
    WaitFor {
        /// Element to watch
        locator: Locator,
        /// State to reach
        #[serde(default)]
        state: ElementState,
        /// Override of the expectation timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Wait for the current page to reach a load state
    WaitForLoad {
        /// State to reach
        state: LoadState,
        /// Override of the navigation timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    /// Mid-scenario visibility check
    AssertVisible {
        /// Text or element expected on screen
        target: Target,
        /// Override of the expectation timeout
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        /// Reported instead of the raw timeout when the check fails
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Scroll the page (one viewport height by default)
    Scroll {
        /// Pixels to scroll; negative scrolls up
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pixels: Option<i64>,
    },
}

impl Step {
    /// Action name as written in scenario files
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Wait { .. } => "wait",
            Self::WaitFor { .. } => "wait_for",
            Self::WaitForLoad { .. } => "wait_for_load",
            Self::AssertVisible { .. } => "assert_visible",
            Self::Scroll { .. } => "scroll",
        }
    }

    /// Whether the step locates an element and acts on it
    #[must_use]
    pub const fn is_interaction(&self) -> bool {
        matches!(self, Self::Click { .. } | Self::Fill { .. })
    }

    /// Explicit timeout override
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::Navigate { timeout_ms, .. }
            | Self::Click { timeout_ms, .. }
            | Self::Fill { timeout_ms, .. }
            | Self::WaitFor { timeout_ms, .. }
            | Self::WaitForLoad { timeout_ms, .. }
            | Self::AssertVisible { timeout_ms, .. } => timeout_ms.map(Duration::from_millis),
            Self::Wait { .. } | Self::Scroll { .. } => None,
        }
    }

    /// One-line description for logs and reports
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Navigate { url, wait_until, .. } => format!("navigate {url} ({wait_until})"),
            Self::Click { locator, .. } => format!("click {locator}"),
            Self::Fill { locator, value, .. } if value.is_empty() => format!("clear {locator}"),
            Self::Fill { locator, .. } => format!("fill {locator}"),
            Self::Wait { ms } => format!("wait {ms}ms"),
            Self::WaitFor { locator, state, .. } => {
                let state = match state {
                    ElementState::Visible => "visible",
                    ElementState::Hidden => "hidden",
                };
                format!("wait for {locator} {state}")
            }
            Self::WaitForLoad { state, .. } => format!("wait for {state}"),
            Self::AssertVisible { target, .. } => format!("assert visible {target}"),
            Self::Scroll { pixels: Some(px) } => format!("scroll {px}px"),
            Self::Scroll { pixels: None } => "scroll one viewport".to_string(),
        }
    }
}

/// A terminal visibility expectation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ExpectationRepr")]
pub struct Expectation {
    /// Text or element expected on screen
    #[serde(rename = "visible")]
    pub target: Target,
    /// Override of the expectation timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Expectation {
    /// Expect `target` to be visible
    #[must_use]
    pub const fn visible(target: Target) -> Self {
        Self {
            target,
            timeout_ms: None,
        }
    }

    /// Set the timeout
    #[must_use]
    pub const fn within(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpectationRepr {
    Short(Target),
    Full {
        #[serde(alias = "target")]
        visible: Target,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl From<ExpectationRepr> for Expectation {
    fn from(repr: ExpectationRepr) -> Self {
        match repr {
            ExpectationRepr::Short(target) => Self::visible(target),
            ExpectationRepr::Full {
                visible,
                timeout_ms,
            } => Self {
                target: visible,
                timeout_ms,
            },
        }
    }
}

/// A named, ordered list of steps plus terminal expectations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Free-form tags for filtering
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Steps, executed strictly in order
    pub steps: Vec<Step>,
    /// Terminal expectations, checked after every step succeeded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expect: Vec<Expectation>,
    /// Reported verbatim when an expectation fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl Scenario {
    /// Create a scenario with no steps
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            steps: Vec::new(),
            expect: Vec::new(),
            failure_reason: None,
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append a terminal expectation
    #[must_use]
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expect.push(expectation);
        self
    }

    /// Set the failure reason
    #[must_use]
    pub fn failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// Parse and validate a scenario from YAML
    pub fn from_yaml(yaml: &str) -> EnsayoResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load and validate a scenario file
    pub fn from_file(path: &Path) -> EnsayoResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml).map_err(|e| match e {
            EnsayoError::Yaml(err) => EnsayoError::InvalidScenario {
                name: path.display().to_string(),
                message: err.to_string(),
            },
            other => other,
        })
    }

    /// Check structural invariants
    pub fn validate(&self) -> EnsayoResult<()> {
        let invalid = |message: String| EnsayoError::InvalidScenario {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("at least one step is required".to_string()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let Step::Navigate { url, .. } = step {
                if url.trim().is_empty() {
                    return Err(invalid(format!("step {}: url must not be empty", index + 1)));
                }
            }
        }
        if self.failure_reason.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(invalid("failure_reason must not be blank".to_string()));
        }
        Ok(())
    }

    /// Whether the scenario carries `tag`
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const REGISTRATION: &str = r#"
name: registration
description: New user signs up from the landing page
tags: [smoke, auth]
steps:
  - action: navigate
    url: /
  - action: click
    locator: role=button[name="Get Started"]
  - action: fill
    locator: label=Email
    value: newuser@example.com
  - action: fill
    locator: { label: Password }
    value: ""
  - action: wait
    ms: 250
  - action: scroll
  - action: assert_visible
    target: Create Account
    message: Form did not render
expect:
  - "Registration Complete! Welcome New User"
  - visible: role=heading[name="Dashboard"]
    timeout_ms: 1000
failure_reason: Registration did not complete
"#;

    mod parsing {
        use super::*;

        #[test]
        fn test_parse_full_scenario() {
            let scenario = Scenario::from_yaml(REGISTRATION).unwrap();
            assert_eq!(scenario.name, "registration");
            assert_eq!(scenario.steps.len(), 7);
            assert!(scenario.has_tag("smoke"));
            assert_eq!(
                scenario.failure_reason.as_deref(),
                Some("Registration did not complete")
            );
        }

        #[test]
        fn test_navigate_defaults_to_commit() {
            let scenario = Scenario::from_yaml(REGISTRATION).unwrap();
            assert_eq!(
                scenario.steps[0],
                Step::Navigate {
                    url: "/".to_string(),
                    wait_until: LoadState::Commit,
                    timeout_ms: None,
                }
            );
        }

        #[test]
        fn test_empty_fill_value_is_kept() {
            let scenario = Scenario::from_yaml(REGISTRATION).unwrap();
            match &scenario.steps[3] {
                Step::Fill { value, locator, .. } => {
                    assert_eq!(value, "");
                    assert_eq!(locator, &Locator::label("Password"));
                }
                other => panic!("unexpected step {other:?}"),
            }
            assert_eq!(scenario.steps[3].describe(), "clear label=Password");
        }

        #[test]
        fn test_fill_without_value_rejected() {
            let yaml = "name: x\nsteps:\n  - action: fill\n    locator: label=Email\n";
            assert!(Scenario::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_expectation_forms() {
            let scenario = Scenario::from_yaml(REGISTRATION).unwrap();
            assert_eq!(
                scenario.expect[0],
                Expectation::visible(Target::Text(
                    "Registration Complete! Welcome New User".to_string()
                ))
            );
            assert_eq!(scenario.expect[1].timeout_ms, Some(1000));
            assert!(matches!(scenario.expect[1].target, Target::Locator(_)));
        }

        #[test]
        fn test_unknown_action_rejected() {
            let yaml = "name: x\nsteps:\n  - action: hover\n    locator: a\n";
            assert!(Scenario::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_unknown_step_field_rejected() {
            let yaml = "name: x\nsteps:\n  - action: click\n    locator: a\n    force: true\n";
            assert!(Scenario::from_yaml(yaml).is_err());
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn test_empty_steps_rejected() {
            let result = Scenario::from_yaml("name: empty\nsteps: []\n");
            assert!(matches!(result, Err(EnsayoError::InvalidScenario { .. })));
        }

        #[test]
        fn test_blank_name_rejected() {
            let scenario = Scenario::new("  ").step(Step::Wait { ms: 1 });
            assert!(scenario.validate().is_err());
        }

        #[test]
        fn test_empty_url_rejected() {
            let scenario = Scenario::new("nav").step(Step::Navigate {
                url: String::new(),
                wait_until: LoadState::Load,
                timeout_ms: None,
            });
            let err = scenario.validate().unwrap_err();
            assert!(err.to_string().contains("step 1"));
        }

        #[test]
        fn test_negative_nth_rejected() {
            let yaml = "name: x\nsteps:\n  - action: click\n    locator: { css: a, nth: -1 }\n";
            assert!(Scenario::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("registration.yaml");
            std::fs::write(&path, REGISTRATION).unwrap();
            let scenario = Scenario::from_file(&path).unwrap();
            assert_eq!(scenario.name, "registration");

            let broken = dir.path().join("broken.yaml");
            std::fs::write(&broken, "name: [").unwrap();
            let err = Scenario::from_file(&broken).unwrap_err();
            assert!(err.to_string().contains("broken.yaml"));
        }
    }

    mod steps {
        use super::*;

        #[test]
        fn test_timeouts_and_names() {
            let step = Step::Click {
                locator: Locator::text("Sign In"),
                timeout_ms: Some(750),
            };
            assert_eq!(step.timeout(), Some(Duration::from_millis(750)));
            assert_eq!(step.action(), "click");
            assert!(step.is_interaction());
            assert_eq!(Step::Wait { ms: 5 }.timeout(), None);
        }

        #[test]
        fn test_serializes_back_to_yaml() {
            let scenario = Scenario::new("s")
                .step(Step::Scroll { pixels: None })
                .expect(Expectation::visible(Target::Text("Done".to_string())));
            let yaml = serde_yaml_ng::to_string(&scenario).unwrap();
            assert!(yaml.contains("action: scroll"));
            assert!(yaml.contains("visible: Done"));
        }
    }
}
