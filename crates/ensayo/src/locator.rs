//! Locator abstraction for element selection.
//!
//! A [`Locator`] names a *set* of candidate elements in the current page and
//! all of its frames; actions use the candidate at the locator's ordinal index
//! (`nth`, default 0). Locators are lazy: nothing is resolved until a step uses
//! them, and every use re-queries the live document.
//!
//! # Design Philosophy
//!
//! - **Semantic first**: role, label, placeholder, text and test id selectors
//!   survive markup refactors; CSS and XPath are the fallback.
//! - **Short form**: every locator has a one-line string form
//!   (`role=button[name="Sign In"]`, `text=Welcome`, `xpath=//form/button`,
//!   optionally suffixed with `>> nth=1`) used in scenario files and logs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::result::{EnsayoError, EnsayoResult};

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css {
        /// Selector text
        selector: String,
    },
    /// XPath expression evaluated against each document
    #[serde(rename = "xpath")]
    XPath {
        /// Expression text
        expression: String,
    },
    /// Visible text content
    Text {
        /// Text to match
        text: String,
        /// Whole-text, case-sensitive match instead of substring
        exact: bool,
    },
    /// ARIA role with an optional accessible name
    Role {
        /// Role name (button, link, textbox, ...)
        role: String,
        /// Accessible name filter
        name: Option<String>,
        /// Whole-name, case-sensitive match instead of substring
        exact: bool,
    },
    /// Form control by its label text
    Label {
        /// Label text
        text: String,
        /// Whole-text, case-sensitive match instead of substring
        exact: bool,
    },
    /// Form control by placeholder
    Placeholder {
        /// Placeholder text
        text: String,
    },
    /// Test ID selector (data-testid attribute)
    TestId {
        /// Attribute value
        id: String,
    },
}

impl Selector {
    /// Whether the selector addresses elements by meaning rather than position
    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        !matches!(self, Self::Css { .. } | Self::XPath { .. })
    }
}

/// A lazy reference to zero or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "LocatorRepr")]
pub struct Locator {
    selector: Selector,
    nth: usize,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self { selector, nth: 0 }
    }

    /// CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css {
            selector: selector.into(),
        })
    }

    /// XPath expression
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::from_selector(Selector::XPath {
            expression: expression.into(),
        })
    }

    /// Elements whose text contains `text` (case-insensitive)
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::Text {
            text: text.into(),
            exact: false,
        })
    }

    /// Elements whose whole text equals `text`
    #[must_use]
    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::Text {
            text: text.into(),
            exact: true,
        })
    }

    /// Elements with an ARIA role, any name
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::from_selector(Selector::Role {
            role: role.into(),
            name: None,
            exact: false,
        })
    }

    /// Elements with an ARIA role whose accessible name contains `name`
    ///
    /// `Locator::role_named("button", "Get Started")`
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_selector(Selector::Role {
            role: role.into(),
            name: Some(name.into()),
            exact: false,
        })
    }

    /// Form control labelled `text`
    #[must_use]
    pub fn label(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::Label {
            text: text.into(),
            exact: false,
        })
    }

    /// Form control with placeholder `text`
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::from_selector(Selector::Placeholder { text: text.into() })
    }

    /// Element with `data-testid="id"`
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::from_selector(Selector::TestId { id: id.into() })
    }

    /// Select the candidate at `index`
    #[must_use]
    pub const fn nth(mut self, index: usize) -> Self {
        self.nth = index;
        self
    }

    /// Select the first candidate
    #[must_use]
    pub const fn first(self) -> Self {
        self.nth(0)
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Ordinal of the candidate actions apply to
    #[must_use]
    pub const fn index(&self) -> usize {
        self.nth
    }

    /// Whether the locator is semantic (role/label/text/...)
    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        self.selector.is_semantic()
    }

    /// JSON description handed to in-page resolution scripts
    #[must_use]
    pub fn to_query_spec(&self) -> serde_json::Value {
        serde_json::json!({
            "selector": self.selector,
            "nth": self.nth,
        })
    }

    /// Parse the short string form
    pub fn parse(input: &str) -> EnsayoResult<Self> {
        let invalid = |message: &str| EnsayoError::InvalidLocator {
            input: input.to_string(),
            message: message.to_string(),
        };

        let (body, nth) = split_nth(input).ok_or_else(|| invalid("malformed '>> nth=' suffix"))?;
        let body = body.trim();
        if body.is_empty() {
            return Err(invalid("empty selector"));
        }

        let selector = if let Some(rest) = body.strip_prefix("text=") {
            match unquote(rest) {
                Some(exact) => Selector::Text {
                    text: exact.to_string(),
                    exact: true,
                },
                None => Selector::Text {
                    text: rest.to_string(),
                    exact: false,
                },
            }
        } else if let Some(rest) = body.strip_prefix("xpath=") {
            Selector::XPath {
                expression: rest.to_string(),
            }
        } else if body.starts_with("//") || body.starts_with("..") {
            Selector::XPath {
                expression: body.to_string(),
            }
        } else if let Some(rest) = body.strip_prefix("css=") {
            Selector::Css {
                selector: rest.to_string(),
            }
        } else if let Some(rest) = body.strip_prefix("role=") {
            parse_role(rest).ok_or_else(|| invalid("expected role=<role>[name=\"...\"]"))?
        } else if let Some(rest) = body.strip_prefix("label=") {
            match unquote(rest) {
                Some(exact) => Selector::Label {
                    text: exact.to_string(),
                    exact: true,
                },
                None => Selector::Label {
                    text: rest.to_string(),
                    exact: false,
                },
            }
        } else if let Some(rest) = body.strip_prefix("placeholder=") {
            Selector::Placeholder {
                text: unquote(rest).unwrap_or(rest).to_string(),
            }
        } else if let Some(rest) = body
            .strip_prefix("testid=")
            .or_else(|| body.strip_prefix("data-testid="))
        {
            Selector::TestId {
                id: unquote(rest).unwrap_or(rest).to_string(),
            }
        } else {
            Selector::Css {
                selector: body.to_string(),
            }
        };

        if selector_body_is_empty(&selector) {
            return Err(invalid("empty selector"));
        }

        Ok(Self { selector, nth })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Selector::Css { selector } => write!(f, "css={selector}")?,
            Selector::XPath { expression } => write!(f, "xpath={expression}")?,
            Selector::Text { text, exact: true } => write!(f, "text=\"{text}\"")?,
            Selector::Text { text, exact: false } => write!(f, "text={text}")?,
            Selector::Role { role, name, exact } => {
                write!(f, "role={role}")?;
                if let Some(name) = name {
                    let suffix = if *exact { "s" } else { "" };
                    write!(f, "[name=\"{name}\"{suffix}]")?;
                }
            }
            Selector::Label { text, exact: true } => write!(f, "label=\"{text}\"")?,
            Selector::Label { text, exact: false } => write!(f, "label={text}")?,
            Selector::Placeholder { text } => write!(f, "placeholder={text}")?,
            Selector::TestId { id } => write!(f, "testid={id}")?,
        }
        if self.nth > 0 {
            write!(f, " >> nth={}", self.nth)?;
        }
        Ok(())
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

impl std::str::FromStr for Locator {
    type Err = EnsayoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Scenario-file representation: short string or structured map
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocatorRepr {
    Short(String),
    Structured(LocatorFields),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LocatorFields {
    css: Option<String>,
    xpath: Option<String>,
    text: Option<String>,
    role: Option<String>,
    name: Option<String>,
    label: Option<String>,
    placeholder: Option<String>,
    test_id: Option<String>,
    #[serde(default)]
    exact: bool,
    #[serde(default)]
    nth: usize,
}

impl TryFrom<LocatorRepr> for Locator {
    type Error = EnsayoError;

    fn try_from(repr: LocatorRepr) -> Result<Self, Self::Error> {
        let fields = match repr {
            LocatorRepr::Short(s) => return Self::parse(&s),
            LocatorRepr::Structured(fields) => fields,
        };

        let LocatorFields {
            css,
            xpath,
            text,
            role,
            name,
            label,
            placeholder,
            test_id,
            exact,
            nth,
        } = fields;

        let mut candidates = Vec::new();
        if let Some(selector) = css {
            candidates.push(Selector::Css { selector });
        }
        if let Some(expression) = xpath {
            candidates.push(Selector::XPath { expression });
        }
        if let Some(text) = text {
            candidates.push(Selector::Text { text, exact });
        }
        if let Some(role) = role {
            candidates.push(Selector::Role {
                role,
                name: name.clone(),
                exact,
            });
        } else if name.is_some() {
            return Err(EnsayoError::InvalidLocator {
                input: format!("name={}", name.unwrap_or_default()),
                message: "'name' is only valid together with 'role'".to_string(),
            });
        }
        if let Some(text) = label {
            candidates.push(Selector::Label { text, exact });
        }
        if let Some(text) = placeholder {
            candidates.push(Selector::Placeholder { text });
        }
        if let Some(id) = test_id {
            candidates.push(Selector::TestId { id });
        }

        if candidates.len() != 1 {
            return Err(EnsayoError::InvalidLocator {
                input: format!("{} selector keys", candidates.len()),
                message: "exactly one of css, xpath, text, role, label, placeholder, test_id is required"
                    .to_string(),
            });
        }

        let selector = candidates.remove(0);
        if selector_body_is_empty(&selector) {
            return Err(EnsayoError::InvalidLocator {
                input: String::new(),
                message: "empty selector".to_string(),
            });
        }
        Ok(Self { selector, nth })
    }
}

/// What an assertion waits to see: plain text or any locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Target {
    /// Visible text anywhere on the page
    Text(String),
    /// A located element
    Locator(Locator),
}

impl Target {
    /// Parse: recognised locator prefixes become locators, anything else is text
    pub fn parse(input: &str) -> EnsayoResult<Self> {
        const PREFIXES: [&str; 8] = [
            "text=",
            "css=",
            "xpath=",
            "role=",
            "label=",
            "placeholder=",
            "testid=",
            "data-testid=",
        ];
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EnsayoError::InvalidLocator {
                input: input.to_string(),
                message: "empty target".to_string(),
            });
        }
        if trimmed.starts_with("//") || PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            Locator::parse(trimmed).map(Self::Locator)
        } else {
            Ok(Self::Text(trimmed.to_string()))
        }
    }

    /// The locator polled for this target (first text match for plain text)
    #[must_use]
    pub fn locator(&self) -> Locator {
        match self {
            Self::Text(text) => Locator::text(text.clone()).first(),
            Self::Locator(locator) => locator.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Locator(locator) => write!(f, "{locator}"),
        }
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.to_string()
    }
}

impl TryFrom<String> for Target {
    type Error = EnsayoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locator> for Target {
    fn from(locator: Locator) -> Self {
        Self::Locator(locator)
    }
}

fn selector_body_is_empty(selector: &Selector) -> bool {
    match selector {
        Selector::Css { selector } => selector.trim().is_empty(),
        Selector::XPath { expression } => expression.trim().is_empty(),
        Selector::Text { text, .. }
        | Selector::Label { text, .. }
        | Selector::Placeholder { text } => text.is_empty(),
        Selector::Role { role, .. } => role.trim().is_empty(),
        Selector::TestId { id } => id.trim().is_empty(),
    }
}

/// Split off a trailing `>> nth=N`; `None` when the suffix is malformed
fn split_nth(input: &str) -> Option<(&str, usize)> {
    match input.rfind(">>") {
        Some(pos) => {
            let suffix = input[pos + 2..].trim();
            let index = suffix.strip_prefix("nth=")?.trim().parse().ok()?;
            Some((&input[..pos], index))
        }
        None => Some((input, 0)),
    }
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

fn role_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"^([A-Za-z][A-Za-z-]*)\s*(?:\[\s*name\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\]"']*?))\s*(s|i)?\s*\])?$"#,
        )
        .unwrap_or_else(|_| unreachable!("role pattern is a valid regex"))
    })
}

fn parse_role(rest: &str) -> Option<Selector> {
    let caps = role_pattern().captures(rest.trim())?;
    let role = caps.get(1)?.as_str().to_ascii_lowercase();
    let name = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map(|m| m.as_str().to_string());
    let exact = caps.get(5).is_some_and(|m| m.as_str() == "s");
    Some(Selector::Role { role, name, exact })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod short_form {
        use super::*;

        #[test]
        fn test_text_prefix() {
            let locator = Locator::parse("text=Welcome Back").unwrap();
            assert_eq!(locator, Locator::text("Welcome Back"));
            assert!(locator.is_semantic());
        }

        #[test]
        fn test_quoted_text_is_exact() {
            let locator = Locator::parse("text=\"Sign In\"").unwrap();
            assert_eq!(locator, Locator::exact_text("Sign In"));
        }

        #[test]
        fn test_text_with_apostrophe_is_substring() {
            let locator = Locator::parse("text=Don't have an account? Sign up").unwrap();
            assert_eq!(locator, Locator::text("Don't have an account? Sign up"));
        }

        #[test]
        fn test_xpath_prefix_and_slashes() {
            let a = Locator::parse("xpath=html/body/header/div/a").unwrap();
            assert_eq!(a, Locator::xpath("html/body/header/div/a"));
            assert!(!a.is_semantic());

            let b = Locator::parse("//form/button").unwrap();
            assert_eq!(b, Locator::xpath("//form/button"));
        }

        #[test]
        fn test_bare_string_is_css() {
            let locator = Locator::parse("button.primary").unwrap();
            assert_eq!(locator, Locator::css("button.primary"));
        }

        #[test]
        fn test_role_with_name() {
            let locator = Locator::parse(r#"role=button[name="Get Started"]"#).unwrap();
            assert_eq!(locator, Locator::role_named("button", "Get Started"));
        }

        #[test]
        fn test_role_single_quotes_and_exact_flag() {
            let locator = Locator::parse("role=link[name='Sign up' s]").unwrap();
            assert_eq!(
                locator.selector(),
                &Selector::Role {
                    role: "link".to_string(),
                    name: Some("Sign up".to_string()),
                    exact: true,
                }
            );
        }

        #[test]
        fn test_role_without_name() {
            let locator = Locator::parse("role=textbox").unwrap();
            assert_eq!(locator, Locator::role("textbox"));
        }

        #[test]
        fn test_label_placeholder_testid() {
            assert_eq!(Locator::parse("label=Email").unwrap(), Locator::label("Email"));
            assert_eq!(
                Locator::parse("placeholder=you@example.com").unwrap(),
                Locator::placeholder("you@example.com")
            );
            assert_eq!(
                Locator::parse("testid=submit").unwrap(),
                Locator::test_id("submit")
            );
            assert_eq!(
                Locator::parse("data-testid=\"submit\"").unwrap(),
                Locator::test_id("submit")
            );
        }

        #[test]
        fn test_nth_suffix() {
            let locator = Locator::parse("role=link >> nth=3").unwrap();
            assert_eq!(locator, Locator::role("link").nth(3));
            assert_eq!(locator.index(), 3);
        }

        #[test]
        fn test_rejections() {
            assert!(Locator::parse("").is_err());
            assert!(Locator::parse("   ").is_err());
            assert!(Locator::parse("text=").is_err());
            assert!(Locator::parse("role=").is_err());
            assert!(Locator::parse("role=button[nome=x]").is_err());
            assert!(Locator::parse("css=a >> nth=x").is_err());
            assert!(Locator::parse("css=a >> first").is_err());
        }

        #[test]
        fn test_display_is_reparseable() {
            let locators = [
                Locator::role_named("button", "Create Account").nth(1),
                Locator::exact_text("Sign In"),
                Locator::xpath("html/body/div[3]/div/div[5]/form/button"),
                Locator::label("Password"),
                Locator::test_id("hero"),
            ];
            for locator in locators {
                assert_eq!(Locator::parse(&locator.to_string()).unwrap(), locator);
            }
        }
    }

    mod structured {
        use super::*;

        #[test]
        fn test_yaml_short_form() {
            let locator: Locator = serde_yaml_ng::from_str("\"text=Github\"").unwrap();
            assert_eq!(locator, Locator::text("Github"));
        }

        #[test]
        fn test_yaml_map_form() {
            let locator: Locator =
                serde_yaml_ng::from_str("{ role: button, name: Create Account, nth: 1 }").unwrap();
            assert_eq!(locator, Locator::role_named("button", "Create Account").nth(1));
        }

        #[test]
        fn test_yaml_exact_label() {
            let locator: Locator = serde_yaml_ng::from_str("{ label: Email, exact: true }").unwrap();
            assert_eq!(
                locator.selector(),
                &Selector::Label {
                    text: "Email".to_string(),
                    exact: true
                }
            );
        }

        #[test]
        fn test_yaml_rejects_two_selectors() {
            let result: Result<Locator, _> = serde_yaml_ng::from_str("{ css: a, text: b }");
            assert!(result.is_err());
        }

        #[test]
        fn test_yaml_rejects_orphan_name() {
            let result: Result<Locator, _> = serde_yaml_ng::from_str("{ name: Submit }");
            assert!(result.is_err());
        }

        #[test]
        fn test_serializes_to_short_form() {
            let json = serde_json::to_string(&Locator::label("Email").nth(2)).unwrap();
            assert_eq!(json, "\"label=Email >> nth=2\"");
        }

        #[test]
        fn test_query_spec_shape() {
            let spec = Locator::role_named("button", "Sign In").nth(1).to_query_spec();
            assert_eq!(spec["nth"], 1);
            assert_eq!(spec["selector"]["kind"], "role");
            assert_eq!(spec["selector"]["role"], "button");
            assert_eq!(spec["selector"]["name"], "Sign In");

            let xpath = Locator::xpath("//a").to_query_spec();
            assert_eq!(xpath["selector"]["kind"], "xpath");
            assert_eq!(xpath["selector"]["expression"], "//a");
        }
    }

    mod target {
        use super::*;

        #[test]
        fn test_plain_string_is_text() {
            let target = Target::parse("Registration Complete! Welcome New User").unwrap();
            assert_eq!(
                target,
                Target::Text("Registration Complete! Welcome New User".to_string())
            );
            assert_eq!(
                target.locator(),
                Locator::text("Registration Complete! Welcome New User")
            );
        }

        #[test]
        fn test_prefixed_string_is_locator() {
            let target = Target::parse("role=heading[name=\"Welcome Back\"]").unwrap();
            assert!(matches!(target, Target::Locator(_)));
        }

        #[test]
        fn test_empty_target_rejected() {
            assert!(Target::parse("  ").is_err());
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(input in ".{0,64}") {
                let _ = Locator::parse(&input);
            }

            #[test]
            fn text_content_is_preserved(text in "[A-Za-z0-9 !?.,']{1,40}") {
                prop_assume!(!text.trim().is_empty());
                prop_assume!(text.trim() == text);
                prop_assume!(!text.contains(">>"));
                prop_assume!(!(text.starts_with('\'') && text.ends_with('\'') && text.len() >= 2));
                let locator = Locator::parse(&format!("text={text}")).unwrap();
                prop_assert_eq!(locator, Locator::text(text));
            }

            #[test]
            fn nth_suffix_roundtrips(index in 0usize..1000) {
                let locator = Locator::parse(&format!("css=li >> nth={index}")).unwrap();
                prop_assert_eq!(locator.index(), index);
            }
        }
    }
}
