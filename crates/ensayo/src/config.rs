//! Run configuration shared by every scenario in a run.
//!
//! A [`RunConfig`] is read-only for the duration of a run. It is layered from
//! defaults, an optional YAML file and environment variables; the CLI applies
//! its own flags on top.

use crate::result::{EnsayoError, EnsayoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default application under test
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Environment variable overriding the base URL
pub const ENV_BASE_URL: &str = "ENSAYO_BASE_URL";

/// Environment variable overriding headless mode (`true`/`false`/`1`/`0`)
pub const ENV_HEADLESS: &str = "ENSAYO_HEADLESS";

/// Environment variable pointing at a chromium binary
pub const ENV_CHROMIUM_PATH: &str = "CHROMIUM_PATH";

/// Browser launch flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Avoid `/dev/shm` (small in containers)
    pub disable_dev_shm_usage: bool,
    /// Share the host IPC namespace
    pub ipc_host: bool,
    /// Run renderer and browser in one process
    pub single_process: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Additional raw command-line flags
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            sandbox: true,
            disable_dev_shm_usage: true,
            ipc_host: true,
            single_process: true,
            chromium_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// Command-line flags passed to the browser process
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![format!(
            "--window-size={},{}",
            self.viewport_width, self.viewport_height
        )];
        if self.disable_dev_shm_usage {
            args.push("--disable-dev-shm-usage".to_string());
        }
        if self.ipc_host {
            args.push("--ipc=host".to_string());
        }
        if self.single_process {
            args.push("--single-process".to_string());
        }
        if !self.sandbox {
            args.push("--no-sandbox".to_string());
        }
        for extra in &self.extra_args {
            if !args.contains(extra) {
                args.push(extra.clone());
            }
        }
        args
    }
}

/// Configuration for a scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL relative navigations are resolved against
    pub base_url: String,
    /// Default timeout for locate + act steps (ms)
    pub action_timeout_ms: u64,
    /// Default timeout for page navigation (ms)
    pub navigation_timeout_ms: u64,
    /// Timeout for best-effort frame load waits (ms)
    pub frame_load_timeout_ms: u64,
    /// Default timeout for terminal expectations (ms)
    pub expect_timeout_ms: u64,
    /// Overall deadline for one scenario (ms)
    pub scenario_timeout_ms: u64,
    /// Polling interval for condition-based waits (ms)
    pub poll_interval_ms: u64,
    /// Pause applied before every locate + act step (ms)
    pub action_delay_ms: u64,
    /// Pause after the expectations pass, before teardown (ms)
    pub linger_ms: u64,
    /// Limit for each teardown stage (ms)
    pub teardown_timeout_ms: u64,
    /// Maximum number of scenarios running at once
    pub concurrency: usize,
    /// Browser launch flags
    pub launch: LaunchOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            action_timeout_ms: 5_000,
            navigation_timeout_ms: 10_000,
            frame_load_timeout_ms: 3_000,
            expect_timeout_ms: 5_000,
            scenario_timeout_ms: 120_000,
            poll_interval_ms: 50,
            action_delay_ms: 0,
            linger_ms: 0,
            teardown_timeout_ms: 10_000,
            concurrency: 1,
            launch: LaunchOptions::default(),
        }
    }
}

impl RunConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from YAML; missing keys keep their defaults
    pub fn from_yaml(yaml: &str) -> EnsayoResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn from_file(path: &Path) -> EnsayoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Apply `ENSAYO_BASE_URL`, `ENSAYO_HEADLESS` and `CHROMIUM_PATH`
    pub fn apply_env(self) -> EnsayoResult<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> EnsayoResult<Self> {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_HEADLESS) {
            self.launch.headless = parse_bool(&raw).ok_or_else(|| EnsayoError::ConfigError {
                message: format!("{ENV_HEADLESS} must be a boolean, got '{raw}'"),
            })?;
        }
        if let Some(path) = lookup(ENV_CHROMIUM_PATH) {
            self.launch.chromium_path = Some(path);
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject configurations that cannot drive a run
    pub fn validate(&self) -> EnsayoResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(EnsayoError::ConfigError {
                message: "base_url must not be empty".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(EnsayoError::ConfigError {
                message: "poll_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.teardown_timeout_ms == 0 {
            return Err(EnsayoError::ConfigError {
                message: "teardown_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.concurrency == 0 {
            return Err(EnsayoError::ConfigError {
                message: "concurrency must be at least 1".to_string(),
            });
        }
        if self.launch.viewport_width == 0 || self.launch.viewport_height == 0 {
            return Err(EnsayoError::ConfigError {
                message: "viewport dimensions must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve a possibly relative URL against the base URL
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
            return url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if url.is_empty() || url == "/" {
            format!("{base}/")
        } else if url.starts_with('/') {
            format!("{base}{url}")
        } else {
            format!("{base}/{url}")
        }
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default action timeout
    #[must_use]
    pub const fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the default navigation timeout
    #[must_use]
    pub const fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the best-effort frame load timeout
    #[must_use]
    pub const fn with_frame_load_timeout(mut self, timeout: Duration) -> Self {
        self.frame_load_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the default expectation timeout
    #[must_use]
    pub const fn with_expect_timeout(mut self, timeout: Duration) -> Self {
        self.expect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the overall scenario deadline
    #[must_use]
    pub const fn with_scenario_timeout(mut self, timeout: Duration) -> Self {
        self.scenario_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the pause before each locate + act step
    #[must_use]
    pub const fn with_action_delay(mut self, delay: Duration) -> Self {
        self.action_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the pause after expectations pass
    #[must_use]
    pub const fn with_linger(mut self, linger: Duration) -> Self {
        self.linger_ms = linger.as_millis() as u64;
        self
    }

    /// Set the limit for each teardown stage
    #[must_use]
    pub const fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set concurrency
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.launch.headless = headless;
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.launch.viewport_width = width;
        self.launch.viewport_height = height;
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.launch.sandbox = false;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.launch.chromium_path = Some(path.into());
        self
    }

    /// Default action timeout
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Default navigation timeout
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Best-effort frame load timeout
    #[must_use]
    pub const fn frame_load_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_load_timeout_ms)
    }

    /// Default expectation timeout
    #[must_use]
    pub const fn expect_timeout(&self) -> Duration {
        Duration::from_millis(self.expect_timeout_ms)
    }

    /// Overall scenario deadline
    #[must_use]
    pub const fn scenario_timeout(&self) -> Duration {
        Duration::from_millis(self.scenario_timeout_ms)
    }

    /// Polling interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pause before each locate + act step
    #[must_use]
    pub const fn action_delay(&self) -> Duration {
        Duration::from_millis(self.action_delay_ms)
    }

    /// Pause after expectations pass
    #[must_use]
    pub const fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// Limit for each teardown stage
    #[must_use]
    pub const fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod defaults {
        use super::*;

        #[test]
        fn test_default_timeouts() {
            let config = RunConfig::default();
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert_eq!(config.action_timeout(), Duration::from_secs(5));
            assert_eq!(config.navigation_timeout(), Duration::from_secs(10));
            assert_eq!(config.frame_load_timeout(), Duration::from_secs(3));
            assert_eq!(config.action_delay(), Duration::ZERO);
            assert_eq!(config.teardown_timeout(), Duration::from_secs(10));
            assert_eq!(config.concurrency, 1);
        }

        #[test]
        fn test_zero_teardown_timeout_rejected() {
            let config = RunConfig::new().with_teardown_timeout(Duration::ZERO);
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_each_launch_flag_appears_once() {
            let launch = LaunchOptions {
                sandbox: false,
                extra_args: vec![
                    "--no-sandbox".to_string(),
                    "--window-size=1280,720".to_string(),
                    "--mute-audio".to_string(),
                ],
                ..LaunchOptions::default()
            };
            let args = launch.args();
            for flag in &args {
                assert_eq!(
                    args.iter().filter(|a| *a == flag).count(),
                    1,
                    "{flag} passed more than once"
                );
            }
            assert!(args.contains(&"--no-sandbox".to_string()));
            assert!(args.contains(&"--mute-audio".to_string()));
        }

        #[test]
        fn test_default_launch_args() {
            let args = LaunchOptions::default().args();
            assert_eq!(
                args,
                vec![
                    "--window-size=1280,720",
                    "--disable-dev-shm-usage",
                    "--ipc=host",
                    "--single-process",
                ]
            );
        }

        #[test]
        fn test_no_sandbox_and_extra_args() {
            let mut launch = LaunchOptions {
                sandbox: false,
                ipc_host: false,
                ..LaunchOptions::default()
            };
            launch.extra_args.push("--lang=en-US".to_string());
            let args = launch.args();
            assert!(args.contains(&"--no-sandbox".to_string()));
            assert!(!args.contains(&"--ipc=host".to_string()));
            assert_eq!(args.last().map(String::as_str), Some("--lang=en-US"));
        }
    }

    mod yaml {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = RunConfig::from_yaml(
                r#"
base_url: "http://app.test:8080"
action_timeout_ms: 2500
launch:
  headless: false
  viewport_width: 1920
"#,
            )
            .unwrap();
            assert_eq!(config.base_url, "http://app.test:8080");
            assert_eq!(config.action_timeout(), Duration::from_millis(2500));
            assert_eq!(config.navigation_timeout_ms, 10_000);
            assert!(!config.launch.headless);
            assert_eq!(config.launch.viewport_width, 1920);
            assert_eq!(config.launch.viewport_height, 720);
        }

        #[test]
        fn test_invalid_yaml_rejected() {
            assert!(RunConfig::from_yaml("concurrency: 0").is_err());
            assert!(RunConfig::from_yaml("poll_interval_ms: 0").is_err());
            assert!(RunConfig::from_yaml("base_url: [1, 2]").is_err());
        }

        #[test]
        fn test_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("ensayo.yaml");
            std::fs::write(&path, "linger_ms: 5000\nconcurrency: 4\n").unwrap();
            let config = RunConfig::from_file(&path).unwrap();
            assert_eq!(config.linger(), Duration::from_secs(5));
            assert_eq!(config.concurrency, 4);
        }

        #[test]
        fn test_sample_config_matches_defaults() {
            let sample = include_str!("../../../ensayo.yaml");
            assert_eq!(RunConfig::from_yaml(sample).unwrap(), RunConfig::default());
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = RunConfig::from_file(Path::new("/nonexistent/ensayo.yaml")).unwrap_err();
            assert!(matches!(err, EnsayoError::Io(_)));
        }
    }

    mod env {
        use super::*;

        fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |key: &str| map.get(key).cloned()
        }

        #[test]
        fn test_env_overrides() {
            let config = RunConfig::default()
                .apply_vars(vars(&[
                    (ENV_BASE_URL, "https://staging.example.com"),
                    (ENV_HEADLESS, "0"),
                    (ENV_CHROMIUM_PATH, "/usr/bin/chromium"),
                ]))
                .unwrap();
            assert_eq!(config.base_url, "https://staging.example.com");
            assert!(!config.launch.headless);
            assert_eq!(
                config.launch.chromium_path.as_deref(),
                Some("/usr/bin/chromium")
            );
        }

        #[test]
        fn test_env_bad_bool() {
            let err = RunConfig::default()
                .apply_vars(vars(&[(ENV_HEADLESS, "maybe")]))
                .unwrap_err();
            assert!(err.to_string().contains(ENV_HEADLESS));
        }

        #[test]
        fn test_env_absent_is_noop() {
            let config = RunConfig::default().apply_vars(vars(&[])).unwrap();
            assert_eq!(config, RunConfig::default());
        }
    }

    mod urls {
        use super::*;

        #[test]
        fn test_resolve_relative_and_absolute() {
            let config = RunConfig::default().with_base_url("http://localhost:3000/");
            assert_eq!(config.resolve_url("/"), "http://localhost:3000/");
            assert_eq!(config.resolve_url(""), "http://localhost:3000/");
            assert_eq!(config.resolve_url("/docs"), "http://localhost:3000/docs");
            assert_eq!(config.resolve_url("login"), "http://localhost:3000/login");
            assert_eq!(
                config.resolve_url("https://other.test/x"),
                "https://other.test/x"
            );
            assert_eq!(config.resolve_url("about:blank"), "about:blank");
        }
    }

    #[test]
    fn test_builder_chain() {
        let config = RunConfig::new()
            .with_headless(false)
            .with_viewport(800, 600)
            .with_no_sandbox()
            .with_action_delay(Duration::from_millis(300))
            .with_scenario_timeout(Duration::from_secs(30));
        assert!(!config.launch.headless);
        assert_eq!(config.launch.viewport_width, 800);
        assert!(!config.launch.sandbox);
        assert_eq!(config.action_delay_ms, 300);
        assert_eq!(config.scenario_timeout(), Duration::from_secs(30));
    }
}
