//! Scenario discovery and suite execution

use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use ensayo::{Driver, EnsayoResult, FailureMode, Reporter, RunConfig, Scenario, ScenarioRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A scenario and the file it came from
#[derive(Debug, Clone)]
pub struct LoadedScenario {
    /// Source file
    pub path: PathBuf,
    /// Parsed scenario
    pub scenario: Scenario,
}

fn is_scenario_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Expand directories into their `.yaml`/`.yml` files (sorted, not recursive)
pub fn collect_files(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = std::fs::read_dir(path)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && is_scenario_file(p))
                .collect::<Vec<_>>();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    if files.is_empty() {
        return Err(CliError::invalid_argument("no scenario files found"));
    }
    Ok(files)
}

/// Parse every file, keeping per-file results
pub fn check_files(files: &[PathBuf]) -> Vec<(PathBuf, EnsayoResult<Scenario>)> {
    files
        .iter()
        .map(|path| (path.clone(), Scenario::from_file(path)))
        .collect()
}

/// Load every file; the first invalid file aborts
pub fn load(paths: &[PathBuf], tag: Option<&str>) -> CliResult<Vec<LoadedScenario>> {
    let files = collect_files(paths)?;
    let mut loaded = Vec::with_capacity(files.len());
    for path in files {
        let scenario = Scenario::from_file(&path)?;
        tracing::debug!(path = %path.display(), name = %scenario.name, "Loaded scenario");
        loaded.push(LoadedScenario { path, scenario });
    }
    if let Some(tag) = tag {
        loaded.retain(|l| l.scenario.has_tag(tag));
        if loaded.is_empty() {
            return Err(CliError::invalid_argument(format!(
                "no scenarios tagged '{tag}'"
            )));
        }
    }
    Ok(loaded)
}

/// Run a suite, printing each outcome as it finishes
pub async fn run_suite(
    driver: Arc<dyn Driver>,
    config: RunConfig,
    scenarios: &[Scenario],
    mode: FailureMode,
    progress: &mut ProgressReporter,
) -> Reporter {
    let runner = ScenarioRunner::new(driver, config);
    let mut reporter = Reporter::new().with_mode(mode).with_name("ensayador");

    progress.start_progress(scenarios.len() as u64, "scenarios");
    {
        let progress = &*progress;
        runner
            .run_all_with(scenarios, mode, |outcome| {
                progress.outcome(outcome);
                progress.increment(1);
                if let Err(e) = reporter.record(outcome.clone()) {
                    tracing::warn!(error = %e, "Stopping suite");
                }
            })
            .await;
    }
    progress.finish();

    let skipped = scenarios.len().saturating_sub(reporter.total_count());
    progress.summary(
        reporter.passed_count(),
        reporter.failed_count(),
        skipped,
        reporter.total_duration(),
    );
    reporter
}
