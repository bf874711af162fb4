//! ensayador: run browser scenarios from the command line
//!
//! ## Usage
//!
//! ```bash
//! ensayador run scenarios/                      # Run every scenario in a directory
//! ensayador run scenarios/registration.yaml -j 2 --format junit -o report.xml
//! ensayador validate scenarios/                 # Parse and check without a browser
//! ensayador list scenarios/ --tag auth          # Show what would run
//! ensayador config --base-url http://localhost:8080
//! ```

use clap::Parser;
use ensayo::{Driver, ReportFormat};
use ensayo_cli::{
    logging, runner, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs,
    ConfigFormat, ListArgs, ProgressReporter, RunArgs, ValidateArgs, Verbosity,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    logging::init(config.verbosity, config.log_json)?;

    match cli.command {
        Commands::Run(args) => run_scenarios(config.with_fail_fast(args.fail_fast), &args),
        Commands::Validate(args) => validate(&config, &args),
        Commands::List(args) => list(&args),
        Commands::Config(args) => show_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet))
        .with_color(ColorChoice::from(cli.color))
        .with_log_json(cli.log_json)
        .with_config_file(cli.config.clone())
}

fn reporter_for(config: &CliConfig) -> ProgressReporter {
    ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet())
}

#[cfg(feature = "browser")]
fn browser_driver() -> CliResult<Arc<dyn Driver>> {
    Ok(Arc::new(ensayo::ChromiumDriver::new()))
}

#[cfg(not(feature = "browser"))]
fn browser_driver() -> CliResult<Arc<dyn Driver>> {
    Err(CliError::config(
        "ensayador was built without the `browser` feature",
    ))
}

fn run_scenarios(config: CliConfig, args: &RunArgs) -> CliResult<()> {
    let run_config = config.run_config(&args.overrides)?;
    let scenarios: Vec<_> = runner::load(&args.scenarios, args.tag.as_deref())?
        .into_iter()
        .map(|loaded| loaded.scenario)
        .collect();
    let driver = browser_driver()?;

    let mut progress = reporter_for(&config);
    progress.header(&format!(
        "Running {} scenarios against {}",
        scenarios.len(),
        run_config.base_url
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let reporter = runtime.block_on(runner::run_suite(
        driver,
        run_config,
        &scenarios,
        config.failure_mode(),
        &mut progress,
    ));

    let format = ReportFormat::from(args.format);
    if let Some(path) = &args.output {
        reporter
            .write(format, path)
            .map_err(|e| CliError::report_generation(e.to_string()))?;
        progress.info(&format!("Report written to {}", path.display()));
    } else if format != ReportFormat::Text {
        let rendered = reporter
            .render(format)
            .map_err(|e| CliError::report_generation(e.to_string()))?;
        println!("{rendered}");
    }

    if reporter.all_passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: reporter.failed_count(),
            total: reporter.total_count(),
        })
    }
}

fn validate(config: &CliConfig, args: &ValidateArgs) -> CliResult<()> {
    let progress = reporter_for(config);
    let files = runner::collect_files(&args.scenarios)?;
    let results = runner::check_files(&files);

    let mut invalid = 0;
    for (path, result) in &results {
        match result {
            Ok(scenario) => progress.success(&format!(
                "{} ({}, {} steps)",
                scenario.name,
                path.display(),
                scenario.steps.len()
            )),
            Err(e) => {
                invalid += 1;
                progress.failure(&format!("{}: {e}", path.display()));
            }
        }
    }

    if invalid == 0 {
        Ok(())
    } else {
        Err(CliError::InvalidScenarios {
            invalid,
            total: results.len(),
        })
    }
}

fn list(args: &ListArgs) -> CliResult<()> {
    for loaded in runner::load(&args.scenarios, args.tag.as_deref())? {
        let scenario = &loaded.scenario;
        let tags = if scenario.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", scenario.tags.join(", "))
        };
        println!(
            "{}{tags}: {} steps, {} expectations ({})",
            scenario.name,
            scenario.steps.len(),
            scenario.expect.len(),
            loaded.path.display()
        );
        if !scenario.description.is_empty() {
            println!("    {}", scenario.description);
        }
    }
    Ok(())
}

fn show_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    let run_config = config.run_config(&args.overrides)?;
    let rendered = match args.format {
        ConfigFormat::Yaml => serde_yaml_ng::to_string(&run_config)
            .map_err(|e| CliError::report_generation(e.to_string()))?,
        ConfigFormat::Json => serde_json::to_string_pretty(&run_config)
            .map_err(|e| CliError::report_generation(e.to_string()))?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
