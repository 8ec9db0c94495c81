//! Run driver: configuration, startup checks, scheduling and reporting

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tracing::{info, warn};

use iwpotest_core::config::HarnessConfig;
use iwpotest_core::ports::PortAllocator;
use iwpotest_scenario::Scenario;

use crate::cli::{Cli, DEFAULT_CONFIG, OutputFormat};
use crate::discovery;
use crate::error::CliError;
use crate::output::OutputWriter;
use crate::report::{self, RunReport};
use crate::scheduler::Scheduler;

/// Load the harness configuration.
///
/// Order: defaults, file, `IWPOTEST_*` environment, command-line flags.
/// Relative paths are resolved against the current directory.
pub async fn load_config(cli: &Cli) -> Result<HarnessConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path).await?,
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            HarnessConfig::from_file(DEFAULT_CONFIG).await?
        }
        None => HarnessConfig::default(),
    };
    config.apply_env_overrides();
    apply_cli_overrides(&mut config, cli);
    config.validate()?;
    config.resolve_paths()?;
    Ok(config)
}

/// Apply command-line flags on top of the loaded configuration.
pub fn apply_cli_overrides(config: &mut HarnessConfig, cli: &Cli) {
    if let Some(dir) = &cli.iwpo_dir {
        config.paths.iwpo_dir = dir.clone();
    }
    if let Some(dir) = &cli.temp_dir {
        config.paths.temp_dir = dir.clone();
    }
    if let Some(companion) = &cli.companion {
        config.paths.companion = companion.split_whitespace().map(str::to_owned).collect();
    }
    if let Some(max_parallel) = cli.max_parallel {
        config.run.max_parallel = max_parallel;
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    config.run.keep |= cli.keep;
    config.run.verbose |= cli.verbose;
    config.run.write_logs |= cli.write_logs;
}

/// Fail with a configuration error when the program or its resources are missing.
pub fn check_environment(config: &HarnessConfig) -> Result<(), CliError> {
    let program = config.program_path();
    if !program.is_file() {
        return Err(CliError::Config(format!(
            "program '{}' does not exist",
            program.display()
        )));
    }
    let resources = config.resources_dir();
    if !resources.is_dir() {
        return Err(CliError::Config(format!(
            "resource directory '{}' does not exist",
            resources.display()
        )));
    }
    Ok(())
}

/// Run every scenario named by `cli.files` and render the report.
///
/// Returns [`CliError::ScenariosFailed`] after rendering when any scenario failed.
pub async fn execute(cli: &Cli, config: HarnessConfig) -> Result<(), CliError> {
    let started = Local::now();
    let clock = Instant::now();
    let writer = OutputWriter::new(cli.output);

    let inputs = cli.files.clone();
    let files = tokio::task::spawn_blocking(move || discovery::discover(&inputs))
        .await
        .map_err(|e| CliError::Command(format!("scenario discovery failed: {e}")))?;

    if files.is_empty() {
        warn!("no scenario files found");
        if matches!(cli.output, OutputFormat::Text) {
            println!("No scenarios to run.");
        } else {
            writer.render(&RunReport::new(&[], clock.elapsed(), config.run.verbose))?;
        }
        return Ok(());
    }

    check_environment(&config)?;
    tokio::fs::create_dir_all(&config.paths.temp_dir).await?;

    let harness = Arc::new(config);
    let mut scenarios = Vec::with_capacity(files.len());
    for path in files {
        let mut scenario = Scenario::new(Arc::clone(&harness), path);
        scenario.parse().await;
        scenarios.push(scenario);
    }
    let parsed = scenarios.iter().filter(|s| s.can_execute()).count();
    info!(total = scenarios.len(), parsed, "scenario files parsed");

    let scheduler = Scheduler::new(
        harness.run.max_parallel,
        Arc::new(PortAllocator::new(harness.run.port_base)),
    );
    let schedule = scheduler.run(scenarios).await?;
    info!(
        workers = schedule.workers,
        peak_in_flight = schedule.peak_in_flight,
        "scenarios finished"
    );

    let elapsed = clock.elapsed();
    let report = RunReport::new(&schedule.results, elapsed, harness.run.verbose);

    if harness.run.write_logs {
        report::write_logs(&report, &harness.paths.temp_dir, started).await?;
    }
    writer.render(&report)?;

    info!(
        passed = report.passed,
        total = report.total,
        elapsed_secs = elapsed.as_secs_f64(),
        "run complete"
    );

    if report.all_passed() {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed: report.failed(),
            total: report.total,
        })
    }
}
