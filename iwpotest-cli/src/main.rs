use std::process::ExitCode;

use clap::Parser;

use iwpotest_cli::cli::Cli;
use iwpotest_cli::error::CliError;
use iwpotest_cli::{logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match run::load_config(&cli).await {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    if let Err(e) = logging::init_tracing(&config.general) {
        eprintln!("error: {e:#}");
        return ExitCode::from(2);
    }

    tracing::info!(
        iwpo_dir = %config.paths.iwpo_dir.display(),
        max_parallel = config.run.max_parallel,
        "iwpotest starting"
    );

    match run::execute(&cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn fail(e: &CliError) -> ExitCode {
    // the report already shows the failures
    if !matches!(e, CliError::ScenariosFailed { .. }) {
        eprintln!("error: {e}");
    }
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}
