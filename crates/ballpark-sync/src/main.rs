//! ballpark-sync - Main entry point

use ballpark_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use ballpark_sync::config::SyncConfig;
use ballpark_sync::store::PostgrestStore;
use ballpark_sync::{Cli, Driver, RunPolicy, TableCatalog};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

// Tables and batches are processed strictly one after another
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Diagnostics go to stderr; the run report goes to stdout
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("ballpark-sync")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.clone().merge_env() {
        Ok(merged) => merged,
        Err(e) => {
            eprintln!("Warning: Ignoring logging environment: {e}");
            log_config
        },
    };

    // The run works without logging
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {e}");
            None
        },
    };

    match execute(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Execute the CLI command
async fn execute(cli: &Cli) -> ballpark_sync::Result<ExitCode> {
    let catalog = cli.catalog()?;

    let Some(mode) = cli.command.mode() else {
        print_catalog(&catalog);
        return Ok(ExitCode::SUCCESS);
    };

    // Credentials are checked before any table is touched
    let config = SyncConfig::load()?;
    let store = Arc::new(PostgrestStore::new(&config.store)?);

    let driver = Driver::new(store, config.batch, RunPolicy::for_mode(mode));
    let report = driver.run(&catalog).await;

    println!("{report}");
    Ok(ExitCode::from(report.exit_code()))
}

fn print_catalog(catalog: &TableCatalog) {
    for spec in catalog.iter() {
        println!(
            "{}\t{}\tinteger: {}\tnumeric: {}",
            spec.name,
            spec.source.display(),
            spec.integer_columns.len(),
            spec.numeric_columns.len()
        );
    }
}
