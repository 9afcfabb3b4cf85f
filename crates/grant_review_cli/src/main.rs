//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load configuration from `GRANT_REVIEW_*` variables, start logging and
//!   open the configured database.
//! - Print core version and schema version for quick local sanity checks.

use grant_review_core::db::migrations::latest_version;
use grant_review_core::{core_version, init_logging, ping, CoreConfig};
use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("grant_review_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    init_logging(&config.logging).map_err(|err| err.to_string())?;

    let conn = config.open_database().map_err(|err| {
        error!("event=cli_health module=cli status=error error={err}");
        err.to_string()
    })?;
    let schema_version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(|err| err.to_string())?;

    info!("event=cli_health module=cli status=ok schema_version={schema_version}");
    println!("grant_review_core ping={}", ping());
    println!("grant_review_core version={}", core_version());
    println!(
        "grant_review_core schema_version={schema_version} latest={}",
        latest_version()
    );
    Ok(())
}
