//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `campus_core` linkage, configuration and schema bootstrap.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `campus_cli [DB_PATH]`. Without a path the `CAMPUS_DB_PATH`
//! variable is used, then an in-memory database.

use campus_core::db::{migrations::latest_version, schema_version};
use campus_core::{load_config, CoreConfig};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("campus_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config_path = std::env::var_os("CAMPUS_CONFIG").map(PathBuf::from);
    let mut config: CoreConfig =
        load_config(config_path.as_deref()).map_err(|err| err.to_string())?;
    if let Some(db_path) = std::env::args_os().nth(1) {
        config.db_path = Some(PathBuf::from(db_path));
    }

    config.start_logging().map_err(|err| err.to_string())?;
    let conn = config.open_database().map_err(|err| err.to_string())?;
    let version = schema_version(&conn).map_err(|err| err.to_string())?;
    info!(
        "event=cli_probe module=cli status=ok schema_version={} tenant_debug={}",
        version, config.tenant_debug
    );

    println!("campus_core ping={}", campus_core::ping());
    println!("campus_core version={}", campus_core::core_version());
    println!("schema version={version} latest={}", latest_version());
    println!(
        "database={}",
        config
            .db_path
            .as_deref()
            .map_or_else(|| ":memory:".to_string(), |path| path.display().to_string())
    );
    Ok(())
}
