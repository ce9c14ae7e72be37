use std::env;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use edm_backend::{
    auth::password::hash_password,
    config::AppConfig,
    db,
    workflow::deadlines::{scan_deadlines, DeadlineSettings},
};

const USAGE: &str = "Usage: maintenance <scan-deadlines | hash-password <password>>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("scan-deadlines") => scan_once()?,
        Some("hash-password") => {
            let password = args.next().context(USAGE)?;
            println!("{}", hash_password(&password)?);
        }
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// One deadline scan outside the worker's schedule.
fn scan_once() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        lead_window_hours = config.alert_lead_window_hours,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let settings = DeadlineSettings::from_hours(config.alert_lead_window_hours);
    let report = scan_deadlines(&mut conn, &settings, Utc::now().naive_utc())
        .context("deadline scan failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
