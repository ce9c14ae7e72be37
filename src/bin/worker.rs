use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use edm_backend::{
    auth::jwt::JwtService,
    config::AppConfig,
    db, default_handlers,
    jobs::{ensure_job_scheduled, JOB_SCAN_STAGE_DEADLINES},
    state::AppState,
    workflow::notify::{LogNotifier, Notifier, WebhookNotifier},
    Worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "worker",
        database_url = %config.redacted_database_url(),
        pool_size = 1,
        scan_interval_seconds = config.deadline_scan_interval_seconds,
        webhook_enabled = config.notification_webhook_url.is_some(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    db::run_migrations(&pool)?;

    {
        let mut conn = pool.get()?;
        if let Some(job) =
            ensure_job_scheduled(&mut conn, JOB_SCAN_STAGE_DEADLINES, Utc::now().naive_utc(), None)?
        {
            tracing::info!(job_id = %job.id, "scheduled deadline scan");
        }
    }

    let notifier: Arc<dyn Notifier> = match config.notification_webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };
    let scan_interval = Duration::from_secs(config.deadline_scan_interval_seconds.max(1));
    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms.max(100));

    let jwt = JwtService::from_config(&config)?;
    let state = Arc::new(AppState::new(pool, config, jwt));
    let worker = Worker::new(state, default_handlers(notifier, scan_interval), poll_interval);

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("worker received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
