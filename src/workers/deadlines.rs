use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::task;
use tracing::{info, warn};

use crate::{
    jobs::{ensure_job_scheduled, JOB_SCAN_STAGE_DEADLINES},
    models::Job,
    state::AppState,
    workflow::deadlines::{scan_deadlines, DeadlineSettings, ScanReport},
};

use super::{JobExecution, JobHandler};

/// Runs the deadline scan and queues the next run `interval` later.
pub struct ScanStageDeadlinesJob {
    interval: Duration,
}

impl ScanStageDeadlinesJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl JobHandler for ScanStageDeadlinesJob {
    fn job_type(&self) -> &'static str {
        JOB_SCAN_STAGE_DEADLINES
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let interval = self.interval;
        let job_id = job.id;
        let outcome = task::spawn_blocking(move || run_scan(&state, job_id, interval)).await;

        match outcome {
            Ok(Ok(report)) => {
                info!(
                    job_id = %job.id,
                    documents = report.documents_scanned,
                    escalations = report.escalations,
                    failures = report.failures,
                    "deadline scan job done"
                );
                JobExecution::Success
            }
            Ok(Err(err)) => {
                warn!(job_id = %job.id, error = %err, "deadline scan will retry");
                JobExecution::Retry {
                    delay: Duration::from_secs(60),
                    error: err,
                }
            }
            Err(err) => JobExecution::Retry {
                delay: Duration::from_secs(60),
                error: format!("deadline scan task panicked: {err}"),
            },
        }
    }
}

fn run_scan(state: &AppState, job_id: uuid::Uuid, interval: Duration) -> Result<ScanReport, String> {
    let mut conn = state.db().map_err(|err| format!("{err:?}"))?;
    let now = Utc::now().naive_utc();
    let settings = DeadlineSettings::from_hours(state.config.alert_lead_window_hours);
    let report = scan_deadlines(&mut conn, &settings, now).map_err(|err| err.to_string())?;

    let next_run = now
        + ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::minutes(5));
    ensure_job_scheduled(&mut conn, JOB_SCAN_STAGE_DEADLINES, next_run, Some(job_id))
        .map_err(|err| err.to_string())?;
    Ok(report)
}
