use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::{
    jobs::JOB_DELIVER_NOTIFICATION,
    models::Job,
    state::AppState,
    workflow::notify::{Notification, Notifier},
};

use super::{JobExecution, JobHandler};

const MAX_ATTEMPTS: i32 = 8;

pub struct DeliverNotificationJob {
    notifier: Arc<dyn Notifier>,
}

impl DeliverNotificationJob {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

/// 30s, 60s, 120s ... capped at one hour.
fn backoff(attempts: i32) -> Duration {
    let exponent = attempts.saturating_sub(1).clamp(0, 7) as u32;
    Duration::from_secs((30u64 << exponent).min(3600))
}

#[async_trait]
impl JobHandler for DeliverNotificationJob {
    fn job_type(&self) -> &'static str {
        JOB_DELIVER_NOTIFICATION
    }

    async fn handle(&self, _state: Arc<AppState>, job: Job) -> JobExecution {
        let notification: Notification = match serde_json::from_value(job.payload.clone()) {
            Ok(notification) => notification,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid notification payload: {err}"),
                }
            }
        };

        match self.notifier.notify(&notification).await {
            Ok(()) => JobExecution::Success,
            Err(err) if job.attempts >= MAX_ATTEMPTS => JobExecution::Failed {
                error: format!("giving up after {} attempts: {err:#}", job.attempts),
            },
            Err(err) => {
                warn!(
                    job_id = %job.id,
                    recipient = %notification.recipient_user_id,
                    error = %err,
                    "notification delivery failed"
                );
                JobExecution::Retry {
                    delay: backoff(job.attempts),
                    error: format!("{err:#}"),
                }
            }
        }
    }
}
