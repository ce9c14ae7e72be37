use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::WorkflowResult;
use crate::jobs::{enqueue_job, JOB_DELIVER_NOTIFICATION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_user_id: Uuid,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub metadata: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %notification.recipient_user_id,
            kind = %notification.kind,
            metadata = %notification.metadata,
            "{}",
            notification.message
        );
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .context("failed to reach notification webhook")?
            .error_for_status()
            .context("notification webhook rejected the request")?;
        Ok(())
    }
}

/// Queues delivery in the caller's transaction; the worker sends it later.
pub fn enqueue_notification(
    conn: &mut PgConnection,
    notification: &Notification,
) -> WorkflowResult<()> {
    let payload = serde_json::to_value(notification)
        .map_err(|err| super::WorkflowError::validation(err.to_string()))?;
    enqueue_job(conn, JOB_DELIVER_NOTIFICATION, payload, None)?;
    Ok(())
}
