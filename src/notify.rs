//! Outbound notification boundary.
//!
//! Deliveries are fire-and-forget webhook calls: any 2xx is success, there is
//! no retry inside a dispatch (retry happens via the next eligible sweep or
//! manual send). The trait seam lets tests inject a recording notifier.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::constants::WEBHOOK_TIMEOUT_SECS;

/// Payload delivered to a reminder webhook
#[derive(Debug, Clone, Serialize)]
pub struct ReminderNote {
    #[serde(rename = "itemId")]
    pub item_id: String,
    pub title: String,
    pub category: String,
    /// Due date as a calendar date in the reference timezone (YYYY-MM-DD)
    #[serde(rename = "dueDate")]
    pub due_date: String,
    /// Which window fired: "day_before" or "day_of"
    pub window: String,
}

/// Webhook delivery error
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(u16),
}

/// Delivery seam for reminder notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, endpoint: &str, note: &ReminderNote) -> Result<(), NotifyError>;
}

/// Production notifier: POSTs the note as JSON to the configured endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, endpoint: &str, note: &ReminderNote) -> Result<(), NotifyError> {
        let response = self.client.post(endpoint).json(note).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Webhook {} returned status {}", endpoint, status);
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Test notifier that records deliveries and can simulate failing endpoints
#[cfg(test)]
pub struct RecordingNotifier {
    pub calls: std::sync::Mutex<Vec<(String, ReminderNote)>>,
    pub fail_endpoints: std::collections::HashSet<String>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            fail_endpoints: std::collections::HashSet::new(),
        }
    }

    pub fn failing(endpoints: &[&str]) -> Self {
        let mut notifier = Self::new();
        notifier.fail_endpoints = endpoints.iter().map(|s| s.to_string()).collect();
        notifier
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, endpoint: &str, note: &ReminderNote) -> Result<(), NotifyError> {
        if self.fail_endpoints.contains(endpoint) {
            return Err(NotifyError::Status(500));
        }
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), note.clone()));
        Ok(())
    }
}
