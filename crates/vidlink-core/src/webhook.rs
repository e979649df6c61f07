//! Status-change notifications.
//!
//! The video list pushes a [`Notification`] through an mpsc channel whenever
//! a link flips between live and offline. The [`WebhookDispatcher`] drains
//! that channel and POSTs a JSON payload to every subscribed endpoint.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::indicator::LinkStatus;

pub const SIGNATURE_HEADER: &str = "X-Vidlink-Signature-256";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// Notification types to deliver (`went_live`, `went_offline`). Empty means all.
    #[serde(default)]
    pub events: Vec<String>,

    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,

    /// HMAC-SHA256 key for the signature header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_webhook_retries() -> u32 {
    2
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            events: Vec::new(),
            timeout_ms: default_webhook_timeout_ms(),
            max_retries: default_webhook_retries(),
            secret: None,
        }
    }

    pub fn accepts(&self, notification_type: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == notification_type)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
    pub url: String,
    pub previous: LinkStatus,
    pub current: LinkStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Notification {
    StatusChanged(StatusChange),
}

impl Notification {
    pub fn status_changed(
        url: impl Into<String>,
        previous: LinkStatus,
        current: LinkStatus,
        message: impl Into<String>,
    ) -> Self {
        Self::StatusChanged(StatusChange {
            url: url.into(),
            previous,
            current,
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn notification_type(&self) -> &'static str {
        match self {
            Self::StatusChanged(change) => match change.current {
                LinkStatus::Live => "went_live",
                _ => "went_offline",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub version: u8,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub url: String,
    pub data: serde_json::Value,
}

impl WebhookPayload {
    pub fn from_notification(notification: &Notification) -> Self {
        match notification {
            Notification::StatusChanged(change) => Self {
                version: 1,
                id: Uuid::new_v4().to_string(),
                timestamp: change.timestamp,
                notification_type: notification.notification_type().to_string(),
                url: change.url.clone(),
                data: serde_json::json!({
                    "previous": change.previous,
                    "current": change.current,
                    "message": change.message,
                }),
            },
        }
    }
}

pub fn notification_channel() -> (
    mpsc::UnboundedSender<Notification>,
    mpsc::UnboundedReceiver<Notification>,
) {
    mpsc::unbounded_channel()
}

/// Background task delivering notifications to webhooks.
pub struct WebhookDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    webhooks: Vec<WebhookConfig>,
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Notification>,
        webhooks: Vec<WebhookConfig>,
        client: Client,
    ) -> Self {
        Self {
            rx,
            webhooks,
            client,
        }
    }

    /// Returns once every sender has been dropped.
    pub async fn run(mut self) {
        debug!(webhook_count = self.webhooks.len(), "Webhook dispatcher started");

        while let Some(notification) = self.rx.recv().await {
            let notification_type = notification.notification_type();
            let payload = WebhookPayload::from_notification(&notification);
            let body = match serde_json::to_vec(&payload) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize webhook payload");
                    continue;
                }
            };

            for wh in self.webhooks.iter().filter(|wh| wh.accepts(notification_type)) {
                let timeout = Duration::from_millis(wh.timeout_ms);
                match deliver(&self.client, wh, &body, timeout).await {
                    Ok(()) => debug!(url = %wh.url, notification_type, "Webhook delivered"),
                    Err(e) => warn!(
                        url = %wh.url,
                        notification_type,
                        error = %e,
                        "Webhook delivery failed"
                    ),
                }
            }
        }

        debug!("Webhook dispatcher shutting down");
    }
}

async fn deliver(
    client: &Client,
    wh: &WebhookConfig,
    body: &[u8],
    timeout: Duration,
) -> Result<(), String> {
    let mut last_error = String::new();

    for attempt in 0..=wh.max_retries {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(attempt - 1))).await;
        }

        let mut req = client
            .post(&wh.url)
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .body(body.to_vec());
        if let Some(secret) = wh.secret.as_deref() {
            req = req.header(SIGNATURE_HEADER, format!("sha256={}", sign_payload(body, secret)));
        }

        match req.send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => {
                let status = resp.status().as_u16();
                last_error = format!("HTTP {} from {}", status, wh.url);
                if (400..500).contains(&status) && status != 429 {
                    return Err(last_error);
                }
            }
            Err(e) => last_error = format!("Request to {} failed: {}", wh.url, e),
        }
    }

    Err(last_error)
}

fn sign_payload(body: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length, so new_from_slice cannot fail here.
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
