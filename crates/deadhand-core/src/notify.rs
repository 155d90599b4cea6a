//! Outbound notifications.
//!
//! Delivery is best-effort: the engine calls `Notifier::send` only after a
//! transition has committed and logs (never propagates) a failure.

use crate::error::{DeadhandError, Result};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApprovalRequired,
    AwaitingApproval,
    TimeLockStarted,
    TimeLockReminder,
    Released,
    Rejected,
    Revoked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub vault_id: String,
    pub release_id: Uuid,
    pub subject: String,
    pub body: String,
}

pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<()>;
}

// ---------------------------------------------------------------------------
// LogNotifier
// ---------------------------------------------------------------------------

/// Writes each notification to the tracing log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, n: &Notification) -> Result<()> {
        tracing::info!(
            recipient = %n.recipient,
            role = %n.role,
            vault = %n.vault_id,
            release = %n.release_id,
            "{}: {}",
            n.subject,
            n.body
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WebhookNotifier
// ---------------------------------------------------------------------------

/// POSTs each notification as JSON to a fixed URL.
///
/// Uses the blocking client; callers on an async runtime must invoke the
/// engine from a blocking context.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, n: &Notification) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DeadhandError::Notify(e.to_string()))?;
        client
            .post(&self.url)
            .json(n)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| DeadhandError::Notify(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryNotifier
// ---------------------------------------------------------------------------

/// Keeps every notification in memory. With `failing()`, records the
/// attempt and then reports a delivery error.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, n: &Notification) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(n.clone());
        if self.fail {
            return Err(DeadhandError::Notify("delivery refused".to_string()));
        }
        Ok(())
    }
}
