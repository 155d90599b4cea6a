//! The release record and its state machine.
//!
//! ```text
//! pending ──grace elapsed──▶ in_progress ──quorum──▶ approved ──countdown──▶ released
//!    │                          │  └──any reject──▶ rejected
//!    └──────── owner revoke ────┴──────────────────────┴──▶ rejected
//! ```
//!
//! `Release::apply` is the only place a status changes. It takes the event
//! and the current time and does no I/O; callers fetch whatever the guard
//! needs (the actor's role) beforehand. The time-lock length is copied from
//! the rule set when the release opens and never re-read.

use crate::error::{DeadhandError, Result};
use crate::rules::{self, RuleSet};
use crate::types::{ReleaseStatus, TimeUnit};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ReleaseEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseEvent {
    GraceElapsed,
    WitnessApproved,
    WitnessRejected,
    CountdownElapsed,
    OwnerRevoked,
}

impl ReleaseEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseEvent::GraceElapsed => "grace_elapsed",
            ReleaseEvent::WitnessApproved => "witness_approved",
            ReleaseEvent::WitnessRejected => "witness_rejected",
            ReleaseEvent::CountdownElapsed => "countdown_elapsed",
            ReleaseEvent::OwnerRevoked => "owner_revoked",
        }
    }
}

// ---------------------------------------------------------------------------
// Transition / StatusChange
// ---------------------------------------------------------------------------

/// Result of applying one event. `from == to` for an approval that did not
/// yet reach quorum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ReleaseStatus,
    pub to: ReleaseStatus,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ReleaseStatus,
    pub to: ReleaseStatus,
    pub event: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: Uuid,
    pub vault_id: String,
    pub status: ReleaseStatus,
    pub triggered_at: DateTime<Utc>,
    pub grace_period_end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_end: Option<DateTime<Utc>>,
    /// Countdown length in seconds, fixed when the release opens.
    #[serde(default)]
    pub time_lock_secs: i64,
    pub approvals_needed: u32,
    pub approvals_received: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once the "time lock started" announcement has gone out.
    #[serde(default)]
    pub notified_time_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke_reason: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub updated_at: DateTime<Utc>,
}

impl Release {
    /// A fresh `pending` release whose grace period starts at `now`.
    ///
    /// Fails with `InvalidRuleSet` when the grace period, or the time lock
    /// following it, would end outside chrono's date range.
    pub fn new(
        vault_id: impl Into<String>,
        rules: &RuleSet,
        unit: TimeUnit,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let grace_period_end = rules.grace_deadline(now, unit)?;
        let time_lock = rules.lock(unit);
        rules::deadline(grace_period_end, time_lock, "time_lock")?;
        Ok(Self {
            id: Uuid::new_v4(),
            vault_id: vault_id.into(),
            status: ReleaseStatus::Pending,
            triggered_at: now,
            grace_period_end,
            countdown_end: None,
            time_lock_secs: time_lock.num_seconds(),
            approvals_needed: rules.approvals_required.max(1),
            approvals_received: 0,
            completed_at: None,
            notified_time_lock: false,
            revoke_reason: None,
            history: Vec::new(),
            updated_at: now,
        })
    }

    pub fn time_lock(&self) -> Duration {
        Duration::try_seconds(self.time_lock_secs).unwrap_or(Duration::MAX)
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn in_grace_period(&self, now: DateTime<Utc>) -> bool {
        self.status == ReleaseStatus::Pending && now < self.grace_period_end
    }

    pub fn in_time_lock(&self, now: DateTime<Utc>) -> bool {
        self.status == ReleaseStatus::Approved && self.countdown_end.is_some_and(|end| now < end)
    }

    /// Time left on the countdown, if approved and not yet elapsed.
    pub fn time_lock_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.status, self.countdown_end) {
            (ReleaseStatus::Approved, Some(end)) if end > now => Some(end - now),
            _ => None,
        }
    }

    /// Witnesses may act only while the release is exactly `in_progress`.
    pub fn ensure_awaiting_approval(&self) -> Result<()> {
        match self.status {
            ReleaseStatus::InProgress => Ok(()),
            ReleaseStatus::Pending => Err(DeadhandError::InvalidState {
                status: self.status,
                reason: format!(
                    "grace period not yet ended (ends {})",
                    self.grace_period_end.to_rfc3339()
                ),
            }),
            status => Err(DeadhandError::InvalidState {
                status,
                reason: "not awaiting approval".to_string(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, event: ReleaseEvent, now: DateTime<Utc>) -> Result<Transition> {
        let from = self.status;

        if from.is_terminal() {
            return Err(match (from, event) {
                (ReleaseStatus::Released, ReleaseEvent::OwnerRevoked) => {
                    DeadhandError::AlreadyReleased
                }
                (_, ReleaseEvent::CountdownElapsed) => DeadhandError::NotApproved(from),
                _ => DeadhandError::InvalidState {
                    status: from,
                    reason: "release is final".to_string(),
                },
            });
        }

        let to = match event {
            ReleaseEvent::GraceElapsed => {
                if from != ReleaseStatus::Pending {
                    return Err(DeadhandError::InvalidState {
                        status: from,
                        reason: "grace period already ended".to_string(),
                    });
                }
                if now < self.grace_period_end {
                    return Err(DeadhandError::InvalidState {
                        status: from,
                        reason: "grace period not yet ended".to_string(),
                    });
                }
                ReleaseStatus::InProgress
            }
            ReleaseEvent::WitnessApproved => {
                self.ensure_awaiting_approval()?;
                let received = (self.approvals_received + 1).min(self.approvals_needed);
                if received >= self.approvals_needed {
                    let end = rules::deadline(now, self.time_lock(), "time_lock")?;
                    self.approvals_received = received;
                    self.countdown_end = Some(end);
                    ReleaseStatus::Approved
                } else {
                    self.approvals_received = received;
                    ReleaseStatus::InProgress
                }
            }
            ReleaseEvent::WitnessRejected => {
                self.ensure_awaiting_approval()?;
                ReleaseStatus::Rejected
            }
            ReleaseEvent::CountdownElapsed => {
                if from != ReleaseStatus::Approved {
                    return Err(DeadhandError::NotApproved(from));
                }
                match self.countdown_end {
                    Some(end) if now < end => return Err(DeadhandError::TimeLockActive(end)),
                    _ => ReleaseStatus::Released,
                }
            }
            ReleaseEvent::OwnerRevoked => ReleaseStatus::Rejected,
        };

        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        if to != from {
            self.history.push(StatusChange {
                from,
                to,
                event: event.as_str().to_string(),
                at: now,
            });
        }
        self.status = to;
        self.updated_at = now;

        Ok(Transition { from, to, at: now })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
