//! Read-only projections served to callers: the per-vault release status
//! and the per-owner inactivity report.

use crate::release::Release;
use crate::rules::RuleSet;
use crate::types::{ReleaseStatus, TimeUnit};
use crate::vault::{Owner, Vault};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// VaultReleaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultReleaseStatus {
    pub vault_id: String,
    pub has_release: bool,
    pub is_released: bool,
    pub in_grace_period: bool,
    pub in_time_lock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReleaseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_period_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_end: Option<DateTime<Utc>>,
    pub approvals_received: u32,
    pub approvals_needed: u32,
}

impl VaultReleaseStatus {
    /// Project the most recent non-rejected release of a vault.
    ///
    /// `releases` must be ordered newest first. A rejected release is
    /// skipped so a vetoed or revoked episode reads as "no release".
    pub fn project(vault_id: &str, releases: &[Release], now: DateTime<Utc>) -> Self {
        let current = releases
            .iter()
            .find(|r| r.status != ReleaseStatus::Rejected);
        match current {
            None => Self {
                vault_id: vault_id.to_string(),
                has_release: false,
                is_released: false,
                in_grace_period: false,
                in_time_lock: false,
                release_id: None,
                status: None,
                grace_period_end: None,
                countdown_end: None,
                approvals_received: 0,
                approvals_needed: 0,
            },
            Some(r) => Self {
                vault_id: vault_id.to_string(),
                has_release: true,
                is_released: r.status == ReleaseStatus::Released,
                in_grace_period: r.in_grace_period(now),
                in_time_lock: r.in_time_lock(now),
                release_id: Some(r.id),
                status: Some(r.status),
                grace_period_end: Some(r.grace_period_end),
                countdown_end: r.countdown_end,
                approvals_received: r.approvals_received,
                approvals_needed: r.approvals_needed,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// InactivityReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InactivityState {
    /// No rule set, or an inactivity period of zero.
    NoRule,
    /// The owner has never been seen active.
    Untracked,
    Active {
        threshold_at: DateTime<Utc>,
        remaining: String,
    },
    Inactive {
        exceeded_at: DateTime<Utc>,
        overdue_by: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        release_status: Option<ReleaseStatus>,
    },
}

impl InactivityState {
    pub fn label(&self) -> &'static str {
        match self {
            InactivityState::NoRule => "no_rule",
            InactivityState::Untracked => "untracked",
            InactivityState::Active { .. } => "active",
            InactivityState::Inactive { .. } => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultInactivity {
    pub vault_id: String,
    pub title: String,
    #[serde(flatten)]
    pub state: InactivityState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InactivityReport {
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
    pub time_unit: TimeUnit,
    pub vaults: Vec<VaultInactivity>,
}

impl InactivityReport {
    pub fn count(&self, label: &str) -> usize {
        self.vaults.iter().filter(|v| v.state.label() == label).count()
    }
}

/// Classify one vault for `owner` at `now`. `active` is the status of the
/// vault's non-terminal release, if any.
pub fn classify(
    owner: &Owner,
    vault: &Vault,
    rules: Option<&RuleSet>,
    active: Option<ReleaseStatus>,
    unit: TimeUnit,
    now: DateTime<Utc>,
) -> VaultInactivity {
    let state = match (rules, owner.last_active_at) {
        (None, _) => InactivityState::NoRule,
        (Some(rules), _) if !rules.monitors_inactivity() => InactivityState::NoRule,
        (Some(_), None) => InactivityState::Untracked,
        (Some(rules), Some(last)) => {
            // A threshold past the end of the calendar is never reached.
            let threshold = rules
                .inactivity_deadline(last, unit)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            if now > threshold {
                InactivityState::Inactive {
                    exceeded_at: threshold,
                    overdue_by: unit.describe(now - threshold),
                    release_status: active,
                }
            } else {
                InactivityState::Active {
                    threshold_at: threshold,
                    remaining: unit.describe(threshold - now),
                }
            }
        }
    };
    VaultInactivity {
        vault_id: vault.id.clone(),
        title: vault.title.clone(),
        state,
    }
}
