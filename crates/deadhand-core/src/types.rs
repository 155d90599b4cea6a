use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeadhandError;

// ---------------------------------------------------------------------------
// ReleaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
    Released,
}

impl ReleaseStatus {
    pub fn all() -> &'static [ReleaseStatus] {
        &[
            ReleaseStatus::Pending,
            ReleaseStatus::InProgress,
            ReleaseStatus::Approved,
            ReleaseStatus::Rejected,
            ReleaseStatus::Released,
        ]
    }

    /// `released` and `rejected` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReleaseStatus::Released | ReleaseStatus::Rejected)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseStatus::Pending => "pending",
            ReleaseStatus::InProgress => "in_progress",
            ReleaseStatus::Approved => "approved",
            ReleaseStatus::Rejected => "rejected",
            ReleaseStatus::Released => "released",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReleaseStatus {
    type Err = DeadhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReleaseStatus::Pending),
            "in_progress" | "in-progress" => Ok(ReleaseStatus::InProgress),
            "approved" => Ok(ReleaseStatus::Approved),
            "rejected" => Ok(ReleaseStatus::Rejected),
            "released" => Ok(ReleaseStatus::Released),
            _ => Err(DeadhandError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// A witness verdict on a release awaiting approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = DeadhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" | "approve" => Ok(Decision::Approved),
            "rejected" | "reject" => Ok(Decision::Rejected),
            _ => Err(DeadhandError::InvalidDecision(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Beneficiary,
    Shared,
    Witness,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Beneficiary => "beneficiary",
            Role::Shared => "shared",
            Role::Witness => "witness",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TimeUnit
// ---------------------------------------------------------------------------

/// The canonical unit every rule-set duration is expressed in.
///
/// Production deployments use `Days`; test deployments compress the whole
/// workflow by choosing `Minutes` (or `Seconds`). The value is fixed when the
/// engine is built and applies to rule durations, reminder thresholds and
/// scheduler polling alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    pub fn seconds_per_unit(self) -> i64 {
        match self {
            TimeUnit::Days => 86_400,
            TimeUnit::Hours => 3_600,
            TimeUnit::Minutes => 60,
            TimeUnit::Seconds => 1,
        }
    }

    /// `count` units as a chrono duration.
    pub fn span(self, count: u32) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(count) * self.seconds_per_unit())
    }

    /// Polling interval for a job that runs `ticks_per_unit` times per unit.
    pub fn poll_interval(self, ticks_per_unit: u32) -> std::time::Duration {
        let per_unit_ms = self.seconds_per_unit() as u64 * 1_000;
        std::time::Duration::from_millis(per_unit_ms / u64::from(ticks_per_unit.max(1)))
    }

    /// Render a duration in whole units, e.g. "3 day(s)".
    pub fn describe(self, d: chrono::Duration) -> String {
        let units = d.num_seconds() / self.seconds_per_unit();
        format!("{units} {}(s)", self.singular())
    }

    fn singular(self) -> &'static str {
        match self {
            TimeUnit::Days => "day",
            TimeUnit::Hours => "hour",
            TimeUnit::Minutes => "minute",
            TimeUnit::Seconds => "second",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Days => "days",
            TimeUnit::Hours => "hours",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Seconds => "seconds",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimeUnit {
    type Err = DeadhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" | "day" => Ok(TimeUnit::Days),
            "hours" | "hour" => Ok(TimeUnit::Hours),
            "minutes" | "minute" => Ok(TimeUnit::Minutes),
            "seconds" | "second" => Ok(TimeUnit::Seconds),
            _ => Err(DeadhandError::InvalidTimeUnit(s.to_string())),
        }
    }
}
