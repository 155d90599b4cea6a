use crate::error::{DeadhandError, Result};
use crate::types::TimeUnit;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-vault release policy. Durations are counts of the engine's `TimeUnit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub inactivity_period: u32,
    pub grace_period: u32,
    pub time_lock: u32,
    #[serde(default = "default_approvals")]
    pub approvals_required: u32,
}

fn default_approvals() -> u32 {
    1
}

impl RuleSet {
    pub fn new(inactivity_period: u32, grace_period: u32, time_lock: u32, approvals: u32) -> Self {
        Self {
            inactivity_period,
            grace_period,
            time_lock,
            approvals_required: approvals,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.approvals_required < 1 {
            return Err(DeadhandError::InvalidRuleSet(
                "approvals_required must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// A zero inactivity period means the vault never auto-triggers.
    pub fn monitors_inactivity(&self) -> bool {
        self.inactivity_period > 0
    }

    pub fn inactivity(&self, unit: TimeUnit) -> Duration {
        unit.span(self.inactivity_period)
    }

    pub fn grace(&self, unit: TimeUnit) -> Duration {
        unit.span(self.grace_period)
    }

    pub fn lock(&self, unit: TimeUnit) -> Duration {
        unit.span(self.time_lock)
    }

    /// When an owner last seen at `last_active` crosses the inactivity threshold.
    pub fn inactivity_deadline(
        &self,
        last_active: DateTime<Utc>,
        unit: TimeUnit,
    ) -> Result<DateTime<Utc>> {
        deadline(last_active, self.inactivity(unit), "inactivity_period")
    }

    /// End of a grace period that starts at `from`.
    pub fn grace_deadline(&self, from: DateTime<Utc>, unit: TimeUnit) -> Result<DateTime<Utc>> {
        deadline(from, self.grace(unit), "grace_period")
    }

    /// Reject rule sets whose periods, counted from `now`, run past the
    /// calendar chrono can represent.
    pub fn check_range(&self, unit: TimeUnit, now: DateTime<Utc>) -> Result<()> {
        self.inactivity_deadline(now, unit)?;
        let grace_end = self.grace_deadline(now, unit)?;
        deadline(grace_end, self.lock(unit), "time_lock")?;
        Ok(())
    }
}

/// `from + span`, or `InvalidRuleSet` naming `field` on overflow.
pub fn deadline(from: DateTime<Utc>, span: Duration, field: &str) -> Result<DateTime<Utc>> {
    from.checked_add_signed(span).ok_or_else(|| {
        DeadhandError::InvalidRuleSet(format!("{field} runs past the representable date range"))
    })
}
