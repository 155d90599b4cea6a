//! Periodic reconciliation jobs.
//!
//! Each job is one scan-and-transition pass over the store. A pass only
//! selects records whose status and deadline still match, so re-running it
//! after a partial failure picks up exactly what is left. Errors on one
//! record are logged and counted; the scan moves on.

mod grace;
mod inactivity;
mod timelock;

use crate::engine::Engine;
use crate::error::{DeadhandError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Job {
    Inactivity,
    Grace,
    TimeLock,
    All,
}

impl Job {
    pub fn as_str(self) -> &'static str {
        match self {
            Job::Inactivity => "inactivity",
            Job::Grace => "grace",
            Job::TimeLock => "time-lock",
            Job::All => "all",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Job {
    type Err = DeadhandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inactivity" => Ok(Job::Inactivity),
            "grace" => Ok(Job::Grace),
            "time-lock" | "time_lock" | "timelock" => Ok(Job::TimeLock),
            "all" => Ok(Job::All),
            _ => Err(DeadhandError::InvalidJob(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// Counts from one or more passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Candidates examined.
    pub scanned: usize,
    /// Releases created (inactivity) or moved to a new status.
    pub transitioned: usize,
    pub announcements: usize,
    pub reminders: usize,
    /// Candidates left alone because their state no longer qualified.
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    pub fn merge(&mut self, other: TickReport) {
        self.scanned += other.scanned;
        self.transitioned += other.transitioned;
        self.announcements += other.announcements;
        self.reminders += other.reminders;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    /// Fold the outcome of one candidate into the counts.
    pub(crate) fn tally(&mut self, job: Job, subject: &str, outcome: Result<bool>) {
        match outcome {
            Ok(true) => self.transitioned += 1,
            Ok(false) => self.skipped += 1,
            Err(e) if e.is_conflict() => {
                tracing::debug!(job = job.as_str(), subject, "skipped: {e}");
                self.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(job = job.as_str(), subject, "tick error: {e}");
                self.failed += 1;
            }
        }
    }
}

impl Engine {
    /// Run one job. `Job::All` runs inactivity, grace, then time-lock.
    pub fn run_job(&self, job: Job) -> Result<TickReport> {
        match job {
            Job::Inactivity => self.run_inactivity_monitor(),
            Job::Grace => self.run_grace_reconciler(),
            Job::TimeLock => self.run_time_lock_reconciler(),
            Job::All => {
                let mut report = self.run_inactivity_monitor()?;
                report.merge(self.run_grace_reconciler()?);
                report.merge(self.run_time_lock_reconciler()?);
                Ok(report)
            }
        }
    }
}
