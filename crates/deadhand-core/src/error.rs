use crate::types::ReleaseStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeadhandError {
    #[error("not initialized: run 'deadhand init'")]
    NotInitialized,

    #[error("release not found: {0}")]
    ReleaseNotFound(String),

    #[error("vault not found: {0}")]
    VaultNotFound(String),

    #[error("owner not found: {0}")]
    OwnerNotFound(String),

    #[error("vault '{0}' has no rule set defined")]
    NoPolicy(String),

    #[error("invalid rule set: {0}")]
    InvalidRuleSet(String),

    #[error("invalid decision '{0}': must be 'approved' or 'rejected'")]
    InvalidDecision(String),

    #[error("invalid release status: {0}")]
    InvalidStatus(String),

    #[error("invalid time unit '{0}': expected days, hours, minutes or seconds")]
    InvalidTimeUnit(String),

    #[error("unknown job '{0}': expected inactivity, grace, time-lock or all")]
    InvalidJob(String),

    #[error("a release is already in progress for vault '{0}'")]
    AlreadyActive(String),

    #[error("release already triggered for vault '{0}' in this inactivity episode")]
    AlreadyTriggered(String),

    #[error("release is {status}: {reason}")]
    InvalidState {
        status: ReleaseStatus,
        reason: String,
    },

    #[error("participant '{0}' is not permitted to perform this action")]
    Forbidden(String),

    #[error("participant '{participant}' already confirmed release {release}")]
    DuplicateConfirmation {
        release: String,
        participant: String,
    },

    #[error("cannot finalize: release is {0}, not approved")]
    NotApproved(ReleaseStatus),

    #[error("time lock still active until {0}")]
    TimeLockActive(chrono::DateTime<chrono::Utc>),

    #[error("cannot revoke a released vault")]
    AlreadyReleased,

    #[error("store error: {0}")]
    Store(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DeadhandError {
    /// True for errors that reflect the current state of a record rather
    /// than a fault; reconcilers skip these quietly.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DeadhandError::AlreadyActive(_)
                | DeadhandError::AlreadyTriggered(_)
                | DeadhandError::InvalidState { .. }
                | DeadhandError::DuplicateConfirmation { .. }
                | DeadhandError::NotApproved(_)
                | DeadhandError::TimeLockActive(_)
                | DeadhandError::AlreadyReleased
        )
    }
}

pub type Result<T> = std::result::Result<T, DeadhandError>;
