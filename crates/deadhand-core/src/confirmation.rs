use crate::types::Decision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One witness verdict on one release. Unique per (release, participant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub id: Uuid,
    pub release_id: Uuid,
    pub participant_id: String,
    pub status: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Confirmation {
    pub fn new(
        release_id: Uuid,
        participant_id: impl Into<String>,
        status: Decision,
        comment: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            release_id,
            participant_id: participant_id.into(),
            status,
            comment,
            timestamp,
        }
    }
}
