//! Records owned by the external vault-management side.
//!
//! The engine reads these and writes only `Vault::release_triggered` and
//! `Owner::last_active_at`.

use crate::types::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vault {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Set when a release is created; cleared only by an explicit reset.
    #[serde(default)]
    pub release_triggered: bool,
}

impl Vault {
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            participants: Vec::new(),
            release_triggered: false,
        }
    }

    pub fn with_participant(mut self, id: impl Into<String>, role: Role) -> Self {
        self.participants.push(Participant {
            id: id.into(),
            role,
            email: None,
        });
        self
    }

    pub fn is_owner(&self, actor: &str) -> bool {
        self.owner_id == actor
    }

    pub fn has_role(&self, participant: &str, role: Role) -> bool {
        self.participants
            .iter()
            .any(|p| p.id == participant && p.role == role)
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(move |p| p.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_lookup_is_exact() {
        let vault = Vault::new("v1", "alice", "Family")
            .with_participant("bob", Role::Witness)
            .with_participant("carol", Role::Beneficiary);
        assert!(vault.has_role("bob", Role::Witness));
        assert!(!vault.has_role("carol", Role::Witness));
        assert!(!vault.has_role("alice", Role::Witness));
        assert_eq!(vault.with_role(Role::Beneficiary).count(), 1);
    }
}
