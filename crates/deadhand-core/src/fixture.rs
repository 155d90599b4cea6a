//! YAML import of owners, vaults, participants and rule sets.
//!
//! ```yaml
//! owners:
//!   - id: alice
//!     email: alice@example.com
//!     last_active_at: 2025-01-01T00:00:00Z
//! vaults:
//!   - id: family
//!     owner_id: alice
//!     title: Family documents
//!     participants:
//!       - { id: bob, role: witness }
//!       - { id: carol, role: beneficiary }
//!     rules:
//!       inactivity_period: 30
//!       grace_period: 7
//!       time_lock: 3
//!       approvals_required: 1
//! ```

use crate::error::Result;
use crate::rules::RuleSet;
use crate::vault::{Owner, Participant};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub vaults: Vec<VaultFixture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFixture {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub owners: usize,
    pub vaults: usize,
    pub rule_sets: usize,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        let fixture: Fixture = serde_yaml::from_str(yaml)?;
        for vault in &fixture.vaults {
            if let Some(rules) = &vault.rules {
                rules.validate()?;
            }
        }
        Ok(fixture)
    }
}
