//! Read model assembled once per operation: a release together with the
//! vault and rule set it belongs to.
//!
//! Operations load a `ReleaseContext` up front and hand plain data to the
//! state machine, which never fetches anything itself.

use crate::error::{DeadhandError, Result};
use crate::release::Release;
use crate::rules::RuleSet;
use crate::store::Store;
use crate::types::Role;
use crate::vault::{Participant, Vault};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReleaseContext {
    pub release: Release,
    pub vault: Vault,
    pub rules: Option<RuleSet>,
}

impl ReleaseContext {
    pub fn load(store: &Store, release_id: Uuid) -> Result<Self> {
        let release = store.release(release_id)?;
        Self::for_release(store, release)
    }

    /// Assemble the context around an already-loaded release.
    pub fn for_release(store: &Store, release: Release) -> Result<Self> {
        let vault = store.vault(&release.vault_id)?;
        let rules = store.rules(&vault.id)?;
        Ok(Self {
            release,
            vault,
            rules,
        })
    }

    pub fn rules(&self) -> Result<&RuleSet> {
        self.rules
            .as_ref()
            .ok_or_else(|| DeadhandError::NoPolicy(self.vault.id.clone()))
    }

    pub fn participants(&self, role: Role) -> Vec<&Participant> {
        self.vault.with_role(role).collect()
    }

    /// Witnesses first, then beneficiaries, then shared-access holders.
    pub fn everyone(&self) -> Vec<&Participant> {
        [Role::Witness, Role::Beneficiary, Role::Shared]
            .into_iter()
            .flat_map(|role| self.vault.with_role(role))
            .collect()
    }
}
