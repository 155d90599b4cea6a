//! Persistent storage for releases, confirmations and the vault records the
//! engine consumes, using redb.
//!
//! # Table design
//!
//! ```text
//! releases         uuid (16 bytes)                  -> JSON Release
//! active_releases  vault id                         -> uuid of the non-terminal release
//! confirmations    release uuid ++ participant id   -> JSON Confirmation
//! vaults           vault id                         -> JSON Vault
//! rule_sets        vault id                         -> JSON RuleSet
//! owners           owner id                         -> JSON Owner
//! ```
//!
//! `active_releases` is the uniqueness index behind "one active release per
//! vault"; the composite key of `confirmations` makes a second verdict from
//! the same witness a key collision. Both are checked inside the write
//! transaction that inserts, and redb admits one writer at a time, so every
//! read-guard-mutate-write sequence below is linearizable.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use uuid::Uuid;

use crate::confirmation::Confirmation;
use crate::error::{DeadhandError, Result};
use crate::release::{Release, Transition};
use crate::rules::RuleSet;
use crate::types::ReleaseStatus;
use crate::vault::{Owner, Vault};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const RELEASES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("releases");
const ACTIVE_RELEASES: TableDefinition<&str, &[u8]> = TableDefinition::new("active_releases");
const CONFIRMATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("confirmations");
const VAULTS: TableDefinition<&str, &[u8]> = TableDefinition::new("vaults");
const RULE_SETS: TableDefinition<&str, &[u8]> = TableDefinition::new("rule_sets");
const OWNERS: TableDefinition<&str, &[u8]> = TableDefinition::new("owners");

fn store_err(e: impl std::fmt::Display) -> DeadhandError {
    DeadhandError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn confirmation_key(release_id: Uuid, participant_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + participant_id.len());
    key.extend_from_slice(release_id.as_bytes());
    key.extend_from_slice(participant_id.as_bytes());
    key
}

/// Half-open range covering every confirmation of `release_id`.
///
/// Participant ids are UTF-8, which never contains the byte `0xff`, so
/// `uuid ++ [0xff]` sorts after every key with that prefix.
fn confirmation_range(release_id: Uuid) -> ([u8; 16], [u8; 17]) {
    let lower = *release_id.as_bytes();
    let mut upper = [0xffu8; 17];
    upper[..16].copy_from_slice(release_id.as_bytes());
    (lower, upper)
}

// ---------------------------------------------------------------------------
// In-transaction helpers
// ---------------------------------------------------------------------------

fn load_release_tx(wt: &WriteTransaction, id: Uuid) -> Result<Release> {
    let table = wt.open_table(RELEASES).map_err(store_err)?;
    let raw = table
        .get(id.as_bytes().as_slice())
        .map_err(store_err)?
        .map(|v| v.value().to_vec())
        .ok_or_else(|| DeadhandError::ReleaseNotFound(id.to_string()))?;
    Ok(serde_json::from_slice(&raw)?)
}

/// Write `release` and keep the active index in step with its status.
fn save_release_tx(wt: &WriteTransaction, release: &Release) -> Result<()> {
    let value = serde_json::to_vec(release)?;
    {
        let mut table = wt.open_table(RELEASES).map_err(store_err)?;
        table
            .insert(release.id.as_bytes().as_slice(), value.as_slice())
            .map_err(store_err)?;
    }
    let mut active = wt.open_table(ACTIVE_RELEASES).map_err(store_err)?;
    if release.is_active() {
        active
            .insert(release.vault_id.as_str(), release.id.as_bytes().as_slice())
            .map_err(store_err)?;
    } else {
        let indexed = active
            .get(release.vault_id.as_str())
            .map_err(store_err)?
            .map(|v| v.value().to_vec());
        if indexed.as_deref() == Some(release.id.as_bytes().as_slice()) {
            active.remove(release.vault_id.as_str()).map_err(store_err)?;
        }
    }
    Ok(())
}

fn load_vault_tx(wt: &WriteTransaction, id: &str) -> Result<Vault> {
    let table = wt.open_table(VAULTS).map_err(store_err)?;
    let raw = table
        .get(id)
        .map_err(store_err)?
        .map(|v| v.value().to_vec())
        .ok_or_else(|| DeadhandError::VaultNotFound(id.to_string()))?;
    Ok(serde_json::from_slice(&raw)?)
}

fn save_vault_tx(wt: &WriteTransaction, vault: &Vault) -> Result<()> {
    let value = serde_json::to_vec(vault)?;
    let mut table = wt.open_table(VAULTS).map_err(store_err)?;
    table
        .insert(vault.id.as_str(), value.as_slice())
        .map_err(store_err)?;
    Ok(())
}

fn active_id_tx(wt: &WriteTransaction, vault_id: &str) -> Result<Option<Vec<u8>>> {
    let active = wt.open_table(ACTIVE_RELEASES).map_err(store_err)?;
    let id = active
        .get(vault_id)
        .map_err(store_err)?
        .map(|v| v.value().to_vec());
    Ok(id)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistent store for engine-owned and engine-consumed records.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the redb database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(RELEASES).map_err(store_err)?;
        wt.open_table(ACTIVE_RELEASES).map_err(store_err)?;
        wt.open_table(CONFIRMATIONS).map_err(store_err)?;
        wt.open_table(VAULTS).map_err(store_err)?;
        wt.open_table(RULE_SETS).map_err(store_err)?;
        wt.open_table(OWNERS).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Owners
    // -----------------------------------------------------------------------

    pub fn put_owner(&self, owner: &Owner) -> Result<()> {
        let value = serde_json::to_vec(owner)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(OWNERS).map_err(store_err)?;
            table
                .insert(owner.id.as_str(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn owner(&self, id: &str) -> Result<Owner> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(OWNERS).map_err(store_err)?;
        let entry = table
            .get(id)
            .map_err(store_err)?
            .ok_or_else(|| DeadhandError::OwnerNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(entry.value())?)
    }

    pub fn owners(&self) -> Result<Vec<Owner>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(OWNERS).map_err(store_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    /// Record activity for `id` at `at`.
    pub fn touch_owner(&self, id: &str, at: DateTime<Utc>) -> Result<Owner> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let owner = {
            let mut table = wt.open_table(OWNERS).map_err(store_err)?;
            let raw = table
                .get(id)
                .map_err(store_err)?
                .map(|v| v.value().to_vec())
                .ok_or_else(|| DeadhandError::OwnerNotFound(id.to_string()))?;
            let mut owner: Owner = serde_json::from_slice(&raw)?;
            owner.last_active_at = Some(at);
            let value = serde_json::to_vec(&owner)?;
            table.insert(id, value.as_slice()).map_err(store_err)?;
            owner
        };
        wt.commit().map_err(store_err)?;
        Ok(owner)
    }

    // -----------------------------------------------------------------------
    // Vaults and rule sets
    // -----------------------------------------------------------------------

    pub fn put_vault(&self, vault: &Vault) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        save_vault_tx(&wt, vault)?;
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn vault(&self, id: &str) -> Result<Vault> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(VAULTS).map_err(store_err)?;
        let entry = table
            .get(id)
            .map_err(store_err)?
            .ok_or_else(|| DeadhandError::VaultNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(entry.value())?)
    }

    pub fn vaults(&self) -> Result<Vec<Vault>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(VAULTS).map_err(store_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    pub fn vaults_owned_by(&self, owner_id: &str) -> Result<Vec<Vault>> {
        Ok(self
            .vaults()?
            .into_iter()
            .filter(|v| v.owner_id == owner_id)
            .collect())
    }

    /// Clear the vault's `release_triggered` marker so a new inactivity
    /// episode can start. Refused while a release is still active.
    pub fn reset_vault(&self, id: &str) -> Result<Vault> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut vault = load_vault_tx(&wt, id)?;
        if active_id_tx(&wt, id)?.is_some() {
            return Err(DeadhandError::AlreadyActive(id.to_string()));
        }
        vault.release_triggered = false;
        save_vault_tx(&wt, &vault)?;
        wt.commit().map_err(store_err)?;
        Ok(vault)
    }

    /// Store the rule set for `vault_id`.
    ///
    /// Rules are frozen while the vault has an active release: a different
    /// rule set fails with `AlreadyActive`, an identical one is a no-op.
    pub fn put_rules(&self, vault_id: &str, rules: &RuleSet) -> Result<()> {
        rules.validate()?;
        let value = serde_json::to_vec(rules)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        let unchanged = {
            let table = wt.open_table(RULE_SETS).map_err(store_err)?;
            let current = table.get(vault_id).map_err(store_err)?;
            match current {
                Some(v) => serde_json::from_slice::<RuleSet>(v.value())? == *rules,
                None => false,
            }
        };
        if unchanged {
            return Ok(());
        }
        if active_id_tx(&wt, vault_id)?.is_some() {
            return Err(DeadhandError::AlreadyActive(vault_id.to_string()));
        }
        {
            let mut table = wt.open_table(RULE_SETS).map_err(store_err)?;
            table
                .insert(vault_id, value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn rules(&self, vault_id: &str) -> Result<Option<RuleSet>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(RULE_SETS).map_err(store_err)?;
        match table.get(vault_id).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Releases
    // -----------------------------------------------------------------------

    /// Insert a new release and mark its vault as triggered, atomically.
    ///
    /// Fails with `AlreadyActive` if the vault has a non-terminal release,
    /// and with `AlreadyTriggered` when `require_untriggered` is set and the
    /// vault's marker is still up from an earlier episode.
    pub fn create_release(&self, release: &Release, require_untriggered: bool) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut vault = load_vault_tx(&wt, &release.vault_id)?;
        if active_id_tx(&wt, &release.vault_id)?.is_some() {
            return Err(DeadhandError::AlreadyActive(release.vault_id.clone()));
        }
        if require_untriggered && vault.release_triggered {
            return Err(DeadhandError::AlreadyTriggered(release.vault_id.clone()));
        }
        save_release_tx(&wt, release)?;
        vault.release_triggered = true;
        save_vault_tx(&wt, &vault)?;
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn release(&self, id: Uuid) -> Result<Release> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(RELEASES).map_err(store_err)?;
        let entry = table
            .get(id.as_bytes().as_slice())
            .map_err(store_err)?
            .ok_or_else(|| DeadhandError::ReleaseNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(entry.value())?)
    }

    /// All releases, newest trigger first.
    pub fn releases(&self) -> Result<Vec<Release>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(RELEASES).map_err(store_err)?;
        let mut result: Vec<Release> = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        result.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(result)
    }

    pub fn releases_for_vault(&self, vault_id: &str) -> Result<Vec<Release>> {
        Ok(self
            .releases()?
            .into_iter()
            .filter(|r| r.vault_id == vault_id)
            .collect())
    }

    pub fn releases_with_status(&self, status: ReleaseStatus) -> Result<Vec<Release>> {
        Ok(self
            .releases()?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    pub fn active_release(&self, vault_id: &str) -> Result<Option<Release>> {
        let id = {
            let rt = self.db.begin_read().map_err(store_err)?;
            let table = rt.open_table(ACTIVE_RELEASES).map_err(store_err)?;
            let raw = table
                .get(vault_id)
                .map_err(store_err)?
                .map(|v| v.value().to_vec());
            match raw {
                Some(bytes) => Uuid::from_slice(&bytes).map_err(store_err)?,
                None => return Ok(None),
            }
        };
        self.release(id).map(Some)
    }

    /// Read-modify-write one release inside a single write transaction.
    ///
    /// `f` runs against the freshly read record; if it fails nothing is
    /// written. The active index is updated in the same commit.
    pub fn update_release<T, F>(&self, id: Uuid, f: F) -> Result<(Release, T)>
    where
        F: FnOnce(&mut Release) -> Result<T>,
    {
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut release = load_release_tx(&wt, id)?;
        let out = f(&mut release)?;
        save_release_tx(&wt, &release)?;
        wt.commit().map_err(store_err)?;
        Ok((release, out))
    }

    /// Set `notified_time_lock` on an approved release that does not have it.
    ///
    /// Returns the updated release to exactly one caller; everyone else gets
    /// `None` and nothing is written.
    pub fn claim_time_lock_notice(&self, id: Uuid) -> Result<Option<Release>> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut release = load_release_tx(&wt, id)?;
        if release.notified_time_lock || release.status != ReleaseStatus::Approved {
            return Ok(None);
        }
        release.notified_time_lock = true;
        save_release_tx(&wt, &release)?;
        wt.commit().map_err(store_err)?;
        Ok(Some(release))
    }

    // -----------------------------------------------------------------------
    // Confirmations
    // -----------------------------------------------------------------------

    /// Persist a witness verdict and apply its transition as one unit.
    ///
    /// Inside the transaction: the release must still await approval, the
    /// (release, participant) pair must be unused, then `decide` mutates the
    /// release and both records are written.
    pub fn commit_confirmation<F>(
        &self,
        confirmation: &Confirmation,
        decide: F,
    ) -> Result<(Release, Transition)>
    where
        F: FnOnce(&mut Release) -> Result<Transition>,
    {
        let key = confirmation_key(confirmation.release_id, &confirmation.participant_id);
        let wt = self.db.begin_write().map_err(store_err)?;
        let mut release = load_release_tx(&wt, confirmation.release_id)?;
        release.ensure_awaiting_approval()?;
        {
            let mut table = wt.open_table(CONFIRMATIONS).map_err(store_err)?;
            if table.get(key.as_slice()).map_err(store_err)?.is_some() {
                return Err(DeadhandError::DuplicateConfirmation {
                    release: confirmation.release_id.to_string(),
                    participant: confirmation.participant_id.clone(),
                });
            }
            let value = serde_json::to_vec(confirmation)?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(store_err)?;
        }
        let transition = decide(&mut release)?;
        save_release_tx(&wt, &release)?;
        wt.commit().map_err(store_err)?;
        Ok((release, transition))
    }

    pub fn confirmation(&self, release_id: Uuid, participant_id: &str) -> Result<Option<Confirmation>> {
        let key = confirmation_key(release_id, participant_id);
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(CONFIRMATIONS).map_err(store_err)?;
        match table.get(key.as_slice()).map_err(store_err)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    /// Confirmations for one release, oldest first.
    pub fn confirmations(&self, release_id: Uuid) -> Result<Vec<Confirmation>> {
        let (lower, upper) = confirmation_range(release_id);
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(CONFIRMATIONS).map_err(store_err)?;
        let mut result: Vec<Confirmation> = Vec::new();
        for entry in table
            .range(lower.as_slice()..upper.as_slice())
            .map_err(store_err)?
        {
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        result.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
