//! Audit events and a tamper-evident, append-only audit log.
//!
//! Each entry stores the hash of its predecessor and a SHA-256 over its own
//! fields, so rewriting any entry breaks every hash after it.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{DeadhandError, Result};

const AUDIT: TableDefinition<u64, &[u8]> = TableDefinition::new("audit");

fn store_err(e: impl std::fmt::Display) -> DeadhandError {
    DeadhandError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    System,
    Participant { id: String },
}

impl Actor {
    pub fn participant(id: impl Into<String>) -> Self {
        Actor::Participant { id: id.into() }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::System => f.write_str("system"),
            Actor::Participant { id } => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ReleaseTriggered,
    GracePeriodEnded,
    WitnessApproved,
    WitnessRejected,
    TimeLockStarted,
    TimeLockReminder,
    ReleaseFinalized,
    ReleaseRevoked,
    VaultReset,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::ReleaseTriggered => "release_triggered",
            AuditAction::GracePeriodEnded => "grace_period_ended",
            AuditAction::WitnessApproved => "witness_approved",
            AuditAction::WitnessRejected => "witness_rejected",
            AuditAction::TimeLockStarted => "time_lock_started",
            AuditAction::TimeLockReminder => "time_lock_reminder",
            AuditAction::ReleaseFinalized => "release_finalized",
            AuditAction::ReleaseRevoked => "release_revoked",
            AuditAction::VaultReset => "vault_reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor: Actor,
    pub action: AuditAction,
    pub vault_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<Uuid>,
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl AuditEvent {
    pub fn new(actor: Actor, action: AuditAction, vault_id: impl Into<String>) -> Self {
        Self {
            actor,
            action,
            vault_id: vault_id.into(),
            release_id: None,
            detail: serde_json::Value::Null,
        }
    }

    pub fn release(mut self, id: Uuid) -> Self {
        self.release_id = Some(id);
        self
    }

    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent, at: DateTime<Utc>) -> Result<()>;
}

/// Writes events to the tracing log only.
#[derive(Debug, Default)]
pub struct LogAudit;

impl AuditSink for LogAudit {
    fn record(&self, event: AuditEvent, _at: DateTime<Utc>) -> Result<()> {
        tracing::info!(
            actor = %event.actor,
            vault = %event.vault_id,
            "audit: {}",
            event.action.as_str()
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub hash: String,
}

impl AuditEntry {
    fn compute_hash(
        seq: u64,
        timestamp: DateTime<Utc>,
        event: &AuditEvent,
        previous_hash: Option<&str>,
    ) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(seq.to_be_bytes());
        hasher.update(timestamp.to_rfc3339().as_bytes());
        hasher.update(serde_json::to_vec(event)?);
        hasher.update(previous_hash.unwrap_or_default().as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn is_intact(&self, previous: Option<&AuditEntry>) -> bool {
        let expected_prev = previous.map(|p| p.hash.as_str());
        if self.previous_hash.as_deref() != expected_prev {
            return false;
        }
        Self::compute_hash(self.seq, self.timestamp, &self.event, expected_prev)
            .map(|h| h == self.hash)
            .unwrap_or(false)
    }
}

/// Append-only audit log in its own redb file, keyed by sequence number.
pub struct AuditLog {
    db: Database,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(AUDIT).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    pub fn append(&self, event: AuditEvent, at: DateTime<Utc>) -> Result<AuditEntry> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let entry = {
            let mut table = wt.open_table(AUDIT).map_err(store_err)?;
            let last: Option<AuditEntry> = match table.last().map_err(store_err)? {
                Some((_, v)) => Some(serde_json::from_slice(v.value())?),
                None => None,
            };
            let seq = last.as_ref().map(|e| e.seq + 1).unwrap_or(0);
            let previous_hash = last.map(|e| e.hash);
            let hash = AuditEntry::compute_hash(seq, at, &event, previous_hash.as_deref())?;
            let entry = AuditEntry {
                seq,
                timestamp: at,
                event,
                previous_hash,
                hash,
            };
            let value = serde_json::to_vec(&entry)?;
            table.insert(seq, value.as_slice()).map_err(store_err)?;
            entry
        };
        wt.commit().map_err(store_err)?;
        Ok(entry)
    }

    /// All entries in sequence order.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(AUDIT).map_err(store_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    pub fn entries_for_release(&self, release_id: Uuid) -> Result<Vec<AuditEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.event.release_id == Some(release_id))
            .collect())
    }

    /// Recompute the hash chain. Returns the sequence number of the first
    /// entry that does not match, or `None` if the chain is intact.
    pub fn verify(&self) -> Result<Option<u64>> {
        let entries = self.entries()?;
        let mut previous: Option<&AuditEntry> = None;
        for entry in &entries {
            if !entry.is_intact(previous) {
                return Ok(Some(entry.seq));
            }
            previous = Some(entry);
        }
        Ok(None)
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: AuditEvent, at: DateTime<Utc>) -> Result<()> {
        self.append(event, at).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, AuditLog) {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::open(&dir.path().join("audit.db")).unwrap();
        (dir, log)
    }

    #[test]
    fn entries_chain_hashes() {
        let (_dir, log) = open_tmp();
        let now = Utc::now();
        let first = log
            .append(
                AuditEvent::new(Actor::System, AuditAction::ReleaseTriggered, "v1"),
                now,
            )
            .unwrap();
        let second = log
            .append(
                AuditEvent::new(Actor::participant("w1"), AuditAction::WitnessApproved, "v1"),
                now,
            )
            .unwrap();

        assert_eq!(first.seq, 0);
        assert!(first.previous_hash.is_none());
        assert_eq!(second.seq, 1);
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));
        assert_eq!(log.verify().unwrap(), None);
    }

    #[test]
    fn tampering_is_detected() {
        let (_dir, log) = open_tmp();
        let now = Utc::now();
        for action in [
            AuditAction::ReleaseTriggered,
            AuditAction::GracePeriodEnded,
            AuditAction::WitnessRejected,
        ] {
            log.append(AuditEvent::new(Actor::System, action, "v1"), now)
                .unwrap();
        }

        // Rewrite entry 1 in place without fixing its hash.
        let mut entries = log.entries().unwrap();
        entries[1].event.vault_id = "v2".into();
        let wt = log.db.begin_write().unwrap();
        {
            let mut table = wt.open_table(AUDIT).unwrap();
            table
                .insert(1u64, serde_json::to_vec(&entries[1]).unwrap().as_slice())
                .unwrap();
        }
        wt.commit().unwrap();

        assert_eq!(log.verify().unwrap(), Some(1));
    }

    #[test]
    fn filters_by_release() {
        let (_dir, log) = open_tmp();
        let id = Uuid::new_v4();
        let now = Utc::now();
        log.append(
            AuditEvent::new(Actor::System, AuditAction::ReleaseTriggered, "v1").release(id),
            now,
        )
        .unwrap();
        log.append(
            AuditEvent::new(Actor::System, AuditAction::VaultReset, "v1"),
            now,
        )
        .unwrap();
        assert_eq!(log.entries_for_release(id).unwrap().len(), 1);
    }
}
