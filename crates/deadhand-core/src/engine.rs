//! The release orchestration engine: the operations callers invoke and the
//! shared plumbing (notification fan-out, audit recording) the periodic
//! reconcilers in [`crate::reconcile`] reuse.
//!
//! Every state change goes through one store write transaction. Notifier
//! and audit calls happen after the commit; their failures are logged and
//! never undo a transition.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{Actor, AuditAction, AuditEvent, AuditLog, AuditSink, LogAudit};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::confirmation::Confirmation;
use crate::context::ReleaseContext;
use crate::error::{DeadhandError, Result};
use crate::fixture::{Fixture, ImportSummary};
use crate::notify::{LogNotifier, Notification, NotificationKind, Notifier};
use crate::paths;
use crate::release::{Release, ReleaseEvent};
use crate::rules::RuleSet;
use crate::status::{self, InactivityReport, VaultReleaseStatus};
use crate::store::Store;
use crate::types::{Decision, ReleaseStatus, Role, TimeUnit};
use crate::vault::{Owner, Participant, Vault};

/// How a release came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Manual,
    Inactivity,
}

impl Origin {
    fn as_str(self) -> &'static str {
        match self {
            Origin::Manual => "manual",
            Origin::Inactivity => "inactivity",
        }
    }
}

pub struct Engine {
    pub(crate) store: Arc<Store>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) unit: TimeUnit,
    pub(crate) reminder_threshold: u32,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) audit: Arc<dyn AuditSink>,
}

impl Engine {
    /// Engine over `store` using wall-clock time, log-only notifications
    /// and a log-only audit sink.
    pub fn new(store: Arc<Store>, unit: TimeUnit) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            unit,
            reminder_threshold: 2,
            notifier: Arc::new(LogNotifier),
            audit: Arc::new(LogAudit),
        }
    }

    /// Open the project's release and audit databases under `root` and wire
    /// the collaborators named in `config`.
    pub fn open(root: &Path, config: &Config) -> Result<Self> {
        let store = Store::open(&paths::releases_db_path(root))?;
        let audit = AuditLog::open(&paths::audit_db_path(root))?;
        Ok(Self::new(Arc::new(store), config.time_unit)
            .with_notifier(config.notify.build())
            .with_audit(Arc::new(audit))
            .with_reminder_threshold(config.reminder_threshold))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_reminder_threshold(mut self, units: u32) -> Self {
        self.reminder_threshold = units;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Trigger
    // -----------------------------------------------------------------------

    /// Open a release for `vault_id` now.
    pub fn trigger_release(&self, vault_id: &str) -> Result<Release> {
        let vault = self.store.vault(vault_id)?;
        let rules = self
            .store
            .rules(vault_id)?
            .ok_or_else(|| DeadhandError::NoPolicy(vault_id.to_string()))?;
        self.open_release(&vault, &rules, self.clock.now(), Origin::Manual)
    }

    /// Create a pending release. The inactivity path additionally requires
    /// the vault's triggered marker to be clear.
    pub(crate) fn open_release(
        &self,
        vault: &Vault,
        rules: &RuleSet,
        now: DateTime<Utc>,
        origin: Origin,
    ) -> Result<Release> {
        rules.validate()?;
        let release = Release::new(&vault.id, rules, self.unit, now)?;
        self.store
            .create_release(&release, origin == Origin::Inactivity)?;

        info!(
            vault = %vault.id,
            release = %release.id,
            origin = origin.as_str(),
            "release triggered; grace period ends {}",
            release.grace_period_end
        );
        self.record(
            AuditEvent::new(Actor::System, AuditAction::ReleaseTriggered, &vault.id)
                .release(release.id)
                .detail(json!({
                    "origin": origin.as_str(),
                    "grace_period_end": release.grace_period_end,
                    "approvals_needed": release.approvals_needed,
                    "time_lock_secs": release.time_lock_secs,
                })),
            now,
        );
        Ok(release)
    }

    // -----------------------------------------------------------------------
    // Confirm
    // -----------------------------------------------------------------------

    /// Record a witness verdict and apply it to the release.
    ///
    /// Checks, in order: the release exists, it is `in_progress`, the actor
    /// is a witness on the vault, and the actor has not confirmed before.
    /// The last check and the status check are repeated inside the write
    /// transaction.
    pub fn confirm_release(
        &self,
        release_id: Uuid,
        witness_id: &str,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<(Confirmation, Release)> {
        let mut ctx = ReleaseContext::load(&self.store, release_id)?;
        ctx.release.ensure_awaiting_approval()?;
        if !ctx.vault.has_role(witness_id, Role::Witness) {
            return Err(DeadhandError::Forbidden(witness_id.to_string()));
        }
        let event = match decision {
            Decision::Approved => ReleaseEvent::WitnessApproved,
            Decision::Rejected => ReleaseEvent::WitnessRejected,
        };

        let now = self.clock.now();
        let confirmation = Confirmation::new(release_id, witness_id, decision, comment, now);
        let (release, transition) = self
            .store
            .commit_confirmation(&confirmation, |r| r.apply(event, now))?;
        ctx.release = release;

        info!(
            release = %release_id,
            witness = witness_id,
            decision = %decision,
            "confirmation recorded: {}/{} approvals, status {}",
            ctx.release.approvals_received,
            ctx.release.approvals_needed,
            ctx.release.status
        );
        let action = match decision {
            Decision::Approved => AuditAction::WitnessApproved,
            Decision::Rejected => AuditAction::WitnessRejected,
        };
        self.record(
            AuditEvent::new(Actor::participant(witness_id), action, &ctx.vault.id)
                .release(release_id)
                .detail(json!({
                    "decision": decision.as_str(),
                    "comment": confirmation.comment,
                    "approvals_received": ctx.release.approvals_received,
                    "approvals_needed": ctx.release.approvals_needed,
                    "status": ctx.release.status.as_str(),
                })),
            now,
        );

        if transition.changed() {
            match transition.to {
                ReleaseStatus::Approved => {
                    self.announce_time_lock(&mut ctx, now);
                }
                ReleaseStatus::Rejected => {
                    self.notify_all(&ctx, NotificationKind::Rejected, now);
                }
                _ => {}
            }
        }
        Ok((confirmation, ctx.release))
    }

    /// Send the one-time "time lock started" notice.
    ///
    /// The guard flag is claimed in its own transaction before anything is
    /// sent, so among concurrent callers only the one holding the claim
    /// notifies. A crash between the claim and the send loses the notice.
    /// Returns whether this call made the claim.
    pub(crate) fn announce_time_lock(&self, ctx: &mut ReleaseContext, now: DateTime<Utc>) -> bool {
        match self.store.claim_time_lock_notice(ctx.release.id) {
            Ok(Some(release)) => ctx.release = release,
            Ok(None) => return false,
            Err(e) => {
                warn!(release = %ctx.release.id, "failed to claim time-lock notice: {e}");
                return false;
            }
        }
        self.notify_all(ctx, NotificationKind::TimeLockStarted, now);
        self.record(
            AuditEvent::new(Actor::System, AuditAction::TimeLockStarted, &ctx.vault.id)
                .release(ctx.release.id)
                .detail(json!({ "countdown_end": ctx.release.countdown_end })),
            now,
        );
        true
    }

    // -----------------------------------------------------------------------
    // Finalize / revoke
    // -----------------------------------------------------------------------

    /// Move an approved release whose countdown has elapsed to `released`.
    pub fn finalize_release(&self, release_id: Uuid) -> Result<Release> {
        let ctx = ReleaseContext::load(&self.store, release_id)?;
        self.finalize(ctx, self.clock.now(), Actor::System)
    }

    pub(crate) fn finalize(
        &self,
        mut ctx: ReleaseContext,
        now: DateTime<Utc>,
        actor: Actor,
    ) -> Result<Release> {
        let (release, _) = self
            .store
            .update_release(ctx.release.id, |r| r.apply(ReleaseEvent::CountdownElapsed, now))?;
        ctx.release = release;

        info!(vault = %ctx.vault.id, release = %ctx.release.id, "release finalized");
        self.notify_all(&ctx, NotificationKind::Released, now);
        self.record(
            AuditEvent::new(actor, AuditAction::ReleaseFinalized, &ctx.vault.id)
                .release(ctx.release.id)
                .detail(json!({ "completed_at": ctx.release.completed_at })),
            now,
        );
        Ok(ctx.release)
    }

    /// Owner-initiated cancellation from any non-terminal state.
    pub fn revoke_release(
        &self,
        release_id: Uuid,
        actor_id: &str,
        reason: Option<String>,
    ) -> Result<Release> {
        let mut ctx = ReleaseContext::load(&self.store, release_id)?;
        if !ctx.vault.is_owner(actor_id) {
            return Err(DeadhandError::Forbidden(actor_id.to_string()));
        }

        let now = self.clock.now();
        let (release, transition) = self.store.update_release(release_id, |r| {
            let t = r.apply(ReleaseEvent::OwnerRevoked, now)?;
            r.revoke_reason = reason.clone();
            Ok(t)
        })?;
        ctx.release = release;

        info!(
            vault = %ctx.vault.id,
            release = %release_id,
            "release revoked by owner (was {})",
            transition.from
        );
        self.notify_all(&ctx, NotificationKind::Revoked, now);
        self.record(
            AuditEvent::new(Actor::participant(actor_id), AuditAction::ReleaseRevoked, &ctx.vault.id)
                .release(release_id)
                .detail(json!({
                    "from": transition.from.as_str(),
                    "reason": reason,
                })),
            now,
        );
        Ok(ctx.release)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn vault_release_status(&self, vault_id: &str) -> Result<VaultReleaseStatus> {
        self.store.vault(vault_id)?;
        let releases = self.store.releases_for_vault(vault_id)?;
        Ok(VaultReleaseStatus::project(
            vault_id,
            &releases,
            self.clock.now(),
        ))
    }

    pub fn release(&self, release_id: Uuid) -> Result<Release> {
        self.store.release(release_id)
    }

    /// Releases newest first, optionally narrowed to one vault or status.
    pub fn releases(
        &self,
        vault_id: Option<&str>,
        status: Option<ReleaseStatus>,
    ) -> Result<Vec<Release>> {
        let releases = match vault_id {
            Some(id) => self.store.releases_for_vault(id)?,
            None => self.store.releases()?,
        };
        Ok(releases
            .into_iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect())
    }

    pub fn confirmations(&self, release_id: Uuid) -> Result<Vec<Confirmation>> {
        self.store.release(release_id)?;
        self.store.confirmations(release_id)
    }

    pub fn inactivity_report(&self, owner_id: &str) -> Result<InactivityReport> {
        let owner = self.store.owner(owner_id)?;
        let now = self.clock.now();
        let mut vaults = Vec::new();
        for vault in self.store.vaults_owned_by(owner_id)? {
            let rules = self.store.rules(&vault.id)?;
            let active = self.store.active_release(&vault.id)?.map(|r| r.status);
            vaults.push(status::classify(
                &owner,
                &vault,
                rules.as_ref(),
                active,
                self.unit,
                now,
            ));
        }
        Ok(InactivityReport {
            owner_id: owner.id,
            last_active_at: owner.last_active_at,
            checked_at: now,
            time_unit: self.unit,
            vaults,
        })
    }

    // -----------------------------------------------------------------------
    // Owner activity and vault reset
    // -----------------------------------------------------------------------

    pub fn record_activity(&self, owner_id: &str) -> Result<Owner> {
        self.store.touch_owner(owner_id, self.clock.now())
    }

    /// Clear the vault's triggered marker and refresh its owner's activity so
    /// a new inactivity episode starts from now.
    pub fn reset_vault(&self, vault_id: &str) -> Result<Vault> {
        let now = self.clock.now();
        let vault = self.store.reset_vault(vault_id)?;
        match self.store.touch_owner(&vault.owner_id, now) {
            Ok(_) | Err(DeadhandError::OwnerNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        info!(vault = vault_id, "vault reset");
        self.record(
            AuditEvent::new(Actor::System, AuditAction::VaultReset, vault_id),
            now,
        );
        Ok(vault)
    }

    // -----------------------------------------------------------------------
    // Import
    // -----------------------------------------------------------------------

    /// Load owners, vaults and rule sets. An existing vault keeps its
    /// triggered marker; an existing owner keeps its recorded activity when
    /// the fixture has none.
    ///
    /// Every rule set is checked before anything is written: it must be
    /// valid, fit the date range in the engine's unit, and leave a vault
    /// with an active release unchanged.
    pub fn import(&self, fixture: &Fixture) -> Result<ImportSummary> {
        let now = self.clock.now();
        for entry in &fixture.vaults {
            let Some(rules) = &entry.rules else { continue };
            rules.validate()?;
            rules.check_range(self.unit, now)?;
            if self.store.rules(&entry.id)?.as_ref() != Some(rules)
                && self.store.active_release(&entry.id)?.is_some()
            {
                return Err(DeadhandError::AlreadyActive(entry.id.clone()));
            }
        }

        let mut summary = ImportSummary::default();
        let existing: HashMap<String, Owner> = self
            .store
            .owners()?
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        for owner in &fixture.owners {
            let mut owner = owner.clone();
            if owner.last_active_at.is_none() {
                owner.last_active_at = existing.get(&owner.id).and_then(|o| o.last_active_at);
            }
            self.store.put_owner(&owner)?;
            summary.owners += 1;
        }

        for entry in &fixture.vaults {
            let release_triggered = match self.store.vault(&entry.id) {
                Ok(v) => v.release_triggered,
                Err(DeadhandError::VaultNotFound(_)) => false,
                Err(e) => return Err(e),
            };
            let vault = Vault {
                id: entry.id.clone(),
                owner_id: entry.owner_id.clone(),
                title: entry.title.clone(),
                participants: entry.participants.clone(),
                release_triggered,
            };
            self.store.put_vault(&vault)?;
            summary.vaults += 1;
            if let Some(rules) = &entry.rules {
                self.store.put_rules(&entry.id, rules)?;
                summary.rule_sets += 1;
            }
        }
        info!(
            owners = summary.owners,
            vaults = summary.vaults,
            rule_sets = summary.rule_sets,
            "fixture imported"
        );
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Collaborators
    // -----------------------------------------------------------------------

    /// Notify everyone on the vault. Returns the number of notices attempted.
    pub(crate) fn notify_all(
        &self,
        ctx: &ReleaseContext,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> usize {
        self.notify(ctx, kind, &ctx.everyone(), now)
    }

    pub(crate) fn notify(
        &self,
        ctx: &ReleaseContext,
        kind: NotificationKind,
        recipients: &[&Participant],
        now: DateTime<Utc>,
    ) -> usize {
        for p in recipients {
            let (subject, body) = compose(kind, p.role, ctx, self.unit, now);
            let notification = Notification {
                kind,
                recipient: p.id.clone(),
                role: p.role,
                email: p.email.clone(),
                vault_id: ctx.vault.id.clone(),
                release_id: ctx.release.id,
                subject,
                body,
            };
            if let Err(e) = self.notifier.send(&notification) {
                warn!(
                    recipient = %p.id,
                    release = %ctx.release.id,
                    "notification failed: {e}"
                );
            }
        }
        recipients.len()
    }

    pub(crate) fn record(&self, event: AuditEvent, at: DateTime<Utc>) {
        let action = event.action;
        if let Err(e) = self.audit.record(event, at) {
            warn!("audit write failed for {}: {e}", action.as_str());
        }
    }
}

/// Subject and body for one recipient.
fn compose(
    kind: NotificationKind,
    role: Role,
    ctx: &ReleaseContext,
    unit: TimeUnit,
    now: DateTime<Utc>,
) -> (String, String) {
    let title = &ctx.vault.title;
    let remaining = ctx
        .release
        .time_lock_remaining(now)
        .map(|d| unit.describe(d))
        .unwrap_or_else(|| "0".to_string());
    match kind {
        NotificationKind::ApprovalRequired => (
            format!("Approval required: {title}"),
            format!(
                "The grace period for vault '{title}' has ended. As a witness, please \
                 approve or reject release {}.",
                ctx.release.id
            ),
        ),
        NotificationKind::AwaitingApproval => (
            format!("Release awaiting approval: {title}"),
            format!(
                "Vault '{title}' is being released to you and is awaiting witness approval. \
                 {} approval(s) are required.",
                ctx.release.approvals_needed
            ),
        ),
        NotificationKind::TimeLockStarted => (
            format!("Time lock started: {title}"),
            format!(
                "All required witnesses approved the release of vault '{title}'. \
                 It unlocks in {remaining}."
            ),
        ),
        NotificationKind::TimeLockReminder => (
            format!("Time lock ending soon: {title}"),
            format!("Vault '{title}' unlocks in {remaining}."),
        ),
        NotificationKind::Released => match role {
            Role::Beneficiary | Role::Shared => (
                format!("Vault released: {title}"),
                format!("Vault '{title}' is now accessible to you."),
            ),
            Role::Witness => (
                format!("Vault released: {title}"),
                format!("The time lock on vault '{title}' has ended and it has been released."),
            ),
        },
        NotificationKind::Rejected => (
            format!("Release rejected: {title}"),
            format!("A witness rejected the release of vault '{title}'. It stays locked."),
        ),
        NotificationKind::Revoked => (
            format!("Release revoked: {title}"),
            format!("The owner of vault '{title}' revoked the pending release."),
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
