use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use super::{Job, TickReport};
use crate::audit::{Actor, AuditAction, AuditEvent};
use crate::context::ReleaseContext;
use crate::engine::Engine;
use crate::error::Result;
use crate::notify::NotificationKind;
use crate::release::{Release, ReleaseEvent};
use crate::types::{ReleaseStatus, Role};

impl Engine {
    /// Promote every pending release whose grace period has ended, then ask
    /// witnesses for a verdict and tell beneficiaries to wait.
    pub fn run_grace_reconciler(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let mut report = TickReport::default();
        for release in self.store.releases_with_status(ReleaseStatus::Pending)? {
            if release.grace_period_end > now {
                continue;
            }
            report.scanned += 1;
            let id = release.id.to_string();
            let outcome = self.end_grace_period(release, now);
            report.tally(Job::Grace, &id, outcome);
        }
        Ok(report)
    }

    fn end_grace_period(&self, release: Release, now: DateTime<Utc>) -> Result<bool> {
        let mut ctx = ReleaseContext::for_release(&self.store, release)?;
        let (release, _) = self
            .store
            .update_release(ctx.release.id, |r| r.apply(ReleaseEvent::GraceElapsed, now))?;
        ctx.release = release;

        info!(
            vault = %ctx.vault.id,
            release = %ctx.release.id,
            "grace period ended; awaiting {} approval(s)",
            ctx.release.approvals_needed
        );
        let witnesses = ctx.participants(Role::Witness);
        let beneficiaries = ctx.participants(Role::Beneficiary);
        self.notify(&ctx, NotificationKind::ApprovalRequired, &witnesses, now);
        self.notify(&ctx, NotificationKind::AwaitingApproval, &beneficiaries, now);
        self.record(
            AuditEvent::new(Actor::System, AuditAction::GracePeriodEnded, &ctx.vault.id)
                .release(ctx.release.id)
                .detail(json!({
                    "grace_period_end": ctx.release.grace_period_end,
                    "witnesses_notified": witnesses.len(),
                    "beneficiaries_notified": beneficiaries.len(),
                })),
            now,
        );
        Ok(true)
    }
}
