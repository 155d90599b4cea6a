use chrono::{DateTime, Utc};
use serde_json::json;

use super::{Job, TickReport};
use crate::audit::{Actor, AuditAction, AuditEvent};
use crate::context::ReleaseContext;
use crate::engine::Engine;
use crate::error::Result;
use crate::notify::NotificationKind;
use crate::release::Release;
use crate::types::ReleaseStatus;

impl Engine {
    /// Drive approved releases through their countdown.
    ///
    /// For each approved release: send the time-lock announcement if it has
    /// not gone out, then either finalize (countdown elapsed) or send a
    /// reminder once the remaining time is within the reminder threshold.
    /// Reminders repeat on every tick inside that window.
    pub fn run_time_lock_reconciler(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let mut report = TickReport::default();
        for release in self.store.releases_with_status(ReleaseStatus::Approved)? {
            report.scanned += 1;
            let id = release.id.to_string();
            let outcome = self.advance_time_lock(release, now, &mut report);
            report.tally(Job::TimeLock, &id, outcome);
        }
        Ok(report)
    }

    fn advance_time_lock(
        &self,
        release: Release,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<bool> {
        let mut ctx = ReleaseContext::for_release(&self.store, release)?;

        if !ctx.release.notified_time_lock && self.announce_time_lock(&mut ctx, now) {
            report.announcements += 1;
        }

        match ctx.release.time_lock_remaining(now) {
            None => {
                self.finalize(ctx, now, Actor::System)?;
                Ok(true)
            }
            Some(remaining) => {
                let threshold = self.unit.span(self.reminder_threshold);
                if self.reminder_threshold > 0 && remaining <= threshold {
                    self.notify_all(&ctx, NotificationKind::TimeLockReminder, now);
                    self.record(
                        AuditEvent::new(Actor::System, AuditAction::TimeLockReminder, &ctx.vault.id)
                            .release(ctx.release.id)
                            .detail(json!({
                                "remaining": self.unit.describe(remaining),
                                "countdown_end": ctx.release.countdown_end,
                            })),
                        now,
                    );
                    report.reminders += 1;
                }
                Ok(false)
            }
        }
    }
}
