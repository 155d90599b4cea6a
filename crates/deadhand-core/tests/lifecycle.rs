use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, OnceLock};
use std::thread;

use chrono::{Duration, Utc};
use deadhand_core::audit::{AuditAction, AuditLog};
use deadhand_core::clock::{Clock, ManualClock};
use deadhand_core::fixture::Fixture;
use deadhand_core::notify::{MemoryNotifier, Notification, NotificationKind, Notifier};
use deadhand_core::reconcile::Job;
use deadhand_core::store::Store;
use deadhand_core::types::{Decision, ReleaseStatus, Role, TimeUnit};
use deadhand_core::{DeadhandError, Engine};
use tempfile::TempDir;

const FIXTURE: &str = r#"
owners:
  - id: alice
vaults:
  - id: family
    owner_id: alice
    title: Family documents
    participants:
      - { id: w1, role: witness }
      - { id: w2, role: witness }
      - { id: carol, role: beneficiary }
    rules:
      inactivity_period: 1
      grace_period: 1
      time_lock: 1
      approvals_required: 2
"#;

struct World {
    _dir: TempDir,
    engine: Arc<Engine>,
    clock: Arc<ManualClock>,
    notifier: Arc<MemoryNotifier>,
    audit: Arc<AuditLog>,
}

fn world_with(notifier: MemoryNotifier) -> World {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(&dir.path().join("releases.db")).unwrap());
    let audit = Arc::new(AuditLog::open(&dir.path().join("audit.db")).unwrap());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let notifier = Arc::new(notifier);
    let engine = Engine::new(store, TimeUnit::Minutes)
        .with_clock(clock.clone())
        .with_notifier(notifier.clone())
        .with_audit(audit.clone());
    engine.import(&Fixture::parse(FIXTURE).unwrap()).unwrap();
    engine.record_activity("alice").unwrap();
    World {
        _dir: dir,
        engine: Arc::new(engine),
        clock,
        notifier,
        audit,
    }
}

fn world() -> World {
    world_with(MemoryNotifier::new())
}

/// Let the owner go quiet, run the monitor, then end the grace period.
fn reach_in_progress(w: &World) -> uuid::Uuid {
    w.clock.advance(Duration::minutes(2));
    let report = w.engine.run_job(Job::Inactivity).unwrap();
    assert_eq!(report.transitioned, 1);
    let release = w.engine.store().active_release("family").unwrap().unwrap();
    assert_eq!(release.status, ReleaseStatus::Pending);

    w.clock.advance(Duration::minutes(1));
    w.engine.run_job(Job::Grace).unwrap();
    assert_eq!(
        w.engine.release(release.id).unwrap().status,
        ReleaseStatus::InProgress
    );
    release.id
}

fn count(w: &World, action: AuditAction) -> usize {
    w.audit
        .entries()
        .unwrap()
        .iter()
        .filter(|e| e.event.action == action)
        .count()
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn quorum_approval_then_time_lock_release() {
    let w = world();
    let id = reach_in_progress(&w);

    assert_eq!(w.notifier.of_kind(NotificationKind::ApprovalRequired).len(), 2);
    let waiting = w.notifier.of_kind(NotificationKind::AwaitingApproval);
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].role, Role::Beneficiary);

    let (_, r) = w
        .engine
        .confirm_release(id, "w1", Decision::Approved, None)
        .unwrap();
    assert_eq!(r.approvals_received, 1);
    assert_eq!(r.status, ReleaseStatus::InProgress);

    let (_, r) = w
        .engine
        .confirm_release(id, "w2", Decision::Approved, None)
        .unwrap();
    assert_eq!(r.approvals_received, 2);
    assert_eq!(r.status, ReleaseStatus::Approved);
    let countdown_end = r.countdown_end.unwrap();
    assert_eq!(countdown_end, w.clock.now() + Duration::minutes(1));

    w.clock.set(countdown_end + Duration::seconds(1));
    let report = w.engine.run_job(Job::TimeLock).unwrap();
    assert_eq!(report.transitioned, 1);

    let r = w.engine.release(id).unwrap();
    assert_eq!(r.status, ReleaseStatus::Released);
    assert!(r.completed_at.is_some());
    assert_eq!(w.notifier.of_kind(NotificationKind::Released).len(), 3);
    assert_eq!(count(&w, AuditAction::ReleaseFinalized), 1);
    assert_eq!(w.audit.verify().unwrap(), None);
}

#[test]
fn single_rejection_is_final() {
    let w = world();
    let id = reach_in_progress(&w);

    let (_, r) = w
        .engine
        .confirm_release(id, "w1", Decision::Rejected, Some("owner is fine".into()))
        .unwrap();
    assert_eq!(r.status, ReleaseStatus::Rejected);
    assert!(r.completed_at.is_some());

    let err = w
        .engine
        .confirm_release(id, "w2", Decision::Approved, None)
        .unwrap_err();
    assert!(matches!(err, DeadhandError::InvalidState { .. }));
    assert_eq!(w.engine.release(id).unwrap().approvals_received, 0);
}

#[test]
fn owner_revoke_while_in_progress() {
    let w = world();
    let id = reach_in_progress(&w);

    let r = w.engine.revoke_release(id, "alice", None).unwrap();
    assert_eq!(r.status, ReleaseStatus::Rejected);
    assert!(r.completed_at.is_some());

    for witness in ["w1", "w2"] {
        assert!(w
            .engine
            .confirm_release(id, witness, Decision::Approved, None)
            .is_err());
    }
    assert!(!w.engine.vault_release_status("family").unwrap().has_release);
}

// ---------------------------------------------------------------------------
// Reconciler properties
// ---------------------------------------------------------------------------

#[test]
fn grace_reconciler_is_idempotent() {
    let w = world();
    reach_in_progress(&w);
    let before = w.audit.entries().unwrap().len();

    let report = w.engine.run_job(Job::Grace).unwrap();
    assert_eq!(report.transitioned, 0);
    assert_eq!(report.scanned, 0);
    assert_eq!(w.audit.entries().unwrap().len(), before);
    assert_eq!(count(&w, AuditAction::GracePeriodEnded), 1);
}

#[test]
fn inactivity_monitor_triggers_once_per_episode() {
    let w = world();
    w.clock.advance(Duration::minutes(2));
    assert_eq!(w.engine.run_job(Job::Inactivity).unwrap().transitioned, 1);
    assert_eq!(w.engine.run_job(Job::Inactivity).unwrap().transitioned, 0);

    let id = w.engine.store().active_release("family").unwrap().unwrap().id;
    w.engine.revoke_release(id, "alice", None).unwrap();

    // Marker still set: a fresh scan does not start a second episode.
    w.clock.advance(Duration::minutes(5));
    assert_eq!(w.engine.run_job(Job::Inactivity).unwrap().transitioned, 0);

    // After reset the owner counts as active again until the period lapses.
    w.engine.reset_vault("family").unwrap();
    assert_eq!(w.engine.run_job(Job::Inactivity).unwrap().transitioned, 0);
    w.clock.advance(Duration::minutes(2));
    assert_eq!(w.engine.run_job(Job::Inactivity).unwrap().transitioned, 1);
    assert_eq!(w.engine.releases(Some("family"), None).unwrap().len(), 2);
}

#[test]
fn reminders_fire_inside_threshold() {
    let w = world();
    let id = reach_in_progress(&w);
    w.engine
        .confirm_release(id, "w1", Decision::Approved, None)
        .unwrap();
    w.engine
        .confirm_release(id, "w2", Decision::Approved, None)
        .unwrap();

    // One minute lock, two minute threshold: every tick before the end reminds.
    let first = w.engine.run_job(Job::TimeLock).unwrap();
    let second = w.engine.run_job(Job::TimeLock).unwrap();
    assert_eq!(first.reminders, 1);
    assert_eq!(second.reminders, 1);
    assert_eq!(first.announcements + second.announcements, 0);
    assert_eq!(w.notifier.of_kind(NotificationKind::TimeLockReminder).len(), 6);
    assert_eq!(w.notifier.of_kind(NotificationKind::TimeLockStarted).len(), 3);
}

// ---------------------------------------------------------------------------
// Concurrency and collaborator failure
// ---------------------------------------------------------------------------

#[test]
fn concurrent_approvals_both_count() {
    for _ in 0..10 {
        let w = world();
        let id = reach_in_progress(&w);

        let handles: Vec<_> = ["w1", "w2"]
            .into_iter()
            .map(|witness| {
                let engine = w.engine.clone();
                thread::spawn(move || engine.confirm_release(id, witness, Decision::Approved, None))
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }

        let r = w.engine.release(id).unwrap();
        assert_eq!(r.approvals_received, 2);
        assert_eq!(r.status, ReleaseStatus::Approved);
        assert_eq!(w.engine.confirmations(id).unwrap().len(), 2);
    }
}

#[test]
fn concurrent_duplicate_confirmations_admit_one() {
    let w = world();
    let id = reach_in_progress(&w);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = w.engine.clone();
            thread::spawn(move || engine.confirm_release(id, "w1", Decision::Approved, None))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e,
        DeadhandError::DuplicateConfirmation { .. }
    )));
    assert_eq!(w.engine.release(id).unwrap().approvals_received, 1);
}

#[test]
fn failing_notifier_does_not_block_transitions() {
    let w = world_with(MemoryNotifier::failing());
    let id = reach_in_progress(&w);
    w.engine
        .confirm_release(id, "w1", Decision::Approved, None)
        .unwrap();
    let (_, r) = w
        .engine
        .confirm_release(id, "w2", Decision::Approved, None)
        .unwrap();

    assert_eq!(r.status, ReleaseStatus::Approved);
    assert!(r.notified_time_lock);
    assert!(!w.notifier.sent().is_empty());
    assert_eq!(count(&w, AuditAction::TimeLockStarted), 1);
}

#[test]
fn inactivity_monitor_and_manual_trigger_open_one_release() {
    for _ in 0..10 {
        let w = world();
        w.clock.advance(Duration::minutes(2));
        let barrier = Arc::new(Barrier::new(2));

        let monitor = {
            let engine = w.engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.run_job(Job::Inactivity)
            })
        };
        let manual = {
            let engine = w.engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.trigger_release("family")
            })
        };
        let report = monitor.join().unwrap().unwrap();
        let triggered = manual.join().unwrap();

        assert_eq!(report.failed, 0);
        match &triggered {
            Ok(_) => assert_eq!(report.transitioned, 0),
            Err(e) => {
                assert!(matches!(e, DeadhandError::AlreadyActive(_)), "got {e:?}");
                assert_eq!(report.transitioned, 1);
            }
        }
        let releases = w.engine.releases(Some("family"), None).unwrap();
        assert_eq!(releases.len(), 1);
        assert!(releases[0].is_active());
        assert_eq!(count(&w, AuditAction::ReleaseTriggered), 1);
    }
}

#[test]
fn grace_reconciler_racing_owner_revoke_ends_rejected() {
    for _ in 0..10 {
        let w = world();
        let id = w.engine.trigger_release("family").unwrap().id;
        w.clock.advance(Duration::minutes(1));
        let barrier = Arc::new(Barrier::new(2));

        let grace = {
            let engine = w.engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.run_job(Job::Grace)
            })
        };
        let revoke = {
            let engine = w.engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.revoke_release(id, "alice", None)
            })
        };
        let report = grace.join().unwrap().unwrap();
        let revoked = revoke.join().unwrap().unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(revoked.status, ReleaseStatus::Rejected);
        let stored = w.engine.release(id).unwrap();
        assert_eq!(stored.status, ReleaseStatus::Rejected);
        assert_eq!(stored.history.last().unwrap().to, ReleaseStatus::Rejected);
        assert_eq!(
            stored.history.iter().filter(|c| c.to.is_terminal()).count(),
            1
        );

        // The grace step shows up in history and audit only if it won.
        let graced = stored
            .history
            .iter()
            .any(|c| c.to == ReleaseStatus::InProgress);
        assert_eq!(graced, report.transitioned == 1);
        assert_eq!(count(&w, AuditAction::GracePeriodEnded), report.transitioned);
        assert!(w.engine.store().active_release("family").unwrap().is_none());
    }
}

/// Runs another engine's time-lock pass from inside the first
/// "time lock started" send, then records the notice.
struct InterleavingNotifier {
    sent: MemoryNotifier,
    other: OnceLock<Arc<Engine>>,
    fired: AtomicBool,
}

impl Notifier for InterleavingNotifier {
    fn send(&self, n: &Notification) -> deadhand_core::Result<()> {
        if n.kind == NotificationKind::TimeLockStarted && !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(other) = self.other.get() {
                let report = other.run_time_lock_reconciler()?;
                assert_eq!(report.announcements, 0);
            }
        }
        self.sent.send(n)
    }
}

#[test]
fn time_lock_announcement_is_sent_once_across_engines() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(&dir.path().join("releases.db")).unwrap());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let notifier = Arc::new(InterleavingNotifier {
        sent: MemoryNotifier::new(),
        other: OnceLock::new(),
        fired: AtomicBool::new(false),
    });
    let engine = Engine::new(store.clone(), TimeUnit::Minutes)
        .with_clock(clock.clone())
        .with_notifier(notifier.clone());
    let scheduler = Engine::new(store, TimeUnit::Minutes)
        .with_clock(clock.clone())
        .with_notifier(notifier.clone());
    assert!(notifier.other.set(Arc::new(scheduler)).is_ok());

    engine.import(&Fixture::parse(FIXTURE).unwrap()).unwrap();
    let id = engine.trigger_release("family").unwrap().id;
    clock.advance(Duration::minutes(1));
    engine.run_job(Job::Grace).unwrap();
    engine
        .confirm_release(id, "w1", Decision::Approved, None)
        .unwrap();
    engine
        .confirm_release(id, "w2", Decision::Approved, None)
        .unwrap();

    assert!(notifier.fired.load(Ordering::SeqCst));
    assert_eq!(
        notifier.sent.of_kind(NotificationKind::TimeLockStarted).len(),
        3
    );
    assert!(engine.release(id).unwrap().notified_time_lock);
}
