//! Drives the three reconciliation jobs on independent timers.

use std::sync::Arc;
use std::time::Duration;

use deadhand_core::config::SchedulerConfig;
use deadhand_core::reconcile::Job;
use deadhand_core::Engine;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Each job's polling period, derived from the engine's time unit.
pub fn periods(unit: deadhand_core::types::TimeUnit, cfg: &SchedulerConfig) -> [(Job, Duration); 3] {
    [
        (Job::Inactivity, unit.poll_interval(cfg.inactivity_ticks_per_unit)),
        (Job::Grace, unit.poll_interval(cfg.grace_ticks_per_unit)),
        (Job::TimeLock, unit.poll_interval(cfg.time_lock_ticks_per_unit)),
    ]
}

/// Spawn one loop per job. Dropping or aborting the handles stops them.
pub fn spawn(engine: Arc<Engine>, cfg: &SchedulerConfig) -> Vec<JoinHandle<()>> {
    periods(engine.unit(), cfg)
        .into_iter()
        .map(|(job, period)| {
            info!(job = job.as_str(), "scheduling every {period:?}");
            tokio::spawn(run_loop(engine.clone(), job, period))
        })
        .collect()
}

async fn run_loop(engine: Arc<Engine>, job: Job, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let engine = engine.clone();
        match tokio::task::spawn_blocking(move || engine.run_job(job)).await {
            Ok(Ok(report)) if report.transitioned + report.failed + report.reminders > 0 => {
                info!(
                    job = job.as_str(),
                    transitioned = report.transitioned,
                    reminders = report.reminders,
                    failed = report.failed,
                    "tick complete"
                );
            }
            Ok(Ok(report)) => debug!(job = job.as_str(), scanned = report.scanned, "tick idle"),
            Ok(Err(e)) => warn!(job = job.as_str(), "tick failed: {e}"),
            Err(e) => warn!(job = job.as_str(), "tick panicked: {e}"),
        }
    }
}
