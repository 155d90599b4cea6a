use super::Workspace;
use crate::output::print_json;
use deadhand_core::reconcile::Job;

pub fn run(ws: &Workspace<'_>, job: Job, json: bool) -> anyhow::Result<()> {
    let report = ws.engine()?.run_job(job)?;

    if json {
        print_json(&serde_json::json!({ "job": job.as_str(), "report": report }))?;
    } else {
        println!(
            "{job}: scanned {}, transitioned {}, announced {}, reminded {}, skipped {}, failed {}",
            report.scanned,
            report.transitioned,
            report.announcements,
            report.reminders,
            report.skipped,
            report.failed
        );
    }
    if report.failed > 0 {
        anyhow::bail!("{} candidate(s) failed during {job}", report.failed);
    }
    Ok(())
}
