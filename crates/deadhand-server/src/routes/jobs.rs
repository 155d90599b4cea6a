use axum::extract::{Path, State};
use axum::Json;
use deadhand_core::reconcile::Job;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/jobs/:job/run: run one reconciliation pass now.
pub async fn run_job(
    State(app): State<AppState>,
    Path(job): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job: Job = job.parse()?;
    let report = app.blocking(move |engine| engine.run_job(job)).await?;
    Ok(Json(serde_json::json!({
        "job": job.as_str(),
        "report": report,
    })))
}
