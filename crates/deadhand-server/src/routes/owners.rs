use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/owners/:id/inactivity: per-vault inactivity report.
pub async fn inactivity_report(
    State(app): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let report = app
        .blocking(move |engine| engine.inactivity_report(&owner_id))
        .await?;
    Ok(Json(serde_json::json!({
        "report": report,
        "summary": {
            "active": report.count("active"),
            "inactive": report.count("inactive"),
            "no_rule": report.count("no_rule"),
            "untracked": report.count("untracked"),
        },
    })))
}

/// POST /api/owners/:id/activity: mark the owner as active now.
pub async fn record_activity(
    State(app): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let owner = app
        .blocking(move |engine| engine.record_activity(&owner_id))
        .await?;
    Ok(Json(serde_json::json!(owner)))
}
