use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/vaults/:id/release: open a release for the vault now.
pub async fn trigger_release(
    State(app): State<AppState>,
    Path(vault_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let release = app
        .blocking(move |engine| engine.trigger_release(&vault_id))
        .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!(release))))
}

/// GET /api/vaults/:id/release-status: projection of the vault's current release.
pub async fn release_status(
    State(app): State<AppState>,
    Path(vault_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = app
        .blocking(move |engine| engine.vault_release_status(&vault_id))
        .await?;
    Ok(Json(serde_json::json!(status)))
}

/// POST /api/vaults/:id/reset: clear the triggered marker after a release ended.
pub async fn reset_vault(
    State(app): State<AppState>,
    Path(vault_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let vault = app
        .blocking(move |engine| engine.reset_vault(&vault_id))
        .await?;
    Ok(Json(serde_json::json!({
        "vault_id": vault.id,
        "release_triggered": vault.release_triggered,
    })))
}
