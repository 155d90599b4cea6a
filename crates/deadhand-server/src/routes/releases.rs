use axum::extract::{Path, Query, State};
use axum::Json;
use deadhand_core::types::{Decision, ReleaseStatus};
use serde::Deserialize;

use super::parse_release_id;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// List / show
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListQuery {
    pub vault: Option<String>,
    pub status: Option<String>,
}

/// GET /api/releases: all releases, newest first; `?vault=` and `?status=` narrow the list.
pub async fn list_releases(
    State(app): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = q
        .status
        .as_deref()
        .map(str::parse::<ReleaseStatus>)
        .transpose()?;
    let releases = app
        .blocking(move |engine| engine.releases(q.vault.as_deref(), status))
        .await?;
    Ok(Json(serde_json::json!(releases)))
}

/// GET /api/releases/:id: one release with its confirmations.
pub async fn get_release(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_release_id(&id)?;
    let (release, confirmations) = app
        .blocking(move |engine| Ok((engine.release(id)?, engine.confirmations(id)?)))
        .await?;
    Ok(Json(serde_json::json!({
        "release": release,
        "confirmations": confirmations,
    })))
}

// ---------------------------------------------------------------------------
// Confirm
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ConfirmBody {
    pub witness_id: String,
    pub decision: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /api/releases/:id/confirm: record a witness verdict.
pub async fn confirm_release(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_release_id(&id)?;
    let decision: Decision = body.decision.parse()?;
    let (confirmation, release) = app
        .blocking(move |engine| {
            engine.confirm_release(id, &body.witness_id, decision, body.comment)
        })
        .await?;
    Ok(Json(serde_json::json!({
        "confirmation": confirmation,
        "release": release,
    })))
}

// ---------------------------------------------------------------------------
// Finalize / revoke
// ---------------------------------------------------------------------------

/// POST /api/releases/:id/finalize: release an approved vault whose countdown has ended.
pub async fn finalize_release(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_release_id(&id)?;
    let release = app
        .blocking(move |engine| engine.finalize_release(id))
        .await?;
    Ok(Json(serde_json::json!(release)))
}

#[derive(Deserialize)]
pub struct RevokeBody {
    pub actor_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/releases/:id/revoke: owner cancels a release.
pub async fn revoke_release(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RevokeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_release_id(&id)?;
    let release = app
        .blocking(move |engine| engine.revoke_release(id, &body.actor_id, body.reason))
        .await?;
    Ok(Json(serde_json::json!(release)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::app;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn get_missing_returns_404() {
        let t = app();
        let err = get_release(State(t.state), Path(uuid::Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_id_returns_400() {
        let t = app();
        let err = finalize_release(State(t.state), Path("not-a-uuid".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_decision_returns_400() {
        let t = app();
        let release = t.state.engine.trigger_release("family").unwrap();
        let err = confirm_release(
            State(t.state),
            Path(release.id.to_string()),
            Json(ConfirmBody {
                witness_id: "w1".into(),
                decision: "maybe".into(),
                comment: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn confirm_during_grace_returns_422() {
        let t = app();
        let release = t.state.engine.trigger_release("family").unwrap();
        let err = confirm_release(
            State(t.state),
            Path(release.id.to_string()),
            Json(ConfirmBody {
                witness_id: "w1".into(),
                decision: "approve".into(),
                comment: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let t = app();
        t.state.engine.trigger_release("family").unwrap();
        let pending = list_releases(
            State(t.state.clone()),
            Query(ListQuery {
                vault: None,
                status: Some("pending".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(pending.0.as_array().unwrap().len(), 1);

        let released = list_releases(
            State(t.state),
            Query(ListQuery {
                vault: Some("family".into()),
                status: Some("released".into()),
            }),
        )
        .await
        .unwrap();
        assert!(released.0.as_array().unwrap().is_empty());
    }
}
