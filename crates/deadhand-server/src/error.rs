use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use deadhand_core::error::DeadhandError;

// ---------------------------------------------------------------------------
// Internal sentinel for malformed request input
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 400 through the `anyhow::Error` chain for input
/// problems caught before the engine is called.
#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }
}

/// HTTP status for a domain error.
pub fn status_for(e: &DeadhandError) -> StatusCode {
    match e {
        DeadhandError::ReleaseNotFound(_)
        | DeadhandError::VaultNotFound(_)
        | DeadhandError::OwnerNotFound(_) => StatusCode::NOT_FOUND,
        DeadhandError::NotInitialized
        | DeadhandError::InvalidRuleSet(_)
        | DeadhandError::InvalidDecision(_)
        | DeadhandError::InvalidStatus(_)
        | DeadhandError::InvalidTimeUnit(_)
        | DeadhandError::InvalidJob(_) => StatusCode::BAD_REQUEST,
        DeadhandError::NoPolicy(_)
        | DeadhandError::AlreadyActive(_)
        | DeadhandError::AlreadyTriggered(_)
        | DeadhandError::DuplicateConfirmation { .. }
        | DeadhandError::AlreadyReleased => StatusCode::CONFLICT,
        DeadhandError::InvalidState { .. }
        | DeadhandError::NotApproved(_)
        | DeadhandError::TimeLockActive(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DeadhandError::Forbidden(_) => StatusCode::FORBIDDEN,
        DeadhandError::Store(_)
        | DeadhandError::Notify(_)
        | DeadhandError::Io(_)
        | DeadhandError::Yaml(_)
        | DeadhandError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(b) = self.0.downcast_ref::<BadRequestError>() {
            let body = serde_json::json!({ "error": b.0.clone() });
            return (StatusCode::BAD_REQUEST, axum::Json(body)).into_response();
        }

        let status = self
            .0
            .downcast_ref::<DeadhandError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
