pub mod error;
pub mod routes;
pub mod scheduler;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use deadhand_core::config::SchedulerConfig;
use deadhand_core::Engine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(engine: Arc<Engine>) -> Router {
    let app_state = state::AppState::new(engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Vaults
        .route(
            "/api/vaults/{id}/release",
            post(routes::vaults::trigger_release),
        )
        .route(
            "/api/vaults/{id}/release-status",
            get(routes::vaults::release_status),
        )
        .route("/api/vaults/{id}/reset", post(routes::vaults::reset_vault))
        // Releases
        .route("/api/releases", get(routes::releases::list_releases))
        .route("/api/releases/{id}", get(routes::releases::get_release))
        .route(
            "/api/releases/{id}/confirm",
            post(routes::releases::confirm_release),
        )
        .route(
            "/api/releases/{id}/finalize",
            post(routes::releases::finalize_release),
        )
        .route(
            "/api/releases/{id}/revoke",
            post(routes::releases::revoke_release),
        )
        // Owners
        .route(
            "/api/owners/{id}/inactivity",
            get(routes::owners::inactivity_report),
        )
        .route(
            "/api/owners/{id}/activity",
            post(routes::owners::record_activity),
        )
        // Jobs
        .route("/api/jobs/{job}/run", post(routes::jobs::run_job))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the API on a pre-bound listener and run the job scheduler until the
/// server stops.
pub async fn serve_on(
    engine: Arc<Engine>,
    scheduler_config: &SchedulerConfig,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let jobs = scheduler::spawn(engine.clone(), scheduler_config);
    let app = build_router(engine);

    tracing::info!("deadhand API listening on http://localhost:{actual_port}");

    let result = axum::serve(listener, app).await;
    for job in jobs {
        job.abort();
    }
    result?;
    Ok(())
}
