pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use intent_core::Hub;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(hub: Arc<Hub>) -> Router {
    let app_state = state::AppState::new(hub);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dispatch
        .route("/api/execute", post(routes::execute::execute))
        .route("/api/actions", get(routes::actions::list_actions))
        .route("/api/log", get(routes::log::tail_log))
        // Task queue
        .route(
            "/api/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::assign_task),
        )
        .route("/api/tasks/claim", post(routes::tasks::claim_next))
        .route("/api/tasks/{id}", get(routes::tasks::task_status))
        .route("/api/tasks/{id}/result", get(routes::tasks::task_result))
        .route(
            "/api/tasks/{id}/complete",
            post(routes::tasks::complete_task),
        )
        .route("/api/tasks/{id}/fail", post(routes::tasks::fail_task))
        .route("/api/tasks/{id}/cancel", post(routes::tasks::cancel_task))
        // Document queue
        .route("/api/docs", get(routes::docs::list_entries))
        .route("/api/docs/process", post(routes::docs::process_queue))
        .route("/api/docs/{key}", post(routes::docs::create_doc))
        .route("/api/docs/{key}/reset", post(routes::docs::reset_entry))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the local API on `127.0.0.1:{port}`.
pub async fn serve(hub: Arc<Hub>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    serve_on(hub, listener).await
}

/// Serve on a pre-bound listener.
///
/// Lets the caller read the actual port first (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(hub: Arc<Hub>, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(hub);

    tracing::info!("intent server listening on http://127.0.0.1:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
