//! `api` crate — HTTP surface over the webhook service and the engine.
//!
//! Routes:
//!   GET    /health
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows
//!   GET    /api/v1/workflows/{id}
//!   DELETE /api/v1/workflows/{id}
//!   POST   /api/v1/workflows/{id}/execute
//!   ANY    /*path                             (registered webhook endpoints)
//!
//! Every error response carries the `{ "success": false, "error": … }`
//! envelope; webhook endpoints with a respond node bypass the envelope
//! entirely and answer with the node's own status/headers/body.

pub mod error;
pub mod handlers;

use axum::routing::{any, delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use handlers::AppState;


pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/workflows",
            post(handlers::workflows::create).get(handlers::workflows::list),
        )
        .route(
            "/api/v1/workflows/:id",
            get(handlers::workflows::get).delete(handlers::workflows::delete),
        )
        .route("/api/v1/workflows/:id/execute", post(handlers::workflows::execute))
        .route("/api/v1/webhooks", get(handlers::webhooks::list))
        .route("/api/v1/webhooks/:id/toggle", post(handlers::webhooks::toggle))
        .route("/*path", any(handlers::webhooks::receive))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is told to stop.
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
