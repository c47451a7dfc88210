//! `api` crate: HTTP record service for workflows, accesses and runs.
//!
//! Exposes:
//!   GET    /api/workflows?page&perPage&enabled
//!   POST   /api/workflows
//!   GET    /api/workflows/:id
//!   PATCH  /api/workflows/:id          (merge-patch; `enabled: true` re-validates)
//!   DELETE /api/workflows/:id
//!   GET    /api/workflows/:id/nodes    (node cards with derived `validated`)
//!   GET    /api/workflows/:id/report   (full validation report)
//!   GET    /api/workflows/:id/runs
//!   POST   /api/workflows/:id/runs     (run reported by the executor)
//!   GET    /api/accesses
//!   POST   /api/accesses
//!   GET    /api/accesses/:id
//!   PATCH  /api/accesses/:id
//!   DELETE /api/accesses/:id           (409 while a workflow references it)
//!   GET    /api/providers?usage=

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::get,
    Router,
};
use db::Store;
use engine::WorkflowService;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, ApiResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: WorkflowService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { service: WorkflowService::new(store) }
    }
}

/// Create the API router
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Workflows
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route(
            "/workflows/:id",
            get(handlers::workflows::get)
                .patch(handlers::workflows::update)
                .delete(handlers::workflows::delete),
        )
        .route("/workflows/:id/nodes", get(handlers::workflows::nodes))
        .route("/workflows/:id/report", get(handlers::workflows::report))
        // Runs
        .route(
            "/workflows/:id/runs",
            get(handlers::runs::list).post(handlers::runs::record),
        )
        // Accesses
        .route("/accesses", get(handlers::accesses::list).post(handlers::accesses::create))
        .route(
            "/accesses/:id",
            get(handlers::accesses::get)
                .patch(handlers::accesses::update)
                .delete(handlers::accesses::delete),
        )
        // Providers
        .route("/providers", get(handlers::providers::list));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "record service listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            // An error here means no signal handler could be installed; keep serving.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await
}
