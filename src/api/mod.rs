//! HTTP surface: route table and shared middleware.
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod handlers {
    pub use crate::handlers::*;
}

use handlers::AppState;

/// The `/api` routes, before state is attached.
pub fn api_routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/leads",
            get(handlers::list_leads).post(handlers::create_lead),
        )
        .route("/api/leads/import", post(handlers::import_leads))
        .route(
            "/api/leads/export",
            get(handlers::export_leads).post(handlers::export_leads_post),
        )
        .route(
            "/api/leads/:id",
            get(handlers::get_lead)
                .patch(handlers::update_lead)
                .delete(handlers::delete_lead),
        )
        .route("/api/stats", get(handlers::get_stats))
        .route(
            "/api/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_upload_bytes)),
        )
}

/// Full application router.
///
/// `protect` wraps the `/api` routes with extra layers (the per-IP rate limit
/// in production); `/health` stays outside it.
pub fn router<F>(state: Arc<AppState>, protect: F) -> Router
where
    F: FnOnce(Router<Arc<AppState>>) -> Router<Arc<AppState>>,
{
    let protected_routes = protect(api_routes(state.config.max_upload_bytes));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Application router without rate limiting.
pub fn app(state: Arc<AppState>) -> Router {
    router(state, |routes| routes)
}
