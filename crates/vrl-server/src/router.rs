use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all VRL endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/account", get(handler::account_handler))
        .route(
            "/v1/records",
            get(handler::list_handler)
                .post(handler::append_handler)
                .delete(handler::delete_handler),
        )
        .route("/v1/records/latest", get(handler::latest_handler))
        .route("/v1/records/history", get(handler::history_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
