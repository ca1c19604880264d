//! Route definitions for the Manufacturing Order Workflow API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Stage catalog (public)
        .route("/stages", get(handlers::list_stages))
        // Protected routes - orders and their stages
        .nest("/orders", order_routes(state))
}

/// Order and stage routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/report", get(handlers::get_order_report))
        .route(
            "/:order_id/stages/:stage_key",
            post(handlers::submit_stage_update),
        )
        .route(
            "/:order_id/stages/:stage_key/documents",
            get(handlers::list_stage_documents),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
