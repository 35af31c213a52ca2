//! Route definitions for the nursery IPM API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - IPM tasks and stock
        .nest("/ipm", ipm_routes(state))
}

/// IPM routes (protected)
fn ipm_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/tasks", task_routes())
        .nest("/bottles", bottle_routes())
        .route("/stock/usage", post(handlers::record_usage))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_tasks))
        .route("/grouped", get(handlers::list_grouped_tasks))
        .route("/complete", post(handlers::complete_tasks))
        .route("/mark-overdue", post(handlers::mark_overdue_tasks))
        .route("/:task_id/skip", post(handlers::skip_task))
        .route(
            "/generate/batch/:batch_id",
            post(handlers::generate_batch_tasks),
        )
        .route(
            "/generate/spot/:spot_treatment_id",
            post(handlers::generate_spot_treatment_tasks),
        )
        .route("/generate/bulk", post(handlers::bulk_generate_tasks))
}

fn bottle_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_bottles).post(handlers::create_bottles),
        )
        .route("/summary", get(handlers::get_stock_summary))
        .route("/:bottle_id", get(handlers::get_bottle))
        .route("/:bottle_id/movements", get(handlers::get_bottle_movements))
        .route("/:bottle_id/open", post(handlers::open_bottle))
        .route("/:bottle_id/dispose", post(handlers::dispose_bottle))
        .route("/:bottle_id/adjust", post(handlers::adjust_bottle_level))
}
