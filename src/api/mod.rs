//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/timers",
            post(create_timer_handler)
                .get(list_timers_handler)
                .delete(clear_timers_handler),
        )
        .route("/timers/events", get(timer_events_handler))
        .route("/timers/pause-all", post(pause_all_handler))
        .route("/timers/resume-all", post(resume_all_handler))
        .route("/timers/:id", get(get_timer_handler).delete(delete_timer_handler))
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/resume", post(resume_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/lifecycle/:event", post(lifecycle_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
