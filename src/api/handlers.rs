//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tracing::{info, warn};

use super::responses::{
    views, ApiError, ApiResponse, HealthResponse, StatusResponse, TimerResponse, TimerView,
};
use crate::{
    error::SchedulerError,
    state::{AppState, NewTimer, Timer, TimerId, TimerScheduler, TimerStatus},
    tasks::LifecycleEvent,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn fetch(state: &AppState, id: TimerId) -> Result<Timer, ApiError> {
    state
        .scheduler
        .get(id)
        .ok_or_else(|| SchedulerError::NotFound(id).into())
}

/// Run a single-timer command and answer with the timer afterwards
fn timer_command(
    state: &AppState,
    id: TimerId,
    action: &str,
    command: fn(&TimerScheduler, TimerId) -> Result<(), SchedulerError>,
) -> ApiResult<TimerResponse> {
    if let Err(e) = command(&state.scheduler, id) {
        warn!("{} rejected: {}", action, e);
        return Err(e.into());
    }
    state.record_action(action);

    let timer = fetch(state, id)?;
    info!("{} endpoint called for '{}'", action, timer.name);
    Ok(Json(TimerResponse::ok(format!("Timer {}", action), &timer)))
}

/// Handle POST /timers - Add an idle timer
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<NewTimer>,
) -> Result<(StatusCode, Json<TimerResponse>), ApiError> {
    let id = state.scheduler.add(draft)?;
    state.record_action("add");

    let timer = fetch(&state, id)?;
    Ok((
        StatusCode::CREATED,
        Json(TimerResponse::ok("Timer added".to_string(), &timer)),
    ))
}

/// Handle GET /timers - Snapshot of every timer
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<TimerView>> {
    Json(views(&state.scheduler.snapshot()))
}

/// Handle DELETE /timers - Drop every timer
pub async fn clear_timers_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.scheduler.clear_all();
    state.record_action("clear-all");
    Json(ApiResponse::ok("All timers cleared".to_string(), &[]))
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerView> {
    let timer = fetch(&state, id)?;
    Ok(Json(TimerView::from(&timer)))
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<ApiResponse> {
    if !state.scheduler.remove(id) {
        return Err(SchedulerError::NotFound(id).into());
    }
    state.record_action("remove");
    Ok(Json(ApiResponse::ok(
        "Timer removed".to_string(),
        &state.scheduler.snapshot(),
    )))
}

pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    timer_command(&state, id, "started", TimerScheduler::start)
}

pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    timer_command(&state, id, "paused", TimerScheduler::pause)
}

pub async fn resume_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    timer_command(&state, id, "resumed", TimerScheduler::resume)
}

pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    timer_command(&state, id, "reset", TimerScheduler::reset)
}

/// Handle POST /timers/pause-all
pub async fn pause_all_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let paused = state.scheduler.pause_all();
    state.record_action("pause-all");
    Json(ApiResponse::ok(
        format!("Paused {} timers", paused),
        &state.scheduler.snapshot(),
    ))
}

/// Handle POST /timers/resume-all
pub async fn resume_all_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    let resumed = state.scheduler.resume_all();
    state.record_action("resume-all");
    Json(ApiResponse::ok(
        format!("Resumed {} timers", resumed),
        &state.scheduler.snapshot(),
    ))
}

/// Handle GET /timers/events - Stream a snapshot after every change
pub async fn timer_events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let updates = state.scheduler.subscribe();

    let events = stream::unfold((updates, true), |(mut updates, first)| async move {
        if !first && updates.changed().await.is_err() {
            return None;
        }
        let snapshot = views(&updates.borrow_and_update());
        let event = Event::default()
            .event("timers")
            .json_data(&snapshot)
            .unwrap_or_else(|e| Event::default().comment(format!("serialize failed: {}", e)));
        Some((Ok::<_, Infallible>(event), (updates, false)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle POST /lifecycle/:event - Deliver a host lifecycle transition
pub async fn lifecycle_handler(
    State(state): State<Arc<AppState>>,
    Path(event): Path<LifecycleEvent>,
) -> Json<ApiResponse> {
    event.apply(&state.scheduler);
    state.record_action(event.label());
    Json(ApiResponse::ok(
        format!("Lifecycle event '{}' applied", event.label()),
        &state.scheduler.snapshot(),
    ))
}

/// Handle GET /status - Return current scheduler status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let timers = state.scheduler.snapshot();
    let count = |status: TimerStatus| timers.iter().filter(|t| t.status == status).count();
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        total_timers: timers.len(),
        running: count(TimerStatus::Running),
        paused: count(TimerStatus::Paused),
        completed: count(TimerStatus::Completed),
        idle: count(TimerStatus::Idle),
        suspended: state.scheduler.is_suspended(),
        tick_engine_running: state.scheduler.tick_engine_running(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
