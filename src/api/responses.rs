//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::SchedulerError,
    state::{NotificationPreferences, Timer, TimerCategory, TimerId, TimerStatus, Urgency},
};

/// Timer as presented to clients, with the derived fields precomputed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    pub id: TimerId,
    pub name: String,
    pub category: TimerCategory,
    pub status: TimerStatus,
    pub total_duration: i64,
    pub remaining_time: i64,
    pub display: String,
    pub progress: f64,
    pub urgency: Urgency,
    pub is_running: bool,
    pub is_paused: bool,
    pub is_completed: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub notification_preferences: NotificationPreferences,
}

impl From<&Timer> for TimerView {
    fn from(timer: &Timer) -> Self {
        Self {
            id: timer.id,
            name: timer.name.clone(),
            category: timer.category,
            status: timer.status,
            total_duration: timer.total_duration,
            remaining_time: timer.remaining_time,
            display: timer.display(),
            progress: timer.progress(),
            urgency: timer.urgency(),
            is_running: timer.is_running(),
            is_paused: timer.is_paused(),
            is_completed: timer.is_completed(),
            start_time: timer.start_time,
            end_time: timer.end_time,
            notification_preferences: timer.notification_preferences,
        }
    }
}

pub fn views(timers: &[Timer]) -> Vec<TimerView> {
    timers.iter().map(TimerView::from).collect()
}

/// API response structure for commands touching many timers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timers: Vec<TimerView>,
}

impl ApiResponse {
    pub fn ok(message: String, timers: &[Timer]) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            timestamp: Utc::now(),
            timers: views(timers),
        }
    }
}

/// API response structure for commands on a single timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerView,
}

impl TimerResponse {
    pub fn ok(message: String, timer: &Timer) -> Self {
        Self {
            status: "ok".to_string(),
            message,
            timestamp: Utc::now(),
            timer: TimerView::from(timer),
        }
    }
}

/// Scheduler overview for GET /status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub total_timers: usize,
    pub running: usize,
    pub paused: usize,
    pub completed: usize,
    pub idle: usize,
    pub suspended: bool,
    pub tick_engine_running: bool,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Handler failure carrying its HTTP status
#[derive(Debug)]
pub struct ApiError {
    pub code: StatusCode,
    pub message: String,
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        let code = match err {
            SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::InvalidState { .. } => StatusCode::CONFLICT,
            SchedulerError::InvalidDuration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.message,
            timestamp: Utc::now(),
        };
        (self.code, Json(body)).into_response()
    }
}
