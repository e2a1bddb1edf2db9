//! Brew Timers - A multi-timer scheduler for home brewing
//!
//! This library runs many concurrent countdowns (mash, boil, hop additions,
//! fermentation), persists them, schedules OS notifications, and reconciles
//! elapsed time across process suspension.

pub mod config;
pub mod error;
pub mod state;
pub mod api;
pub mod services;
pub mod tasks;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{SchedulerError, StoreError};
pub use state::{
    AppState, Collaborators, NewTimer, Timer, TimerCategory, TimerId, TimerScheduler, TimerStatus,
};
pub use api::create_router;
pub use utils::signals::shutdown_signal;
