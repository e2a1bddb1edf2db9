//! State management module
//!
//! The timer entity, the scheduler that owns the timer set, and the shared
//! application state handed to the HTTP layer.

pub mod app_state;
pub mod scheduler;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use scheduler::{Collaborators, TimerScheduler};
pub use timer::{
    NewTimer, NotificationPreferences, SoundVariant, Timer, TimerCategory, TimerId, TimerStatus,
    Urgency,
};
