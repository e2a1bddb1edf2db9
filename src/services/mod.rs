//! External collaborators of the scheduler
//!
//! Durable storage, fire-at-time notifications, and local haptic/sound
//! feedback. Each is a trait so the scheduler can be built with fakes.

pub mod feedback;
pub mod notifications;
pub mod store;

pub use feedback::{alert_completion, FeedbackService, HapticIntensity, SystemFeedback};
pub use notifications::{
    check_systemd_run_available, schedule_timer_alerts, LogNotifier, NotificationKind,
    NotificationRequest, NotificationService, SystemdNotifier,
};
pub use store::{JsonFileStore, TimerStore};
