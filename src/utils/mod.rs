//! Utility module
//!
//! Clock abstraction and Unix signal plumbing used by the host process.

pub mod clock;
pub mod signals;

pub use clock::{Clock, SystemClock};
pub use signals::{register_lifecycle_signals, shutdown_signal, LifecycleRegistration};
