//! Background tasks module
//!
//! The tick engine, lifecycle reconciliation, and the tasks that feed lifecycle
//! transitions into the scheduler.

pub mod lifecycle;
pub mod reconciler;
pub mod tick_engine;
pub mod wake_up_recovery;

// Re-export main types and functions
pub use lifecycle::{lifecycle_task, LifecycleEvent};
pub use tick_engine::{TickEngine, TICK_PERIOD};
pub use wake_up_recovery::wake_up_recovery_task;
