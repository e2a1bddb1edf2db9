//! Host lifecycle signals delivered to the scheduler

use std::{io, sync::Arc};

use futures::stream::StreamExt;
use serde::Deserialize;
use signal_hook::{
    consts::{SIGCONT, SIGTSTP, SIGUSR1},
    low_level::emulate_default_handler,
};
use signal_hook_tokio::Signals;
use tracing::{debug, info, warn};

use crate::state::TimerScheduler;

/// Unix signals the host uses to announce lifecycle transitions
pub const LIFECYCLE_SIGNALS: [i32; 3] = [SIGTSTP, SIGCONT, SIGUSR1];

/// A lifecycle transition of the host process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleEvent {
    Suspend,
    Resume,
    MemoryPressure,
}

impl LifecycleEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::MemoryPressure => "memory-pressure",
        }
    }

    /// SIGTSTP suspends, SIGCONT resumes, SIGUSR1 reports memory pressure
    pub fn from_signal(signal: i32) -> Option<Self> {
        match signal {
            SIGTSTP => Some(Self::Suspend),
            SIGCONT => Some(Self::Resume),
            SIGUSR1 => Some(Self::MemoryPressure),
            _ => None,
        }
    }

    /// Hand the transition to the scheduler
    pub fn apply(self, scheduler: &TimerScheduler) {
        info!("Lifecycle event: {:?}", self);
        match self {
            Self::Suspend => scheduler.on_suspend(),
            Self::Resume => scheduler.on_resume(),
            Self::MemoryPressure => {
                scheduler.on_memory_pressure();
            }
        }
    }
}

/// Deliver one signal to the scheduler
///
/// Catching SIGTSTP replaces job control's default stop, so once the timers are
/// suspended `stop_process` performs that stop. The matching SIGCONT resumes.
pub fn handle_signal<F>(scheduler: &TimerScheduler, signal: i32, stop_process: F)
where
    F: FnOnce(i32) -> io::Result<()>,
{
    let Some(event) = LifecycleEvent::from_signal(signal) else {
        debug!("Ignoring signal {}", signal);
        return;
    };

    event.apply(scheduler);

    if signal == SIGTSTP {
        if let Err(e) = stop_process(signal) {
            warn!("Failed to stop the process after suspend: {}", e);
        }
    }
}

/// Forward lifecycle signals until the registration is closed
pub async fn lifecycle_task(scheduler: Arc<TimerScheduler>, mut signals: Signals) {
    info!("Starting lifecycle signal task");

    while let Some(signal) = signals.next().await {
        handle_signal(&scheduler, signal, emulate_default_handler);
    }

    info!("Lifecycle signal task stopped");
}
