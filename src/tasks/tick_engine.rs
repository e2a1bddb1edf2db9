//! Shared 1 Hz driver for all running timers
//!
//! One task per scheduler, never one per timer. The handle lives inside the
//! scheduler's lock so that starting the engine and the engine deciding to stop
//! cannot interleave. Each spawn gets a new generation; a superseded task finds
//! its generation stale on its next beat and exits without ticking.

use std::{sync::Weak, time::Duration};

use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::state::TimerScheduler;

/// Beat period of the engine
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct TickEngine {
    period: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TickEngine {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            generation: 0,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Whether `generation` belongs to the task that should be ticking
    pub fn is_current(&self, generation: u64) -> bool {
        self.handle.is_some() && self.generation == generation
    }

    /// Spawn the driver unless one is already running
    ///
    /// Returns false when there is no tokio runtime to spawn on; the owner then
    /// drives ticks by hand.
    pub fn start(&mut self, scheduler: Weak<TimerScheduler>) -> bool {
        if self.is_running() {
            return true;
        }

        let Ok(runtime) = Handle::try_current() else {
            debug!("No tokio runtime, tick engine not started");
            return false;
        };

        self.generation += 1;
        let generation = self.generation;
        let period = self.period;
        self.handle = Some(runtime.spawn(async move {
            tick_task(scheduler, period, generation).await;
        }));

        info!("Tick engine started (generation {})", generation);
        true
    }

    /// Abort the driver if it is running
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("Tick engine stopped (generation {})", self.generation);
        }
    }

    /// Forget the driver after it decided to exit on its own
    pub(crate) fn mark_stopped(&mut self) {
        if self.handle.take().is_some() {
            info!("Tick engine idle, stopping (generation {})", self.generation);
        }
    }
}

impl Default for TickEngine {
    fn default() -> Self {
        Self::new(TICK_PERIOD)
    }
}

async fn tick_task(scheduler: Weak<TimerScheduler>, period: Duration, generation: u64) {
    let mut interval = interval_at(Instant::now() + period, period);
    // Replay beats missed while the process was stopped or the runtime stalled
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        interval.tick().await;

        let Some(scheduler) = scheduler.upgrade() else {
            debug!("Scheduler dropped, tick engine exiting");
            break;
        };
        if !scheduler.engine_tick(generation) {
            break;
        }
    }
}
