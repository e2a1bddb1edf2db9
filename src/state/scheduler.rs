//! Timer scheduler: the single owner of the timer set
//!
//! Every command runs under one exclusive lock and, when it changes anything,
//! writes the full set to the store and (de)schedules notifications before
//! returning. Store and notification work is fire-and-forget; their failures
//! are logged by the collaborators and never reach the caller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::timer::{NewTimer, Timer, TimerId, TimerStatus};
use crate::{
    error::SchedulerError,
    services::{
        alert_completion, schedule_timer_alerts, FeedbackService, NotificationService, TimerStore,
    },
    tasks::{reconciler, TickEngine},
    utils::Clock,
};

/// External collaborators injected at construction
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn TimerStore>,
    pub notifier: Arc<dyn NotificationService>,
    pub feedback: Arc<dyn FeedbackService>,
    pub clock: Arc<dyn Clock>,
}

struct SchedulerInner {
    timers: Vec<Timer>,
    /// Host process is suspended; nothing ticks until resume
    suspended: bool,
    tick_engine: TickEngine,
}

impl SchedulerInner {
    fn position(&self, id: TimerId) -> Result<usize, SchedulerError> {
        self.timers
            .iter()
            .position(|t| t.id == id)
            .ok_or(SchedulerError::NotFound(id))
    }

    fn any_running(&self) -> bool {
        self.timers.iter().any(Timer::is_running)
    }
}

/// Owns the timer set and exposes the brewing timer commands
pub struct TimerScheduler {
    inner: Mutex<SchedulerInner>,
    store: Arc<dyn TimerStore>,
    notifier: Arc<dyn NotificationService>,
    feedback: Arc<dyn FeedbackService>,
    clock: Arc<dyn Clock>,
    updates: watch::Sender<Vec<Timer>>,
    this: Weak<TimerScheduler>,
}

fn invalid_state(timer: &Timer, operation: &'static str) -> SchedulerError {
    SchedulerError::InvalidState {
        id: timer.id,
        status: timer.status,
        operation,
    }
}

// Construction and lifecycle plumbing.
impl TimerScheduler {
    /// Create a scheduler with an empty set
    pub fn new(collaborators: Collaborators) -> Arc<Self> {
        let (updates, _) = watch::channel(Vec::new());

        Arc::new_cyclic(|this| Self {
            inner: Mutex::new(SchedulerInner {
                timers: Vec::new(),
                suspended: false,
                tick_engine: TickEngine::default(),
            }),
            store: collaborators.store,
            notifier: collaborators.notifier,
            feedback: collaborators.feedback,
            clock: collaborators.clock,
            updates,
            this: this.clone(),
        })
    }

    /// Create a scheduler from the stored set, charging running timers for the
    /// time the process was gone
    pub fn restore(collaborators: Collaborators) -> Arc<Self> {
        let loaded = collaborators.store.load();
        let now = collaborators.clock.now();
        let outcome = reconciler::restore_timers(loaded, now);
        info!(
            "Restoring {} timers ({} dropped, {} repaired)",
            outcome.timers.len(),
            outcome.dropped,
            outcome.repaired
        );

        let scheduler = Self::new(collaborators);
        {
            let mut inner = scheduler.lock();
            inner.timers = outcome.timers;
            inner.suspended = outcome.needs_resume;
            if !outcome.needs_resume {
                scheduler.persist(&inner);
            }
        }

        if outcome.needs_resume {
            scheduler.on_resume();
        }
        scheduler
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the set through to the store and publish it to subscribers
    fn persist(&self, inner: &SchedulerInner) {
        let now = self.clock.now();
        let mut durable = inner.timers.clone();
        if !inner.suspended {
            // Anchor running timers at the save instant so a crash restart can
            // charge them from here
            for timer in durable.iter_mut().filter(|t| t.is_running()) {
                timer.background_suspend_time = Some(now);
            }
        }
        self.store.save(&durable);
        self.publish(inner);
    }

    fn publish(&self, inner: &SchedulerInner) {
        self.updates.send_replace(inner.timers.clone());
    }

    fn ensure_ticking(&self, inner: &mut SchedulerInner) {
        if inner.suspended || !inner.any_running() {
            return;
        }
        inner.tick_engine.start(self.this.clone());
    }

    fn stop_ticking_if_idle(&self, inner: &mut SchedulerInner) {
        if !inner.any_running() {
            inner.tick_engine.stop();
        }
    }

    fn complete(&self, timer: &mut Timer, now: DateTime<Utc>) {
        timer.mark_completed(now);
        self.notifier.cancel(timer.id);
        alert_completion(self.feedback.as_ref(), timer);
        info!("Timer '{}' completed", timer.name);
    }
}

// Commands.
impl TimerScheduler {
    /// Add an idle timer
    pub fn add(&self, draft: NewTimer) -> Result<TimerId, SchedulerError> {
        let timer = Timer::new(draft)?;
        let id = timer.id;
        info!(
            "Adding timer '{}' ({}, {}s)",
            timer.name,
            timer.category.label(),
            timer.total_duration
        );

        let mut inner = self.lock();
        inner.timers.push(timer);
        self.persist(&inner);
        Ok(id)
    }

    /// Remove a timer in any state. Returns false for an unknown id.
    pub fn remove(&self, id: TimerId) -> bool {
        let mut inner = self.lock();
        let Ok(index) = inner.position(id) else {
            warn!("Ignoring remove of unknown timer {}", id);
            return false;
        };

        self.notifier.cancel(id);
        let removed = inner.timers.remove(index);
        info!("Removed timer '{}'", removed.name);

        self.stop_ticking_if_idle(&mut inner);
        self.persist(&inner);
        true
    }

    /// Start an idle timer
    pub fn start(&self, id: TimerId) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        self.run_locked(&mut inner, id, TimerStatus::Idle, "start")?;
        self.ensure_ticking(&mut inner);
        self.persist(&inner);
        Ok(())
    }

    /// Pause a running timer, freezing its remaining time
    pub fn pause(&self, id: TimerId) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        self.pause_locked(&mut inner, id)?;
        self.stop_ticking_if_idle(&mut inner);
        self.persist(&inner);
        Ok(())
    }

    /// Resume a paused timer from its frozen remaining time
    pub fn resume(&self, id: TimerId) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        self.run_locked(&mut inner, id, TimerStatus::Paused, "resume")?;
        self.ensure_ticking(&mut inner);
        self.persist(&inner);
        Ok(())
    }

    /// Re-arm a timer from any state
    pub fn reset(&self, id: TimerId) -> Result<(), SchedulerError> {
        let mut inner = self.lock();
        let index = inner.position(id)?;

        let timer = &mut inner.timers[index];
        timer.reset();
        self.notifier.cancel(id);
        debug!("Reset timer '{}'", timer.name);

        self.stop_ticking_if_idle(&mut inner);
        self.persist(&inner);
        Ok(())
    }

    /// Pause every running timer; returns how many were paused
    pub fn pause_all(&self) -> usize {
        let mut inner = self.lock();
        let targets: Vec<TimerId> = inner
            .timers
            .iter()
            .filter(|t| t.is_running())
            .map(|t| t.id)
            .collect();

        let mut paused = 0;
        for id in targets {
            match self.pause_locked(&mut inner, id) {
                Ok(()) => paused += 1,
                Err(e) => warn!("Skipping timer in pause-all: {}", e),
            }
        }

        self.stop_ticking_if_idle(&mut inner);
        self.persist(&inner);
        info!("Paused {} timers", paused);
        paused
    }

    /// Resume every paused timer; returns how many were resumed
    pub fn resume_all(&self) -> usize {
        let mut inner = self.lock();
        let targets: Vec<TimerId> = inner
            .timers
            .iter()
            .filter(|t| t.is_paused())
            .map(|t| t.id)
            .collect();

        let mut resumed = 0;
        for id in targets {
            match self.run_locked(&mut inner, id, TimerStatus::Paused, "resume") {
                Ok(()) => resumed += 1,
                Err(e) => warn!("Skipping timer in resume-all: {}", e),
            }
        }

        self.ensure_ticking(&mut inner);
        self.persist(&inner);
        info!("Resumed {} timers", resumed);
        resumed
    }

    /// Drop every timer and every pending notification
    pub fn clear_all(&self) {
        let mut inner = self.lock();
        self.notifier.cancel_all();
        let count = inner.timers.len();
        inner.timers.clear();
        inner.tick_engine.stop();
        self.persist(&inner);
        info!("Cleared {} timers", count);
    }

    /// Move a timer from `from` to Running and schedule its alerts
    fn run_locked(
        &self,
        inner: &mut SchedulerInner,
        id: TimerId,
        from: TimerStatus,
        operation: &'static str,
    ) -> Result<(), SchedulerError> {
        let index = inner.position(id)?;
        let timer = &mut inner.timers[index];
        if timer.status != from {
            return Err(invalid_state(timer, operation));
        }

        timer.mark_running(self.clock.now());
        schedule_timer_alerts(self.notifier.as_ref(), timer, timer.remaining_time);
        info!("Timer '{}' running, {}s left", timer.name, timer.remaining_time);
        Ok(())
    }

    fn pause_locked(&self, inner: &mut SchedulerInner, id: TimerId) -> Result<(), SchedulerError> {
        let index = inner.position(id)?;
        let timer = &mut inner.timers[index];
        if !timer.is_running() {
            return Err(invalid_state(timer, "pause"));
        }

        timer.mark_paused();
        self.notifier.cancel(id);
        info!("Timer '{}' paused at {}s", timer.name, timer.remaining_time);
        Ok(())
    }
}

// Lifecycle signals and ticking.
impl TimerScheduler {
    /// The host process is about to be suspended
    pub fn on_suspend(&self) {
        self.on_suspend_at(self.clock.now());
    }

    /// Suspend as of `at`, which may lie in the past when a sleep is detected
    /// after the fact
    pub fn on_suspend_at(&self, at: DateTime<Utc>) {
        let mut inner = self.lock();
        if inner.suspended {
            debug!("Already suspended, keeping the original suspend time");
            return;
        }
        inner.suspended = true;
        inner.tick_engine.stop();

        let running = reconciler::suspend_timers(&mut inner.timers, at);
        // Backstop for the process being killed rather than resumed
        for timer in inner.timers.iter().filter(|t| t.is_running()) {
            schedule_timer_alerts(self.notifier.as_ref(), timer, timer.remaining_time);
        }

        self.persist(&inner);
        info!("Suspended with {} running timers", running.len());
    }

    /// The host process is active again
    pub fn on_resume(&self) {
        let mut inner = self.lock();
        if !inner.suspended {
            debug!("Not suspended, nothing to reconcile");
            return;
        }

        let now = self.clock.now();
        let outcome = reconciler::resume_timers(&mut inner.timers, now);
        inner.suspended = false;

        for id in &outcome.completed {
            if let Some(timer) = inner.timers.iter().find(|t| t.id == *id) {
                alert_completion(self.feedback.as_ref(), timer);
            }
        }
        // Anything the OS still holds would duplicate what is now on screen
        self.notifier.cancel_all();

        self.ensure_ticking(&mut inner);
        self.persist(&inner);
        info!(
            "Resumed: {} timers completed while suspended, {} still running",
            outcome.completed.len(),
            inner.timers.iter().filter(|t| t.is_running()).count()
        );
    }

    /// Drop completed timers to shed memory; returns how many were purged
    pub fn on_memory_pressure(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.timers.len();
        inner.timers.retain(|t| !t.is_completed());
        let purged = before - inner.timers.len();

        self.persist(&inner);
        warn!("Memory pressure: purged {} completed timers", purged);
        purged
    }

    /// Advance every running timer by one second
    ///
    /// Returns whether anything is still running. Driven by the tick engine,
    /// or by hand where no runtime exists.
    pub fn tick(&self) -> bool {
        let mut inner = self.lock();
        self.tick_locked(&mut inner)
    }

    /// Tick on behalf of engine `generation`; a superseded engine is told to exit
    pub(crate) fn engine_tick(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if !inner.tick_engine.is_current(generation) {
            debug!("Stale tick engine generation {}, exiting", generation);
            return false;
        }
        let still_running = self.tick_locked(&mut inner);
        if !still_running {
            inner.tick_engine.mark_stopped();
        }
        still_running
    }

    fn tick_locked(&self, inner: &mut SchedulerInner) -> bool {
        if inner.suspended {
            return false;
        }

        let now = self.clock.now();
        let mut completed = 0;
        for timer in inner.timers.iter_mut().filter(|t| t.is_running()) {
            timer.remaining_time -= 1;
            if timer.remaining_time <= 0 {
                self.complete(timer, now);
                completed += 1;
            }
        }

        if completed > 0 {
            self.persist(inner);
        } else {
            self.publish(inner);
        }
        inner.any_running()
    }

    /// Stop ticking and write the final state, for process teardown
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        inner.tick_engine.stop();
        self.persist(&inner);
        info!("Scheduler shut down with {} timers", inner.timers.len());
    }
}

// Queries.
impl TimerScheduler {
    /// Number of running timers
    pub fn active_count(&self) -> usize {
        self.lock().timers.iter().filter(|t| t.is_running()).count()
    }

    pub fn has_active(&self) -> bool {
        self.active_count() > 0
    }

    /// Read-only copy of the set, in insertion order
    pub fn snapshot(&self) -> Vec<Timer> {
        self.lock().timers.clone()
    }

    pub fn get(&self, id: TimerId) -> Option<Timer> {
        self.lock().timers.iter().find(|t| t.id == id).cloned()
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    pub fn tick_engine_running(&self) -> bool {
        self.lock().tick_engine.is_running()
    }

    /// Receive a fresh snapshot after every change and every tick
    pub fn subscribe(&self) -> watch::Receiver<Vec<Timer>> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
