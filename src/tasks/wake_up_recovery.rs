//! Wake-up recovery background task
//!
//! When the whole machine sleeps nobody sends us a suspend signal, and the
//! monotonic clock stops while the wall clock keeps going. The gap between the
//! two tells us how long we were out so the scheduler can be reconciled.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, info};

use crate::state::TimerScheduler;

/// Wall-clock surplus that counts as a sleep
pub const SLEEP_THRESHOLD: Duration = Duration::from_secs(2);

/// Compares wall-clock and monotonic progress between observations
#[derive(Debug)]
pub struct SleepDetector {
    last_wall: DateTime<Utc>,
    last_mono: Instant,
    threshold: Duration,
}

impl SleepDetector {
    pub fn new(wall: DateTime<Utc>, mono: Instant, threshold: Duration) -> Self {
        Self {
            last_wall: wall,
            last_mono: mono,
            threshold,
        }
    }

    /// Record an observation; returns the estimated moment the host went to
    /// sleep if one happened since the previous observation
    pub fn observe(&mut self, wall: DateTime<Utc>, mono: Instant) -> Option<DateTime<Utc>> {
        let mono_elapsed = mono.saturating_duration_since(self.last_mono);
        let mono_elapsed =
            chrono::Duration::from_std(mono_elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        let wall_elapsed = wall - self.last_wall;
        let slept_at = self.last_wall + mono_elapsed;

        self.last_wall = wall;
        self.last_mono = mono;

        let surplus = (wall_elapsed - mono_elapsed).to_std().ok()?;
        (surplus > self.threshold).then_some(slept_at)
    }
}

/// Background task that reconciles timers after an unannounced host sleep
pub async fn wake_up_recovery_task(scheduler: Arc<TimerScheduler>, check_every: Duration) {
    info!("Starting wake-up recovery task (every {:?})", check_every);

    let mut interval = interval(check_every);
    let mut detector = SleepDetector::new(Utc::now(), Instant::now(), SLEEP_THRESHOLD);

    loop {
        interval.tick().await;

        let Some(slept_at) = detector.observe(Utc::now(), Instant::now()) else {
            continue;
        };

        if scheduler.is_suspended() {
            debug!("Host sleep detected while already suspended, leaving it to the resume signal");
            continue;
        }

        info!("System wake-up detected, host slept since {}", slept_at);
        scheduler.on_suspend_at(slept_at);
        scheduler.on_resume();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_clocks_report_nothing() {
        let wall = Utc::now();
        let mono = Instant::now();
        let mut detector = SleepDetector::new(wall, mono, SLEEP_THRESHOLD);

        let step = Duration::from_secs(5);
        assert_eq!(detector.observe(wall + chrono::Duration::seconds(5), mono + step), None);
        assert_eq!(detector.observe(wall + chrono::Duration::seconds(11), mono + step * 2), None);
    }

    #[test]
    fn test_wall_clock_jump_reports_sleep_start() {
        let wall = Utc::now();
        let mono = Instant::now();
        let mut detector = SleepDetector::new(wall, mono, SLEEP_THRESHOLD);

        let slept_at = detector.observe(
            wall + chrono::Duration::seconds(605),
            mono + Duration::from_secs(5),
        );
        assert_eq!(slept_at, Some(wall + chrono::Duration::seconds(5)));

        // Next observation is measured from the wake-up
        let later = wall + chrono::Duration::seconds(610);
        assert_eq!(detector.observe(later, mono + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_wall_clock_set_backwards_is_not_sleep() {
        let wall = Utc::now();
        let mono = Instant::now();
        let mut detector = SleepDetector::new(wall, mono, SLEEP_THRESHOLD);

        let rewound = wall - chrono::Duration::seconds(300);
        assert_eq!(detector.observe(rewound, mono + Duration::from_secs(5)), None);
    }
}
