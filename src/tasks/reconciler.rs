//! Lifecycle reconciliation
//!
//! While the process is suspended nothing ticks, so on resume each running timer
//! is charged the wall-clock time that passed since it was suspended. The same
//! arithmetic restores timers loaded after a full process restart.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::state::{Timer, TimerId, TimerStatus};

/// What a resume pass changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResumeOutcome {
    /// Timers that ran out while suspended, in set order
    pub completed: Vec<TimerId>,
    /// Whether any timer is still running afterwards
    pub any_running: bool,
}

/// Result of validating a freshly loaded set
#[derive(Debug, Default)]
pub struct RestoreOutcome {
    pub timers: Vec<Timer>,
    /// Entries discarded as invalid
    pub dropped: usize,
    /// Entries rewritten to a consistent state
    pub repaired: usize,
    /// Some running timer carries a suspend time and must be reconciled
    pub needs_resume: bool,
}

/// Whole seconds from `since` to `now`, never negative
pub fn elapsed_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - since).num_seconds().max(0)
}

/// Record the suspend instant on every running timer
pub fn suspend_timers(timers: &mut [Timer], at: DateTime<Utc>) -> Vec<TimerId> {
    timers
        .iter_mut()
        .filter(|t| t.is_running())
        .map(|t| {
            t.background_suspend_time = Some(at);
            t.id
        })
        .collect()
}

/// Charge running timers for the time since their suspend instant
///
/// The suspend time is consumed, so a second pass without a new suspend leaves
/// every timer untouched.
pub fn resume_timers(timers: &mut [Timer], now: DateTime<Utc>) -> ResumeOutcome {
    let mut outcome = ResumeOutcome::default();

    for timer in timers.iter_mut().filter(|t| t.is_running()) {
        let Some(since) = timer.background_suspend_time.take() else {
            continue;
        };

        let elapsed = elapsed_secs(since, now);
        timer.remaining_time -= elapsed;
        debug!(
            "Timer {} charged {}s while suspended, {}s left",
            timer.id, elapsed, timer.remaining_time
        );

        if timer.remaining_time <= 0 {
            timer.mark_completed(now);
            info!("Timer '{}' ran out while suspended", timer.name);
            outcome.completed.push(timer.id);
        }
    }

    outcome.any_running = timers.iter().any(Timer::is_running);
    outcome
}

/// Validate a loaded set and put every timer in a state we can stand behind
///
/// Timers that cannot be placed confidently in Running or Paused are completed
/// rather than left ambiguous.
pub fn restore_timers(loaded: Vec<Timer>, now: DateTime<Utc>) -> RestoreOutcome {
    let mut outcome = RestoreOutcome::default();
    let mut seen = HashSet::new();

    for mut timer in loaded {
        if timer.total_duration <= 0 {
            warn!("Dropping stored timer '{}' with duration {}s", timer.name, timer.total_duration);
            outcome.dropped += 1;
            continue;
        }
        if !seen.insert(timer.id) {
            warn!("Dropping duplicate stored timer {}", timer.id);
            outcome.dropped += 1;
            continue;
        }

        match timer.status {
            TimerStatus::Running if timer.background_suspend_time.is_none() => {
                warn!("Running timer '{}' has no anchor, completing it", timer.name);
                timer.mark_completed(now);
                outcome.repaired += 1;
            }
            TimerStatus::Running => outcome.needs_resume = true,
            TimerStatus::Paused if timer.remaining_time <= 0 => {
                warn!("Paused timer '{}' has no time left, completing it", timer.name);
                timer.mark_completed(now);
                outcome.repaired += 1;
            }
            TimerStatus::Idle if timer.remaining_time != timer.total_duration => {
                timer.reset();
                outcome.repaired += 1;
            }
            _ => {}
        }

        outcome.timers.push(timer);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::state::{NewTimer, TimerCategory};

    fn running(duration: i64, now: DateTime<Utc>) -> Timer {
        let draft = NewTimer::new("Boil", TimerCategory::Boiling, duration);
        let mut timer = Timer::new(draft).unwrap();
        timer.mark_running(now);
        timer
    }

    #[test]
    fn test_elapsed_time_is_charged() {
        let t0 = Utc::now();
        let mut timers = vec![running(120, t0)];

        suspend_timers(&mut timers, t0);
        let outcome = resume_timers(&mut timers, t0 + Duration::seconds(50));

        assert_eq!(timers[0].remaining_time, 70);
        assert!(timers[0].is_running());
        assert!(timers[0].background_suspend_time.is_none());
        assert!(outcome.completed.is_empty());
        assert!(outcome.any_running);
    }

    #[test]
    fn test_overshoot_completes_with_overtime() {
        let t0 = Utc::now();
        let mut timers = vec![running(10, t0)];

        suspend_timers(&mut timers, t0);
        let resumed_at = t0 + Duration::seconds(30);
        let outcome = resume_timers(&mut timers, resumed_at);

        assert!(timers[0].is_completed());
        assert_eq!(timers[0].remaining_time, -20);
        assert_eq!(timers[0].end_time, Some(resumed_at));
        assert_eq!(outcome.completed, vec![timers[0].id]);
        assert!(!outcome.any_running);
    }

    #[test]
    fn test_second_resume_changes_nothing() {
        let t0 = Utc::now();
        let mut timers = vec![running(120, t0)];

        suspend_timers(&mut timers, t0);
        resume_timers(&mut timers, t0 + Duration::seconds(50));
        let after_first = timers.clone();

        let outcome = resume_timers(&mut timers, t0 + Duration::seconds(50));
        assert_eq!(timers, after_first);
        assert!(outcome.completed.is_empty());
    }

    #[test]
    fn test_paused_timers_are_not_charged() {
        let t0 = Utc::now();
        let mut timer = running(60, t0);
        timer.remaining_time = 40;
        timer.mark_paused();
        let mut timers = vec![timer];

        assert!(suspend_timers(&mut timers, t0).is_empty());
        resume_timers(&mut timers, t0 + Duration::seconds(500));
        assert_eq!(timers[0].remaining_time, 40);
        assert!(timers[0].is_paused());
    }

    #[test]
    fn test_clock_going_backwards_charges_nothing() {
        let t0 = Utc::now();
        let mut timers = vec![running(60, t0)];

        resume_timers(&mut timers, t0 - Duration::seconds(30));
        assert_eq!(timers[0].remaining_time, 60);
    }

    #[test]
    fn test_restore_repairs_ambiguous_timers() {
        let now = Utc::now();

        let mut orphan = running(60, now);
        orphan.background_suspend_time = None;

        let mut spent = running(60, now);
        spent.remaining_time = 0;
        spent.mark_paused();

        let mut invalid = running(60, now);
        invalid.total_duration = 0;

        let mut stale_idle =
            Timer::new(NewTimer::new("Chill", TimerCategory::Cooling, 600)).unwrap();
        stale_idle.remaining_time = 12;

        let anchored = running(60, now);
        let duplicate = anchored.clone();

        let outcome = restore_timers(
            vec![orphan, spent, invalid, stale_idle, anchored, duplicate],
            now,
        );

        assert_eq!(outcome.timers.len(), 4);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(outcome.repaired, 3);
        assert!(outcome.needs_resume);
        assert!(outcome.timers[0].is_completed());
        assert!(outcome.timers[1].is_completed());
        assert_eq!(outcome.timers[2].remaining_time, 600);
        assert!(outcome.timers[3].is_running());
    }
}
