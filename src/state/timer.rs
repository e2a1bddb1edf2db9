//! Timer entity: identity plus countdown state for one brewing timer

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SchedulerError;

/// Seconds left at which a timer is shown as a warning
pub const WARNING_THRESHOLD_SECS: i64 = 300;
/// Seconds left at which a timer is shown as critical
pub const CRITICAL_THRESHOLD_SECS: i64 = 60;

/// Opaque timer identifier, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Uuid);

impl TimerId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TimerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Brewing step a timer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerCategory {
    Mashing,
    Boiling,
    Hopping,
    Cooling,
    Fermentation,
    Conditioning,
    #[default]
    Other,
}

impl TimerCategory {
    /// Categories whose completion alert is doubled
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Mashing | Self::Boiling)
    }

    /// How many pulses/sounds a completion alert plays
    pub fn alert_multiplier(&self) -> u8 {
        if self.is_critical() { 2 } else { 1 }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Mashing => "mashing",
            Self::Boiling => "boiling",
            Self::Hopping => "hopping",
            Self::Cooling => "cooling",
            Self::Fermentation => "fermentation",
            Self::Conditioning => "conditioning",
            Self::Other => "other",
        }
    }
}

/// Sound played when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundVariant {
    #[default]
    Default,
    Bell,
    Chime,
    Alarm,
    Silent,
}

impl SoundVariant {
    /// Freedesktop sound theme name, `None` for silent
    pub fn sound_name(&self) -> Option<&'static str> {
        match self {
            Self::Default => Some("complete"),
            Self::Bell => Some("bell"),
            Self::Chime => Some("message-new-instant"),
            Self::Alarm => Some("alarm-clock-elapsed"),
            Self::Silent => None,
        }
    }
}

/// Per-timer alert settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default)]
    pub sound: SoundVariant,
    #[serde(default = "default_vibration")]
    pub vibration: bool,
}

fn default_vibration() -> bool {
    true
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            sound: SoundVariant::Default,
            vibration: true,
        }
    }
}

/// Where a timer is in its lifecycle. Exactly one holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Presentation urgency derived from the remaining time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
    Overtime,
    Completed,
}

/// Caller-supplied data for a timer that does not exist yet
#[derive(Debug, Clone, Deserialize)]
pub struct NewTimer {
    pub name: String,
    #[serde(default)]
    pub category: TimerCategory,
    pub duration_secs: i64,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
}

impl NewTimer {
    pub fn new(name: impl Into<String>, category: TimerCategory, duration_secs: i64) -> Self {
        Self {
            name: name.into(),
            category,
            duration_secs,
            notification_preferences: NotificationPreferences::default(),
        }
    }
}

/// One brewing countdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub category: TimerCategory,
    /// Countdown length in seconds, fixed at creation
    pub total_duration: i64,
    /// Seconds left; negative once the timer ran past zero
    pub remaining_time: i64,
    pub status: TimerStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub background_suspend_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notification_preferences: NotificationPreferences,
}

impl Timer {
    /// Create an idle timer, rejecting non-positive durations
    pub fn new(draft: NewTimer) -> Result<Self, SchedulerError> {
        if draft.duration_secs <= 0 {
            return Err(SchedulerError::InvalidDuration(draft.duration_secs));
        }

        Ok(Self {
            id: TimerId::new(),
            name: draft.name,
            category: draft.category,
            total_duration: draft.duration_secs,
            remaining_time: draft.duration_secs,
            status: TimerStatus::Idle,
            start_time: None,
            background_suspend_time: None,
            end_time: None,
            notification_preferences: draft.notification_preferences,
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_paused(&self) -> bool {
        self.status == TimerStatus::Paused
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    pub fn is_idle(&self) -> bool {
        self.status == TimerStatus::Idle
    }

    /// Fraction of the duration used up; exceeds 1.0 in overtime
    pub fn progress(&self) -> f64 {
        1.0 - self.remaining_time as f64 / self.total_duration as f64
    }

    /// `H:MM:SS` above an hour, `MM:SS` otherwise, sign dropped
    pub fn display(&self) -> String {
        format_clock(self.remaining_time.unsigned_abs())
    }

    pub fn urgency(&self) -> Urgency {
        if self.remaining_time < 0 {
            Urgency::Overtime
        } else if self.is_completed() {
            Urgency::Completed
        } else if self.remaining_time <= CRITICAL_THRESHOLD_SECS {
            Urgency::Critical
        } else if self.remaining_time <= WARNING_THRESHOLD_SECS {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }

    /// Enter Running from Idle or Paused
    pub(crate) fn mark_running(&mut self, now: DateTime<Utc>) {
        self.status = TimerStatus::Running;
        self.start_time = Some(now);
        self.background_suspend_time = Some(now);
    }

    pub(crate) fn mark_paused(&mut self) {
        self.status = TimerStatus::Paused;
        self.background_suspend_time = None;
    }

    pub(crate) fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = TimerStatus::Completed;
        self.background_suspend_time = None;
        self.end_time = Some(now);
    }

    /// Re-arm: full duration, no timestamps
    pub(crate) fn reset(&mut self) {
        self.status = TimerStatus::Idle;
        self.remaining_time = self.total_duration;
        self.start_time = None;
        self.background_suspend_time = None;
        self.end_time = None;
    }
}

/// Format whole seconds as a countdown clock
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(duration: i64) -> Timer {
        Timer::new(NewTimer::new("Boil", TimerCategory::Boiling, duration)).unwrap()
    }

    #[test]
    fn test_new_timer_is_idle_with_full_duration() {
        let t = timer(3600);
        assert!(t.is_idle());
        assert!(!t.is_running() && !t.is_paused() && !t.is_completed());
        assert_eq!(t.remaining_time, 3600);
        assert!(t.start_time.is_none());
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        let err = Timer::new(NewTimer::new("Bad", TimerCategory::Other, 0)).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidDuration(0));

        let err = Timer::new(NewTimer::new("Bad", TimerCategory::Other, -5)).unwrap_err();
        assert_eq!(err, SchedulerError::InvalidDuration(-5));
    }

    #[test]
    fn test_progress_exceeds_one_in_overtime() {
        let mut t = timer(100);
        assert_eq!(t.progress(), 0.0);

        t.remaining_time = 25;
        assert!((t.progress() - 0.75).abs() < f64::EPSILON);

        t.remaining_time = -50;
        assert!((t.progress() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display_formats() {
        let mut t = timer(3600);
        assert_eq!(t.display(), "1:00:00");

        t.remaining_time = 3599;
        assert_eq!(t.display(), "59:59");

        t.remaining_time = 65;
        assert_eq!(t.display(), "01:05");

        t.remaining_time = -75;
        assert_eq!(t.display(), "01:15");

        t.remaining_time = 3 * 3600 + 2 * 60 + 1;
        assert_eq!(t.display(), "3:02:01");
    }

    #[test]
    fn test_urgency_thresholds() {
        let mut t = timer(1000);
        assert_eq!(t.urgency(), Urgency::Normal);

        t.remaining_time = 300;
        assert_eq!(t.urgency(), Urgency::Warning);

        t.remaining_time = 60;
        assert_eq!(t.urgency(), Urgency::Critical);

        t.remaining_time = 0;
        t.status = TimerStatus::Completed;
        assert_eq!(t.urgency(), Urgency::Completed);

        t.remaining_time = -1;
        assert_eq!(t.urgency(), Urgency::Overtime);
    }

    #[test]
    fn test_critical_categories_double_alert() {
        assert_eq!(TimerCategory::Mashing.alert_multiplier(), 2);
        assert_eq!(TimerCategory::Boiling.alert_multiplier(), 2);
        assert_eq!(TimerCategory::Hopping.alert_multiplier(), 1);
        assert_eq!(TimerCategory::Fermentation.alert_multiplier(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut t = timer(60);
        let now = Utc::now();
        t.mark_running(now);
        t.remaining_time = -10;
        t.mark_completed(now);

        t.reset();
        assert!(t.is_idle());
        assert_eq!(t.remaining_time, 60);
        assert!(t.start_time.is_none());
        assert!(t.background_suspend_time.is_none());
        assert!(t.end_time.is_none());
    }

    #[test]
    fn test_draft_deserializes_with_defaults() {
        let draft: NewTimer =
            serde_json::from_str(r#"{"name":"Mash","duration_secs":3600}"#).unwrap();
        assert_eq!(draft.category, TimerCategory::Other);
        assert_eq!(draft.notification_preferences, NotificationPreferences::default());
    }
}
