//! Recording fakes and a manual clock for unit tests

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    services::{
        FeedbackService, HapticIntensity, NotificationRequest, NotificationService, TimerStore,
    },
    state::{SoundVariant, Timer, TimerId, TimerScheduler},
    utils::Clock,
};

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory store remembering every saved set
#[derive(Debug, Default)]
pub struct MemoryStore {
    initial: Vec<Timer>,
    saves: Mutex<Vec<Vec<Timer>>>,
}

impl MemoryStore {
    pub fn with_timers(timers: Vec<Timer>) -> Self {
        Self {
            initial: timers,
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn last_saved(&self) -> Option<Vec<Timer>> {
        self.saves.lock().unwrap().last().cloned()
    }
}

impl TimerStore for MemoryStore {
    fn save(&self, timers: &[Timer]) {
        self.saves.lock().unwrap().push(timers.to_vec());
    }

    fn load(&self) -> Vec<Timer> {
        self.initial.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Schedule(NotificationRequest),
    Cancel(TimerId),
    CancelAll,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<NotificationRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                NotifierCall::Schedule(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl NotificationService for RecordingNotifier {
    fn schedule(&self, request: NotificationRequest) {
        self.calls.lock().unwrap().push(NotifierCall::Schedule(request));
    }

    fn cancel(&self, timer_id: TimerId) {
        self.calls.lock().unwrap().push(NotifierCall::Cancel(timer_id));
    }

    fn cancel_all(&self) {
        self.calls.lock().unwrap().push(NotifierCall::CancelAll);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCall {
    Pulse(HapticIntensity),
    Sound(SoundVariant),
}

#[derive(Debug, Default)]
pub struct RecordingFeedback {
    calls: Mutex<Vec<FeedbackCall>>,
}

impl RecordingFeedback {
    pub fn calls(&self) -> Vec<FeedbackCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pulses(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, FeedbackCall::Pulse(_))).count()
    }

    pub fn sounds(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, FeedbackCall::Sound(_))).count()
    }
}

impl FeedbackService for RecordingFeedback {
    fn pulse(&self, intensity: HapticIntensity) {
        self.calls.lock().unwrap().push(FeedbackCall::Pulse(intensity));
    }

    fn play_sound(&self, variant: SoundVariant) {
        self.calls.lock().unwrap().push(FeedbackCall::Sound(variant));
    }
}

/// A scheduler wired to fakes, with handles to inspect them
pub struct Harness {
    pub scheduler: Arc<TimerScheduler>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub feedback: Arc<RecordingFeedback>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::restored(Vec::new(), Arc::new(ManualClock::new()))
    }

    /// Build the scheduler through the startup restore path
    pub fn restored(timers: Vec<Timer>, clock: Arc<ManualClock>) -> Self {
        let store = Arc::new(MemoryStore::with_timers(timers));
        let notifier = Arc::new(RecordingNotifier::default());
        let feedback = Arc::new(RecordingFeedback::default());

        let scheduler = TimerScheduler::restore(crate::state::Collaborators {
            store: store.clone(),
            notifier: notifier.clone(),
            feedback: feedback.clone(),
            clock: clock.clone(),
        });

        Self {
            scheduler,
            store,
            notifier,
            feedback,
            clock,
        }
    }
}
