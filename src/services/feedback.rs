//! Local haptic and sound feedback when a timer completes

use tokio::{process::Command, sync::mpsc};
use tracing::{debug, info, warn};

use crate::state::{SoundVariant, Timer};

/// Strength of a haptic pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticIntensity {
    Light,
    Medium,
    Heavy,
}

/// Best-effort feedback sink, results are never observed
pub trait FeedbackService: Send + Sync {
    fn pulse(&self, intensity: HapticIntensity);

    fn play_sound(&self, variant: SoundVariant);
}

/// Fire the completion alert for `timer`, repeated for critical categories
pub fn alert_completion(feedback: &dyn FeedbackService, timer: &Timer) {
    let prefs = timer.notification_preferences;
    for _ in 0..timer.category.alert_multiplier() {
        if prefs.vibration {
            feedback.pulse(HapticIntensity::Heavy);
        }
        feedback.play_sound(prefs.sound);
    }
}

#[derive(Debug)]
enum FeedbackEvent {
    Pulse(HapticIntensity),
    Sound(SoundVariant),
}

/// Desktop feedback: sounds through libcanberra, pulses are logged
#[derive(Debug, Clone)]
pub struct SystemFeedback {
    event_tx: mpsc::UnboundedSender<FeedbackEvent>,
}

impl SystemFeedback {
    /// Spawn the playback worker. With `sound_enabled` off, sounds are only logged.
    pub fn spawn(sound_enabled: bool) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            feedback_task(event_rx, sound_enabled).await;
        });
        Self { event_tx }
    }

    fn send(&self, event: FeedbackEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("Feedback worker is gone, dropping {:?}", e.0);
        }
    }
}

impl FeedbackService for SystemFeedback {
    fn pulse(&self, intensity: HapticIntensity) {
        self.send(FeedbackEvent::Pulse(intensity));
    }

    fn play_sound(&self, variant: SoundVariant) {
        self.send(FeedbackEvent::Sound(variant));
    }
}

/// Plays events one after another so repeated alerts stay audible
async fn feedback_task(mut event_rx: mpsc::UnboundedReceiver<FeedbackEvent>, sound_enabled: bool) {
    while let Some(event) = event_rx.recv().await {
        match event {
            FeedbackEvent::Pulse(intensity) => {
                info!("Haptic pulse ({:?})", intensity);
            }
            FeedbackEvent::Sound(variant) => {
                let Some(name) = variant.sound_name() else {
                    continue;
                };
                if !sound_enabled {
                    info!("Sound '{}' (playback disabled)", name);
                    continue;
                }
                if let Err(e) = play(name).await {
                    warn!("Failed to play sound '{}': {}", name, e);
                }
            }
        }
    }
}

async fn play(sound_name: &str) -> Result<(), String> {
    let output = Command::new("canberra-gtk-play")
        .arg(format!("--id={}", sound_name))
        .output()
        .await
        .map_err(|e| format!("Failed to execute canberra-gtk-play: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("canberra-gtk-play failed: {}", stderr));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{NewTimer, TimerCategory};
    use crate::testing::{FeedbackCall, RecordingFeedback};

    #[test]
    fn test_critical_category_alerts_twice() {
        let feedback = RecordingFeedback::default();
        let boil = Timer::new(NewTimer::new("Boil", TimerCategory::Boiling, 10)).unwrap();

        alert_completion(&feedback, &boil);

        assert_eq!(feedback.pulses(), 2);
        assert_eq!(feedback.sounds(), 2);
    }

    #[test]
    fn test_vibration_off_only_plays_sound() {
        let feedback = RecordingFeedback::default();
        let mut dry_hop = Timer::new(NewTimer::new("Dry hop", TimerCategory::Hopping, 10)).unwrap();
        dry_hop.notification_preferences.vibration = false;
        dry_hop.notification_preferences.sound = SoundVariant::Chime;

        alert_completion(&feedback, &dry_hop);

        assert_eq!(feedback.calls(), vec![FeedbackCall::Sound(SoundVariant::Chime)]);
    }
}
