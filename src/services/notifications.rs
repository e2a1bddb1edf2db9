//! Fire-at-time alerts that outlive the process
//!
//! The desktop implementation hands each alert to the user's systemd instance as
//! a transient timer unit running `notify-send`, so an alert still fires when this
//! process is suspended or killed.

use tokio::{process::Command, sync::mpsc};
use tracing::{debug, info, warn};

use crate::state::{SoundVariant, Timer, TimerId};

/// Seconds before completion at which the warning alert fires
pub const WARNING_LEAD_SECS: i64 = 60;

/// Prefix of every transient unit this service creates
const UNIT_PREFIX: &str = "brew-timer";

/// Which alert of a timer a request refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Completion,
    Warning,
}

impl NotificationKind {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Warning => "warning",
        }
    }
}

/// One fire-once alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub timer_id: TimerId,
    pub kind: NotificationKind,
    pub delay_secs: i64,
    pub title: String,
    pub body: String,
    pub sound: SoundVariant,
}

impl NotificationRequest {
    /// Alert for the moment `timer` reaches zero
    pub fn completion(timer: &Timer, delay_secs: i64) -> Self {
        Self {
            timer_id: timer.id,
            kind: NotificationKind::Completion,
            delay_secs,
            title: format!("{} is done", timer.name),
            body: format!("Your {} timer has finished.", timer.category.label()),
            sound: timer.notification_preferences.sound,
        }
    }

    /// Earlier heads-up, only when there is room for it before completion
    pub fn warning(timer: &Timer, delay_secs: i64) -> Option<Self> {
        if delay_secs <= WARNING_LEAD_SECS {
            return None;
        }

        Some(Self {
            timer_id: timer.id,
            kind: NotificationKind::Warning,
            delay_secs: delay_secs - WARNING_LEAD_SECS,
            title: format!("{}: 1 minute left", timer.name),
            body: format!("Your {} timer is almost done.", timer.category.label()),
            sound: timer.notification_preferences.sound,
        })
    }

    /// Name of the transient unit carrying this request
    pub fn unit_name(&self) -> String {
        unit_name(self.timer_id, self.kind)
    }
}

/// Schedules and cancels alerts independent of process lifetime
pub trait NotificationService: Send + Sync {
    fn schedule(&self, request: NotificationRequest);

    /// Cancel every alert of `timer_id`. Safe when nothing is scheduled.
    fn cancel(&self, timer_id: TimerId);

    fn cancel_all(&self);
}

/// Replace a timer's alerts with ones firing `delay_secs` from now
pub fn schedule_timer_alerts(notifier: &dyn NotificationService, timer: &Timer, delay_secs: i64) {
    notifier.cancel(timer.id);
    notifier.schedule(NotificationRequest::completion(timer, delay_secs));
    if let Some(warning) = NotificationRequest::warning(timer, delay_secs) {
        notifier.schedule(warning);
    }
}

fn unit_name(timer_id: TimerId, kind: NotificationKind) -> String {
    format!("{}-{}-{}", UNIT_PREFIX, timer_id, kind.suffix())
}

/// Arguments for `systemd-run` scheduling `request`
pub fn systemd_run_args(request: &NotificationRequest) -> Vec<String> {
    let mut args = vec![
        "--user".to_string(),
        format!("--unit={}", request.unit_name()),
        format!("--on-active={}", request.delay_secs.max(1)),
        "--timer-property=AccuracySec=1s".to_string(),
        "--timer-property=RemainAfterElapse=no".to_string(),
        "--collect".to_string(),
        "--quiet".to_string(),
        "notify-send".to_string(),
        "--app-name=brew-timers".to_string(),
        "--urgency=critical".to_string(),
    ];
    if let Some(sound) = request.sound.sound_name() {
        args.push(format!("--hint=string:sound-name:{}", sound));
    }
    args.push(request.title.clone());
    args.push(request.body.clone());
    args
}

#[derive(Debug)]
enum NotifierCommand {
    Schedule(NotificationRequest),
    Cancel(TimerId),
    CancelAll,
}

/// Desktop notifier backed by systemd user timers
#[derive(Debug, Clone)]
pub struct SystemdNotifier {
    command_tx: mpsc::UnboundedSender<NotifierCommand>,
}

impl SystemdNotifier {
    /// Spawn the worker that talks to systemd, one command at a time
    pub fn spawn() -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            notifier_task(command_rx).await;
        });
        Self { command_tx }
    }

    fn send(&self, command: NotifierCommand) {
        if let Err(e) = self.command_tx.send(command) {
            warn!("Notification worker is gone, dropping {:?}", e.0);
        }
    }
}

impl NotificationService for SystemdNotifier {
    fn schedule(&self, request: NotificationRequest) {
        self.send(NotifierCommand::Schedule(request));
    }

    fn cancel(&self, timer_id: TimerId) {
        self.send(NotifierCommand::Cancel(timer_id));
    }

    fn cancel_all(&self) {
        self.send(NotifierCommand::CancelAll);
    }
}

async fn notifier_task(mut command_rx: mpsc::UnboundedReceiver<NotifierCommand>) {
    debug!("Starting notification worker");

    while let Some(command) = command_rx.recv().await {
        let result = match &command {
            NotifierCommand::Schedule(request) => schedule_unit(request).await,
            NotifierCommand::Cancel(timer_id) => {
                stop_units(&[
                    format!("{}.timer", unit_name(*timer_id, NotificationKind::Completion)),
                    format!("{}.timer", unit_name(*timer_id, NotificationKind::Warning)),
                ])
                .await
            }
            NotifierCommand::CancelAll => stop_units(&[format!("{}-*.timer", UNIT_PREFIX)]).await,
        };

        if let Err(e) = result {
            warn!("Notification command {:?} failed: {}", command, e);
        }
    }

    debug!("Notification worker stopped");
}

async fn schedule_unit(request: &NotificationRequest) -> Result<(), String> {
    let output = Command::new("systemd-run")
        .args(systemd_run_args(request))
        .output()
        .await
        .map_err(|e| format!("Failed to execute systemd-run: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("systemd-run failed: {}", stderr));
    }

    debug!("Scheduled {} in {}s", request.unit_name(), request.delay_secs);
    Ok(())
}

async fn stop_units(units: &[String]) -> Result<(), String> {
    // Stopping a unit that is not loaded is not an error for us
    let output = Command::new("systemctl")
        .args(["--user", "stop"])
        .args(units)
        .output()
        .await
        .map_err(|e| format!("Failed to execute systemctl stop: {}", e))?;

    debug!("Stopped {:?} (exit code: {})", units, output.status.code().unwrap_or(-1));
    Ok(())
}

/// Check that a systemd user instance can take transient timers
pub async fn check_systemd_run_available() -> Result<(), String> {
    let output = Command::new("systemctl")
        .args(["--user", "is-system-running"])
        .output()
        .await
        .map_err(|_| "systemctl is not available; alerts need a systemd user session".to_string())?;

    // "degraded" still accepts new units, only a missing manager matters
    if output.stdout.is_empty() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("systemd user instance is not reachable: {}", stderr.trim()));
    }

    info!("systemd user instance is available");
    Ok(())
}

/// Notifier that only logs, for hosts without a systemd user session
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationService for LogNotifier {
    fn schedule(&self, request: NotificationRequest) {
        info!(
            "Alert {:?} for timer {} in {}s: {}",
            request.kind, request.timer_id, request.delay_secs, request.title
        );
    }

    fn cancel(&self, timer_id: TimerId) {
        debug!("Cancelled alerts for timer {}", timer_id);
    }

    fn cancel_all(&self) {
        debug!("Cancelled all alerts");
    }
}
