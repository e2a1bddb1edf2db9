//! Brew Timers - A multi-timer scheduler for home brewing
//!
//! This is the main entry point for the brew-timers application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use brew_timers::{
    api::create_router,
    config::{Config, NotifierKind},
    services::{
        check_systemd_run_available, JsonFileStore, LogNotifier, NotificationService,
        SystemFeedback, SystemdNotifier,
    },
    state::{AppState, Collaborators, TimerScheduler},
    tasks::wake_up_recovery_task,
    utils::{register_lifecycle_signals, shutdown_signal, SystemClock},
};

/// Pick the notification backend, falling back to logging when systemd-run is missing
async fn select_notifier(kind: NotifierKind) -> Arc<dyn NotificationService> {
    match kind {
        NotifierKind::Systemd => match check_systemd_run_available().await {
            Ok(()) => Arc::new(SystemdNotifier::spawn()),
            Err(e) => {
                warn!("{}; falling back to logged notifications", e);
                Arc::new(LogNotifier)
            }
        },
        NotifierKind::Log => Arc::new(LogNotifier),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("brew_timers={},tower_http=info", config.log_level()))
        .init();

    info!("Starting brew-timers server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, state_file={}, notifier={:?}, sound={}",
        config.host,
        config.port,
        config.state_file.display(),
        config.notifier,
        !config.no_sound
    );

    let store = Arc::new(JsonFileStore::spawn(&config.state_file));
    let collaborators = Collaborators {
        store: store.clone(),
        notifier: select_notifier(config.notifier).await,
        feedback: Arc::new(SystemFeedback::spawn(!config.no_sound)),
        clock: Arc::new(SystemClock),
    };

    // Restore the timer set, charging running timers for the downtime
    let scheduler = TimerScheduler::restore(collaborators);

    let lifecycle = match register_lifecycle_signals(scheduler.clone()) {
        Ok(registration) => Some(registration),
        Err(e) => {
            error!("Failed to register lifecycle signals: {}", e);
            None
        }
    };

    // Start the wake-up recovery background task
    let wake_scheduler = Arc::clone(&scheduler);
    let wake_interval = config.wake_check_interval();
    let wake_task = tokio::spawn(async move {
        wake_up_recovery_task(wake_scheduler, wake_interval).await;
    });

    let state = Arc::new(AppState::new(scheduler.clone(), config.port, config.host.clone()));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers                  - Add a timer");
    info!("  GET    /timers                  - List timers");
    info!("  DELETE /timers                  - Clear all timers");
    info!("  GET    /timers/:id              - Get one timer");
    info!("  DELETE /timers/:id              - Remove a timer");
    info!("  POST   /timers/:id/start|pause|resume|reset");
    info!("  POST   /timers/pause-all        - Pause every running timer");
    info!("  POST   /timers/resume-all       - Resume every paused timer");
    info!("  GET    /timers/events           - Server-sent snapshots");
    info!("  POST   /lifecycle/suspend|resume|memory-pressure");
    info!("  GET    /status                  - Scheduler status");
    info!("  GET    /health                  - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Some(registration) = lifecycle {
        registration.close().await;
    }
    wake_task.abort();
    scheduler.shutdown();
    store.flush().await;

    info!("Server shutdown complete");
    Ok(())
}
