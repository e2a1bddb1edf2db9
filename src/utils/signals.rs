//! Signal handling for graceful shutdown and host lifecycle transitions

use std::{io, sync::Arc};

use futures::stream::StreamExt;
use signal_hook_tokio::{Handle, Signals};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    state::TimerScheduler,
    tasks::{lifecycle::LIFECYCLE_SIGNALS, lifecycle_task},
};

/// Wait for shutdown signals (SIGTERM, SIGINT)
pub async fn shutdown_signal() {
    let mut signals = match Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
    ]) {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to create signal handler: {}, falling back to Ctrl-C", e);
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            return;
        }
    };

    if let Some(signal) = signals.next().await {
        info!("Received signal: {}", signal);
    }
}

/// Active lifecycle signal subscription
pub struct LifecycleRegistration {
    handle: Handle,
    task: JoinHandle<()>,
}

impl LifecycleRegistration {
    /// Deregister the signal hooks and wait for the forwarding task to finish
    pub async fn close(self) {
        self.handle.close();
        if let Err(e) = self.task.await {
            error!("Lifecycle signal task failed: {}", e);
        }
        info!("Lifecycle signals deregistered");
    }
}

/// Subscribe the scheduler to the host's lifecycle signals
pub fn register_lifecycle_signals(
    scheduler: Arc<TimerScheduler>,
) -> io::Result<LifecycleRegistration> {
    let signals = Signals::new(LIFECYCLE_SIGNALS)?;
    let handle = signals.handle();
    let task = tokio::spawn(lifecycle_task(scheduler, signals));

    info!("Registered lifecycle signals (SIGTSTP suspend, SIGCONT resume, SIGUSR1 memory)");
    Ok(LifecycleRegistration { handle, task })
}
