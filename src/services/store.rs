//! Durable storage for the timer set
//!
//! The scheduler writes the whole set after every mutating operation. Writes are
//! queued to a single writer task so they land in order without blocking the
//! caller; a failed write is logged and the next one re-establishes durability.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::{error::StoreError, state::Timer};

/// Current on-disk format version
pub const STORE_VERSION: u32 = 1;

/// Durable mirror of the scheduler's timer set
pub trait TimerStore: Send + Sync {
    /// Replace the stored set. Best-effort, never blocks on I/O.
    fn save(&self, timers: &[Timer]);

    /// Load the stored set; empty when missing or unreadable
    fn load(&self) -> Vec<Timer>;
}

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct StoredTimers {
    version: u32,
    saved_at: DateTime<Utc>,
    timers: Vec<Timer>,
}

enum StoreCommand {
    Write(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// JSON file store with an ordered background writer
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_tx: mpsc::UnboundedSender<StoreCommand>,
}

impl JsonFileStore {
    /// Create the store and spawn its writer task on the current runtime
    pub fn spawn(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let writer_path = path.clone();
        tokio::spawn(async move {
            writer_task(writer_path, write_rx).await;
        });

        info!("Timer store at {}", path.display());
        Self { path, write_tx }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until every write queued so far has been attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.write_tx.send(StoreCommand::Flush(done_tx)).is_err() {
            warn!("Timer store writer is gone, nothing to flush");
            return;
        }
        let _ = done_rx.await;
    }

    fn encode(timers: &[Timer]) -> Result<Vec<u8>, StoreError> {
        let stored = StoredTimers {
            version: STORE_VERSION,
            saved_at: Utc::now(),
            timers: timers.to_vec(),
        };
        Ok(serde_json::to_vec_pretty(&stored)?)
    }

    /// Where an unreadable file is kept so the next save cannot clobber it
    pub fn corrupt_path(&self) -> PathBuf {
        with_suffix(&self.path, ".corrupt")
    }

    fn set_aside(&self) {
        let corrupt = self.corrupt_path();
        match std::fs::rename(&self.path, &corrupt) {
            Ok(()) => warn!("Moved unreadable timer file to {}", corrupt.display()),
            Err(e) => error!("Failed to move unreadable timer file aside: {}", e),
        }
    }

    fn read(&self) -> Result<Option<Vec<Timer>>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let stored: StoredTimers =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if stored.version != STORE_VERSION {
            return Err(StoreError::Version {
                path: self.path.clone(),
                found: stored.version,
            });
        }

        Ok(Some(stored.timers))
    }
}

impl TimerStore for JsonFileStore {
    fn save(&self, timers: &[Timer]) {
        match Self::encode(timers) {
            Ok(bytes) => {
                if self.write_tx.send(StoreCommand::Write(bytes)).is_err() {
                    error!("Timer store writer is gone, dropping write of {} timers", timers.len());
                }
            }
            Err(e) => error!("Failed to encode timers: {}", e),
        }
    }

    fn load(&self) -> Vec<Timer> {
        match self.read() {
            Ok(Some(timers)) => {
                info!("Loaded {} timers from {}", timers.len(), self.path.display());
                timers
            }
            Ok(None) => {
                info!("No timer file at {}, starting empty", self.path.display());
                Vec::new()
            }
            Err(e @ (StoreError::Parse { .. } | StoreError::Version { .. })) => {
                warn!("Ignoring unreadable timer file: {}", e);
                self.set_aside();
                Vec::new()
            }
            Err(e) => {
                warn!("Ignoring unreadable timer file: {}", e);
                Vec::new()
            }
        }
    }
}

/// Drain queued writes in order, replacing the file atomically each time
async fn writer_task(path: PathBuf, mut write_rx: mpsc::UnboundedReceiver<StoreCommand>) {
    debug!("Starting timer store writer for {}", path.display());

    while let Some(command) = write_rx.recv().await {
        match command {
            StoreCommand::Write(bytes) => {
                if let Err(e) = write_atomically(&path, &bytes).await {
                    error!("Failed to persist timers: {}", e);
                }
            }
            StoreCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    debug!("Timer store writer for {} stopped", path.display());
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = with_suffix(path, ".tmp");

    let to_write_error = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&tmp, bytes).await.map_err(to_write_error)?;
    tokio::fs::rename(&tmp, path).await.map_err(to_write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{NewTimer, TimerCategory};

    fn sample() -> Vec<Timer> {
        vec![
            Timer::new(NewTimer::new("Mash", TimerCategory::Mashing, 3600)).unwrap(),
            Timer::new(NewTimer::new("Bittering hops", TimerCategory::Hopping, 3000)).unwrap(),
        ]
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::spawn(dir.path().join("timers.json"));
        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_saved_set_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        let timers = sample();

        let store = JsonFileStore::spawn(&path);
        store.save(&timers);
        store.flush().await;

        let reopened = JsonFileStore::spawn(&path);
        assert_eq!(reopened.load(), timers);
    }

    #[tokio::test]
    async fn test_writes_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::spawn(dir.path().join("timers.json"));
        let timers = sample();

        store.save(&timers);
        store.save(&timers[..1]);
        store.save(&[]);
        store.flush().await;

        assert!(store.load().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::spawn(&path);
        assert!(store.load().is_empty());
        assert!(!path.exists());
        assert_eq!(std::fs::read(store.corrupt_path()).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn test_save_after_corrupt_load_keeps_the_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonFileStore::spawn(&path);
        assert!(store.load().is_empty());
        store.save(&[]);
        store.flush().await;

        assert!(store.load().is_empty());
        assert_eq!(std::fs::read(store.corrupt_path()).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn test_unknown_version_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timers.json");
        std::fs::write(
            &path,
            br#"{"version":99,"saved_at":"2024-01-01T00:00:00Z","timers":[]}"#,
        )
        .unwrap();

        let store = JsonFileStore::spawn(&path);
        assert!(store.load().is_empty());
        assert!(store.corrupt_path().exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::spawn(dir.path().join("timers.json"));
        assert!(store.load().is_empty());
        assert!(!store.corrupt_path().exists());
    }
}
