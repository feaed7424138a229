//! Persistent storage for tracking sessions.
//!
//! Persistence is best-effort: the controller logs store failures and
//! carries on. [`JsonSessionStore`] keeps one JSON document per session
//! under `<data_dir>/sessions/<id>.json`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::feed::BoxFuture;
use crate::types::TrackingSession;

/// Errors raised by session stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a file failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A session could not be serialized.
    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A stored session could not be parsed.
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Receives session lifecycle records.
pub trait SessionStore: Send + Sync {
    /// Records a newly started session.
    fn create(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>>;

    /// Records the latest state of an active session.
    fn update(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>>;

    /// Records a session that reached a terminal status.
    fn end(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>>;
}

/// Store that keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSessionStore;

impl SessionStore for NoopSessionStore {
    fn create(&self, _session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn update(&self, _session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn end(&self, _session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// File-backed store writing pretty JSON per session.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    data_dir: PathBuf,
}

impl JsonSessionStore {
    /// Create a new store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of this store.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load one session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self, id: Uuid) -> StoreResult<Option<TrackingSession>> {
        let path = self.session_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|source| StoreError::Parse { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    /// Load all stored sessions, newest first.
    ///
    /// Files that fail to parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions directory cannot be listed.
    pub async fn list(&self) -> StoreResult<Vec<TrackingSession>> {
        let dir = self.sessions_dir();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut sessions = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: dir.clone(),
                        source,
                    })
                }
            };

            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match tokio::fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<TrackingSession>(&content) {
                    Ok(session) => sessions.push(session),
                    Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable session file"),
                },
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }

        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn write(&self, session: &TrackingSession) -> StoreResult<()> {
        let dir = self.sessions_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = self.session_path(session.id);
        let content = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.sessions_dir().join(format!("{id}.json"))
    }
}

impl SessionStore for JsonSessionStore {
    fn create(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.write(&session).await })
    }

    fn update(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.write(&session).await })
    }

    fn end(&self, session: TrackingSession) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move { self.write(&session).await })
    }
}

/// Default data directory for the current platform.
///
/// On Linux: `/var/lib/bustrack/`
/// Elsewhere: the platform data directory, e.g. `~/Library/Application Support/bustrack/`
#[must_use]
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/var/lib/bustrack")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "bustrack")
            .map_or_else(|| PathBuf::from("./data"), |dirs| dirs.data_dir().to_path_buf())
    }
}
