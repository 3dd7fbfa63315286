//! Per-session workspace directories with idle-TTL eviction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Session ids must stay within one path segment.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Manages workspace directories keyed by session id.
pub struct SessionWorkspaces {
    root: PathBuf,
    ttl: Duration,
    last_used: Mutex<HashMap<String, Instant>>,
}

impl SessionWorkspaces {
    pub fn new(root: PathBuf, ttl: Duration) -> Self {
        SessionWorkspaces {
            root,
            ttl,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a session, created on first use; refreshes the TTL.
    pub fn dir_for(&self, session_id: &str) -> std::io::Result<PathBuf> {
        let dir = self.root.join(session_id);
        std::fs::create_dir_all(&dir)?;
        self.last_used
            .lock()
            .unwrap()
            .insert(session_id.to_string(), Instant::now());
        Ok(dir)
    }

    /// Remove a session's workspace. No-op if it never existed.
    pub fn remove(&self, session_id: &str) -> std::io::Result<()> {
        self.last_used.lock().unwrap().remove(session_id);
        let dir = self.root.join(session_id);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            info!(session = session_id, "workspace removed");
        }
        Ok(())
    }

    /// Evict sessions idle past the TTL. Returns the evicted count.
    pub fn evict_idle(&self) -> usize {
        let expired: Vec<String> = {
            let last_used = self.last_used.lock().unwrap();
            last_used
                .iter()
                .filter(|(_, at)| at.elapsed() > self.ttl)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut evicted = 0;
        for id in expired {
            match self.remove(&id) {
                Ok(()) => evicted += 1,
                Err(e) => warn!(session = %id, error = %e, "eviction failed"),
            }
        }
        if evicted > 0 {
            debug!(evicted, "idle workspaces evicted");
        }
        evicted
    }
}
