//! Pending authorization states held on the client between the redirect to
//! the provider and the callback.
//!
//! One entry per platform under `oauth_state_<platform>`. Starting a new flow
//! for a platform overwrites the previous entry, so only the most recent
//! attempt can complete.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::platforms::Platform;

pub const DEFAULT_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub platform: Platform,
    pub state: String,
    pub issued_at: DateTime<Utc>,
}

/// Key/value storage for pending states. Best-effort, like browser local
/// storage: failures are logged by implementations and never surfaced.
pub trait PendingStateStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingStateStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// A JSON object on disk, one field per key. Survives process restarts the
/// way local storage survives a full-page navigation.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> HashMap<String, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read state file: {e}");
                return HashMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Discarding unreadable state file: {e}");
            HashMap::new()
        })
    }

    fn save(&self, entries: &HashMap<String, String>) {
        let result = serde_json::to_string_pretty(entries)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(&self.path, json));
        if let Err(e) = result {
            warn!(path = %self.path.display(), "Failed to write state file: {e}");
        }
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) {
        let Ok(_guard) = self.lock.lock() else {
            return;
        };
        let mut entries = self.load();
        f(&mut entries);
        self.save(&entries);
    }
}

impl PendingStateStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().ok()?;
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: String) {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }
}

/// Result of comparing a callback's state with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMatch {
    Matched,
    /// Same value, but older than the TTL.
    Expired,
    Mismatched,
    Missing,
}

#[derive(Clone)]
pub struct StateTokenManager {
    storage: Arc<dyn PendingStateStorage>,
    ttl: chrono::Duration,
}

impl StateTokenManager {
    pub fn new(storage: Arc<dyn PendingStateStorage>) -> Self {
        Self {
            storage,
            ttl: chrono::Duration::seconds(DEFAULT_STATE_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn storage_key(platform: Platform) -> String {
        format!("oauth_state_{platform}")
    }

    /// Remember `state` as the only live attempt for `platform`.
    pub fn issue(&self, platform: Platform, state: &str) {
        self.issue_at(platform, state, Utc::now());
    }

    pub fn issue_at(&self, platform: Platform, state: &str, now: DateTime<Utc>) {
        let pending = PendingAuthorization {
            platform,
            state: state.to_string(),
            issued_at: now,
        };
        match serde_json::to_string(&pending) {
            Ok(json) => self.storage.set(&Self::storage_key(platform), json),
            Err(e) => warn!(%platform, "Failed to encode pending state: {e}"),
        }
    }

    pub fn pending(&self, platform: Platform) -> Option<PendingAuthorization> {
        let raw = self.storage.get(&Self::storage_key(platform))?;
        match serde_json::from_str(&raw) {
            Ok(pending) => Some(pending),
            Err(e) => {
                debug!(%platform, "Ignoring malformed pending state: {e}");
                None
            }
        }
    }

    pub fn inspect(&self, platform: Platform, candidate: &str) -> StateMatch {
        self.inspect_at(platform, candidate, Utc::now())
    }

    pub fn inspect_at(&self, platform: Platform, candidate: &str, now: DateTime<Utc>) -> StateMatch {
        let Some(pending) = self.pending(platform) else {
            return StateMatch::Missing;
        };
        if pending.state != candidate {
            return StateMatch::Mismatched;
        }
        if now - pending.issued_at > self.ttl {
            return StateMatch::Expired;
        }
        StateMatch::Matched
    }

    /// True iff `candidate` is the live, unexpired state for `platform`.
    /// The entry is deleted only on a match.
    pub fn consume(&self, platform: Platform, candidate: &str) -> bool {
        self.consume_at(platform, candidate, Utc::now())
    }

    pub fn consume_at(&self, platform: Platform, candidate: &str, now: DateTime<Utc>) -> bool {
        if self.inspect_at(platform, candidate, now) != StateMatch::Matched {
            return false;
        }
        self.storage.remove(&Self::storage_key(platform));
        true
    }
}
