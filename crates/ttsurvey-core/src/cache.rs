//! Resumable local cache of session state.
//!
//! The full `{participant, survey state, last updated}` tuple is stored as
//! JSON under `phonikud-survey-{session_id}`. Loading never fails: corrupt
//! entries are logged and reported as a miss so the caller starts fresh.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::model::{Participant, SurveyState};
use crate::traits::KeyValueStorage;

/// Prefix of every cache key.
pub const CACHE_KEY_PREFIX: &str = "phonikud-survey-";

/// Default debounce between a state change and the cache write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Cache key for a session.
pub fn cache_key(session_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{session_id}")
}

/// What gets written to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub user_data: Participant,
    pub survey_state: SurveyState,
    pub last_updated: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(user_data: Participant, survey_state: SurveyState) -> Self {
        Self {
            user_data,
            survey_state,
            last_updated: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage backends
// ---------------------------------------------------------------------------

/// In-process storage. Used by tests and by the `memory` store config.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> std::io::Result<Option<String>> {
        Ok(self.items.lock().unwrap().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> std::io::Result<()> {
        self.items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> std::io::Result<()> {
        self.items.lock().unwrap().remove(key);
        Ok(())
    }

    fn keys(&self) -> std::io::Result<Vec<String>> {
        Ok(self.items.lock().unwrap().keys().cloned().collect())
    }
}

/// One `<key>.json` file per entry in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_file_stem(key)))
    }
}

/// Escape a key into a file stem. Bytes outside `[A-Za-z0-9_-]` become
/// `%XX`, so distinct keys always get distinct files.
fn encode_file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{byte:02X}"));
        }
    }
    stem
}

/// Inverse of [`encode_file_stem`]. `None` for stems it could not have produced.
fn decode_file_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = tail.get(..2)?;
            let hex = std::str::from_utf8(hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        // Write to a sibling file and rename so a crash never leaves half a blob.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(tmp, path)
    }

    fn remove_item(&self, key: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn keys(&self) -> std::io::Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(key) = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(decode_file_stem)
                {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// Session cache
// ---------------------------------------------------------------------------

/// Save/load/clear of whole session snapshots.
#[derive(Clone)]
pub struct SessionCache {
    storage: Arc<dyn KeyValueStorage>,
}

impl SessionCache {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }

    pub fn save(&self, session_id: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let json = serde_json::to_string(entry)?;
        self.storage.set_item(&cache_key(session_id), &json)?;
        tracing::trace!(session_id, "saved session to cache");
        Ok(())
    }

    /// Load a session snapshot. Missing, unreadable or corrupt → `None`.
    pub fn load(&self, session_id: &str) -> Option<CacheEntry> {
        let key = cache_key(session_id);
        let raw = match self.storage.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(key = %key, "error reading cache: {e}");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.user_data.session_id == session_id => Some(entry),
            Ok(entry) => {
                tracing::error!(
                    key = %key,
                    found = %entry.user_data.session_id,
                    "cache entry belongs to a different session"
                );
                None
            }
            Err(e) => {
                tracing::error!(key = %key, "error loading from cache: {e}");
                None
            }
        }
    }

    /// Remove a session's entry. Failures are logged, not returned.
    pub fn clear(&self, session_id: &str) {
        if let Err(e) = self.storage.remove_item(&cache_key(session_id)) {
            tracing::warn!(session_id, "failed to clear cached session: {e}");
        }
    }

    /// Most recently updated session that has not been completed.
    pub fn latest_incomplete(&self) -> Option<CacheEntry> {
        let keys = match self.storage.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("error listing cache: {e}");
                return None;
            }
        };

        keys.iter()
            .filter_map(|k| k.strip_prefix(CACHE_KEY_PREFIX))
            .filter_map(|session_id| self.load(session_id))
            .filter(|entry| !entry.survey_state.is_complete)
            .max_by_key(|entry| entry.last_updated)
    }
}

// ---------------------------------------------------------------------------
// Debounced auto-save
// ---------------------------------------------------------------------------

struct Pending {
    entry: CacheEntry,
    due: Instant,
}

/// Coalesces rapid state changes into one cache write per debounce window.
///
/// `schedule` replaces any pending snapshot and restarts the window; `poll`
/// writes once the window has elapsed; `flush` writes immediately and is
/// what callers use before exiting.
pub struct AutoSave {
    cache: SessionCache,
    delay: Duration,
    pending: Option<Pending>,
}

impl AutoSave {
    pub fn new(cache: SessionCache, delay: Duration) -> Self {
        Self {
            cache,
            delay,
            pending: None,
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn schedule(&mut self, entry: CacheEntry, now: Instant) {
        self.pending = Some(Pending {
            entry,
            due: now + self.delay,
        });
    }

    /// Write the pending snapshot if its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match &self.pending {
            Some(p) if p.due <= now => self.flush(),
            _ => false,
        }
    }

    /// Write the pending snapshot now. Returns `true` if something was saved.
    ///
    /// A failed write stays pending so the next poll or flush retries it.
    pub fn flush(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let session_id = pending.entry.user_data.session_id.clone();
        match self.cache.save(&session_id, &pending.entry) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(session_id, "error saving to cache: {e}");
                self.pending = Some(pending);
                false
            }
        }
    }

    /// Drop any pending write (used once the session's entry is cleared).
    pub fn discard(&mut self) {
        self.pending = None;
    }
}
