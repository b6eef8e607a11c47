//! # Local State
//!
//! Remembers the last opened thread in `~/.murmur/state.json` so the next
//! launch can reopen it.
//!
//! Writes use atomic rename (write `.tmp`, then `rename()`) for crash safety.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::api::DirectoryId;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct LocalState {
    pub last_thread: Option<DirectoryId>,
    /// Unix seconds of the last write.
    #[serde(default)]
    pub updated_at: i64,
}

/// Returns `~/.murmur/state.json`.
pub fn state_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".murmur").join("state.json"))
}

/// Atomically write `data` as JSON to `path` (via `.tmp` + rename).
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn load_state_from(path: &Path) -> io::Result<LocalState> {
    if !path.exists() {
        return Ok(LocalState::default());
    }
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn save_last_thread_to(path: &Path, thread_id: DirectoryId) -> io::Result<()> {
    let mut state = load_state_from(path).unwrap_or_default();
    state.last_thread = Some(thread_id);
    state.updated_at = Utc::now().timestamp();
    atomic_write_json(path, &state)
}

/// Reads the last opened thread id, if any.
pub fn load_last_thread() -> Option<DirectoryId> {
    let path = state_path()?;
    match load_state_from(&path) {
        Ok(state) => state.last_thread,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

/// Persists the active thread id. Failures are logged, not surfaced.
pub fn save_last_thread(thread_id: DirectoryId) {
    let Some(path) = state_path() else {
        warn!("Could not determine home directory, not saving last thread");
        return;
    };
    match save_last_thread_to(&path, thread_id) {
        Ok(()) => debug!("Saved last thread: {}", thread_id),
        Err(e) => warn!("Failed to save last thread: {}", e),
    }
}
