//! # Thread Cache
//!
//! Keeps the message state of threads the viewer has left so re-opening
//! one is instant. Entries never go stale on their own (live messages for
//! cached threads are applied in place); they are dropped when unused for
//! longer than the horizon, or least-recently-used first when the cache
//! is full.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::api::{DirectoryId, Message};
use crate::core::store::ThreadMessages;

pub const DEFAULT_GC_HORIZON: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_THREADS: usize = 32;

#[derive(Debug)]
struct CacheEntry {
    messages: ThreadMessages,
    last_used: Instant,
}

#[derive(Debug)]
pub struct ThreadCache {
    horizon: Duration,
    capacity: usize,
    entries: HashMap<DirectoryId, CacheEntry>,
}

impl Default for ThreadCache {
    fn default() -> Self {
        Self::new(DEFAULT_GC_HORIZON, DEFAULT_MAX_THREADS)
    }
}

impl ThreadCache {
    pub fn new(horizon: Duration, capacity: usize) -> Self {
        Self {
            horizon,
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, thread_id: DirectoryId) -> bool {
        self.entries.contains_key(&thread_id)
    }

    /// Removes a thread to reopen it. Expired entries are dropped instead.
    pub fn take(&mut self, thread_id: DirectoryId, now: Instant) -> Option<ThreadMessages> {
        let horizon = self.horizon;
        let expired = self
            .entries
            .get(&thread_id)
            .is_some_and(|entry| now.saturating_duration_since(entry.last_used) > horizon);
        if expired {
            debug!("Cache entry for thread {} expired", thread_id);
            self.entries.remove(&thread_id);
            return None;
        }

        self.entries.remove(&thread_id).map(|entry| entry.messages)
    }

    pub fn insert(&mut self, thread_id: DirectoryId, messages: ThreadMessages, now: Instant) {
        self.entries.insert(
            thread_id,
            CacheEntry {
                messages,
                last_used: now,
            },
        );
        while self.entries.len() > self.capacity {
            if !self.evict_least_recent() {
                break;
            }
        }
    }

    /// Applies a live message to the cached thread it belongs to, if any.
    /// Does not count as use.
    pub fn apply(&mut self, message: Message) -> bool {
        match self.entries.get_mut(&message.directory_id) {
            Some(entry) => entry.messages.append(message),
            None => false,
        }
    }

    /// Drops every entry unused for longer than the horizon.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let horizon = self.horizon;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_used) <= horizon);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("Evicted {} expired thread(s) from cache", evicted);
        }
        evicted
    }

    fn evict_least_recent(&mut self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                debug!("Cache full, evicting thread {}", id);
                self.entries.remove(&id);
                true
            }
            None => false,
        }
    }
}
