//! # Message Store
//!
//! The local view of one thread: every message by id plus the derived
//! grouping, built once from fetched history and then extended one live
//! message at a time.
//!
//! ```text
//! ThreadMessages                          (owned by the session or cache)
//! ├── index: HashMap<MessageId, Arc<Entry>>
//! ├── anchor: Option<Arc<Entry>>          // first message of the last group
//! └── snapshot: ThreadSnapshot            (handed to renderers)
//!     └── tail ─► Entry ─► Entry ─► … ─► Entry   // newest to oldest
//! ```
//!
//! Entries are immutable and linked newest to oldest, so an append pushes
//! one entry on the tail and every earlier snapshot keeps pointing at the
//! chain it saw. Taking a snapshot is a pointer copy.
//!
//! Appends are positional. A late message with an older `created_at` still
//! lands at the tail; the live stream is assumed to arrive in creation
//! order. Appending an id that is already present is a no-op, which makes
//! replayed frames after a reconnect harmless.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::api::{Message, MessageId};
use crate::core::grouping::should_group;

struct Entry {
    message: Message,
    starts_group: bool,
    prev: Option<Arc<Entry>>,
}

impl Drop for Entry {
    // Unlink iteratively; a long chain would otherwise drop recursively.
    fn drop(&mut self) {
        let mut prev = self.prev.take();
        while let Some(entry) = prev {
            prev = Arc::into_inner(entry).and_then(|mut entry| entry.prev.take());
        }
    }
}

/// Immutable, cheaply cloned view of a thread's messages.
#[derive(Clone, Default)]
pub struct ThreadSnapshot {
    tail: Option<Arc<Entry>>,
    len: usize,
    group_count: usize,
}

impl ThreadSnapshot {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Oldest first.
    fn entries(&self) -> Vec<&Entry> {
        let mut entries = Vec::with_capacity(self.len);
        let mut cursor = self.tail.as_deref();
        while let Some(entry) = cursor {
            entries.push(entry);
            cursor = entry.prev.as_deref();
        }
        entries.reverse();
        entries
    }

    /// Messages in display order.
    pub fn messages(&self) -> Vec<&Message> {
        self.entries().into_iter().map(|e| &e.message).collect()
    }

    /// Groups resolved to messages, for rendering.
    pub fn groups(&self) -> Vec<Vec<&Message>> {
        let mut groups: Vec<Vec<&Message>> = Vec::with_capacity(self.group_count);
        for entry in self.entries() {
            match groups.last_mut() {
                Some(group) if !entry.starts_group => group.push(&entry.message),
                _ => groups.push(vec![&entry.message]),
            }
        }
        groups
    }

    /// Group ids in display order.
    pub fn group_ids(&self) -> Vec<Vec<MessageId>> {
        self.groups()
            .into_iter()
            .map(|group| group.into_iter().map(|m| m.id).collect())
            .collect()
    }

    /// All ids in display order.
    pub fn ordered_ids(&self) -> Vec<MessageId> {
        self.entries().into_iter().map(|e| e.message.id).collect()
    }

    /// True if this snapshot is `earlier` plus zero or more appended
    /// messages, sharing its entries rather than copies of them.
    pub fn extends(&self, earlier: &ThreadSnapshot) -> bool {
        if earlier.len > self.len {
            return false;
        }
        let mut cursor = self.tail.as_ref();
        for _ in earlier.len..self.len {
            cursor = cursor.and_then(|entry| entry.prev.as_ref());
        }
        match (cursor, earlier.tail.as_ref()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl PartialEq for ThreadSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self.group_count == other.group_count
            && (self.extends(other) || self.groups() == other.groups())
    }
}

impl fmt::Debug for ThreadSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.group_ids()).finish()
    }
}

#[derive(Clone, Default)]
pub struct ThreadMessages {
    index: HashMap<MessageId, Arc<Entry>>,
    anchor: Option<Arc<Entry>>,
    snapshot: ThreadSnapshot,
}

impl ThreadMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions history (ordered by `created_at` ascending) into groups in one pass.
    pub fn from_history(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut state = Self::new();
        for message in messages {
            state.append(message);
        }
        state
    }

    /// Adds a message at the tail. Returns `false` if the id was already present.
    pub fn append(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            return false;
        }

        let starts_group = !self
            .anchor
            .as_ref()
            .is_some_and(|anchor| should_group(&anchor.message, &message));

        let id = message.id;
        let entry = Arc::new(Entry {
            message,
            starts_group,
            prev: self.snapshot.tail.take(),
        });
        if starts_group {
            self.anchor = Some(Arc::clone(&entry));
            self.snapshot.group_count += 1;
        }
        self.index.insert(id, Arc::clone(&entry));
        self.snapshot.tail = Some(entry);
        self.snapshot.len += 1;
        true
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.index.get(&id).map(|entry| &entry.message)
    }

    pub fn len(&self) -> usize {
        self.snapshot.len
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// The current contents. Clone it to hand it to a renderer.
    pub fn snapshot(&self) -> &ThreadSnapshot {
        &self.snapshot
    }
}

impl PartialEq for ThreadMessages {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot == other.snapshot
    }
}

impl fmt::Debug for ThreadMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadMessages")
            .field("groups", &self.snapshot)
            .finish()
    }
}
