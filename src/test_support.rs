//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde_json::json;
use tokio::sync::broadcast;

use crate::api::{DirectoryId, Message, MessageId};
use crate::transport::{ClientMessage, Envelope, Transport, TransportError};

/// Directory used by [`message`] and [`reply`].
pub const THREAD: DirectoryId = 1;

/// A transport that records what was sent and lets tests inject frames.
pub struct RecordingTransport {
    sent: Mutex<Vec<ClientMessage>>,
    inbound: broadcast::Sender<Envelope>,
    closed: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(64);
        Self {
            sent: Mutex::new(Vec::new()),
            inbound,
            closed: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Delivers an envelope to every current subscriber.
    pub fn emit(&self, env: Envelope) {
        let _ = self.inbound.send(env);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inbound.receiver_count()
    }

    /// While closed, `send` fails with `TransportError::Closed`.
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inbound.subscribe()
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
}

/// A top-level message in [`THREAD`], `secs` seconds after a fixed base time.
pub fn message(id: MessageId, author: &str, secs: i64) -> Message {
    message_in(id, author, secs, THREAD)
}

pub fn message_in(id: MessageId, author: &str, secs: i64, directory_id: DirectoryId) -> Message {
    Message {
        id,
        content: format!("message {id}"),
        author: author.to_string(),
        directory_id,
        created_at: base_time() + TimeDelta::seconds(secs),
        parent_id: None,
    }
}

pub fn reply(id: MessageId, author: &str, secs: i64, parent: MessageId) -> Message {
    Message {
        parent_id: Some(parent),
        ..message(id, author, secs)
    }
}

pub fn message_created_env(message: &Message) -> Envelope {
    Envelope {
        module: "messages".into(),
        kind: "message_created".into(),
        payload: serde_json::to_value(message).unwrap(),
    }
}

pub fn typing_env(username: &str, thread_id: DirectoryId) -> Envelope {
    Envelope {
        module: "messages".into(),
        kind: "user_typing".into(),
        payload: json!({"username": username, "thread_id": thread_id}),
    }
}

pub fn stopped_typing_env(username: &str, thread_id: DirectoryId) -> Envelope {
    Envelope {
        module: "messages".into(),
        kind: "user_stopped_typing".into(),
        payload: json!({"username": username, "thread_id": thread_id}),
    }
}
