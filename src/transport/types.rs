//! Socket frame model.
//!
//! Every frame is a JSON envelope `{module, type, payload}`. Outgoing frames
//! are built from [`ClientMessage`]; incoming envelopes are decoded into
//! [`ServerMessage`] by the session controller. Envelopes for modules or
//! types we don't know decode to `None` so newer servers don't break us.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::api::{DirectoryId, Message, NewMessage, User};

/// Module that owns typing and message traffic.
pub const MESSAGES_MODULE: &str = "messages";
/// Older servers broadcast messaging events under this name.
const MESSAGING_MODULE_ALIAS: &str = "messaging";
const USERS_MODULE: &str = "users";
const SYSTEM_MODULE: &str = "system";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub module: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(
        module: impl Into<String>,
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            module: module.into(),
            kind: kind.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    fn payload<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| FrameError::Payload {
            kind: self.kind.clone(),
            message: e.to_string(),
        })
    }
}

/// Errors decoding an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Not a JSON envelope at all.
    Json(String),
    /// Known type, but the payload has the wrong shape.
    Payload { kind: String, message: String },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Json(msg) => write!(f, "malformed frame: {msg}"),
            FrameError::Payload { kind, message } => {
                write!(f, "bad payload for '{kind}': {message}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingPayload {
    pub thread_id: DirectoryId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserTypingPayload {
    pub username: String,
    pub thread_id: DirectoryId,
}

/// Client → server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Typing { thread_id: DirectoryId },
    StopTyping { thread_id: DirectoryId },
    CreateMessage(NewMessage),
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Typing { .. } => "typing",
            ClientMessage::StopTyping { .. } => "stop_typing",
            ClientMessage::CreateMessage(_) => "create_message",
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            ClientMessage::Typing { thread_id } | ClientMessage::StopTyping { thread_id } => {
                Envelope::new(
                    MESSAGES_MODULE,
                    self.kind(),
                    &TypingPayload {
                        thread_id: *thread_id,
                    },
                )
            }
            ClientMessage::CreateMessage(body) => Envelope::new(MESSAGES_MODULE, self.kind(), body),
        }
    }

    /// Serializes to the JSON text sent over the socket.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }
}

/// Server → client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    UserTyping(UserTypingPayload),
    UserStoppedTyping(UserTypingPayload),
    MessageCreated(Message),
    UserCreated(User),
    Error(String),
}

impl ServerMessage {
    /// Decodes a known envelope. Unknown module/type pairs yield `Ok(None)`.
    pub fn from_envelope(env: &Envelope) -> Result<Option<Self>, FrameError> {
        let module = env.module.as_str();
        let is_messaging = module == MESSAGES_MODULE || module == MESSAGING_MODULE_ALIAS;

        let decoded = match (env.kind.as_str(), is_messaging) {
            ("user_typing", true) => ServerMessage::UserTyping(env.payload()?),
            ("user_stopped_typing", true) => ServerMessage::UserStoppedTyping(env.payload()?),
            ("message_created", true) => ServerMessage::MessageCreated(env.payload()?),
            ("user_created", _) if module == USERS_MODULE => {
                ServerMessage::UserCreated(env.payload()?)
            }
            ("error", _) if module == SYSTEM_MODULE || is_messaging => {
                ServerMessage::Error(match &env.payload {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            }
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }
}

/// Parses the raw socket text into an envelope.
pub fn parse_frame(text: &str) -> Result<Envelope, FrameError> {
    serde_json::from_str(text).map_err(|e| FrameError::Json(e.to_string()))
}
