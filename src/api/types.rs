//! Wire data model shared by the REST client and the socket envelopes.
//!
//! Field names follow the server's JSON. `Message::author` is sent as
//! `author_username`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = i64;
pub type DirectoryId = i64;

/// A chat message as stored by the server. Immutable once received.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    #[serde(rename = "author_username")]
    pub author: String,
    pub directory_id: DirectoryId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_id: Option<MessageId>,
}

/// Body of a `create_message` request. The server assigns id, author and timestamp.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub directory_id: DirectoryId,
    pub parent_id: Option<MessageId>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Thread,
}

/// One entry in the folder/thread tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    pub id: DirectoryId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub parent_id: Option<DirectoryId>,
}

impl DirectoryNode {
    pub fn is_thread(&self) -> bool {
        self.kind == NodeKind::Thread
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub name: String,
}

/// Response of `POST /login`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}
