pub mod client;
pub mod types;

pub use client::{ApiError, ChatApi, HttpApi, ThreadHistory, login};
pub use types::{AuthResponse, DirectoryId, DirectoryNode, Message, MessageId, NewMessage, NodeKind, User};
