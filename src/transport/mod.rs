pub mod channel;
pub mod types;

pub use channel::{ConnectionState, ReconnectPolicy, Transport, TransportError, WsChannel};
pub use types::{ClientMessage, Envelope, FrameError, ServerMessage, UserTypingPayload, parse_frame};
