//! # Actions
//!
//! Everything that can happen in a chat session becomes an `Action`.
//! User presses Enter? That's `Action::Submit`.
//! History fetch finishes? That's `Action::HistoryLoaded { .. }`.
//!
//! `update()` applies an action to the [`ThreadSession`] and returns an
//! [`Effect`] describing the I/O the adapter must perform. Sends over the
//! socket are fire-and-forget and happen inside the session; anything
//! that has to be awaited comes back out as an effect.
//!
//! ```text
//! Session + Action  →  update()  →  Effect (FetchHistory, Quit, ...)
//! ```

use log::debug;

use crate::api::{ApiError, DirectoryId, MessageId, ThreadHistory};
use crate::core::session::{Activation, ThreadSession};

#[derive(Debug)]
pub enum Action {
    OpenThread(DirectoryId),
    CloseThread,
    HistoryLoaded {
        thread_id: DirectoryId,
        result: Result<ThreadHistory, ApiError>,
    },
    /// New composer contents.
    InputChanged(String),
    Blur,
    Submit,
    ReplyTo(Option<MessageId>),
    DismissNotice,
    /// Drain frames queued on the socket subscription.
    Inbound,
    /// Fire due timers.
    Tick,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Thread opened without cached state; fetch its history.
    FetchHistory(DirectoryId),
    /// Thread opened from cache.
    ThreadOpened(DirectoryId),
    Quit,
}

pub fn update(session: &mut ThreadSession, action: Action) -> Effect {
    match action {
        Action::OpenThread(thread_id) => match session.activate(thread_id) {
            Activation::NeedsFetch => Effect::FetchHistory(thread_id),
            Activation::FromCache => Effect::ThreadOpened(thread_id),
            Activation::AlreadyActive => Effect::None,
        },
        Action::CloseThread => {
            session.deactivate();
            Effect::None
        }
        Action::HistoryLoaded { thread_id, result } => {
            session.history_loaded(thread_id, result);
            Effect::None
        }
        Action::InputChanged(draft) => {
            session.input_changed(draft);
            Effect::None
        }
        Action::Blur => {
            session.blur();
            Effect::None
        }
        Action::Submit => {
            if !session.submit() {
                debug!("Nothing to submit");
            }
            Effect::None
        }
        Action::ReplyTo(target) => {
            session.set_reply_target(target);
            Effect::None
        }
        Action::DismissNotice => {
            session.dismiss_notice();
            Effect::None
        }
        Action::Inbound => {
            session.poll_inbound();
            Effect::None
        }
        Action::Tick => {
            session.tick();
            Effect::None
        }
        Action::Quit => {
            // Leaving the thread flushes a pending stop_typing.
            session.deactivate();
            Effect::Quit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DirectoryNode, NodeKind};
    use crate::core::cache::ThreadCache;
    use crate::core::timer::ManualClock;
    use crate::test_support::{RecordingTransport, message};
    use crate::transport::ClientMessage;
    use std::sync::Arc;

    fn setup() -> (ThreadSession, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let session = ThreadSession::new(
            transport.clone(),
            ThreadCache::default(),
            Arc::new(ManualClock::new()),
            "me",
        );
        (session, transport)
    }

    fn loaded(thread_id: DirectoryId) -> Action {
        Action::HistoryLoaded {
            thread_id,
            result: Ok(ThreadHistory {
                nodes: vec![DirectoryNode {
                    id: thread_id,
                    name: "general".into(),
                    kind: NodeKind::Thread,
                    parent_id: None,
                }],
                messages: vec![message(1, "ann", 0)],
            }),
        }
    }

    #[test]
    fn test_open_thread_requests_fetch_once() {
        let (mut session, _) = setup();
        assert_eq!(update(&mut session, Action::OpenThread(1)), Effect::FetchHistory(1));
        assert_eq!(update(&mut session, Action::OpenThread(1)), Effect::None);
    }

    #[test]
    fn test_reopen_comes_from_cache() {
        let (mut session, _) = setup();
        update(&mut session, Action::OpenThread(1));
        update(&mut session, loaded(1));
        update(&mut session, Action::OpenThread(2));
        assert_eq!(update(&mut session, Action::OpenThread(1)), Effect::ThreadOpened(1));
    }

    #[test]
    fn test_type_and_submit() {
        let (mut session, transport) = setup();
        update(&mut session, Action::OpenThread(1));
        update(&mut session, loaded(1));
        update(&mut session, Action::InputChanged("hi".into()));
        assert_eq!(update(&mut session, Action::Submit), Effect::None);

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[2], ClientMessage::CreateMessage(_)));
    }

    #[test]
    fn test_quit_flushes_typing() {
        let (mut session, transport) = setup();
        update(&mut session, Action::OpenThread(1));
        update(&mut session, Action::InputChanged("hi".into()));
        assert_eq!(update(&mut session, Action::Quit), Effect::Quit);
        assert_eq!(
            transport.sent().last(),
            Some(&ClientMessage::StopTyping { thread_id: 1 })
        );
        assert_eq!(session.active_thread(), None);
    }
}
