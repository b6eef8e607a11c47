//! # Thread Session Controller
//!
//! Owns everything about the thread the viewer has open and reconciles it
//! with the socket, the REST fetch and navigation.
//!
//! ```text
//! ThreadSession
//! ├── transport: Arc<dyn Transport>    // send + subscribe
//! ├── cache: ThreadCache               // threads we left, kept warm
//! ├── clock: Arc<dyn Clock>            // drives the typing debounce
//! ├── active: Option<ActiveThread>
//! │   ├── load: LoadState<ThreadMessages> // Loading → Ready(store)
//! │   ├── pending: Vec<Message>        // live messages seen while loading
//! │   ├── typing: TypingSet            // other people typing here
//! │   ├── outgoing: OutgoingTyping     // our own typing state
//! │   ├── draft / reply_to             // composer
//! │   └── inbound: broadcast::Receiver // dropped on deactivate
//! └── view: watch::Sender<ThreadView>  // snapshot for the renderer
//! ```
//!
//! All mutation happens on the caller's thread, in the order frames and
//! input arrive. Every change publishes a fresh [`ThreadView`]; renderers
//! hold a `watch::Receiver` and redraw when it changes.
//!
//! History fetches are not awaited here. `activate()` says whether one is
//! needed and the runtime reports the result through `history_loaded()`,
//! which drops results for any thread that is no longer active.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::watch;

use crate::api::{ApiError, DirectoryId, Message, MessageId, NewMessage, ThreadHistory};
use crate::core::cache::ThreadCache;
use crate::core::presence::{OutgoingTyping, TYPING_IDLE_TIMEOUT, TypingSet, TypingSignal};
use crate::core::store::{ThreadMessages, ThreadSnapshot};
use crate::core::timer::Clock;
use crate::transport::{ClientMessage, Envelope, ServerMessage, Transport};

/// Where the open thread is in its lifecycle. The session holds the
/// mutable store; published views hold a snapshot of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState<T = ThreadSnapshot> {
    #[default]
    Loading,
    Ready(T),
    /// The directory node is missing or is a folder.
    NotFound,
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready(_))
    }
}

impl LoadState<ThreadMessages> {
    fn snapshot(&self) -> LoadState {
        match self {
            LoadState::Loading => LoadState::Loading,
            LoadState::Ready(messages) => LoadState::Ready(messages.snapshot().clone()),
            LoadState::NotFound => LoadState::NotFound,
            LoadState::Failed(e) => LoadState::Failed(e.clone()),
        }
    }
}

/// Non-fatal things worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// An `error` envelope from the server.
    ServerError(String),
    /// Someone else posted in a thread that isn't open.
    NewMessage {
        thread_id: DirectoryId,
        thread_name: Option<String>,
        author: String,
        content: String,
    },
    Unauthorized,
    LoadFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ServerError(msg) => write!(f, "Server error: {msg}"),
            Notice::NewMessage {
                thread_id,
                thread_name,
                author,
                content,
            } => match thread_name {
                Some(name) => write!(f, "#{name} - {author}: {content}"),
                None => write!(f, "#{thread_id} - {author}: {content}"),
            },
            Notice::Unauthorized => write!(f, "Session expired, please log in again"),
            Notice::LoadFailed(msg) => write!(f, "Could not load thread: {msg}"),
        }
    }
}

/// Immutable snapshot of what the renderer should show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadView {
    pub thread_id: Option<DirectoryId>,
    pub title: Option<String>,
    pub load: LoadState,
    pub typing: Vec<String>,
    pub draft: String,
    pub reply_to: Option<MessageId>,
    pub notice: Option<Notice>,
}

impl ThreadView {
    pub fn messages(&self) -> Option<&ThreadSnapshot> {
        match &self.load {
            LoadState::Ready(messages) => Some(messages),
            _ => None,
        }
    }
}

/// What `activate()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    AlreadyActive,
    FromCache,
    /// The caller must fetch history and report it via `history_loaded()`.
    NeedsFetch,
}

struct ActiveThread {
    id: DirectoryId,
    load: LoadState<ThreadMessages>,
    pending: Vec<Message>,
    typing: TypingSet,
    outgoing: OutgoingTyping,
    draft: String,
    reply_to: Option<MessageId>,
    inbound: broadcast::Receiver<Envelope>,
}

pub struct ThreadSession {
    username: String,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    cache: ThreadCache,
    typing_timeout: Duration,
    names: HashMap<DirectoryId, String>,
    active: Option<ActiveThread>,
    notice: Option<Notice>,
    view: watch::Sender<ThreadView>,
}

impl ThreadSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: ThreadCache,
        clock: Arc<dyn Clock>,
        username: impl Into<String>,
    ) -> Self {
        let (view, _) = watch::channel(ThreadView::default());
        Self {
            username: username.into(),
            transport,
            clock,
            cache,
            typing_timeout: TYPING_IDLE_TIMEOUT,
            names: HashMap::new(),
            active: None,
            notice: None,
            view,
        }
    }

    pub fn with_typing_timeout(mut self, timeout: Duration) -> Self {
        self.typing_timeout = timeout;
        self
    }

    /// A receiver that sees every published snapshot.
    pub fn watch(&self) -> watch::Receiver<ThreadView> {
        self.view.subscribe()
    }

    /// The latest snapshot.
    pub fn view(&self) -> ThreadView {
        self.view.borrow().clone()
    }

    pub fn active_thread(&self) -> Option<DirectoryId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn is_typing(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.outgoing.is_typing())
    }

    pub fn cache(&self) -> &ThreadCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Opens a thread, leaving the current one first. Reopening a thread
    /// whose load failed fetches it again.
    pub fn activate(&mut self, thread_id: DirectoryId) -> Activation {
        if let Some(active) = self.active.as_mut().filter(|a| a.id == thread_id) {
            if !matches!(active.load, LoadState::Failed(_)) {
                return Activation::AlreadyActive;
            }
            info!("Retrying thread {}", thread_id);
            active.load = LoadState::Loading;
            active.pending.clear();
            self.publish();
            return Activation::NeedsFetch;
        }
        self.leave_active();

        let now = self.clock.now();
        self.cache.evict_expired(now);

        // Subscribe before fetching so nothing posted during the load is lost.
        let inbound = self.transport.subscribe();
        let (load, activation) = match self.cache.take(thread_id, now) {
            Some(messages) => (LoadState::Ready(messages), Activation::FromCache),
            None => (LoadState::Loading, Activation::NeedsFetch),
        };
        info!("Opened thread {} ({:?})", thread_id, activation);

        self.active = Some(ActiveThread {
            id: thread_id,
            load,
            pending: Vec::new(),
            typing: TypingSet::new(),
            outgoing: OutgoingTyping::new(self.typing_timeout),
            draft: String::new(),
            reply_to: None,
            inbound,
        });
        self.publish();
        activation
    }

    /// Closes the open thread: flushes `stop_typing`, caches its messages
    /// and unsubscribes.
    pub fn deactivate(&mut self) {
        if self.leave_active() {
            self.publish();
        }
    }

    fn leave_active(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        if let Some(signal) = active.outgoing.stop() {
            self.send_signal(active.id, signal);
        }
        if let LoadState::Ready(messages) = active.load {
            self.cache.insert(active.id, messages, self.clock.now());
        }
        info!("Left thread {}", active.id);
        true
    }

    /// Applies a finished history fetch. Returns false if it was discarded.
    pub fn history_loaded(
        &mut self,
        thread_id: DirectoryId,
        result: Result<ThreadHistory, ApiError>,
    ) -> bool {
        let Some(active) = self.active.as_mut().filter(|a| a.id == thread_id) else {
            debug!("Discarding history for thread {} (no longer open)", thread_id);
            return false;
        };
        if !matches!(active.load, LoadState::Loading) {
            debug!("Discarding history for thread {} (already loaded)", thread_id);
            return false;
        }

        match result {
            Ok(history) => match history.nodes.first() {
                Some(node) if node.is_thread() => {
                    self.names.insert(thread_id, node.name.clone());
                    let mut messages = ThreadMessages::from_history(history.messages);
                    for message in active.pending.drain(..) {
                        messages.append(message);
                    }
                    debug!(
                        "Thread {} loaded: {} messages in {} groups",
                        thread_id,
                        messages.len(),
                        messages.snapshot().group_count()
                    );
                    active.load = LoadState::Ready(messages);
                }
                _ => {
                    info!("Directory {} is not a thread", thread_id);
                    active.pending.clear();
                    active.load = LoadState::NotFound;
                }
            },
            Err(ApiError::Unauthorized) => {
                active.load = LoadState::Failed(ApiError::Unauthorized.to_string());
                self.notice = Some(Notice::Unauthorized);
            }
            Err(e) => {
                warn!("Failed to load thread {}: {}", thread_id, e);
                active.load = LoadState::Failed(e.to_string());
                self.notice = Some(Notice::LoadFailed(e.to_string()));
            }
        }
        self.publish();
        true
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Drains every envelope queued on the subscription, in delivery order.
    pub fn poll_inbound(&mut self) -> usize {
        let mut received = Vec::new();
        if let Some(active) = self.active.as_mut() {
            loop {
                match active.inbound.try_recv() {
                    Ok(env) => received.push(env),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!("Inbound subscription lagged, skipped {} frames", skipped);
                    }
                    Err(TryRecvError::Closed) => {
                        warn!("Transport closed the inbound subscription");
                        break;
                    }
                }
            }
        }

        let count = received.len();
        for env in &received {
            self.handle_envelope(env);
        }
        count
    }

    pub fn handle_envelope(&mut self, env: &Envelope) {
        match ServerMessage::from_envelope(env) {
            Ok(Some(message)) => self.handle_server_message(message),
            Ok(None) => debug!("Ignoring envelope {}/{}", env.module, env.kind),
            Err(e) => warn!("Ignoring envelope {}/{}: {}", env.module, env.kind, e),
        }
    }

    pub fn handle_server_message(&mut self, message: ServerMessage) {
        let changed = match message {
            ServerMessage::MessageCreated(message) => self.message_created(message),
            ServerMessage::UserTyping(p) => self.with_typing(p.thread_id, &p.username, true),
            ServerMessage::UserStoppedTyping(p) => {
                self.with_typing(p.thread_id, &p.username, false)
            }
            ServerMessage::UserCreated(user) => {
                debug!("User created: {}", user.username);
                false
            }
            ServerMessage::Error(text) => {
                warn!("Server error: {}", text);
                self.notice = Some(Notice::ServerError(text));
                true
            }
        };
        if changed {
            self.publish();
        }
    }

    fn message_created(&mut self, message: Message) -> bool {
        if let Some(active) = self.active.as_mut().filter(|a| a.id == message.directory_id) {
            return match &mut active.load {
                LoadState::Loading => {
                    if !active.pending.iter().any(|m| m.id == message.id) {
                        active.pending.push(message);
                    }
                    false
                }
                LoadState::Ready(messages) => {
                    let appended = messages.append(message);
                    if !appended {
                        debug!("Duplicate message ignored");
                    }
                    appended
                }
                LoadState::NotFound | LoadState::Failed(_) => false,
            };
        }

        let is_own = message.author == self.username;
        let thread_id = message.directory_id;
        let notice = (!is_own).then(|| Notice::NewMessage {
            thread_id,
            thread_name: self.names.get(&thread_id).cloned(),
            author: message.author.clone(),
            content: message.content.clone(),
        });
        if self.cache.apply(message) {
            debug!("Applied live message to cached thread {}", thread_id);
        }
        match notice {
            Some(notice) => {
                self.notice = Some(notice);
                true
            }
            None => false,
        }
    }

    fn with_typing(&mut self, thread_id: DirectoryId, username: &str, typing: bool) -> bool {
        if username == self.username {
            return false;
        }
        match self.active.as_mut().filter(|a| a.id == thread_id) {
            Some(active) if typing => active.typing.insert(username),
            Some(active) => active.typing.remove(username),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Composer
    // ------------------------------------------------------------------

    /// The composer text changed. Ignored unless the thread is loaded.
    pub fn input_changed(&mut self, draft: String) {
        let now = self.clock.now();
        let Some(active) = self.active.as_mut().filter(|a| a.load.is_ready()) else {
            return;
        };
        let signal = active.outgoing.input_changed(&draft, now);
        active.draft = draft;
        let thread_id = active.id;
        if let Some(signal) = signal {
            self.send_signal(thread_id, signal);
        }
        self.publish();
    }

    /// The composer lost focus.
    pub fn blur(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let thread_id = active.id;
        if let Some(signal) = active.outgoing.stop() {
            self.send_signal(thread_id, signal);
        }
    }

    /// Sets or clears the message being replied to. Only messages present
    /// in the open thread can be targeted.
    pub fn set_reply_target(&mut self, target: Option<MessageId>) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if let Some(id) = target {
            let known = matches!(&active.load, LoadState::Ready(m) if m.contains(id));
            if !known {
                debug!("Reply target {} not in thread {}", id, active.id);
                return false;
            }
        }
        active.reply_to = target;
        self.publish();
        true
    }

    /// Sends the draft. Blank drafts, and drafts for a thread that isn't
    /// loaded, are ignored.
    pub fn submit(&mut self) -> bool {
        let Some(active) = self.active.as_mut().filter(|a| a.load.is_ready()) else {
            return false;
        };
        if active.draft.trim().is_empty() {
            return false;
        }

        let thread_id = active.id;
        let stop = active.outgoing.stop();
        let body = NewMessage {
            content: std::mem::take(&mut active.draft),
            directory_id: thread_id,
            parent_id: active.reply_to.take(),
        };

        if let Some(signal) = stop {
            self.send_signal(thread_id, signal);
        }
        self.send(ClientMessage::CreateMessage(body));
        self.publish();
        true
    }

    // ------------------------------------------------------------------
    // Timers and notices
    // ------------------------------------------------------------------

    /// When `tick()` next has something to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.as_ref().and_then(|a| a.outgoing.deadline())
    }

    /// Fires due timers and sweeps the cache.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        if let Some(active) = self.active.as_mut() {
            let thread_id = active.id;
            if let Some(signal) = active.outgoing.poll(now) {
                self.send_signal(thread_id, signal);
            }
        }
        self.cache.evict_expired(now);
    }

    pub fn dismiss_notice(&mut self) {
        if self.notice.take().is_some() {
            self.publish();
        }
    }

    // ------------------------------------------------------------------

    fn send_signal(&self, thread_id: DirectoryId, signal: TypingSignal) {
        let message = match signal {
            TypingSignal::Start => ClientMessage::Typing { thread_id },
            TypingSignal::Stop => ClientMessage::StopTyping { thread_id },
        };
        self.send(message);
    }

    fn send(&self, message: ClientMessage) {
        if let Err(e) = self.transport.send(&message) {
            warn!("Failed to send {}: {}", message.kind(), e);
        }
    }

    fn publish(&self) {
        let view = match &self.active {
            Some(active) => ThreadView {
                thread_id: Some(active.id),
                title: self.names.get(&active.id).cloned(),
                load: active.load.snapshot(),
                typing: active.typing.users().to_vec(),
                draft: active.draft.clone(),
                reply_to: active.reply_to,
                notice: self.notice.clone(),
            },
            None => ThreadView {
                notice: self.notice.clone(),
                ..ThreadView::default()
            },
        };
        self.view.send_replace(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DirectoryNode, NodeKind};
    use crate::core::timer::ManualClock;
    use crate::test_support::{
        RecordingTransport, message, message_in, reply, stopped_typing_env, typing_env,
        message_created_env,
    };
    use serde_json::json;

    const ME: &str = "me";

    fn setup() -> (ThreadSession, Arc<RecordingTransport>, Arc<ManualClock>) {
        let transport = Arc::new(RecordingTransport::new());
        let clock = Arc::new(ManualClock::new());
        let session = ThreadSession::new(
            transport.clone(),
            ThreadCache::default(),
            clock.clone(),
            ME,
        );
        (session, transport, clock)
    }

    fn history(thread_id: DirectoryId, name: &str, messages: Vec<Message>) -> ThreadHistory {
        ThreadHistory {
            nodes: vec![DirectoryNode {
                id: thread_id,
                name: name.to_string(),
                kind: NodeKind::Thread,
                parent_id: None,
            }],
            messages,
        }
    }

    fn open_loaded(session: &mut ThreadSession, thread_id: DirectoryId, messages: Vec<Message>) {
        assert_eq!(session.activate(thread_id), Activation::NeedsFetch);
        assert!(session.history_loaded(thread_id, Ok(history(thread_id, "general", messages))));
    }

    fn group_ids(session: &ThreadSession) -> Vec<Vec<MessageId>> {
        session.view().messages().unwrap().group_ids()
    }

    #[test]
    fn test_activate_starts_loading_and_subscribes() {
        let (mut session, transport, _) = setup();
        assert_eq!(session.activate(1), Activation::NeedsFetch);
        assert_eq!(session.active_thread(), Some(1));
        assert_eq!(session.view().load, LoadState::Loading);
        assert_eq!(transport.subscriber_count(), 1);
        assert_eq!(session.activate(1), Activation::AlreadyActive);
    }

    #[test]
    fn test_history_builds_groups_and_title() {
        let (mut session, _, _) = setup();
        open_loaded(
            &mut session,
            1,
            vec![message(1, "ann", 0), message(2, "ann", 50), message(3, "ann", 105)],
        );
        let view = session.view();
        assert_eq!(view.title.as_deref(), Some("general"));
        assert_eq!(group_ids(&session), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_live_message_appends_to_active_thread() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);

        transport.emit(message_created_env(&message(2, "ann", 5)));
        transport.emit(message_created_env(&message(3, "bo", 6)));
        assert_eq!(session.poll_inbound(), 2);

        assert_eq!(group_ids(&session), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_live_messages_extend_the_published_snapshot() {
        let (mut session, transport, _) = setup();
        open_loaded(
            &mut session,
            1,
            (1..=1000).map(|id| message(id, "ann", id * 120)).collect(),
        );
        let rx = session.watch();
        let held = rx.borrow().messages().unwrap().clone();

        for id in 1001..=1010 {
            let before = session.view().messages().unwrap().clone();
            transport.emit(message_created_env(&message(id, "bo", id * 120)));
            session.poll_inbound();
            let after = session.view();
            assert!(after.messages().unwrap().extends(&before));
        }

        let latest = session.view();
        assert_eq!(latest.messages().unwrap().len(), 1010);
        assert!(latest.messages().unwrap().extends(&held));
        assert_eq!(held.len(), 1000);
    }

    #[test]
    fn test_replayed_frame_is_ignored() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        let before = session.view();

        transport.emit(message_created_env(&message(1, "ann", 0)));
        session.poll_inbound();

        assert_eq!(session.view(), before);
    }

    #[test]
    fn test_messages_during_load_are_kept() {
        let (mut session, transport, _) = setup();
        session.activate(1);

        // Arrives before the fetch resolves; message 2 is also in the history.
        transport.emit(message_created_env(&message(2, "ann", 5)));
        transport.emit(message_created_env(&message(3, "bo", 90)));
        session.poll_inbound();

        session.history_loaded(1, Ok(history(1, "general", vec![message(1, "ann", 0), message(2, "ann", 5)])));
        assert_eq!(group_ids(&session), vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_late_fetch_for_abandoned_thread_is_dropped() {
        let (mut session, _, _) = setup();
        assert_eq!(session.activate(1), Activation::NeedsFetch);
        assert_eq!(session.activate(2), Activation::NeedsFetch);

        let applied = session.history_loaded(1, Ok(history(1, "one", vec![message(1, "ann", 0)])));

        assert!(!applied);
        assert_eq!(session.active_thread(), Some(2));
        assert_eq!(session.view().load, LoadState::Loading);
        assert_eq!(session.view().title, None);
        // Nothing for thread 1 leaked into the cache either.
        assert!(!session.cache().contains(1));

        assert!(session.history_loaded(2, Ok(history(2, "two", vec![message_in(5, "bo", 0, 2)]))));
        assert_eq!(group_ids(&session), vec![vec![5]]);
    }

    #[test]
    fn test_second_fetch_result_is_ignored() {
        let (mut session, _, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        assert!(!session.history_loaded(1, Ok(history(1, "general", Vec::new()))));
        assert_eq!(session.view().messages().unwrap().len(), 1);
    }

    #[test]
    fn test_folder_is_not_found() {
        let (mut session, _, _) = setup();
        session.activate(3);
        let folder = ThreadHistory {
            nodes: vec![DirectoryNode {
                id: 3,
                name: "team".into(),
                kind: NodeKind::Folder,
                parent_id: None,
            }],
            messages: Vec::new(),
        };
        session.history_loaded(3, Ok(folder));
        assert_eq!(session.view().load, LoadState::NotFound);

        session.history_loaded(3, Ok(ThreadHistory { nodes: Vec::new(), messages: Vec::new() }));
        assert_eq!(session.view().load, LoadState::NotFound);
    }

    #[test]
    fn test_fetch_failure_is_a_notice() {
        let (mut session, _, _) = setup();
        session.activate(1);
        session.history_loaded(1, Err(ApiError::Network("refused".into())));
        let view = session.view();
        assert!(matches!(view.load, LoadState::Failed(_)));
        assert!(matches!(view.notice, Some(Notice::LoadFailed(_))));
    }

    #[test]
    fn test_reopening_failed_thread_fetches_again() {
        let (mut session, _, _) = setup();
        session.activate(1);
        session.history_loaded(1, Err(ApiError::Network("refused".into())));

        assert_eq!(session.activate(1), Activation::NeedsFetch);
        assert_eq!(session.view().load, LoadState::Loading);
        assert!(session.history_loaded(1, Ok(history(1, "general", vec![message(1, "ann", 0)]))));
        assert_eq!(group_ids(&session), vec![vec![1]]);

        assert_eq!(session.activate(1), Activation::AlreadyActive);
    }

    #[test]
    fn test_not_found_thread_is_not_refetched() {
        let (mut session, _, _) = setup();
        session.activate(3);
        session.history_loaded(3, Ok(ThreadHistory { nodes: Vec::new(), messages: Vec::new() }));
        assert_eq!(session.activate(3), Activation::AlreadyActive);
    }

    #[test]
    fn test_unauthorized_fetch() {
        let (mut session, _, _) = setup();
        session.activate(1);
        session.history_loaded(1, Err(ApiError::Unauthorized));
        assert_eq!(session.view().notice, Some(Notice::Unauthorized));
    }

    #[test]
    fn test_switching_back_uses_cache() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        session.activate(2);

        // Live message for thread 1 while viewing thread 2 updates the cache.
        transport.emit(message_created_env(&message(2, "bo", 5)));
        session.poll_inbound();

        assert_eq!(session.activate(1), Activation::FromCache);
        assert_eq!(group_ids(&session), vec![vec![1], vec![2]]);
        assert_eq!(session.view().title.as_deref(), Some("general"));
    }

    #[test]
    fn test_message_for_other_thread_raises_notice() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());

        transport.emit(message_created_env(&message_in(9, "bo", 0, 4)));
        session.poll_inbound();

        let view = session.view();
        assert_eq!(
            view.notice,
            Some(Notice::NewMessage {
                thread_id: 4,
                thread_name: None,
                author: "bo".into(),
                content: "message 9".into(),
            })
        );
        assert!(view.messages().unwrap().is_empty());

        session.dismiss_notice();
        assert_eq!(session.view().notice, None);
    }

    #[test]
    fn test_own_message_elsewhere_is_silent() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());
        transport.emit(message_created_env(&message_in(9, ME, 0, 4)));
        session.poll_inbound();
        assert_eq!(session.view().notice, None);
    }

    #[test]
    fn test_typing_events_filtered_by_thread() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());

        transport.emit(typing_env("ann", 1));
        transport.emit(typing_env("ann", 1));
        transport.emit(typing_env("bo", 2));
        transport.emit(typing_env("cy", 1));
        transport.emit(typing_env(ME, 1));
        session.poll_inbound();
        assert_eq!(session.view().typing, vec!["ann".to_string(), "cy".to_string()]);

        transport.emit(stopped_typing_env("ann", 1));
        session.poll_inbound();
        assert_eq!(session.view().typing, vec!["cy".to_string()]);
    }

    #[test]
    fn test_typing_set_is_discarded_on_switch() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());
        transport.emit(typing_env("ann", 1));
        session.poll_inbound();

        session.activate(2);
        session.activate(1);
        assert!(session.view().typing.is_empty());
    }

    #[test]
    fn test_unknown_and_malformed_envelopes_are_ignored() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        let before = session.view();

        transport.emit(Envelope {
            module: "reactions".into(),
            kind: "reaction_added".into(),
            payload: json!({"emoji": "+1"}),
        });
        transport.emit(Envelope {
            module: "messages".into(),
            kind: "message_created".into(),
            payload: json!({"id": "not a number"}),
        });
        assert_eq!(session.poll_inbound(), 2);
        assert_eq!(session.view(), before);
    }

    #[test]
    fn test_server_error_becomes_notice_without_rollback() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        transport.emit(Envelope {
            module: "system".into(),
            kind: "error".into(),
            payload: json!("Internal server error"),
        });
        session.poll_inbound();

        let view = session.view();
        assert_eq!(view.notice, Some(Notice::ServerError("Internal server error".into())));
        assert_eq!(view.messages().unwrap().len(), 1);
    }

    #[test]
    fn test_typing_start_is_sent_once() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("h".into());
        session.input_changed("he".into());
        session.input_changed("hey".into());
        assert_eq!(transport.sent(), vec![ClientMessage::Typing { thread_id: 1 }]);
    }

    #[test]
    fn test_idle_transition_twice_sends_one_stop() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("hi".into());
        session.blur();
        session.blur();

        let stops = transport
            .sent()
            .into_iter()
            .filter(|m| matches!(m, ClientMessage::StopTyping { .. }))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_idle_timer_sends_stop() {
        let (mut session, transport, clock) = setup();
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("hi".into());
        assert!(session.next_deadline().is_some());

        clock.advance(Duration::from_millis(2999));
        session.tick();
        assert!(session.is_typing());

        clock.advance(Duration::from_millis(1));
        session.tick();
        assert!(!session.is_typing());
        assert_eq!(session.next_deadline(), None);
        assert_eq!(
            transport.sent(),
            vec![
                ClientMessage::Typing { thread_id: 1 },
                ClientMessage::StopTyping { thread_id: 1 },
            ]
        );

        // The timer already fired; blurring now is a no-op.
        session.blur();
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_custom_typing_timeout() {
        let (session, transport, clock) = setup();
        let mut session = session.with_typing_timeout(Duration::from_millis(500));
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("x".into());
        clock.advance(Duration::from_millis(500));
        session.tick();
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_switching_threads_flushes_stop_typing() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("draft".into());
        session.activate(2);

        assert_eq!(
            transport.sent(),
            vec![
                ClientMessage::Typing { thread_id: 1 },
                ClientMessage::StopTyping { thread_id: 1 },
            ]
        );
        assert!(!session.is_typing());
        assert_eq!(session.view().draft, "");
        assert_eq!(session.next_deadline(), None);
    }

    #[test]
    fn test_deactivate_unsubscribes() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        session.deactivate();

        assert_eq!(transport.subscriber_count(), 0);
        assert_eq!(session.active_thread(), None);
        assert_eq!(session.view().thread_id, None);
        assert!(session.cache().contains(1));
    }

    #[test]
    fn test_submit_sends_create_message() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, vec![message(1, "ann", 0)]);
        assert!(session.set_reply_target(Some(1)));
        session.input_changed("hello there".into());
        assert!(session.submit());

        assert_eq!(
            transport.sent(),
            vec![
                ClientMessage::Typing { thread_id: 1 },
                ClientMessage::StopTyping { thread_id: 1 },
                ClientMessage::CreateMessage(NewMessage {
                    content: "hello there".into(),
                    directory_id: 1,
                    parent_id: Some(1),
                }),
            ]
        );
        let view = session.view();
        assert_eq!(view.draft, "");
        assert_eq!(view.reply_to, None);
        assert!(!session.is_typing());
    }

    #[test]
    fn test_blank_submit_is_rejected() {
        let (mut session, transport, _) = setup();
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("   ".into());
        assert!(!session.submit());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_composer_is_inert_until_thread_loads() {
        let (mut session, transport, _) = setup();
        session.activate(1);
        session.input_changed("early".into());
        assert!(!session.submit());

        session.history_loaded(1, Err(ApiError::Network("refused".into())));
        session.input_changed("still nothing".into());
        assert!(!session.submit());

        session.activate(3);
        session.history_loaded(3, Ok(ThreadHistory { nodes: Vec::new(), messages: Vec::new() }));
        session.input_changed("into a folder".into());
        assert!(!session.submit());

        assert!(transport.sent().is_empty());
        assert!(!session.is_typing());
        assert_eq!(session.view().draft, "");
    }

    #[test]
    fn test_reply_target_must_exist() {
        let (mut session, _, _) = setup();
        open_loaded(&mut session, 1, vec![reply(1, "ann", 0, 99)]);
        assert!(!session.set_reply_target(Some(42)));
        assert!(session.set_reply_target(Some(1)));
        assert_eq!(session.view().reply_to, Some(1));
        assert!(session.set_reply_target(None));
        assert_eq!(session.view().reply_to, None);
    }

    #[test]
    fn test_disconnected_transport_never_panics() {
        let (mut session, transport, _) = setup();
        transport.set_closed(true);
        open_loaded(&mut session, 1, Vec::new());
        session.input_changed("hi".into());
        assert!(session.submit());
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_watchers_see_each_snapshot() {
        let (mut session, transport, _) = setup();
        let mut rx = session.watch();
        open_loaded(&mut session, 1, Vec::new());
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert!(seen.messages().is_some());

        transport.emit(typing_env("ann", 1));
        session.poll_inbound();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().typing, vec!["ann".to_string()]);
    }
}
