//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the latest
//! [`ThreadView`](crate::core::session::ThreadView), and translates
//! keyboard events into `core::Action` values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Event Loop
//!
//! One synchronous loop owns the session. Each pass it:
//!
//! 1. Redraws if the view snapshot or connection state changed.
//! 2. Polls the terminal, waking early for the next typing deadline.
//! 3. Applies actions from background fetch tasks (std `mpsc`).
//! 4. Drains inbound socket frames and fires due timers.

mod component;
mod components;
mod event;
mod ui;

use log::{debug, info, warn};
use std::io::{self, stdout};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{SetCursorStyle, Show};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;

use crate::api::{ChatApi, DirectoryId, HttpApi};
use crate::core::action::{Action, Effect, update};
use crate::core::cache::ThreadCache;
use crate::core::config::ResolvedConfig;
use crate::core::session::ThreadSession;
use crate::core::storage;
use crate::core::timer::SystemClock;
use crate::transport::WsChannel;
use crate::tui::component::EventHandler;
use crate::tui::components::{Command, Composer, ComposerEvent};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// Longest the loop blocks on the terminal. Bounds inbound frame latency.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// How long quitting waits for queued frames (the final `stop_typing`) to
/// reach the server.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Who we are on the server.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// TUI-specific presentation state (not part of core business logic)
pub(crate) struct TuiState {
    pub composer: Composer,
    pub username: String,
}

impl TuiState {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            composer: Composer::new(),
            username: username.into(),
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> io::Result<Self> {
        execute!(
            stdout(),
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock, // Non-blinking: avoids blink timer reset from continuous redraws
        )?;
        info!("Terminal modes enabled (bracketed paste, steady block cursor)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableBracketedPaste, SetCursorStyle::DefaultUserShape);
    }
}

pub fn run(
    config: ResolvedConfig,
    credentials: Credentials,
    initial_thread: Option<DirectoryId>,
) -> io::Result<()> {
    let ws_url = config.ws_url(&credentials.token).map_err(io::Error::other)?;
    let api: Arc<dyn ChatApi> = Arc::new(HttpApi::new(config.http_base(), credentials.token));
    let channel = Arc::new(WsChannel::connect(
        ws_url,
        config.reconnect,
        config.inbound_capacity,
    ));
    let mut connection = channel.state();

    let cache = ThreadCache::new(config.cache_horizon, config.max_threads);
    let mut session = ThreadSession::new(
        channel.clone(),
        cache,
        Arc::new(SystemClock),
        credentials.username.clone(),
    )
    .with_typing_timeout(config.typing_idle_timeout);
    let mut view = session.watch();
    let mut tui = TuiState::new(credentials.username);

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    if let Some(thread_id) = initial_thread {
        dispatch(&mut session, Action::OpenThread(thread_id), &api, &tx);
    }

    let mut needs_redraw = true; // Force first frame

    loop {
        if needs_redraw {
            let snapshot = view.borrow_and_update().clone();
            let state = *connection.borrow_and_update();
            tui.composer.reply_to = snapshot.reply_to;
            tui.composer.enabled = snapshot.load.is_ready();
            terminal.draw(|f| ui::draw_ui(f, &snapshot, state, &mut tui))?;
            needs_redraw = false;
        }

        let timeout = poll_timeout(session.next_deadline(), Instant::now());
        let first_event = poll_event_timeout(timeout);

        // Process first event + drain ALL pending events before next draw
        let mut should_quit = false;
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            // Composer-local changes (cursor, command errors) need a redraw too.
            needs_redraw = true;

            let actions = match event {
                TuiEvent::Quit => vec![Action::Quit],
                TuiEvent::Resize => continue,
                other => tui
                    .composer
                    .handle_event(&other)
                    .map(composer_actions)
                    .unwrap_or_default(),
            };
            for action in actions {
                should_quit |= dispatch(&mut session, action, &api, &tx);
            }
        }

        // Handle background task actions (history fetches)
        while let Ok(action) = rx.try_recv() {
            debug!("Event loop received: {:?}", action);
            should_quit |= dispatch(&mut session, action, &api, &tx);
        }

        dispatch(&mut session, Action::Inbound, &api, &tx);
        dispatch(&mut session, Action::Tick, &api, &tx);

        if view.has_changed().unwrap_or(false) || connection.has_changed().unwrap_or(false) {
            needs_redraw = true;
        }

        if should_quit {
            break;
        }
    }

    ratatui::restore();
    // The loop runs on a runtime worker; step out of it to await the flush.
    tokio::task::block_in_place(|| {
        tokio::runtime::Handle::current().block_on(channel.close(SHUTDOWN_GRACE))
    });
    info!("Murmur shut down");
    Ok(())
}

fn composer_actions(event: ComposerEvent) -> Vec<Action> {
    match event {
        ComposerEvent::Changed(draft) => vec![Action::InputChanged(draft)],
        ComposerEvent::Submit => vec![Action::Submit],
        ComposerEvent::Blur => vec![Action::Blur, Action::DismissNotice],
        ComposerEvent::Command(Command::Open(thread_id)) => vec![Action::OpenThread(thread_id)],
        ComposerEvent::Command(Command::Reply(id)) => vec![Action::ReplyTo(Some(id))],
        ComposerEvent::Command(Command::Cancel) => vec![Action::ReplyTo(None)],
        ComposerEvent::Command(Command::Quit) => vec![Action::Quit],
    }
}

/// Applies an action and performs its effect. Returns true to quit.
fn dispatch(
    session: &mut ThreadSession,
    action: Action,
    api: &Arc<dyn ChatApi>,
    tx: &mpsc::Sender<Action>,
) -> bool {
    match update(session, action) {
        Effect::None => false,
        Effect::FetchHistory(thread_id) => {
            storage::save_last_thread(thread_id);
            spawn_fetch(Arc::clone(api), thread_id, tx.clone());
            false
        }
        Effect::ThreadOpened(thread_id) => {
            storage::save_last_thread(thread_id);
            false
        }
        Effect::Quit => true,
    }
}

fn spawn_fetch(api: Arc<dyn ChatApi>, thread_id: DirectoryId, tx: mpsc::Sender<Action>) {
    info!("Fetching history for thread {}", thread_id);
    tokio::spawn(async move {
        let result = api.thread_history(thread_id).await;
        if tx.send(Action::HistoryLoaded { thread_id, result }).is_err() {
            warn!(
                "Failed to deliver history for thread {}: receiver dropped",
                thread_id
            );
        }
    });
}

/// How long to block on the terminal before the next timer is due.
fn poll_timeout(deadline: Option<Instant>, now: Instant) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(now).min(IDLE_POLL),
        None => IDLE_POLL,
    }
}
