//! # Transport Channel
//!
//! One live WebSocket per client. `WsChannel` spawns a supervisor task that
//! owns the socket, reconnects with exponential backoff, and fans inbound
//! envelopes out to every subscriber over a `broadcast` channel.
//!
//! ```text
//!  send() ──► mpsc ──► supervisor ──► socket write
//!                          │
//!  subscribe() ◄── broadcast ◄── socket read (parse_frame)
//! ```
//!
//! Sends never fail loudly: frames queued while disconnected are dropped
//! by the supervisor (the wire is fire-and-forget).
//!
//! [`WsChannel::close`] drops the outbound sender, so the supervisor writes
//! every frame already queued, sends a Close frame and exits.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::types::{ClientMessage, Envelope, parse_frame};

/// Errors surfaced by [`Transport::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The message could not be serialized.
    Encode(String),
    /// The channel has been shut down.
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Encode(msg) => write!(f, "encode error: {msg}"),
            TransportError::Closed => write!(f, "transport closed"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "online",
            ConnectionState::Disconnected => "offline",
        }
    }
}

/// The seam between the session controller and the socket.
pub trait Transport: Send + Sync {
    /// Queues a frame for sending. Never blocks.
    fn send(&self, message: &ClientMessage) -> Result<(), TransportError>;

    /// A new receiver for every inbound envelope delivered after this call.
    fn subscribe(&self) -> broadcast::Receiver<Envelope>;
}

/// Backoff between reconnect attempts: `min * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub min: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.min.saturating_mul(factor).min(self.max)
    }
}

pub struct WsChannel {
    /// `None` once closed.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound: broadcast::Sender<Envelope>,
    state: watch::Receiver<ConnectionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WsChannel {
    /// Spawns the supervisor. Must be called from inside a tokio runtime.
    pub fn connect(url: String, policy: ReconnectPolicy, inbound_capacity: usize) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, _) = broadcast::channel(inbound_capacity.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);

        let task = tokio::spawn(supervise(
            url,
            policy,
            outbound_rx,
            inbound.clone(),
            state_tx,
        ));

        Self {
            outbound: Mutex::new(Some(outbound)),
            inbound,
            state,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Flushes queued frames, closes the socket and waits up to `grace`
    /// for the supervisor to finish. Later sends fail with `Closed`.
    pub async fn close(&self, grace: Duration) {
        lock(&self.outbound).take();
        let Some(task) = lock(&self.task).take() else {
            return;
        };

        let abort = task.abort_handle();
        match tokio::time::timeout(grace, task).await {
            Ok(_) => debug!("WebSocket supervisor finished"),
            Err(_) => {
                warn!("WebSocket channel did not close within {:?}, aborting", grace);
                abort.abort();
            }
        }
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}

impl Transport for WsChannel {
    fn send(&self, message: &ClientMessage) -> Result<(), TransportError> {
        let frame = message
            .to_frame()
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        match lock(&self.outbound).as_ref() {
            Some(outbound) => outbound.send(frame).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.inbound.subscribe()
    }
}

enum PumpExit {
    /// Every `WsChannel` handle is gone.
    Shutdown,
    Disconnected(String),
}

async fn supervise(
    url: String,
    policy: ReconnectPolicy,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: broadcast::Sender<Envelope>,
    state: watch::Sender<ConnectionState>,
) {
    let mut attempt = 0u32;

    loop {
        state.send_replace(ConnectionState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("WebSocket connected");
                attempt = 0;
                state.send_replace(ConnectionState::Connected);
                match pump(stream, &mut outbound, &inbound).await {
                    PumpExit::Shutdown => {
                        info!("WebSocket channel shut down");
                        state.send_replace(ConnectionState::Disconnected);
                        return;
                    }
                    PumpExit::Disconnected(reason) => warn!("WebSocket disconnected: {}", reason),
                }
            }
            Err(e) => warn!("WebSocket connect failed: {}", e),
        }

        state.send_replace(ConnectionState::Disconnected);
        let delay = policy.delay(attempt);
        attempt = attempt.saturating_add(1);
        debug!("Reconnecting in {:?} (attempt {})", delay, attempt);

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                frame = outbound.recv() => match frame {
                    Some(_) => debug!("Dropping outbound frame while disconnected"),
                    None => return,
                },
            }
        }
    }
}

async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    inbound: &broadcast::Sender<Envelope>,
) -> PumpExit {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(WsFrame::Text(text.into())).await {
                        return PumpExit::Disconnected(e.to_string());
                    }
                }
                None => {
                    let _ = write.send(WsFrame::Close(None)).await;
                    return PumpExit::Shutdown;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(WsFrame::Text(text))) => match parse_frame(text.as_str()) {
                    Ok(env) => {
                        // No subscribers is fine: nobody is looking at a thread.
                        let _ = inbound.send(env);
                    }
                    Err(e) => warn!("{}", e),
                },
                Some(Ok(WsFrame::Close(_))) | None => {
                    return PumpExit::Disconnected("closed by server".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return PumpExit::Disconnected(e.to_string()),
            },
        }
    }
}
