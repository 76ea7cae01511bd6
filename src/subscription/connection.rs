//! Task subscription connection
//!
//! One `TaskConnection` owns one subscription to one ingestion task at a
//! time. It drives the connect/reconnect state machine, parses and
//! dispatches inbound messages, forwards cancellation, and invokes the
//! consumer's callbacks. All operations return immediately; outcomes are
//! observed through the `ProgressHandler`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{ClientMessage, ProgressMessage, ServerMessage};
use crate::types::{ProgressSnapshot, TaskStatus};

use super::keepalive::{KeepAlive, DEFAULT_KEEPALIVE_INTERVAL};
use super::policy::ReconnectPolicy;

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for a task subscription
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Base URL of the per-task progress endpoint; the task id is appended
    /// as the final path segment
    pub base_url: String,

    /// Connection attempt timeout
    pub connect_timeout: Duration,

    /// Keepalive ping cadence on an open connection
    pub keepalive_interval: Duration,

    /// Reconnect decision policy
    pub reconnect: ReconnectPolicy,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8000/api/ws/upload".to_string(),
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Connection State
// ─────────────────────────────────────────────────────────────────

/// Connection lifecycle state
///
/// An involuntary close is momentary: it resolves immediately to either
/// `ReconnectScheduled` or `Terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No subscription yet
    #[default]
    Idle,
    /// Opening the WebSocket
    Connecting,
    /// Subscribed and receiving messages
    Open,
    /// Connection lost; a reconnect is scheduled
    ReconnectScheduled,
    /// Subscription over; no further activity for this task
    Terminal,
}

// ─────────────────────────────────────────────────────────────────
// Consumer Callbacks
// ─────────────────────────────────────────────────────────────────

/// Consumer-facing callbacks for one task subscription
///
/// Callbacks are invoked from the subscription task, one at a time, in
/// arrival order. Implementations should hand heavy work off rather than
/// block.
pub trait ProgressHandler: Send + Sync {
    /// Fired on every valid progress message
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// Fired exactly once, only when the task reaches `completed`
    fn on_complete(&self, _snapshot: &ProgressSnapshot) {}

    /// Fired exactly once, only when the task reaches `failed` with an
    /// error message
    fn on_error(&self, _error: &str) {}

    /// Fired when a reconnect has been scheduled; lets a UI show a
    /// "reconnecting" indicator during the wait
    fn on_reconnecting(&self, _attempt: u32) {}

    /// Fired once when the reconnect ceiling is exhausted without a
    /// terminal snapshot
    fn on_gave_up(&self, _attempts: u32) {}
}

// ─────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────

/// Commands accepted by the subscription loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Send a keepalive ping
    Ping,

    /// Send a cancel request for the subscribed task
    Cancel,

    /// Tear the subscription down permanently
    Disconnect,
}

// ─────────────────────────────────────────────────────────────────
// Subscription State
// ─────────────────────────────────────────────────────────────────

/// Shared state for one TaskConnection instance
#[derive(Debug, Default)]
struct SubscriptionState {
    /// Current connection lifecycle state
    connection_state: ConnectionState,

    /// Active task id; cleared by `disconnect`
    task_id: Option<String>,

    /// Bumped by every `connect`/`disconnect`; a loop holding an older
    /// epoch is stale and must not mutate state or fire callbacks
    epoch: u64,

    /// Latest snapshot for the active task
    snapshot: Option<ProgressSnapshot>,

    /// Reconnect attempts since the last successful open
    attempts: u32,

    /// Latched once a terminal snapshot arrives
    is_complete: bool,
}

// ─────────────────────────────────────────────────────────────────
// Task Connection
// ─────────────────────────────────────────────────────────────────

/// Subscription client for one ingestion task's progress stream
pub struct TaskConnection {
    config: SubscriptionConfig,
    state: Arc<RwLock<SubscriptionState>>,
    handler: Arc<dyn ProgressHandler>,
    command_tx: RwLock<Option<mpsc::Sender<Command>>>,
}

impl TaskConnection {
    /// Create a new, idle task connection
    pub fn new(config: SubscriptionConfig, handler: Arc<dyn ProgressHandler>) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(SubscriptionState::default())),
            handler,
            command_tx: RwLock::new(None),
        }
    }

    /// Subscribe to a task's progress stream.
    ///
    /// If a different task is already subscribed, that subscription is
    /// implicitly disconnected first. Returns immediately; must be called
    /// within a Tokio runtime.
    pub fn connect(&self, task_id: &str) -> Result<()> {
        let url = task_url(&self.config.base_url, task_id)?;

        let epoch = {
            let mut s = self.state.write();
            s.epoch += 1;
            s.task_id = Some(task_id.to_string());
            s.snapshot = None;
            s.attempts = 0;
            s.is_complete = false;
            s.connection_state = ConnectionState::Connecting;
            s.epoch
        };

        let (tx, rx) = mpsc::channel(16);
        let superseded = self.command_tx.write().replace(tx.clone());
        if let Some(superseded) = superseded {
            // Nudge the previous loop so it notices the epoch change now
            // rather than at its next inbound event.
            let _ = superseded.try_send(Command::Disconnect);
        }

        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let handler = Arc::clone(&self.handler);
        let task_id = task_id.to_string();

        tokio::spawn(async move {
            run_subscription(config, state, handler, rx, tx, url, task_id, epoch).await;
        });

        Ok(())
    }

    /// Request cooperative cancellation of the subscribed task.
    ///
    /// Sends a single cancel message when the connection is open. Local
    /// state is not touched: the outcome arrives as a server-pushed
    /// `cancelled` (or, if the task won the race, `completed`) snapshot.
    pub fn cancel(&self) {
        let open = {
            let s = self.state.read();
            s.connection_state == ConnectionState::Open && !s.is_complete
        };
        if !open {
            debug!("Cancel ignored: subscription is not open");
            return;
        }
        if let Some(tx) = self.command_tx.read().as_ref() {
            let _ = tx.try_send(Command::Cancel);
        }
    }

    /// Permanently end the subscription. Idempotent.
    ///
    /// The epoch bump makes any in-flight event for the old subscription a
    /// no-op, including a connection attempt or reconnect timer that
    /// completes after this call.
    pub fn disconnect(&self) {
        {
            let mut s = self.state.write();
            s.epoch += 1;
            s.task_id = None;
            s.connection_state = ConnectionState::Terminal;
        }
        if let Some(tx) = self.command_tx.write().take() {
            let _ = tx.try_send(Command::Disconnect);
        }
    }

    /// Current connection lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state.read().connection_state
    }

    /// Latest snapshot for the active task, if any message has arrived
    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        self.state.read().snapshot.clone()
    }

    /// Active task id, if subscribed
    pub fn task_id(&self) -> Option<String> {
        self.state.read().task_id.clone()
    }

    /// Whether a terminal snapshot has been received
    pub fn is_complete(&self) -> bool {
        self.state.read().is_complete
    }
}

/// Build the per-task endpoint URL: `<base>/<task_id>`
fn task_url(base_url: &str, task_id: &str) -> Result<Url> {
    let joined = format!("{}/{}", base_url.trim_end_matches('/'), task_id);
    Url::parse(&joined).map_err(|e| Error::InvalidEndpoint {
        url: joined,
        message: e.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────
// Subscription Loop
// ─────────────────────────────────────────────────────────────────

/// Why an open connection stopped being driven
enum Drive {
    /// Closed by the server or a transport error; reconnect may follow
    Closed,
    /// Detached on purpose (disconnect or superseded); no reconnect
    Detached,
}

/// Outcome of the post-close reconnect decision
enum Decision {
    Retry(u32),
    GaveUp(u32),
    Settled,
}

async fn run_subscription(
    config: SubscriptionConfig,
    state: Arc<RwLock<SubscriptionState>>,
    handler: Arc<dyn ProgressHandler>,
    mut commands: mpsc::Receiver<Command>,
    ping_tx: mpsc::Sender<Command>,
    url: Url,
    task_id: String,
    epoch: u64,
) {
    let mut keepalive = KeepAlive::new(config.keepalive_interval);

    loop {
        if stale(&state, epoch) {
            return;
        }
        set_state(&state, epoch, ConnectionState::Connecting);

        info!(task_id = %task_id, url = %url, "Connecting to task progress endpoint");

        match tokio::time::timeout(config.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => {
                if stale(&state, epoch) {
                    close_quietly(ws).await;
                    return;
                }
                {
                    let mut s = state.write();
                    s.connection_state = ConnectionState::Open;
                    s.attempts = 0;
                }
                info!(task_id = %task_id, "Subscription open");

                keepalive.start(ping_tx.clone());
                let outcome = drive_connection(
                    &state,
                    &handler,
                    &mut commands,
                    &mut keepalive,
                    ws,
                    &task_id,
                    epoch,
                )
                .await;
                keepalive.stop();

                if let Drive::Detached = outcome {
                    return;
                }
            }
            Ok(Err(e)) => {
                warn!(task_id = %task_id, error = %e, "Failed to open subscription");
            }
            Err(_) => {
                warn!(
                    task_id = %task_id,
                    timeout_ms = config.connect_timeout.as_millis() as u64,
                    "Connection attempt timed out"
                );
            }
        }

        // Involuntary closure: decide whether to try again
        let decision = {
            let mut s = state.write();
            if s.epoch != epoch {
                return;
            }
            if s.is_complete {
                s.connection_state = ConnectionState::Terminal;
                Decision::Settled
            } else if config.reconnect.should_reconnect(s.attempts, s.is_complete) {
                s.attempts += 1;
                s.connection_state = ConnectionState::ReconnectScheduled;
                Decision::Retry(s.attempts)
            } else {
                s.connection_state = ConnectionState::Terminal;
                Decision::GaveUp(s.attempts)
            }
        };

        let attempt = match decision {
            Decision::Settled => {
                debug!(task_id = %task_id, "Subscription settled, not reconnecting");
                return;
            }
            Decision::GaveUp(attempts) => {
                warn!(task_id = %task_id, attempts, "Reconnect ceiling reached, giving up");
                handler.on_gave_up(attempts);
                return;
            }
            Decision::Retry(attempt) => attempt,
        };

        handler.on_reconnecting(attempt);
        let delay = config.reconnect.delay_for(attempt);
        debug!(
            task_id = %task_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Waiting before reconnect"
        );

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = commands.recv() => match cmd {
                    Some(Command::Disconnect) | None => return,
                    // Pings and cancels have no connection to act on
                    Some(_) => {}
                },
            }
        }
    }
}

/// Drive one open connection until it closes or is detached
async fn drive_connection(
    state: &Arc<RwLock<SubscriptionState>>,
    handler: &Arc<dyn ProgressHandler>,
    commands: &mut mpsc::Receiver<Command>,
    keepalive: &mut KeepAlive,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    task_id: &str,
    epoch: u64,
) -> Drive {
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        if stale(state, epoch) {
                            let _ = write.send(WsMessage::Close(None)).await;
                            return Drive::Detached;
                        }
                        dispatch_text(state, handler, keepalive, &text, task_id, epoch);
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        // Transport-level ping, distinct from the JSON keepalive
                        if write.send(WsMessage::Pong(data)).await.is_err() {
                            return Drive::Closed;
                        }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!(task_id, frame = ?frame, "Server closed the subscription");
                        return Drive::Closed;
                    }
                    Some(Err(e)) => {
                        warn!(task_id, error = %e, "WebSocket error");
                        return Drive::Closed;
                    }
                    None => {
                        debug!(task_id, "Subscription stream ended");
                        return Drive::Closed;
                    }
                    // Binary frames are not part of this protocol
                    _ => {}
                }
            }

            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Ping) => {
                        if stale(state, epoch) {
                            let _ = write.send(WsMessage::Close(None)).await;
                            return Drive::Detached;
                        }
                        if send_client_message(&mut write, ClientMessage::Ping).await.is_err() {
                            return Drive::Closed;
                        }
                        debug!(task_id, "Sent keepalive ping");
                    }
                    Some(Command::Cancel) => {
                        if stale(state, epoch) {
                            let _ = write.send(WsMessage::Close(None)).await;
                            return Drive::Detached;
                        }
                        if send_client_message(&mut write, ClientMessage::Cancel).await.is_err() {
                            return Drive::Closed;
                        }
                        info!(task_id, "Sent cancel request");
                    }
                    Some(Command::Disconnect) | None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return Drive::Detached;
                    }
                }
            }
        }
    }
}

/// Parse and dispatch one inbound text frame
fn dispatch_text(
    state: &Arc<RwLock<SubscriptionState>>,
    handler: &Arc<dyn ProgressHandler>,
    keepalive: &mut KeepAlive,
    text: &str,
    task_id: &str,
    epoch: u64,
) {
    let message = match ServerMessage::parse(text) {
        Some(message) => message,
        None => {
            debug!(task_id, "Discarding unrecognized message");
            return;
        }
    };

    match message {
        // Neither heartbeats nor pongs change state or reach the consumer
        ServerMessage::Heartbeat(_) => {}
        ServerMessage::Pong(_) => {}
        ServerMessage::Progress(progress) => {
            dispatch_progress(state, handler, keepalive, progress, task_id, epoch);
        }
    }
}

/// Apply a progress message: replace the snapshot and fire callbacks
fn dispatch_progress(
    state: &Arc<RwLock<SubscriptionState>>,
    handler: &Arc<dyn ProgressHandler>,
    keepalive: &mut KeepAlive,
    progress: ProgressMessage,
    task_id: &str,
    epoch: u64,
) {
    if progress.task_id != task_id {
        debug!(task_id, other = %progress.task_id, "Discarding progress for another task");
        return;
    }

    let snapshot = ProgressSnapshot::from(progress);
    let terminal = snapshot.is_terminal();

    {
        let mut s = state.write();
        // Stale epoch: subscription was superseded or disconnected.
        // Already complete: the terminal snapshot was delivered once.
        if s.epoch != epoch || s.is_complete {
            return;
        }
        s.snapshot = Some(snapshot.clone());
        if terminal {
            s.is_complete = true;
        }
    }

    handler.on_progress(&snapshot);

    if terminal {
        keepalive.stop();
        match snapshot.status {
            TaskStatus::Completed => handler.on_complete(&snapshot),
            TaskStatus::Failed => {
                if let Some(error) = snapshot.error.as_deref() {
                    handler.on_error(error);
                }
            }
            // Cancelled updates the snapshot and fires neither callback
            _ => {}
        }
    }
}

/// Send one client control message as a text frame
async fn send_client_message<S>(
    write: &mut S,
    message: ClientMessage,
) -> std::result::Result<(), WsError>
where
    S: SinkExt<WsMessage, Error = WsError> + Unpin,
{
    let json = match message.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to encode client message");
            return Ok(());
        }
    };
    write.send(WsMessage::Text(json)).await
}

/// Whether the given epoch has been superseded
fn stale(state: &Arc<RwLock<SubscriptionState>>, epoch: u64) -> bool {
    state.read().epoch != epoch
}

/// Set the connection state, unless the epoch has been superseded
fn set_state(state: &Arc<RwLock<SubscriptionState>>, epoch: u64, next: ConnectionState) {
    let mut s = state.write();
    if s.epoch == epoch {
        s.connection_state = next;
    }
}

/// Close a connection that is no longer wanted
async fn close_quietly(mut ws: WebSocketStream<MaybeTlsStream<TcpStream>>) {
    let _ = ws.close(None).await;
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHandler;

    impl ProgressHandler for NullHandler {
        fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
    }

    fn connection() -> TaskConnection {
        TaskConnection::new(SubscriptionConfig::default(), Arc::new(NullHandler))
    }

    #[test]
    fn test_config_defaults() {
        let config = SubscriptionConfig::default();
        assert_eq!(config.keepalive_interval, Duration::from_millis(25_000));
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.reconnect.delay, Duration::from_millis(3000));
    }

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }

    #[test]
    fn test_task_url() {
        let url = task_url("ws://127.0.0.1:8000/api/ws/upload", "abc123").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8000/api/ws/upload/abc123");

        // Trailing slash on the base must not double up
        let url = task_url("ws://127.0.0.1:8000/api/ws/upload/", "abc123").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8000/api/ws/upload/abc123");
    }

    #[test]
    fn test_task_url_invalid_base() {
        assert!(task_url("not a url", "abc123").is_err());
    }

    #[test]
    fn test_new_connection_is_idle() {
        let conn = connection();
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert!(conn.task_id().is_none());
        assert!(conn.snapshot().is_none());
        assert!(!conn.is_complete());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let conn = connection();
        conn.disconnect();
        conn.disconnect();
        assert_eq!(conn.state(), ConnectionState::Terminal);
        assert!(conn.task_id().is_none());
    }

    #[test]
    fn test_cancel_ignored_when_idle() {
        let conn = connection();
        // No panic, no state change
        conn.cancel();
        assert_eq!(conn.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_connect_sets_task_id() {
        let conn = connection();
        conn.connect("abc123").unwrap();
        assert_eq!(conn.task_id().as_deref(), Some("abc123"));
        conn.disconnect();
        assert!(conn.task_id().is_none());
        assert_eq!(conn.state(), ConnectionState::Terminal);
    }
}
