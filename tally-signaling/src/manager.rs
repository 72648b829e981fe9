//! Signaling manager and its connection task
//!
//! The manager is an explicitly constructed service: the composition
//! root calls [`SignalingManager::connect`] once and hands clones of the
//! returned handle to whoever needs market data. One background task
//! owns the socket end to end; handles talk to it through a command
//! channel and a shared subscription set.
//!
//! Send semantics follow the gateway contract: control messages are
//! silently dropped while the connection is not open, and on every
//! successful open the whole subscription set is replayed exactly once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use tally_core::{ClientRequest, Envelope, Room, RoomUpdate, TallyError, TallyResult};

use crate::backoff::{Backoff, DEFAULT_BACKOFF_CEILING, DEFAULT_BACKOFF_FLOOR};
use crate::registry::{CallbackId, CallbackRegistry};

/// Default gateway endpoint
pub const DEFAULT_WS_URL: &str = "ws://localhost:8081/ws";

/// Command channel capacity
const COMMAND_BUFFER: usize = 100;

// ============================================================================
// Connection State
// ============================================================================

/// State of the gateway connection, owned by the connection task and
/// published through a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Task not running (initial, or all handles dropped)
    Idle,
    /// Dialing the gateway
    Connecting,
    /// Connected; control messages flow
    Open,
    /// Waiting to reconnect after the given number of consecutive
    /// failures
    Backoff(u32),
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the signaling manager
#[derive(Clone, Debug)]
pub struct SignalingConfig {
    /// Gateway WebSocket endpoint
    pub url: String,
    /// Floor delay between reconnect attempts
    pub backoff_floor: Duration,
    /// Ceiling delay between reconnect attempts
    pub backoff_ceiling: Duration,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            backoff_floor: DEFAULT_BACKOFF_FLOOR,
            backoff_ceiling: DEFAULT_BACKOFF_CEILING,
        }
    }
}

// ============================================================================
// Signaling Manager
// ============================================================================

/// Commands sent from handles to the connection task
#[derive(Debug)]
enum Command {
    Subscribe(Room),
    Unsubscribe(Room),
}

/// Handle to the signaling layer; cheap to clone
#[derive(Clone)]
pub struct SignalingManager {
    /// Rooms the application wants, independent of connection state.
    /// Replayed on every reconnect.
    subscriptions: Arc<RwLock<HashSet<Room>>>,
    /// Callbacks fan-out registry shared with the connection task
    registry: Arc<CallbackRegistry>,
    /// Command sender to the connection task
    command_tx: mpsc::Sender<Command>,
    /// Connection state published by the task
    state_rx: watch::Receiver<ConnectionState>,
}

impl SignalingManager {
    /// Spawn the connection task and return a handle to it
    pub fn connect(config: SignalingConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let subscriptions = Arc::new(RwLock::new(HashSet::new()));
        let registry = Arc::new(CallbackRegistry::new());

        tokio::spawn(connection_loop(
            config,
            Arc::clone(&subscriptions),
            Arc::clone(&registry),
            command_rx,
            state_tx,
        ));

        Self {
            subscriptions,
            registry,
            command_tx,
            state_rx,
        }
    }

    /// Add a room to the subscription set and, when the connection is
    /// open, send a SUBSCRIBE for it. While disconnected the send is
    /// dropped; the set itself is replayed on the next open.
    pub async fn subscribe(&self, room: Room) -> TallyResult<()> {
        {
            let mut subs = self.subscriptions.write().await;
            subs.insert(room.clone());
        }

        self.command_tx
            .send(Command::Subscribe(room))
            .await
            .map_err(|_| TallyError::internal("signaling task stopped"))
    }

    /// Remove a room from the subscription set and, when open, send an
    /// UNSUBSCRIBE. Registered callbacks are left in place; callers
    /// deregister separately.
    pub async fn unsubscribe(&self, room: Room) -> TallyResult<()> {
        {
            let mut subs = self.subscriptions.write().await;
            subs.remove(&room);
        }

        self.command_tx
            .send(Command::Unsubscribe(room))
            .await
            .map_err(|_| TallyError::internal("signaling task stopped"))
    }

    /// Register a callback for a room. Returns the id used to
    /// deregister it.
    pub fn register_callback<F>(&self, room: Room, callback: F) -> CallbackId
    where
        F: Fn(&RoomUpdate) + Send + Sync + 'static,
    {
        self.registry.register(room, Arc::new(callback))
    }

    /// Remove a callback by id. A no-op when the room or id is unknown.
    pub fn deregister_callback(&self, room: &Room, id: CallbackId) {
        self.registry.deregister(room, id);
    }

    /// Number of callbacks currently registered for a room
    pub fn callback_count(&self, room: &Room) -> usize {
        self.registry.callback_count(room)
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch receiver of connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Snapshot of the subscription set, sorted for determinism
    pub async fn subscribed_rooms(&self) -> Vec<Room> {
        let subs = self.subscriptions.read().await;
        let mut rooms: Vec<Room> = subs.iter().cloned().collect();
        rooms.sort();
        rooms
    }
}

impl std::fmt::Debug for SignalingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingManager")
            .field("state", &self.connection_state())
            .field("registry", &self.registry)
            .finish()
    }
}

// ============================================================================
// Connection Task
// ============================================================================

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Why a connected session ended
enum SessionEnd {
    /// Socket closed or errored; reconnect
    Disconnected,
    /// All handles dropped; stop the task
    Shutdown,
}

/// Main connection loop with reconnection logic. Runs until every
/// manager handle has been dropped.
async fn connection_loop(
    config: SignalingConfig,
    subscriptions: Arc<RwLock<HashSet<Room>>>,
    registry: Arc<CallbackRegistry>,
    mut command_rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let mut backoff = Backoff::new(config.backoff_floor, config.backoff_ceiling);
    let mut failures = 0u32;

    loop {
        let _ = state_tx.send(ConnectionState::Connecting);
        info!("[Signaling] Connecting to {}", config.url);

        match connect_async(config.url.as_str()).await {
            Ok((stream, _)) => {
                info!("[Signaling] Connected");
                backoff.reset();
                failures = 0;
                let _ = state_tx.send(ConnectionState::Open);

                let end = run_session(stream, &subscriptions, &registry, &mut command_rx).await;

                if let SessionEnd::Shutdown = end {
                    info!("[Signaling] All handles dropped, stopping");
                    let _ = state_tx.send(ConnectionState::Idle);
                    return;
                }
            }
            Err(e) => {
                error!("[Signaling] Connection failed: {}", e);
            }
        }

        // The old transport is gone at this point; a fresh socket is
        // dialed on the next pass.
        failures += 1;
        let delay = backoff.next_delay();
        let _ = state_tx.send(ConnectionState::Backoff(failures));
        info!(
            "[Signaling] Reconnecting in {:?} (failure {})",
            delay, failures
        );

        // Sends while disconnected are dropped, not queued; the
        // subscription set is replayed after reconnect instead.
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(command) => {
                            debug!("[Signaling] Dropping {:?} while disconnected", command)
                        }
                        None => {
                            info!("[Signaling] All handles dropped, stopping");
                            let _ = state_tx.send(ConnectionState::Idle);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Drive one connected session: replay the subscription set, then
/// multiplex socket reads and handle commands until the socket dies.
async fn run_session(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    subscriptions: &Arc<RwLock<HashSet<Room>>>,
    registry: &Arc<CallbackRegistry>,
    command_rx: &mut mpsc::Receiver<Command>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    // Commands queued while we were away are stale; the subscription
    // set below is the source of truth for this session.
    while command_rx.try_recv().is_ok() {}

    // Replay the set, exactly one SUBSCRIBE per room.
    let rooms: Vec<Room> = {
        let subs = subscriptions.read().await;
        subs.iter().cloned().collect()
    };
    let mut active: HashSet<Room> = HashSet::with_capacity(rooms.len());
    for room in rooms {
        if let Err(e) = send_request(&mut write, &ClientRequest::subscribe(&room)).await {
            warn!("[Signaling] Failed to replay subscription {}: {}", room, e);
            return SessionEnd::Disconnected;
        }
        debug!("[Signaling] Subscribed {}", room);
        active.insert(room);
    }

    loop {
        tokio::select! {
            // Incoming gateway messages
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_envelope(&text, registry);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!("[Signaling] Failed to send pong: {}", e);
                            return SessionEnd::Disconnected;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("[Signaling] Connection closed by gateway");
                        return SessionEnd::Disconnected;
                    }
                    Some(Err(e)) => {
                        error!("[Signaling] Socket error: {}", e);
                        return SessionEnd::Disconnected;
                    }
                    None => {
                        info!("[Signaling] Stream ended");
                        return SessionEnd::Disconnected;
                    }
                    _ => {}
                }
            }

            // Commands from handles. The per-session `active` set keeps
            // replay + live subscribes from ever double-sending a room.
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Subscribe(room)) => {
                        if active.insert(room.clone()) {
                            if let Err(e) = send_request(&mut write, &ClientRequest::subscribe(&room)).await {
                                warn!("[Signaling] Failed to subscribe {}: {}", room, e);
                                return SessionEnd::Disconnected;
                            }
                            debug!("[Signaling] Subscribed {}", room);
                        }
                    }
                    Some(Command::Unsubscribe(room)) => {
                        if active.remove(&room) {
                            if let Err(e) = send_request(&mut write, &ClientRequest::unsubscribe(&room)).await {
                                warn!("[Signaling] Failed to unsubscribe {}: {}", room, e);
                                return SessionEnd::Disconnected;
                            }
                            debug!("[Signaling] Unsubscribed {}", room);
                        }
                    }
                    None => return SessionEnd::Shutdown,
                }
            }
        }
    }
}

/// Serialize and send one control request
async fn send_request(write: &mut WsSink, request: &ClientRequest) -> TallyResult<()> {
    let json = serde_json::to_string(request)
        .map_err(|e| TallyError::internal(format!("encode control request: {}", e)))?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| TallyError::network(e.to_string()))
}

/// Parse one gateway envelope and fan it out to the room's callbacks.
/// Anything malformed is logged and dropped; the next message is
/// unaffected.
fn dispatch_envelope(text: &str, registry: &CallbackRegistry) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("[Signaling] Dropping malformed envelope: {}", e);
            return;
        }
    };

    let room: Room = match envelope.room.parse() {
        Ok(room) => room,
        Err(e) => {
            warn!("[Signaling] Dropping envelope: {}", e);
            return;
        }
    };

    let update = match RoomUpdate::parse(room.kind, &envelope.data) {
        Ok(update) => update,
        Err(e) => {
            warn!("[Signaling] Dropping {} payload: {}", room, e);
            return;
        }
    };

    let delivered = registry.dispatch(&room, &update);
    debug!("[Signaling] {} delivered to {} callback(s)", room, delivered);
}
