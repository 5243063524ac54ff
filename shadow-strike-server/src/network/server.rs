//! WebSocket Arena Server
//!
//! Async WebSocket front end for the arena. Each connection authenticates
//! with a provider JWT, then issues arena operations as JSON messages.
//! Committed registrations and battles are pushed to every connection.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Notify, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::battle::Arena;
use crate::core::identity::PlayerId;
use crate::fhe::{DecryptionOracle, FheEvaluator};
use crate::network::auth::Authenticator;
use crate::network::protocol::{AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for longer than this are dropped.
    pub idle_timeout: Duration,
    /// How often idle connections are swept.
    pub cleanup_interval: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerRunError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Log correlation id.
    connection_id: Uuid,
    /// Bound identity after auth.
    player: Option<PlayerId>,
    /// Last inbound message.
    last_activity: Instant,
    /// Outbound queue.
    sender: mpsc::Sender<ServerMessage>,
    /// Signals the connection task to close.
    kick: Arc<Notify>,
}

type ClientMap = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

// =============================================================================
// DISPATCH
// =============================================================================

/// Routes decoded client messages to arena operations.
///
/// Holds no connection state; the caller owns the bound identity.
pub struct Dispatcher<B> {
    arena: Arc<Arena<B>>,
    auth: Option<Arc<Authenticator>>,
    version: String,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            auth: self.auth.clone(),
            version: self.version.clone(),
        }
    }
}

impl<B: FheEvaluator + DecryptionOracle> Dispatcher<B> {
    /// Create a dispatcher. With `auth` unset every authentication attempt fails.
    pub fn new(arena: Arc<Arena<B>>, auth: Option<Arc<Authenticator>>, version: String) -> Self {
        Self { arena, auth, version }
    }

    /// Handle one message for a connection bound to `identity`.
    pub async fn dispatch(
        &self,
        identity: &mut Option<PlayerId>,
        msg: ClientMessage,
    ) -> ServerMessage {
        if msg.requires_auth() {
            return match *identity {
                Some(who) => self.dispatch_authenticated(who, msg).await,
                None => error_reply(ServerError::new(
                    ErrorCode::NotAuthenticated,
                    "Must authenticate first",
                )),
            };
        }

        match msg {
            ClientMessage::Auth { token } => self.authenticate(identity, &token),
            ClientMessage::GetPlayer { player } => match self.arena.get_player(&player).await {
                Ok(player) => ServerMessage::Player { player },
                Err(e) => error_reply(ServerError::from(&e)),
            },
            ClientMessage::GetAllPlayers => match self.arena.get_all_players().await {
                Ok(players) => ServerMessage::Players { players },
                Err(e) => error_reply(ServerError::from(&e)),
            },
            ClientMessage::GetBattleHistory { player } => ServerMessage::History {
                player,
                entries: self.arena.get_battle_history(&player).await,
            },
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: server_time_millis(),
            },
            other => {
                debug!(message = ?other, "Unroutable message");
                error_reply(ServerError::new(ErrorCode::InvalidMessage, "Unsupported message"))
            }
        }
    }

    async fn dispatch_authenticated(&self, who: PlayerId, msg: ClientMessage) -> ServerMessage {
        let result = match msg {
            ClientMessage::Register { name } => self
                .arena
                .register_player(who, &name)
                .await
                .map(|reg| ServerMessage::Registered { tx: reg.tx, player: reg.player }),
            ClientMessage::Battle { opponent } => self
                .arena
                .battle(who, opponent)
                .await
                .map(ServerMessage::BattleResolved),
            ClientMessage::Decrypt { battle_id } => self
                .arena
                .request_decrypt(who, battle_id)
                .await
                .map(|outcome| ServerMessage::Decrypted { battle_id, outcome }),
            ClientMessage::RevealStats => self
                .arena
                .reveal_own_stats(who)
                .await
                .map(|stats| ServerMessage::Stats { power: stats.power(), stats }),
            other => {
                debug!(message = ?other, "Unroutable message");
                return error_reply(ServerError::new(ErrorCode::InvalidMessage, "Unsupported message"));
            }
        };
        result.unwrap_or_else(|e| error_reply(ServerError::from(&e)))
    }

    fn authenticate(&self, identity: &mut Option<PlayerId>, token: &str) -> ServerMessage {
        let verified = match &self.auth {
            Some(auth) => auth.verify(token),
            None => Err(crate::network::auth::AuthError::NotConfigured),
        };

        match verified {
            Ok(who) => {
                *identity = Some(who);
                ServerMessage::AuthResult(AuthResult {
                    success: true,
                    player: Some(who),
                    error: None,
                    server_version: self.version.clone(),
                })
            }
            Err(e) => {
                debug!(error = %e, "Authentication rejected");
                ServerMessage::AuthResult(AuthResult {
                    success: false,
                    player: None,
                    error: Some(ServerError::from(&e).message),
                    server_version: self.version.clone(),
                })
            }
        }
    }
}

fn error_reply(err: ServerError) -> ServerMessage {
    ServerMessage::Error(err)
}

fn server_time_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

// =============================================================================
// SERVER
// =============================================================================

/// The arena server.
pub struct ArenaServer<B> {
    config: ServerConfig,
    dispatcher: Dispatcher<B>,
    clients: ClientMap,
    shutdown_tx: broadcast::Sender<()>,
}

impl<B: FheEvaluator + DecryptionOracle + 'static> ArenaServer<B> {
    /// Create a server in front of `arena`.
    pub fn new(config: ServerConfig, arena: Arc<Arena<B>>, auth: Option<Authenticator>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let dispatcher = Dispatcher::new(arena, auth.map(Arc::new), config.version.clone());
        Self {
            config,
            dispatcher,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Run until [`ArenaServer::shutdown`] is called.
    #[instrument(skip(self), fields(bind = %self.config.bind_addr))]
    pub async fn run(&self) -> Result<(), ServerRunError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Arena server listening on {}", self.config.bind_addr);

        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.idle_timeout;
        let cleanup_interval = self.config.cleanup_interval;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout, cleanup_interval).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_full(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let dispatcher = self.dispatcher.clone();
        let mut events = dispatcher.arena.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let connection_id = Uuid::new_v4();
            let kick = Arc::new(Notify::new());

            clients.write().await.insert(
                addr,
                ConnectedClient {
                    connection_id,
                    player: None,
                    last_activity: Instant::now(),
                    sender: msg_tx.clone(),
                    kick: kick.clone(),
                },
            );
            debug!(%connection_id, %addr, "Client registered");

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut identity: Option<PlayerId> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => dispatcher.dispatch(&mut identity, client_msg).await,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        error_reply(ServerError::new(
                                            ErrorCode::InvalidMessage,
                                            "Invalid message format",
                                        ))
                                    }
                                };

                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&addr) {
                                        client.last_activity = Instant::now();
                                        client.player = identity;
                                    }
                                }

                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(error_reply(ServerError::new(
                                    ErrorCode::InvalidMessage,
                                    "Binary frames are not supported",
                                ))).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                if msg_tx.send(ServerMessage::Event { event }).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(%connection_id, skipped, "Client lagging behind arena events");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = kick.notified() => {
                        debug!(%connection_id, "Connection closed by server");
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let the writer flush what is already queued.
            drop(msg_tx);
            clients.write().await.remove(&addr);
            let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;

            info!(%connection_id, "Client {} cleaned up", addr);
        });
    }

    /// Drop connections idle for longer than `idle_timeout`.
    async fn run_cleanup_loop(clients: ClientMap, idle_timeout: Duration, every: Duration) {
        let mut interval = interval(every);

        loop {
            interval.tick().await;
            let removed = Self::sweep_idle(&clients, idle_timeout, Instant::now()).await;
            if removed > 0 {
                info!(removed, "Removed idle clients");
            }
        }
    }

    async fn sweep_idle(clients: &ClientMap, idle_timeout: Duration, now: Instant) -> usize {
        let mut clients = clients.write().await;
        let before = clients.len();
        clients.retain(|addr, client| {
            let keep = now.duration_since(client.last_activity) <= idle_timeout;
            if !keep {
                debug!(connection_id = %client.connection_id, %addr, "Idle client dropped");
                let _ = client.sender.try_send(ServerMessage::Shutdown {
                    reason: "Idle timeout".to_string(),
                });
                client.kick.notify_one();
            }
            keep
        });
        before - clients.len()
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Connections bound to an identity.
    pub async fn authenticated_count(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|client| client.player.is_some())
            .count()
    }
}

/// Finish the handshake only to tell the client there is no room.
async fn reject_full<S>(stream: S, addr: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake with rejected client {} failed: {}", addr, e);
            return;
        }
    };

    let reply = error_reply(ServerError {
        retryable: true,
        ..ServerError::new(ErrorCode::ServerFull, "Connection limit reached")
    });
    if let Ok(text) = reply.to_json() {
        let _ = ws.send(Message::Text(text)).await;
    }
    let _ = ws.close(None).await;
}

// =============================================================================
// TESTS
// =============================================================================
