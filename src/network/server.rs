//! WebSocket Game Server
//!
//! Accepts WebSocket connections and bridges each one to the round engine.
//! Every connection gets a fresh participant id, an outbound channel and a
//! writer task; all round logic stays in the engine.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::core::money::Amount;
use crate::fairness::commitment::FairnessError;
use crate::game::machine::{GameConfig, RoundStateMachine};
use crate::game::participant::ParticipantId;
use crate::network::engine::{EngineHandle, EngineStopped, RoundEngine};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3001;

/// How long a closing connection may spend flushing its queue.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Engine command queue capacity.
    pub command_queue_depth: usize,
    /// Per-client outbound queue capacity.
    pub client_queue_depth: usize,
    /// Server version string.
    pub version: String,
    /// Round timing and economy.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            command_queue_depth: 1024,
            client_queue_depth: 256,
            version: env!("CARGO_PKG_VERSION").to_string(),
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `CRASH_*` / `PORT` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    /// Unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("CRASH_BIND_ADDR") {
            config.bind_addr = parse_or(&raw, "CRASH_BIND_ADDR", config.bind_addr);
        } else if let Some(raw) = lookup("PORT") {
            let port = parse_or(&raw, "PORT", DEFAULT_PORT);
            config.bind_addr.set_port(port);
        }

        if let Some(raw) = lookup("CRASH_MAX_CONNECTIONS") {
            config.max_connections = parse_or(&raw, "CRASH_MAX_CONNECTIONS", config.max_connections);
        }
        if let Some(raw) = lookup("CRASH_COUNTDOWN_SECS") {
            config.game.countdown_secs = parse_or(&raw, "CRASH_COUNTDOWN_SECS", config.game.countdown_secs);
        }
        if let Some(raw) = lookup("CRASH_STARTING_BALANCE") {
            match raw.trim().parse::<f64>().ok().and_then(Amount::from_units) {
                Some(balance) => config.game.starting_balance = balance,
                None => warn!(value = %raw, "invalid CRASH_STARTING_BALANCE, keeping default"),
            }
        }

        config
    }
}

fn parse_or<T: FromStr>(raw: &str, key: &str, default: T) -> T {
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(value = %raw, "invalid {}, keeping default", key);
            default
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The round engine exited unexpectedly.
    #[error("Round engine stopped")]
    EngineStopped(#[from] EngineStopped),

    /// Round secrets could not be generated.
    #[error("Fairness failure: {0}")]
    Fairness(#[from] FairnessError),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Open connections.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let (machine, _) = RoundStateMachine::new(self.config.game.clone())?;
        let (engine, mut engine_task) = RoundEngine::spawn(
            machine,
            self.config.command_queue_depth,
            self.shutdown_tx.subscribe(),
        );

        info!(
            addr = ?listener.local_addr().ok(),
            version = %self.config.version,
            "Crash round server listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let open = self.connections.load(Ordering::SeqCst);
                            if open >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_connection(stream, addr));
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, engine.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                finished = &mut engine_task => {
                    return match finished {
                        Ok(Ok(())) => Err(GameServerError::EngineStopped(EngineStopped)),
                        Ok(Err(e)) => Err(e.into()),
                        Err(e) => {
                            error!("Round engine task failed: {}", e);
                            Err(GameServerError::EngineStopped(EngineStopped))
                        }
                    };
                }
            }
        }

        match engine_task.await {
            Ok(result) => result.map_err(GameServerError::from),
            Err(_) => Err(GameServerError::EngineStopped(EngineStopped)),
        }
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, engine: EngineHandle) {
        let connections = self.connections.clone();
        let queue_depth = self.config.client_queue_depth.max(1);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(queue_depth);
            let participant = ParticipantId::new_v4();

            // Spawn message sender task
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
                let _ = ws_sender.close().await;
            });

            if engine.connect(participant, msg_tx.clone()).await.is_ok() {
                info!(participant = %participant.short(), "Client {} connected", addr);

                loop {
                    tokio::select! {
                        msg = ws_receiver.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let client_msg = match ClientMessage::from_json(&text) {
                                        Ok(m) => m,
                                        Err(e) => {
                                            debug!("Invalid message from {}: {}", addr, e);
                                            let _ = msg_tx.try_send(ServerMessage::Rejected(ServerError::new(
                                                ErrorCode::InvalidInput,
                                                "Invalid message format",
                                            )));
                                            continue;
                                        }
                                    };

                                    if engine.submit(participant, client_msg).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    debug!("Client {} disconnected", addr);
                                    break;
                                }
                                Some(Err(e)) => {
                                    warn!("WebSocket error for {}: {}", addr, e);
                                    break;
                                }
                                _ => {}
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            let _ = msg_tx.send(ServerMessage::Shutdown {
                                reason: "Server shutting down".to_string(),
                            }).await;
                            break;
                        }
                    }
                }
            }

            // Cleanup: once the engine drops its sender the writer drains and exits
            drop(msg_tx);
            let _ = engine.disconnect(participant).await;
            if tokio::time::timeout(FLUSH_TIMEOUT, sender_task).await.is_err() {
                debug!("Writer for {} did not drain in time", addr);
            }

            connections.fetch_sub(1, Ordering::SeqCst);
            info!(participant = %participant.short(), "Client {} cleaned up", addr);
        });
    }

    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Tell an over-limit client why it is being dropped.
async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake with rejected client {} failed: {}", addr, e);
            return;
        }
    };

    let rejection = ServerMessage::Rejected(ServerError::new(
        ErrorCode::ServerOverloaded,
        "Server is full",
    ));
    if let Ok(text) = rejection.to_json() {
        let _ = ws.send(Message::Text(text)).await;
    }
    let _ = ws.close(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_tungstenite::connect_async;
    use serde_json::Value;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.game.countdown_secs, 10);
        assert_eq!(config.game.starting_balance, Amount::from_whole(1000));
    }

    #[test]
    fn test_config_from_env_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "4000"),
            ("CRASH_MAX_CONNECTIONS", "5"),
            ("CRASH_COUNTDOWN_SECS", "3"),
            ("CRASH_STARTING_BALANCE", "250.5"),
        ]));
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.game.countdown_secs, 3);
        assert_eq!(config.game.starting_balance, Amount::from_hundredths(25050));
    }

    #[test]
    fn test_bind_addr_wins_over_port() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("CRASH_BIND_ADDR", "127.0.0.1:9000"),
            ("PORT", "4000"),
        ]));
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("CRASH_MAX_CONNECTIONS", "-1"),
            ("CRASH_STARTING_BALANCE", "lots"),
        ]));
        let defaults = ServerConfig::default();
        assert_eq!(config.bind_addr, defaults.bind_addr);
        assert_eq!(config.max_connections, defaults.max_connections);
        assert_eq!(config.game.starting_balance, defaults.game.starting_balance);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        });
        assert_eq!(server.connection_count(), 0);
        server.shutdown();
        // Should not panic
    }

    async fn next_of_type<S>(ws: &mut S, kind: &str) -> Value
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = msg {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["type"] == kind {
                    return value;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_websocket_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(GameServer::new(ServerConfig::default()));

        let serving = server.clone();
        let server_task = tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        let snapshot = next_of_type(&mut ws, "gameUpdate").await;
        assert_eq!(snapshot["phase"], "waiting");
        assert_eq!(snapshot["balance"], 1000.0);

        ws.send(Message::Text(r#"{"type":"setName","name":"alice"}"#.to_string())).await.unwrap();
        let user = next_of_type(&mut ws, "userUpdate").await;
        assert_eq!(user["name"], "alice");

        ws.send(Message::Text(r#"{"type":"placeBet","amount":100}"#.to_string())).await.unwrap();
        let balance = next_of_type(&mut ws, "balanceUpdate").await;
        assert_eq!(balance["balance"], 900.0);

        ws.send(Message::Text("garbage".to_string())).await.unwrap();
        let rejected = next_of_type(&mut ws, "rejected").await;
        assert_eq!(rejected["code"], "invalid_input");

        server.shutdown();
        let shutdown = next_of_type(&mut ws, "shutdown").await;
        assert!(shutdown["reason"].is_string());

        let result = tokio::time::timeout(Duration::from_secs(5), server_task).await.unwrap().unwrap();
        assert!(result.is_ok());
    }
}
