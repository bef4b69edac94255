//! Server network layer handling TCP connections and the game loop

use crate::config::GameConfig;
use crate::error::ServerError;
use crate::game::GameState;
use crate::session_manager::{SessionId, SessionManager};
use crate::words::WordSource;
use log::{debug, error, info, warn};
use shared::{Info, LineBuffer, ServerPacket};
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

const TICK_INTERVAL: Duration = Duration::from_millis(500);
const READ_BUFFER_SIZE: usize = 1024;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    LineReceived { session_id: SessionId, line: String },
    Disconnected { session_id: SessionId },
}

/// Main server coordinating connections and the game
pub struct Server {
    listener: TcpListener,
    sessions: SessionManager,
    game: GameState,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: GameConfig,
        word_source: Box<dyn WordSource>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            sessions: SessionManager::new(config.max_players, config.max_rounds),
            game: GameState::new(config, word_source),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Main server loop, stopping once `shutdown` completes
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        let mut tick_interval = interval(TICK_INTERVAL);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Server started: {} players, {} rounds",
            self.game.config().max_players,
            self.game.config().max_rounds
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_new_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                // Handle lines and disconnects from connection tasks
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::LineReceived { session_id, line }) => {
                            self.handle_line(session_id, &line);
                        }
                        Some(ServerMessage::Disconnected { session_id }) => {
                            self.game.handle_disconnect(&mut self.sessions, session_id, Instant::now());
                        }
                        None => break,
                    }
                },

                // Phase timers
                _ = tick_interval.tick() => {
                    self.game.tick(&mut self.sessions, Instant::now());
                },

                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        let closed = self.sessions.close_all();
        info!("Closed {} sessions", closed);
        Ok(())
    }

    fn handle_new_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let Some(session_id) = self.sessions.add_session(addr, outbox_tx) else {
            warn!("Server full, dropping connection from {}", addr);
            return;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();

        let server_tx = self.server_tx.clone();
        tokio::spawn(async move {
            forward_lines(reader, session_id, server_tx).await;
        });
        tokio::spawn(async move {
            if let Err(e) = write_lines(writer, outbox_rx).await {
                info!("Write to session {} failed: {}", session_id, e);
            }
        });

        self.sessions.send(
            session_id,
            &ServerPacket::Info(Info::Id {
                server_name: self.game.config().server_name.clone(),
            }),
        );
        self.sessions.send(session_id, &ServerPacket::LoginPrompt);
    }

    fn handle_line(&mut self, session_id: SessionId, line: &str) {
        let Some(session) = self.sessions.get(session_id) else {
            return;
        };
        if line.trim().is_empty() {
            debug!("Ignoring empty line from session {}", session_id);
            return;
        }
        debug!("<- {}@{}: {}", session.display_name(), session.addr, line);
        self.game
            .handle_line(&mut self.sessions, session_id, line, Instant::now());
    }
}

/// Reads a connection, framing it into lines for the server loop. Ends with
/// a disconnect message on end-of-stream or read error.
pub async fn forward_lines<R: AsyncRead + Unpin>(
    mut reader: R,
    session_id: SessionId,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; READ_BUFFER_SIZE];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(len) => {
                buffer.extend(&chunk[..len]);
                while let Some(line) = buffer.next_line() {
                    if server_tx
                        .send(ServerMessage::LineReceived { session_id, line })
                        .is_err()
                    {
                        return;
                    }
                }
                if let Some(dropped) = buffer.discard_overflow() {
                    warn!(
                        "Session {} sent {} bytes without a newline, discarding",
                        session_id, dropped
                    );
                }
            }
            Err(e) => {
                info!("Read from session {} failed: {}", session_id, e);
                break;
            }
        }
    }

    let _ = server_tx.send(ServerMessage::Disconnected { session_id });
}

/// Drains a session's outbound queue into the socket until the queue closes.
pub async fn write_lines<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbox: mpsc::UnboundedReceiver<String>,
) -> std::io::Result<()> {
    while let Some(line) = outbox.recv().await {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.shutdown().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
