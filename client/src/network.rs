use crate::game::GameView;
use crate::input::{interpret, InputAction};
use crate::rendering::Renderer;
use log::{debug, error, info, warn};
use shared::{ClientPacket, LineBuffer, ServerPacket};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::interval;

const RENDER_INTERVAL: Duration = Duration::from_secs(1);

/// Events fed to the client loop by its helper tasks
#[derive(Debug)]
pub enum ClientEvent {
    Packet(ServerPacket),
    ConnectionClosed,
    Input(String),
    InputClosed,
}

pub struct Client {
    writer: OwnedWriteHalf,
    view: GameView,
    renderer: Renderer,

    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        info!("Connected to {}", server_addr);
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let reader_tx = events_tx.clone();
        tokio::spawn(async move {
            read_packets(reader, reader_tx).await;
        });

        Ok(Client {
            writer,
            view: GameView::new(),
            renderer: Renderer::new(),
            events_tx,
            events_rx,
        })
    }

    /// Spawns the task that turns stdin into input events
    fn spawn_input_reader(&self) {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if events_tx.send(ClientEvent::Input(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = events_tx.send(ClientEvent::InputClosed);
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        let _ = events_tx.send(ClientEvent::InputClosed);
                        break;
                    }
                }
            }
        });
    }

    async fn handle_input(&mut self, text: &str) -> Result<bool, std::io::Error> {
        let action = interpret(&self.view, text);
        match &action {
            InputAction::Quit => return Ok(false),
            InputAction::Ignored(reason) => {
                if !reason.is_empty() {
                    self.view.push_event(*reason);
                }
            }
            InputAction::Send(ClientPacket::Login {
                username: Some(name),
            }) => self.view.set_pending_username(name),
            _ => {}
        }

        if let Some(line) = action.line() {
            debug!("-> {}", line.trim_end());
            self.writer.write_all(line.as_bytes()).await?;
        }
        Ok(true)
    }

    /// Main client loop; the only place the view is mutated
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_input_reader();
        let mut render_interval = interval(RENDER_INTERVAL);

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(ClientEvent::Packet(packet)) => {
                            self.view.apply(packet, Instant::now());
                            self.renderer.render(&mut self.view, Instant::now());
                        }
                        Some(ClientEvent::Input(text)) => {
                            if !self.handle_input(&text).await? {
                                break;
                            }
                            self.renderer.render(&mut self.view, Instant::now());
                        }
                        Some(ClientEvent::ConnectionClosed) => {
                            warn!("Server closed the connection");
                            self.view.push_event("Disconnected from server");
                            break;
                        }
                        Some(ClientEvent::InputClosed) | None => break,
                    }
                },

                _ = render_interval.tick() => {
                    self.renderer.render(&mut self.view, Instant::now());
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.renderer.render(&mut self.view, Instant::now());
        let _ = self.writer.shutdown().await;
        Ok(())
    }
}

/// Frames the server stream into packets. Lines that do not decode are
/// skipped.
pub async fn read_packets<R: AsyncRead + Unpin>(
    mut reader: R,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 1024];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(len) => {
                buffer.extend(&chunk[..len]);
                while let Some(line) = buffer.next_line() {
                    debug!("<- {}", line);
                    match ServerPacket::decode(&line) {
                        Ok(packet) => {
                            if events_tx.send(ClientEvent::Packet(packet)).is_err() {
                                return;
                            }
                        }
                        Err(e) => debug!("Ignoring '{}': {}", line, e),
                    }
                }
                buffer.discard_overflow();
            }
            Err(e) => {
                error!("Error reading from server: {}", e);
                break;
            }
        }
    }

    let _ = events_tx.send(ClientEvent::ConnectionClosed);
}
