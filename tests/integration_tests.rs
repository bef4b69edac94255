//! Integration tests running a real server over TCP
//!
//! Each test binds a server on an ephemeral port and drives it with plain
//! socket clients speaking the line protocol.

use client::game::{GameView, LocalPhase};
use server::config::GameConfig;
use server::network::Server;
use server::words::FixedWordSource;
use shared::{LineBuffer, ServerPacket};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn small_config() -> GameConfig {
    GameConfig {
        max_players: 3,
        max_rounds: 1,
        play_timeout: Duration::from_secs(30),
        vote_timeout: Duration::from_secs(1),
        results_cooldown: Duration::from_secs(30),
        ..GameConfig::default()
    }
}

async fn start_server(config: GameConfig) -> SocketAddr {
    let words = Box::new(FixedWordSource::single("apple", "pear"));
    let server = Server::new("127.0.0.1:0", config, words)
        .await
        .expect("server should bind");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run_until(std::future::pending()));
    addr
}

/// Plain socket client that records every line it reads
struct TestClient {
    stream: TcpStream,
    buffer: LineBuffer,
    seen: Vec<String>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            stream,
            buffer: LineBuffer::new(),
            seen: Vec::new(),
        }
    }

    async fn send(&mut self, line: &str) {
        self.stream
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap();
    }

    /// Next line, or `None` once the server closes the connection.
    async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.buffer.next_line() {
                self.seen.push(line.clone());
                return Some(line);
            }
            let mut chunk = [0u8; 1024];
            let len = timeout(WAIT, self.stream.read(&mut chunk))
                .await
                .expect("timed out waiting for the server")
                .unwrap_or(0);
            if len == 0 {
                return None;
            }
            self.buffer.extend(&chunk[..len]);
        }
    }

    /// Reads until a line starting with `prefix` arrives.
    async fn expect(&mut self, prefix: &str) -> String {
        while let Some(line) = self.next_line().await {
            if line.starts_with(prefix) {
                return line;
            }
        }
        panic!("connection closed before '{prefix}', saw {:?}", self.seen);
    }

    async fn login(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.expect("/login").await;
        client.send(&format!("/login {name}")).await;
        assert_eq!(client.expect("/ret LOGIN").await, "/ret LOGIN:000");
        client
    }
}

#[tokio::test]
async fn new_connection_gets_id_and_login_prompt() {
    let addr = start_server(small_config()).await;
    let mut client = TestClient::connect(addr).await;

    assert_eq!(
        client.next_line().await.as_deref(),
        Some("/info ID:Impostor Server")
    );
    assert_eq!(client.next_line().await.as_deref(), Some("/login"));
}

#[tokio::test]
async fn third_login_assigns_words() {
    let addr = start_server(small_config()).await;
    let mut clients = Vec::new();
    for name in ["alice", "bob", "carol"] {
        clients.push(TestClient::login(addr, name).await);
    }

    let mut words = Vec::new();
    for client in &mut clients {
        let line = client.expect("/assign ").await;
        words.push(line.trim_start_matches("/assign ").to_string());
    }

    assert_eq!(words.iter().filter(|w| *w == "pear").count(), 1);
    assert_eq!(words.iter().filter(|w| *w == "apple").count(), 2);

    let game = clients[0].expect("/info GAME").await;
    assert_eq!(game, "/info GAME:1/1:3:30:1");
    assert_eq!(clients[0].expect("/play").await, "/play 30");
}

#[tokio::test]
async fn protocol_errors_keep_connection_open() {
    let addr = start_server(small_config()).await;
    let mut client = TestClient::login(addr, "alice").await;

    client.send("hello").await;
    assert_eq!(client.expect("/ret").await, "/ret PROTO:201");

    client.send("/dance now").await;
    assert_eq!(client.expect("/ret").await, "/ret PROTO:201");

    client.send("/play tree").await;
    assert_eq!(client.expect("/ret").await, "/ret PLAY:202");

    client.send("/login again").await;
    assert_eq!(client.expect("/ret").await, "/ret LOGIN:202");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let addr = start_server(small_config()).await;
    let _alice = TestClient::login(addr, "alice").await;

    let mut other = TestClient::connect(addr).await;
    other.expect("/login").await;
    other.send("/login Alice").await;
    assert_eq!(other.expect("/ret").await, "/ret LOGIN:101");
    assert_eq!(other.next_line().await.as_deref(), Some("/login"));
}

#[tokio::test]
async fn full_server_drops_extra_connection() {
    let addr = start_server(small_config()).await;
    let mut held = Vec::new();
    for _ in 0..3 {
        let mut client = TestClient::connect(addr).await;
        client.expect("/login").await;
        held.push(client);
    }

    let mut extra = TestClient::connect(addr).await;
    assert_eq!(extra.next_line().await, None);
}

#[tokio::test]
async fn disconnect_during_game_aborts_to_waiting() {
    let addr = start_server(small_config()).await;
    let mut alice = TestClient::login(addr, "alice").await;
    let bob = TestClient::login(addr, "bob").await;
    let _carol = TestClient::login(addr, "carol").await;
    alice.expect("/assign").await;

    drop(bob);
    assert_eq!(alice.expect("/info ALERT:bob").await, "/info ALERT:bob disconnected");
    alice.expect("/info ALERT:Not enough players").await;
    alice.expect("/info ALERT:Waiting for more players").await;
}

#[tokio::test]
async fn full_game_reaches_results() {
    let config = GameConfig {
        vote_timeout: Duration::from_secs(2),
        ..small_config()
    };
    let addr = start_server(config).await;
    let mut players = Vec::new();
    for name in ["alice", "bob", "carol"] {
        players.push(TestClient::login(addr, name).await);
    }

    for (n, player) in players.iter_mut().enumerate() {
        assert_eq!(player.expect("/play").await, "/play 30");
        player.send(&format!("/play word{n}")).await;
        assert_eq!(player.expect("/ret PLAY").await, "/ret PLAY:000");
    }

    for player in &mut players {
        assert_eq!(player.expect("/choice").await, "/choice 2");
    }
    players[0].send("/choice bob").await;
    assert_eq!(players[0].expect("/ret CHOICE").await, "/ret CHOICE:000");

    let answer = players[0].expect("/info ANSWER").await;
    assert!(answer.ends_with(":pear:apple"));
    let result = players[0].expect("/info RESULT").await;
    assert!(result.starts_with("/info RESULT:alice:0+"));

    // The client view makes sense of everything the server sent.
    let mut view = GameView::new();
    view.set_pending_username("alice");
    let now = Instant::now();
    for line in &players[0].seen {
        if let Ok(packet) = ServerPacket::decode(line) {
            view.apply(packet, now);
        }
    }
    assert_eq!(view.username.as_deref(), Some("alice"));
    assert_eq!(view.phase, LocalPhase::Results);
    assert_eq!(view.players.len(), 3);
    assert!(view.reveal.is_some());
    assert_eq!(
        view.players
            .iter()
            .find(|p| p.name == "bob")
            .unwrap()
            .words,
        vec!["word1".to_string()]
    );
}

#[tokio::test]
async fn five_player_results_reach_every_row() {
    let config = GameConfig {
        max_players: 5,
        ..small_config()
    };
    let addr = start_server(config).await;
    let names = ["alice", "bob", "carol", "dave", "erin"];
    let mut players = Vec::new();
    for name in names {
        players.push(TestClient::login(addr, name).await);
    }

    for (n, player) in players.iter_mut().enumerate() {
        assert_eq!(player.expect("/play").await, "/play 30");
        player.send(&format!("/play word{n}")).await;
        assert_eq!(player.expect("/ret PLAY").await, "/ret PLAY:000");
    }
    let result = players[0].expect("/info RESULT").await;
    assert!(result.contains(":erin:"));

    let mut view = GameView::new();
    view.set_pending_username("alice");
    let now = Instant::now();
    for line in &players[0].seen {
        if let Ok(packet) = ServerPacket::decode(line) {
            view.apply(packet, now);
        }
    }
    assert_eq!(view.phase, LocalPhase::Results);
    assert_eq!(view.players.len(), 5);
    for name in names {
        let row = view.players.iter().find(|p| p.name == name).unwrap();
        assert!(row.last_score.is_some(), "{name} has no score");
    }
}
