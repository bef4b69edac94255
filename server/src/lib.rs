//! # Impostor Game Server Library
//!
//! This library provides the authoritative server for the impostor word game.
//! A small group of players connects over TCP, each receives a secret word,
//! and they take turns saying one word about it. One player, the impostor,
//! holds a different word. After the last round everybody votes on who the
//! impostor was.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the complete lifecycle of client connections including:
//! - Accepting connections up to the configured capacity
//! - Username login with case-insensitive uniqueness
//! - Disconnection handling and game repair
//!
//! ### Phase Engine
//! Drives the game through `WAITING`, `ASSIGNING_WORDS`, `PLAYING`, `VOTING`
//! and `RESULTS`. Turns and votes are validated against the current phase and
//! answered with coded `/ret` replies; timers force progress when players
//! stall.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! The server runs on a current-thread runtime. Per-connection tasks only
//! move bytes: readers frame lines and forward them over a channel, writers
//! drain a queue of outgoing lines. All game state lives in the loop task and
//! is mutated only there, so no locking is needed.
//!
//! ### Line Protocol
//! Every message is a newline-terminated `/command param:param` line. The
//! codec lives in the `shared` crate and is used by both ends.
//!
//! ## Module Organization
//!
//! - `config`: game settings and their validation
//! - `error`: startup and configuration errors
//! - `session_manager`: connected sessions, usernames, scores and votes
//! - `words`: word pair corpus
//! - `game`: the phase state machine
//! - `network`: TCP accept loop, connection tasks and the timer tick
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//! use server::words::CsvWordSource;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let words = CsvWordSource::load("data/words.csv")?;
//!     let server = Server::new("0.0.0.0:5000", GameConfig::default(), Box::new(words)).await?;
//!
//!     // Accepts players and runs games until Ctrl+C
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod session_manager;
pub mod words;
