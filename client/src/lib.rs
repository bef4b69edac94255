//! # Impostor Game Client Library
//!
//! A line-oriented terminal client for the impostor word game. Server
//! messages are decoded into a local view of the game, the view is printed as
//! text, and typed lines become protocol messages based on the current phase.
//!
//! ## Architecture Overview
//!
//! Helper tasks read the socket and stdin and forward what they get over a
//! channel. A single event loop owns the [`game::GameView`], applies server
//! messages to it, sends player input, and re-renders once a second so
//! countdowns stay current.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The client-side view: phase, secret word, turn, round, player table,
//! impostor reveal, countdown and a bounded event log.
//!
//! ### Input Module (`input`)
//! Turns a typed line into a login, a word, or a vote depending on the phase.
//! Lines starting with `/` are sent as typed.
//!
//! ### Network Module (`network`)
//! TCP connection, line framing and the event loop.
//!
//! ### Rendering Module (`rendering`)
//! Status line and scoreboard formatting.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("127.0.0.1:5000").await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
