//! Scripted player for soak testing a running server.
//!
//! Logs in, answers every `/play` prompt with a random word and every
//! `/choice` prompt with a random player it has heard from.

use clap::Parser;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{ClientPacket, Domain, Info, LineBuffer, RetCode, ServerPacket};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

const WORDS: &[&str] = &[
    "bright", "cold", "round", "sweet", "loud", "soft", "heavy", "green", "fast", "old",
    "sharp", "wet", "tiny", "wild", "salty", "quiet", "warm", "shiny", "long", "dark",
];

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Username to log in with
    #[clap(short, long, default_value = "bot")]
    name: String,

    /// Pause before answering a prompt
    #[clap(long, default_value_t = 500)]
    delay_ms: u64,
}

struct Bot {
    name: String,
    attempt: u32,
    seen_players: Vec<String>,
    voted: bool,
    delay: Duration,
}

impl Bot {
    /// Returns the reply to a server packet, if any.
    fn respond(&mut self, packet: ServerPacket) -> Option<ClientPacket> {
        match packet {
            ServerPacket::LoginPrompt => Some(ClientPacket::Login {
                username: Some(self.current_name()),
            }),
            ServerPacket::Ret {
                domain: Domain::Login,
                code: RetCode::UsernameTaken | RetCode::InvalidUsername,
            } => {
                self.attempt += 1;
                debug!("Name rejected, next attempt {}", self.current_name());
                None
            }
            ServerPacket::Ret { domain, code } => {
                debug!("{} -> {}", domain, code);
                None
            }
            ServerPacket::Info(Info::Say { username, .. }) => {
                if !self.seen_players.contains(&username) {
                    self.seen_players.push(username);
                }
                None
            }
            ServerPacket::Info(Info::Game { round: 1, .. }) => {
                self.voted = false;
                self.seen_players.clear();
                None
            }
            ServerPacket::Info(info) => {
                debug!("{:?}", info);
                None
            }
            ServerPacket::Assign { word } => {
                info!("Secret word is {}", word);
                None
            }
            ServerPacket::PlayPrompt { .. } => {
                let mut rng = rand::thread_rng();
                let word = format!(
                    "{}{}",
                    WORDS.choose(&mut rng).copied().unwrap_or("thing"),
                    rng.gen_range(0..1000)
                );
                Some(ClientPacket::Play { word: Some(word) })
            }
            ServerPacket::ChoicePrompt { .. } => {
                if self.voted {
                    return None;
                }
                let me = self.current_name();
                let candidates: Vec<&String> =
                    self.seen_players.iter().filter(|p| **p != me).collect();
                let target = candidates.choose(&mut rand::thread_rng())?;
                self.voted = true;
                Some(ClientPacket::Choice {
                    target: Some((*target).clone()),
                })
            }
        }
    }

    fn current_name(&self) -> String {
        match self.attempt {
            0 => self.name.clone(),
            n => format!("{}{}", self.name, n),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);

    let mut bot = Bot {
        name: args.name,
        attempt: 0,
        seen_players: Vec::new(),
        voted: false,
        delay: Duration::from_millis(args.delay_ms),
    };
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 1024];

    loop {
        let len = stream.read(&mut chunk).await?;
        if len == 0 {
            info!("Server closed the connection");
            return Ok(());
        }
        buffer.extend(&chunk[..len]);

        while let Some(line) = buffer.next_line() {
            let packet = match ServerPacket::decode(&line) {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Ignoring '{}': {}", line, e);
                    continue;
                }
            };
            if let Some(reply) = bot.respond(packet) {
                sleep(bot.delay).await;
                debug!("-> {}", reply.encode().trim_end());
                stream.write_all(reply.encode().as_bytes()).await?;
            }
        }
    }
}
