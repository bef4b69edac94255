//! Client-side view of the game, rebuilt from server messages

use log::debug;
use shared::{
    normalize_username, Domain, Info, RetCode, ScoreLine, ServerPacket, ALERT_GAME_STARTING,
    ALERT_WAITING_FOR_PLAYERS,
};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// Oldest events are dropped past this many entries
pub const MAX_LOG_ENTRIES: usize = 200;

/// The server does not announce its cool-down, so the client assumes the default.
pub const RESULTS_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalPhase {
    WaitingUsername,
    Waiting,
    Assigned,
    WaitingTurn,
    Playing,
    Voting,
    Results,
}

impl fmt::Display for LocalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LocalPhase::WaitingUsername => "login",
            LocalPhase::Waiting => "waiting",
            LocalPhase::Assigned => "word assigned",
            LocalPhase::WaitingTurn => "waiting for turn",
            LocalPhase::Playing => "your turn",
            LocalPhase::Voting => "voting",
            LocalPhase::Results => "results",
        };
        f.write_str(label)
    }
}

/// A timer started from a prompt's timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub duration: Duration,
    pub started: Instant,
}

impl Countdown {
    pub fn new(seconds: u64, now: Instant) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            started: now,
        }
    }

    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let left = self
            .duration
            .saturating_sub(now.saturating_duration_since(self.started));
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.remaining_secs(now) == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRow {
    pub name: String,
    /// Words said during the current game
    pub words: Vec<String>,
    pub last_score: Option<ScoreLine>,
}

impl PlayerRow {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            words: Vec::new(),
            last_score: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub impostor: String,
    pub impostor_word: String,
    pub common_word: String,
}

/// Everything the terminal shows, owned by the client's event loop
#[derive(Debug)]
pub struct GameView {
    pub username: Option<String>,
    pending_username: Option<String>,
    pub server_name: Option<String>,
    pub phase: LocalPhase,
    pub secret_word: Option<String>,
    pub turn: Option<String>,
    pub round: Option<String>,
    pub players: Vec<PlayerRow>,
    pub reveal: Option<Reveal>,
    pub countdown: Option<Countdown>,
    play_secs: u64,
    log: VecDeque<String>,
    unread: usize,
}

impl Default for GameView {
    fn default() -> Self {
        Self::new()
    }
}

impl GameView {
    pub fn new() -> Self {
        Self {
            username: None,
            pending_username: None,
            server_name: None,
            phase: LocalPhase::WaitingUsername,
            secret_word: None,
            turn: None,
            round: None,
            players: Vec::new(),
            reveal: None,
            countdown: None,
            play_secs: 0,
            log: VecDeque::new(),
            unread: 0,
        }
    }

    /// Remembers the name just sent, in the form the server registers it,
    /// so a successful reply can confirm it.
    pub fn set_pending_username(&mut self, name: &str) {
        self.pending_username = Some(normalize_username(name));
    }

    pub fn is_me(&self, name: &str) -> bool {
        self.username.as_deref() == Some(name)
    }

    pub fn log(&self) -> impl Iterator<Item = &String> {
        self.log.iter()
    }

    pub fn push_event(&mut self, text: impl Into<String>) {
        if self.log.len() == MAX_LOG_ENTRIES {
            self.log.pop_front();
        }
        self.log.push_back(text.into());
        self.unread = (self.unread + 1).min(MAX_LOG_ENTRIES);
    }

    /// Events added since the last call, oldest first.
    pub fn take_unread(&mut self) -> Vec<String> {
        let start = self.log.len() - self.unread;
        self.unread = 0;
        self.log.iter().skip(start).cloned().collect()
    }

    fn row_mut(&mut self, name: &str) -> &mut PlayerRow {
        let idx = match self.players.iter().position(|p| p.name == name) {
            Some(idx) => idx,
            None => {
                self.players.push(PlayerRow::new(name));
                self.players.len() - 1
            }
        };
        &mut self.players[idx]
    }

    fn start_new_game(&mut self) {
        self.reveal = None;
        self.turn = None;
        for row in &mut self.players {
            row.words.clear();
        }
    }

    /// Applies one server message.
    pub fn apply(&mut self, packet: ServerPacket, now: Instant) {
        match packet {
            ServerPacket::LoginPrompt => {
                if self.username.is_none() {
                    self.phase = LocalPhase::WaitingUsername;
                    self.push_event("Enter a username");
                }
            }
            ServerPacket::Ret { domain, code } => self.apply_ret(domain, code),
            ServerPacket::Info(info) => self.apply_info(info, now),
            ServerPacket::Assign { word } => {
                self.start_new_game();
                self.phase = LocalPhase::Assigned;
                self.push_event(format!("Your secret word is '{word}'"));
                self.secret_word = Some(word);
            }
            ServerPacket::PlayPrompt { seconds } => {
                if self.phase != LocalPhase::Playing {
                    self.push_event(format!("Your turn, say a word ({seconds}s)"));
                }
                self.phase = LocalPhase::Playing;
                self.countdown = Some(Countdown::new(seconds, now));
            }
            ServerPacket::ChoicePrompt { seconds } => {
                if self.phase != LocalPhase::Voting {
                    self.push_event(format!("Vote for the impostor ({seconds}s)"));
                }
                self.phase = LocalPhase::Voting;
                self.turn = None;
                self.countdown = Some(Countdown::new(seconds, now));
            }
        }
    }

    fn apply_ret(&mut self, domain: Domain, code: RetCode) {
        let text = match (domain, code) {
            (Domain::Login, RetCode::Ok) => {
                self.username = self.pending_username.take();
                self.phase = LocalPhase::Waiting;
                match &self.username {
                    Some(name) => format!("Logged in as {name}"),
                    None => "Logged in".to_string(),
                }
            }
            (Domain::Login, RetCode::UsernameTaken) => "That username is taken".into(),
            (Domain::Login, RetCode::InvalidUsername) => {
                "Usernames need at least 3 characters and no ':'".into()
            }
            (Domain::Play, RetCode::Ok) => {
                self.phase = LocalPhase::WaitingTurn;
                self.countdown = None;
                "Word accepted".into()
            }
            (Domain::Play, RetCode::NotYourTurn) => "It is not your turn".into(),
            (Domain::Play, RetCode::WordAlreadyPlayed) => "That word was already said".into(),
            (Domain::Play, RetCode::InvalidWord) => "Send a single word without ':'".into(),
            (Domain::Choice, RetCode::Ok) => "Vote recorded".into(),
            (Domain::Choice, RetCode::SelfVote) => "You cannot vote for yourself".into(),
            (Domain::Choice, RetCode::UnknownPlayer) => "No such player in this game".into(),
            (_, RetCode::UnexpectedCommand) => {
                if matches!(self.phase, LocalPhase::Playing | LocalPhase::Voting) {
                    self.phase = LocalPhase::Waiting;
                    self.countdown = None;
                }
                "Not allowed right now".into()
            }
            (Domain::Proto, _) => "The server did not understand that".into(),
            (domain, code) => format!("{domain} {code}"),
        };
        self.push_event(text);
    }

    fn apply_info(&mut self, info: Info, now: Instant) {
        match info {
            Info::Id { server_name } => {
                self.push_event(format!("Connected to {server_name}"));
                self.server_name = Some(server_name);
            }
            Info::Login {
                ready,
                max,
                username,
            } => {
                self.row_mut(&username);
                self.push_event(format!("{username} joined ({ready}/{max} ready)"));
            }
            Info::Game {
                round,
                max_rounds,
                players,
                play_secs,
                ..
            } => {
                if round == 1 {
                    self.start_new_game();
                }
                self.play_secs = play_secs;
                self.round = Some(format!("{round}/{max_rounds}"));
                self.push_event(format!("Round {round} of {max_rounds}, {players} players"));
            }
            Info::Wait { username } => {
                if !self.is_me(&username) {
                    self.phase = LocalPhase::WaitingTurn;
                    self.countdown = Some(Countdown::new(self.play_secs, now));
                    self.push_event(format!("{username} is thinking"));
                }
                self.row_mut(&username);
                self.turn = Some(username);
            }
            Info::Say { username, word } => {
                self.push_event(format!("{username}: {word}"));
                self.row_mut(&username).words.push(word);
            }
            Info::Choice { voter, target } => {
                self.push_event(format!("{voter} votes for {target}"));
            }
            Info::Answer {
                impostor,
                impostor_word,
                common_word,
            } => {
                self.push_event(format!(
                    "The impostor was {impostor} with '{impostor_word}', everyone else had '{common_word}'"
                ));
                self.reveal = Some(Reveal {
                    impostor,
                    impostor_word,
                    common_word,
                });
            }
            Info::Result { scores } => {
                for score in scores {
                    let username = score.username.clone();
                    self.row_mut(&username).last_score = Some(score);
                }
                self.phase = LocalPhase::Results;
                self.countdown = Some(Countdown {
                    duration: RESULTS_COOLDOWN,
                    started: now,
                });
                self.push_event("Scores updated");
            }
            Info::Alert { text } => {
                let ends_results = text == ALERT_GAME_STARTING || text == ALERT_WAITING_FOR_PLAYERS;
                if self.phase == LocalPhase::Results && ends_results {
                    self.phase = LocalPhase::Waiting;
                    self.countdown = None;
                }
                if let Some(name) = text.strip_suffix(" disconnected") {
                    debug!("Removing {} from the table", name);
                    self.players.retain(|p| p.name != name);
                }
                self.push_event(text);
            }
        }
    }
}
