//! The game phase engine
//!
//! `GameState` owns everything about the game in progress: phase, roster,
//! turn and round counters, the phase deadline and the played words. It is
//! driven from the server loop by three entry points:
//! - [`GameState::handle_line`] for every line a session sends
//! - [`GameState::tick`] on each timer tick
//! - [`GameState::handle_disconnect`] when a connection goes away
//!
//! Every entry point takes the current [`Instant`] so timers can be driven
//! deterministically.

use crate::config::GameConfig;
use crate::session_manager::{SessionId, SessionManager};
use crate::words::WordSource;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    normalize_username, ClientPacket, Command, Domain, Info, RetCode, ScoreLine, ServerPacket,
    ALERT_GAME_STARTING, ALERT_WAITING_FOR_PLAYERS, MAX_WORD_LEN, MIN_PLAYERS, MIN_USERNAME_LEN,
};
use std::fmt;
use std::time::Instant;

const CAUGHT_POINTS: u32 = 2;
const ESCAPED_POINTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    AssigningWords,
    Playing,
    Voting,
    Results,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Waiting => "WAITING",
            Phase::AssigningWords => "ASSIGNING_WORDS",
            Phase::Playing => "PLAYING",
            Phase::Voting => "VOTING",
            Phase::Results => "RESULTS",
        };
        f.write_str(name)
    }
}

/// Outcome of counting the votes of one voting phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Votes received per roster index
    pub counts: Vec<u32>,
    /// Roster index with the most votes, lowest index on ties
    pub target: Option<usize>,
    pub impostor_caught: bool,
}

pub struct GameState {
    config: GameConfig,
    phase: Phase,
    /// Players of the current game, fixed when it starts
    roster: Vec<SessionId>,
    impostor_idx: Option<usize>,
    current_turn: usize,
    current_round: u32,
    votes_received: usize,
    phase_deadline: Option<Instant>,
    played_words: Vec<String>,
    common_word: Option<String>,
    impostor_word: Option<String>,
    word_source: Box<dyn WordSource>,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: GameConfig, word_source: Box<dyn WordSource>) -> Self {
        Self::with_rng(config, word_source, StdRng::from_entropy())
    }

    pub fn with_seed(config: GameConfig, word_source: Box<dyn WordSource>, seed: u64) -> Self {
        Self::with_rng(config, word_source, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, word_source: Box<dyn WordSource>, rng: StdRng) -> Self {
        Self {
            config,
            phase: Phase::Waiting,
            roster: Vec::new(),
            impostor_idx: None,
            current_turn: 0,
            current_round: 0,
            votes_received: 0,
            phase_deadline: None,
            played_words: Vec::new(),
            common_word: None,
            impostor_word: None,
            word_source,
            rng,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn roster(&self) -> &[SessionId] {
        &self.roster
    }

    pub fn impostor(&self) -> Option<SessionId> {
        self.impostor_idx.and_then(|idx| self.roster.get(idx).copied())
    }

    /// Session whose turn it is while playing
    pub fn turn_player(&self) -> Option<SessionId> {
        match self.phase {
            Phase::Playing => self.roster.get(self.current_turn).copied(),
            _ => None,
        }
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn votes_received(&self) -> usize {
        self.votes_received
    }

    pub fn played_words(&self) -> &[String] {
        &self.played_words
    }

    pub fn phase_deadline(&self) -> Option<Instant> {
        self.phase_deadline
    }

    /// Seconds left before the phase deadline, rounded up.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        let Some(deadline) = self.phase_deadline else {
            return 0;
        };
        let left = deadline.saturating_duration_since(now);
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }

    /// Parses and dispatches one line received from a session.
    pub fn handle_line(
        &mut self,
        sessions: &mut SessionManager,
        session_id: SessionId,
        line: &str,
        now: Instant,
    ) {
        let packet =
            Command::parse_capped(line).and_then(|command| ClientPacket::from_command(&command));
        match packet {
            Ok(packet) => self.handle_packet(sessions, session_id, packet, now),
            Err(e) => {
                debug!("Rejecting line from session {}: {}", session_id, e);
                sessions.send(
                    session_id,
                    &ServerPacket::ret(Domain::Proto, RetCode::UnknownCommand),
                );
            }
        }
    }

    /// Routes a packet to its handler, rejecting anything the phase does not allow.
    pub fn handle_packet(
        &mut self,
        sessions: &mut SessionManager,
        session_id: SessionId,
        packet: ClientPacket,
        now: Instant,
    ) {
        match (packet, self.phase) {
            (ClientPacket::Login { username }, _) => {
                self.handle_login(sessions, session_id, username, now)
            }
            (ClientPacket::Play { word }, Phase::Playing) => {
                self.handle_word_submission(sessions, session_id, word, now)
            }
            (ClientPacket::Choice { target }, Phase::Voting) => {
                self.handle_vote(sessions, session_id, target, now)
            }
            (packet, phase) => {
                debug!(
                    "Session {} sent {:?} during {}",
                    session_id,
                    packet.domain(),
                    phase
                );
                sessions.send(
                    session_id,
                    &ServerPacket::ret(packet.domain(), RetCode::UnexpectedCommand),
                );
            }
        }
    }

    fn handle_login(
        &mut self,
        sessions: &mut SessionManager,
        session_id: SessionId,
        username: Option<String>,
        now: Instant,
    ) {
        let Some(session) = sessions.get(session_id) else {
            return;
        };
        if session.username_set() {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Login, RetCode::UnexpectedCommand),
            );
            return;
        }

        let username = username
            .map(|raw| normalize_username(&raw))
            .filter(|name| name.chars().count() >= MIN_USERNAME_LEN);
        let Some(username) = username else {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Login, RetCode::InvalidUsername),
            );
            sessions.send(session_id, &ServerPacket::LoginPrompt);
            return;
        };

        if sessions.by_username(&username).is_some() {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Login, RetCode::UsernameTaken),
            );
            sessions.send(session_id, &ServerPacket::LoginPrompt);
            return;
        }

        if !sessions.login(session_id, username.clone()) {
            return;
        }
        sessions.send(session_id, &ServerPacket::ret(Domain::Login, RetCode::Ok));
        sessions.broadcast(&ServerPacket::Info(Info::Login {
            ready: sessions.count_ready(),
            max: self.config.max_players,
            username: username.clone(),
        }));
        info!(
            "Session {} logged in as {} ({}/{} ready)",
            session_id,
            username,
            sessions.count_ready(),
            self.config.max_players
        );

        match self.phase {
            Phase::Waiting => {
                if sessions.all_ready(self.config.max_players) {
                    self.start_game(sessions, now);
                }
            }
            _ => sessions.send(
                session_id,
                &ServerPacket::alert("A game is in progress, you will join the next one"),
            ),
        }
    }

    fn handle_word_submission(
        &mut self,
        sessions: &mut SessionManager,
        session_id: SessionId,
        word: Option<String>,
        now: Instant,
    ) {
        if self.roster.get(self.current_turn) != Some(&session_id) {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Play, RetCode::NotYourTurn),
            );
            return;
        }

        let Some(word) = word.map(|w| w.chars().take(MAX_WORD_LEN).collect::<String>()) else {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Play, RetCode::InvalidWord),
            );
            self.reprompt_play(sessions, session_id, now);
            return;
        };

        let lowered = word.to_lowercase();
        if self.played_words.iter().any(|w| w.to_lowercase() == lowered) {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Play, RetCode::WordAlreadyPlayed),
            );
            self.reprompt_play(sessions, session_id, now);
            return;
        }

        self.played_words.push(word.clone());
        let round_slot = self.current_round.saturating_sub(1) as usize;
        let username = match sessions.get_mut(session_id) {
            Some(session) => {
                if let Some(slot) = session.submitted_words.get_mut(round_slot) {
                    *slot = Some(word.clone());
                }
                session.display_name().to_string()
            }
            None => return,
        };

        info!("{} said '{}' in round {}", username, word, self.current_round);
        sessions.broadcast(&ServerPacket::Info(Info::Say { username, word }));
        sessions.send(session_id, &ServerPacket::ret(Domain::Play, RetCode::Ok));
        self.advance_turn(sessions, now);
    }

    fn reprompt_play(&self, sessions: &SessionManager, session_id: SessionId, now: Instant) {
        sessions.send(
            session_id,
            &ServerPacket::PlayPrompt {
                seconds: self.remaining_secs(now),
            },
        );
    }

    fn handle_vote(
        &mut self,
        sessions: &mut SessionManager,
        session_id: SessionId,
        target: Option<String>,
        now: Instant,
    ) {
        if !self.roster.contains(&session_id) {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Choice, RetCode::UnexpectedCommand),
            );
            return;
        }

        let target_id = target
            .and_then(|name| sessions.by_username(&name))
            .filter(|id| self.roster.contains(id));
        let Some(target_id) = target_id else {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Choice, RetCode::UnknownPlayer),
            );
            self.reprompt_choice(sessions, session_id, now);
            return;
        };

        if target_id == session_id {
            sessions.send(
                session_id,
                &ServerPacket::ret(Domain::Choice, RetCode::SelfVote),
            );
            self.reprompt_choice(sessions, session_id, now);
            return;
        }

        let target_name = name_of(sessions, target_id);
        let voter_name = match sessions.get_mut(session_id) {
            Some(session) => {
                if session.vote.replace(target_id).is_none() {
                    self.votes_received += 1;
                }
                session.display_name().to_string()
            }
            None => return,
        };

        info!("{} votes for {}", voter_name, target_name);
        sessions.broadcast(&ServerPacket::Info(Info::Choice {
            voter: voter_name,
            target: target_name,
        }));
        sessions.send(session_id, &ServerPacket::ret(Domain::Choice, RetCode::Ok));
        self.reprompt_choice(sessions, session_id, now);
    }

    fn reprompt_choice(&self, sessions: &SessionManager, session_id: SessionId, now: Instant) {
        sessions.send(
            session_id,
            &ServerPacket::ChoicePrompt {
                seconds: self.remaining_secs(now),
            },
        );
    }

    /// Snapshots the logged-in players and deals out the secret words.
    fn start_game(&mut self, sessions: &mut SessionManager, now: Instant) {
        self.reset(sessions);
        self.phase = Phase::AssigningWords;
        self.roster = sessions.players();
        info!("Starting a game with {} players", self.roster.len());
        sessions.broadcast(&ServerPacket::alert(ALERT_GAME_STARTING));

        let impostor_idx = self.rng.gen_range(0..self.roster.len());
        let pair = self.word_source.pick_pair();
        for (idx, &id) in self.roster.iter().enumerate() {
            let word = if idx == impostor_idx {
                pair.impostor.clone()
            } else {
                pair.common.clone()
            };
            if let Some(session) = sessions.get_mut(id) {
                session.secret_word = Some(word.clone());
                session.send(&ServerPacket::Assign { word });
            }
        }
        debug!(
            "Impostor is {} ('{}' vs '{}')",
            name_of(sessions, self.roster[impostor_idx]),
            pair.impostor,
            pair.common
        );

        self.impostor_idx = Some(impostor_idx);
        self.common_word = Some(pair.common);
        self.impostor_word = Some(pair.impostor);
        self.current_turn = 0;
        self.current_round = 1;

        self.phase = Phase::Playing;
        sessions.broadcast(&self.game_info());
        self.announce_turn(sessions, now);
    }

    fn game_info(&self) -> ServerPacket {
        ServerPacket::Info(Info::Game {
            round: self.current_round,
            max_rounds: self.config.max_rounds,
            players: self.roster.len(),
            play_secs: self.config.play_secs(),
            choice_secs: self.config.vote_secs(),
        })
    }

    fn announce_turn(&mut self, sessions: &SessionManager, now: Instant) {
        let Some(&id) = self.roster.get(self.current_turn) else {
            return;
        };
        sessions.broadcast(&ServerPacket::Info(Info::Wait {
            username: name_of(sessions, id),
        }));
        sessions.send(
            id,
            &ServerPacket::PlayPrompt {
                seconds: self.config.play_secs(),
            },
        );
        self.phase_deadline = Some(now + self.config.play_timeout);
    }

    fn advance_turn(&mut self, sessions: &mut SessionManager, now: Instant) {
        self.current_turn += 1;
        self.settle_turn(sessions, now);
    }

    /// Wraps the turn index into the next round or on to voting, then
    /// prompts whoever is up.
    fn settle_turn(&mut self, sessions: &mut SessionManager, now: Instant) {
        if self.current_turn >= self.roster.len() {
            self.current_turn = 0;
            self.current_round += 1;
            if self.current_round > self.config.max_rounds {
                self.begin_voting(sessions, now);
                return;
            }
            info!("Round {}/{}", self.current_round, self.config.max_rounds);
            sessions.broadcast(&self.game_info());
        }
        self.announce_turn(sessions, now);
    }

    fn begin_voting(&mut self, sessions: &mut SessionManager, now: Instant) {
        info!("Voting opens for {}s", self.config.vote_secs());
        self.phase = Phase::Voting;
        self.votes_received = 0;
        for &id in &self.roster {
            if let Some(session) = sessions.get_mut(id) {
                session.vote = None;
            }
        }
        sessions.broadcast(&ServerPacket::ChoicePrompt {
            seconds: self.config.vote_secs(),
        });
        self.phase_deadline = Some(now + self.config.vote_timeout);
    }

    /// Counts the roster's votes.
    pub fn tally(&self, sessions: &SessionManager) -> Tally {
        let mut counts = vec![0u32; self.roster.len()];
        for &voter in &self.roster {
            let target = sessions.get(voter).and_then(|s| s.vote);
            if let Some(pos) = target.and_then(|t| self.roster.iter().position(|&id| id == t)) {
                counts[pos] += 1;
            }
        }

        let mut target = None;
        let mut best = 0;
        for (idx, &count) in counts.iter().enumerate() {
            if count > best {
                best = count;
                target = Some(idx);
            }
        }

        Tally {
            impostor_caught: target.is_some() && target == self.impostor_idx,
            counts,
            target,
        }
    }

    fn finish_voting(&mut self, sessions: &mut SessionManager, now: Instant) {
        let tally = self.tally(sessions);
        let impostor_idx = self.impostor_idx.unwrap_or_default();

        let mut scores = Vec::with_capacity(self.roster.len());
        for (idx, &id) in self.roster.iter().enumerate() {
            let gain = match (tally.impostor_caught, idx == impostor_idx) {
                (true, false) => CAUGHT_POINTS,
                (false, true) => ESCAPED_POINTS,
                _ => 0,
            };
            if let Some(session) = sessions.get_mut(id) {
                scores.push(ScoreLine {
                    username: session.display_name().to_string(),
                    old: session.score,
                    gain,
                });
                session.score += gain;
            }
        }

        let impostor = self
            .roster
            .get(impostor_idx)
            .map(|&id| name_of(sessions, id))
            .unwrap_or_default();
        if tally.impostor_caught {
            info!("The impostor {} was caught ({:?})", impostor, tally.counts);
        } else {
            info!("The impostor {} got away ({:?})", impostor, tally.counts);
        }

        sessions.broadcast(&ServerPacket::Info(Info::Answer {
            impostor,
            impostor_word: self.impostor_word.clone().unwrap_or_default(),
            common_word: self.common_word.clone().unwrap_or_default(),
        }));
        sessions.broadcast(&ServerPacket::Info(Info::Result { scores }));

        self.phase = Phase::Results;
        self.phase_deadline = Some(now + self.config.results_cooldown);
    }

    /// Runs any transition whose deadline has passed.
    pub fn tick(&mut self, sessions: &mut SessionManager, now: Instant) {
        let Some(deadline) = self.phase_deadline else {
            return;
        };
        if now < deadline {
            return;
        }

        match self.phase {
            Phase::Playing => {
                let name = self
                    .roster
                    .get(self.current_turn)
                    .map(|&id| name_of(sessions, id))
                    .unwrap_or_default();
                info!("{} ran out of time", name);
                self.advance_turn(sessions, now);
            }
            Phase::Voting => self.finish_voting(sessions, now),
            Phase::Results => self.start_next_game(sessions, now),
            Phase::Waiting | Phase::AssigningWords => self.phase_deadline = None,
        }
    }

    /// Resets and starts again when enough players are logged in.
    fn start_next_game(&mut self, sessions: &mut SessionManager, now: Instant) {
        self.reset(sessions);
        if sessions.player_count() >= MIN_PLAYERS {
            self.start_game(sessions, now);
        } else {
            info!(
                "Waiting for players ({} logged in)",
                sessions.player_count()
            );
            sessions.broadcast(&ServerPacket::alert(ALERT_WAITING_FOR_PLAYERS));
        }
    }

    /// Clears everything tied to the current game and returns to waiting.
    /// Scores are kept.
    pub fn reset(&mut self, sessions: &mut SessionManager) {
        self.phase = Phase::Waiting;
        self.roster.clear();
        self.impostor_idx = None;
        self.current_turn = 0;
        self.current_round = 0;
        self.votes_received = 0;
        self.phase_deadline = None;
        self.played_words.clear();
        self.common_word = None;
        self.impostor_word = None;
        sessions.reset_game_state();
    }

    /// Removes a session and repairs the game around its absence.
    pub fn handle_disconnect(
        &mut self,
        sessions: &mut SessionManager,
        session_id: SessionId,
        now: Instant,
    ) {
        let Some(session) = sessions.remove_session(&session_id) else {
            return;
        };
        let name = session.display_name().to_string();
        info!(
            "{} disconnected from {} after {:?}",
            name,
            session.addr,
            session.connected_at.elapsed()
        );
        if session.username_set() {
            sessions.broadcast(&ServerPacket::alert(format!("{name} disconnected")));
        }

        let Some(pos) = self.roster.iter().position(|&id| id == session_id) else {
            return;
        };
        self.roster.remove(pos);

        if !matches!(self.phase, Phase::Playing | Phase::Voting) {
            return;
        }

        if self.roster.len() < MIN_PLAYERS {
            warn!("Not enough players left, aborting the game");
            sessions.broadcast(&ServerPacket::alert(
                "Not enough players left, the game was aborted",
            ));
            self.start_next_game(sessions, now);
            return;
        }

        if self.impostor_idx == Some(pos) {
            warn!("The impostor {} left, starting over", name);
            sessions.broadcast(&ServerPacket::alert(format!(
                "The impostor {name} left, starting a new game"
            )));
            self.start_next_game(sessions, now);
            return;
        }

        if let Some(idx) = self.impostor_idx.as_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }

        match self.phase {
            Phase::Playing => {
                if pos < self.current_turn {
                    self.current_turn -= 1;
                } else if pos == self.current_turn {
                    self.settle_turn(sessions, now);
                }
            }
            Phase::Voting => {
                for &id in &self.roster {
                    if let Some(voter) = sessions.get_mut(id) {
                        if voter.vote == Some(session_id) {
                            voter.vote = None;
                        }
                    }
                }
                self.votes_received = self
                    .roster
                    .iter()
                    .filter(|&&id| sessions.get(id).is_some_and(|s| s.vote.is_some()))
                    .count();
            }
            _ => {}
        }
    }
}

fn name_of(sessions: &SessionManager, id: SessionId) -> String {
    sessions
        .get(id)
        .map(|s| s.display_name().to_string())
        .unwrap_or_default()
}
