//! Connected sessions and the player registry
//!
//! This module owns every connection the server has accepted, including:
//! - Session lifecycle (accept, login, disconnect)
//! - Usernames, scores, votes and per-round submissions
//! - The stable join order used for turn and vote indexing
//! - Outbound delivery of protocol lines to one or all sessions
//!
//! Sessions live in an arena keyed by [`SessionId`]; a separate ordered list
//! of ids keeps insertion order so removing a session is a sequence edit and
//! never disturbs the ids of the others.

use log::{debug, info};
use shared::ServerPacket;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

pub type SessionId = u32;

/// One connected client
///
/// A session starts anonymous. Until a username is set it cannot take a
/// turn, be voted for, or count toward the ready quorum.
#[derive(Debug)]
pub struct Session {
    /// Unique session identifier assigned by the server
    pub id: SessionId,
    /// Remote address, used in logs
    pub addr: SocketAddr,
    pub username: Option<String>,
    /// Word assigned for the current game
    pub secret_word: Option<String>,
    /// One slot per round of the current game
    pub submitted_words: Vec<Option<String>>,
    /// Session this player currently accuses
    pub vote: Option<SessionId>,
    /// Accumulated over every game played on this connection
    pub score: u32,
    pub ready: bool,
    /// Logged with the session length on disconnect
    pub connected_at: Instant,
    outbox: mpsc::UnboundedSender<String>,
}

impl Session {
    pub fn new(
        id: SessionId,
        addr: SocketAddr,
        max_rounds: u32,
        outbox: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id,
            addr,
            username: None,
            secret_word: None,
            submitted_words: vec![None; max_rounds as usize],
            vote: None,
            score: 0,
            ready: false,
            connected_at: Instant::now(),
            outbox,
        }
    }

    pub fn username_set(&self) -> bool {
        self.username.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }

    /// Queues a packet on this session's writer. Delivery is best-effort: a
    /// closed writer means the connection is already going away.
    pub fn send(&self, packet: &ServerPacket) {
        let line = packet.encode();
        debug!("-> {}@{}: {}", self.display_name(), self.addr, line.trim_end());
        if self.outbox.send(line).is_err() {
            debug!("Writer for session {} is closed, dropping message", self.id);
        }
    }

    /// Clears everything tied to a single game. Scores survive.
    pub fn reset_game_state(&mut self, max_rounds: u32) {
        self.secret_word = None;
        self.submitted_words = vec![None; max_rounds as usize];
        self.vote = None;
    }
}

/// Registry of every connected session
///
/// Capacity counts anonymous sessions too, so a full server refuses new
/// connections even if some of them have not logged in yet.
pub struct SessionManager {
    /// Sessions indexed by their unique ID
    sessions: HashMap<SessionId, Session>,
    /// Session ids in connection order
    order: Vec<SessionId>,
    /// Next available session ID for new connections
    next_session_id: SessionId,
    /// Maximum number of concurrent sessions allowed
    max_sessions: usize,
    max_rounds: u32,
}

impl SessionManager {
    pub fn new(max_sessions: usize, max_rounds: u32) -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            next_session_id: 1,
            max_sessions,
            max_rounds,
        }
    }

    /// Registers a new connection
    ///
    /// Returns `None` when the server is at capacity.
    pub fn add_session(
        &mut self,
        addr: SocketAddr,
        outbox: mpsc::UnboundedSender<String>,
    ) -> Option<SessionId> {
        if self.is_full() {
            return None;
        }

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let session = Session::new(session_id, addr, self.max_rounds, outbox);
        info!("Session {} connected from {}", session_id, addr);
        self.sessions.insert(session_id, session);
        self.order.push(session_id);

        Some(session_id)
    }

    /// Removes a session and hands it back so the caller can report on it.
    pub fn remove_session(&mut self, session_id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        self.order.retain(|id| id != session_id);
        info!("Session {} removed", session.id);
        Some(session)
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions.get(&session_id)
    }

    pub fn get_mut(&mut self, session_id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&session_id)
    }

    /// Case-insensitive exact match over logged-in sessions.
    pub fn by_username(&self, username: &str) -> Option<SessionId> {
        let wanted = username.to_lowercase();
        self.order.iter().copied().find(|id| {
            self.sessions
                .get(id)
                .and_then(|s| s.username.as_deref())
                .is_some_and(|name| name.to_lowercase() == wanted)
        })
    }

    /// The `index`-th logged-in player in connection order.
    pub fn by_index(&self, index: usize) -> Option<SessionId> {
        self.players().get(index).copied()
    }

    /// Logged-in players in connection order.
    pub fn players(&self) -> Vec<SessionId> {
        self.order
            .iter()
            .copied()
            .filter(|id| self.sessions.get(id).is_some_and(Session::username_set))
            .collect()
    }

    pub fn player_count(&self) -> usize {
        self.players().len()
    }

    /// Sets the username and marks the session ready.
    pub fn login(&mut self, session_id: SessionId, username: String) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(session) => {
                session.username = Some(username);
                session.ready = true;
                true
            }
            None => false,
        }
    }

    pub fn count_ready(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.ready && s.username_set())
            .count()
    }

    /// True when exactly `threshold` players are ready.
    pub fn all_ready(&self, threshold: usize) -> bool {
        self.count_ready() == threshold
    }

    pub fn send(&self, session_id: SessionId, packet: &ServerPacket) {
        if let Some(session) = self.sessions.get(&session_id) {
            session.send(packet);
        }
    }

    /// Sends to every connected session, logged in or not.
    pub fn broadcast(&self, packet: &ServerPacket) {
        debug!("-> everyone: {}", packet.encode().trim_end());
        for id in &self.order {
            if let Some(session) = self.sessions.get(id) {
                if session.outbox.send(packet.encode()).is_err() {
                    debug!("Writer for session {} is closed, dropping broadcast", id);
                }
            }
        }
    }

    pub fn reset_game_state(&mut self) {
        let max_rounds = self.max_rounds;
        for session in self.sessions.values_mut() {
            session.reset_game_state(max_rounds);
        }
    }

    /// Drops every session, closing their writers. Returns how many were open.
    pub fn close_all(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        self.order.clear();
        count
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.max_sessions
    }

    /// Returns the number of currently connected sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no sessions are currently connected
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Domain, RetCode};

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn connect(
        manager: &mut SessionManager,
        port: u16,
    ) -> (SessionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.add_session(test_addr(port), tx).unwrap();
        (id, rx)
    }

    #[test]
    fn test_session_creation() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = Session::new(1, test_addr(9000), 3, tx);

        assert_eq!(session.id, 1);
        assert!(!session.username_set());
        assert_eq!(session.display_name(), "Unknown");
        assert_eq!(session.submitted_words, vec![None, None, None]);
        assert_eq!(session.score, 0);
        assert!(!session.ready);
    }

    #[test]
    fn test_add_sessions_until_full() {
        let mut manager = SessionManager::new(2, 3);
        let (first, _rx1) = connect(&mut manager, 9001);
        let (second, _rx2) = connect(&mut manager, 9002);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert!(manager.is_full());

        let (tx, _rx3) = mpsc::unbounded_channel();
        assert!(manager.add_session(test_addr(9003), tx).is_none());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_remove_session() {
        let mut manager = SessionManager::new(3, 3);
        let (id, _rx) = connect(&mut manager, 9001);

        let removed = manager.remove_session(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(manager.is_empty());
        assert!(manager.remove_session(&id).is_none());
    }

    #[test]
    fn test_players_keep_connection_order() {
        let mut manager = SessionManager::new(5, 3);
        let (a, _ra) = connect(&mut manager, 9001);
        let (b, _rb) = connect(&mut manager, 9002);
        let (c, _rc) = connect(&mut manager, 9003);

        assert!(manager.login(c, "carol".into()));
        assert!(manager.login(a, "alice".into()));
        assert!(!manager.login(99, "ghost".into()));
        assert_eq!(manager.players(), vec![a, c]);
        assert_eq!(manager.by_index(1), Some(c));
        assert_eq!(manager.by_index(2), None);

        manager.login(b, "bob".into());
        manager.remove_session(&a);
        assert_eq!(manager.players(), vec![b, c]);
        assert_eq!(manager.by_index(0), Some(b));
    }

    #[test]
    fn test_by_username_is_case_insensitive() {
        let mut manager = SessionManager::new(3, 3);
        let (a, _ra) = connect(&mut manager, 9001);
        let (_anon, _rb) = connect(&mut manager, 9002);
        manager.login(a, "Alice".into());

        assert_eq!(manager.by_username("alice"), Some(a));
        assert_eq!(manager.by_username("ALICE"), Some(a));
        assert_eq!(manager.by_username("Unknown"), None);
        assert_eq!(manager.by_username("ali"), None);
    }

    #[test]
    fn test_ready_counts_only_logged_in() {
        let mut manager = SessionManager::new(4, 3);
        let (a, _ra) = connect(&mut manager, 9001);
        let (b, _rb) = connect(&mut manager, 9002);
        let (_c, _rc) = connect(&mut manager, 9003);

        manager.login(a, "alice".into());
        manager.login(b, "bob".into());
        assert_eq!(manager.count_ready(), 2);
        assert!(manager.all_ready(2));
        assert!(!manager.all_ready(3));
    }

    #[test]
    fn test_send_and_broadcast() {
        let mut manager = SessionManager::new(3, 3);
        let (a, mut ra) = connect(&mut manager, 9001);
        let (_b, mut rb) = connect(&mut manager, 9002);

        manager.send(a, &ServerPacket::LoginPrompt);
        manager.broadcast(&ServerPacket::ret(Domain::Proto, RetCode::UnknownCommand));

        assert_eq!(ra.try_recv().unwrap(), "/login\n");
        assert_eq!(ra.try_recv().unwrap(), "/ret PROTO:201\n");
        assert_eq!(rb.try_recv().unwrap(), "/ret PROTO:201\n");
        assert!(rb.try_recv().is_err());
    }

    #[test]
    fn test_reset_game_state_keeps_score() {
        let mut manager = SessionManager::new(3, 2);
        let (a, _ra) = connect(&mut manager, 9001);
        {
            let session = manager.get_mut(a).unwrap();
            session.secret_word = Some("apple".into());
            session.submitted_words[0] = Some("red".into());
            session.vote = Some(7);
            session.score = 5;
        }

        manager.reset_game_state();
        let session = manager.get(a).unwrap();
        assert_eq!(session.secret_word, None);
        assert_eq!(session.submitted_words, vec![None, None]);
        assert_eq!(session.vote, None);
        assert_eq!(session.score, 5);
    }

    #[test]
    fn test_close_all() {
        let mut manager = SessionManager::new(3, 3);
        let (_a, mut ra) = connect(&mut manager, 9001);
        let (_b, _rb) = connect(&mut manager, 9002);

        assert_eq!(manager.close_all(), 2);
        assert!(manager.is_empty());
        assert!(ra.try_recv().is_err());
    }
}
