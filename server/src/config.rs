//! Game configuration with the defaults the server ships with.

use crate::error::ConfigError;
use shared::{MIN_PLAYERS, PARAM_SEPARATOR};
use std::time::Duration;

pub const DEFAULT_MAX_PLAYERS: usize = 10;
pub const DEFAULT_MAX_ROUNDS: u32 = 3;
pub const DEFAULT_PLAY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VOTE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RESULTS_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_SERVER_NAME: &str = "Impostor Server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Connection capacity and the ready count that starts a game.
    pub max_players: usize,
    pub max_rounds: u32,
    pub play_timeout: Duration,
    pub vote_timeout: Duration,
    /// Pause between the results reveal and the next game.
    pub results_cooldown: Duration,
    pub server_name: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            play_timeout: Duration::from_secs(DEFAULT_PLAY_TIMEOUT_SECS),
            vote_timeout: Duration::from_secs(DEFAULT_VOTE_TIMEOUT_SECS),
            results_cooldown: Duration::from_secs(DEFAULT_RESULTS_COOLDOWN_SECS),
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players < MIN_PLAYERS {
            return Err(ConfigError::TooFewPlayers {
                min: MIN_PLAYERS,
                got: self.max_players,
            });
        }
        if self.max_rounds < 1 {
            return Err(ConfigError::NoRounds);
        }
        if self.play_timeout < Duration::from_secs(1) {
            return Err(ConfigError::TimeoutTooShort("play"));
        }
        if self.vote_timeout < Duration::from_secs(1) {
            return Err(ConfigError::TimeoutTooShort("vote"));
        }
        let name = self.server_name.trim();
        if name.is_empty() || name.contains(PARAM_SEPARATOR) {
            return Err(ConfigError::InvalidServerName);
        }
        Ok(())
    }

    pub fn play_secs(&self) -> u64 {
        self.play_timeout.as_secs()
    }

    pub fn vote_secs(&self) -> u64 {
        self.vote_timeout.as_secs()
    }
}
