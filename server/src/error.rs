//! Error types for server startup and configuration.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max players must be at least {min}, got {got}")]
    TooFewPlayers { min: usize, got: usize },
    #[error("max rounds must be at least 1")]
    NoRounds,
    #[error("{0} timeout must be at least one second")]
    TimeoutTooShort(&'static str),
    #[error("server name must be non-empty and must not contain ':'")]
    InvalidServerName,
}

#[derive(Debug, Error)]
pub enum WordSourceError {
    #[error("cannot read word list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("word list {0} has no line with two distinct words")]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    WordSource(#[from] WordSourceError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
