//! Wire protocol shared by the impostor server and its clients.
//!
//! Every message is a single newline-terminated line of the form
//! `/name param1:param2:...`. [`Command`] is the untyped view of such a line;
//! [`ClientPacket`] and [`ServerPacket`] are the typed messages each side
//! sends. [`LineBuffer`] frames a byte stream into lines.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;
pub const MIN_PLAYERS: usize = 3;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 15;
pub const MAX_WORD_LEN: usize = 31;
pub const MAX_PARAMS: usize = 10;
pub const MAX_LINE_LEN: usize = 4096;
pub const PARAM_SEPARATOR: char = ':';

/// Alert broadcast when the words of a new game are about to be dealt.
pub const ALERT_GAME_STARTING: &str = "The game is starting";
/// Alert broadcast when a game cannot start for lack of players.
pub const ALERT_WAITING_FOR_PLAYERS: &str = "Waiting for more players";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("line does not start with '/'")]
    NotACommand,
    #[error("empty command name")]
    EmptyName,
    #[error("unknown command '/{0}'")]
    UnknownCommand(String),
    #[error("malformed '/{command}' message: {reason}")]
    Malformed { command: String, reason: String },
}

impl ProtocolError {
    fn malformed(command: &str, reason: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

/// A parsed protocol line: command name without the leading `/` plus its
/// trimmed, non-empty parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub params: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Parses one line. Trailing CR/LF is ignored, parameters are split on
    /// `:` after the first space, trimmed, and empty ones are dropped.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Self::parse_limited(line, usize::MAX)
    }

    /// Like [`parse`](Self::parse) but keeps at most [`MAX_PARAMS`]
    /// parameters. Used for lines coming from clients.
    pub fn parse_capped(line: &str) -> Result<Self, ProtocolError> {
        Self::parse_limited(line, MAX_PARAMS)
    }

    fn parse_limited(line: &str, max_params: usize) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let rest = line.strip_prefix('/').ok_or(ProtocolError::NotACommand)?;

        let (name, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        if name.is_empty() {
            return Err(ProtocolError::EmptyName);
        }

        let params = tail
            .split(PARAM_SEPARATOR)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .take(max_params)
            .map(str::to_string)
            .collect();

        Ok(Self {
            name: name.to_string(),
            params,
        })
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Returns the parameter only when the line carried exactly one.
    pub fn single_param(&self) -> Option<&str> {
        match self.params.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    /// Encodes the command as a newline-terminated line.
    pub fn encode(&self) -> String {
        let params: Vec<&str> = self
            .params
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();

        let mut line = format!("/{}", self.name);
        if !params.is_empty() {
            line.push(' ');
            line.push_str(&params.join(":"));
        }
        line.push('\n');
        line
    }
}

/// Which request a `/ret` reply answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Login,
    Play,
    Choice,
    Proto,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Login => "LOGIN",
            Domain::Play => "PLAY",
            Domain::Choice => "CHOICE",
            Domain::Proto => "PROTO",
        }
    }
}

impl FromStr for Domain {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN" => Ok(Domain::Login),
            "PLAY" => Ok(Domain::Play),
            "CHOICE" => Ok(Domain::Choice),
            "PROTO" => Ok(Domain::Proto),
            other => Err(ProtocolError::malformed("ret", format!("unknown domain {other}"))),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result codes carried by `/ret DOMAIN:code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetCode {
    Ok,
    UsernameTaken,
    NotYourTurn,
    WordAlreadyPlayed,
    SelfVote,
    UnknownPlayer,
    InvalidUsername,
    InvalidWord,
    UnknownCommand,
    UnexpectedCommand,
}

impl RetCode {
    pub fn code(&self) -> &'static str {
        match self {
            RetCode::Ok => "000",
            RetCode::UsernameTaken => "101",
            RetCode::NotYourTurn => "102",
            RetCode::WordAlreadyPlayed => "103",
            RetCode::SelfVote => "105",
            RetCode::UnknownPlayer => "106",
            RetCode::InvalidUsername => "107",
            RetCode::InvalidWord => "108",
            RetCode::UnknownCommand => "201",
            RetCode::UnexpectedCommand => "202",
        }
    }
}

impl FromStr for RetCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "000" => Ok(RetCode::Ok),
            "101" => Ok(RetCode::UsernameTaken),
            "102" => Ok(RetCode::NotYourTurn),
            "103" => Ok(RetCode::WordAlreadyPlayed),
            "105" => Ok(RetCode::SelfVote),
            "106" => Ok(RetCode::UnknownPlayer),
            "107" => Ok(RetCode::InvalidUsername),
            "108" => Ok(RetCode::InvalidWord),
            "201" => Ok(RetCode::UnknownCommand),
            "202" => Ok(RetCode::UnexpectedCommand),
            other => Err(ProtocolError::malformed("ret", format!("unknown code {other}"))),
        }
    }
}

impl fmt::Display for RetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One `name:old+gain` entry of a RESULT line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLine {
    pub username: String,
    pub old: u32,
    pub gain: u32,
}

impl ScoreLine {
    pub fn total(&self) -> u32 {
        self.old + self.gain
    }
}

/// Payloads of `/info` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Info {
    Id {
        server_name: String,
    },
    Login {
        ready: usize,
        max: usize,
        username: String,
    },
    Game {
        round: u32,
        max_rounds: u32,
        players: usize,
        play_secs: u64,
        choice_secs: u64,
    },
    Wait {
        username: String,
    },
    Say {
        username: String,
        word: String,
    },
    Choice {
        voter: String,
        target: String,
    },
    Answer {
        impostor: String,
        impostor_word: String,
        common_word: String,
    },
    Result {
        scores: Vec<ScoreLine>,
    },
    Alert {
        text: String,
    },
}

impl Info {
    fn to_params(&self) -> Vec<String> {
        match self {
            Info::Id { server_name } => vec!["ID".into(), server_name.clone()],
            Info::Login {
                ready,
                max,
                username,
            } => vec!["LOGIN".into(), format!("{ready}/{max}"), username.clone()],
            Info::Game {
                round,
                max_rounds,
                players,
                play_secs,
                choice_secs,
            } => vec![
                "GAME".into(),
                format!("{round}/{max_rounds}"),
                players.to_string(),
                play_secs.to_string(),
                choice_secs.to_string(),
            ],
            Info::Wait { username } => vec!["WAIT".into(), username.clone(), "PLAY".into()],
            Info::Say { username, word } => vec!["SAY".into(), username.clone(), word.clone()],
            Info::Choice { voter, target } => {
                vec!["CHOICE".into(), voter.clone(), target.clone()]
            }
            Info::Answer {
                impostor,
                impostor_word,
                common_word,
            } => vec![
                "ANSWER".into(),
                impostor.clone(),
                impostor_word.clone(),
                common_word.clone(),
            ],
            Info::Result { scores } => {
                let mut params = vec!["RESULT".to_string()];
                for score in scores {
                    params.push(score.username.clone());
                    params.push(format!("{}+{}", score.old, score.gain));
                }
                params
            }
            Info::Alert { text } => vec!["ALERT".into(), text.clone()],
        }
    }

    fn from_params(params: &[String]) -> Result<Self, ProtocolError> {
        let kind = params
            .first()
            .ok_or_else(|| ProtocolError::malformed("info", "missing kind"))?;
        let arg = |i: usize| -> Result<String, ProtocolError> {
            params
                .get(i)
                .cloned()
                .ok_or_else(|| ProtocolError::malformed("info", format!("{kind} is missing field {i}")))
        };

        match kind.as_str() {
            "ID" => Ok(Info::Id {
                server_name: params[1..].join(":"),
            }),
            "LOGIN" => {
                let (ready, max) = parse_fraction(&arg(1)?)?;
                Ok(Info::Login {
                    ready: ready as usize,
                    max: max as usize,
                    username: arg(2)?,
                })
            }
            "GAME" => {
                let (round, max_rounds) = parse_fraction(&arg(1)?)?;
                Ok(Info::Game {
                    round,
                    max_rounds,
                    players: parse_number(&arg(2)?)?,
                    play_secs: parse_number(&arg(3)?)?,
                    choice_secs: parse_number(&arg(4)?)?,
                })
            }
            "WAIT" => Ok(Info::Wait { username: arg(1)? }),
            "SAY" => Ok(Info::Say {
                username: arg(1)?,
                word: arg(2)?,
            }),
            "CHOICE" => Ok(Info::Choice {
                voter: arg(1)?,
                target: arg(2)?,
            }),
            "ANSWER" => Ok(Info::Answer {
                impostor: arg(1)?,
                impostor_word: arg(2)?,
                common_word: arg(3)?,
            }),
            "RESULT" => {
                let mut scores = Vec::new();
                for pair in params[1..].chunks(2) {
                    let [username, points] = pair else {
                        return Err(ProtocolError::malformed("info", "dangling RESULT entry"));
                    };
                    let (old, gain) = points
                        .split_once('+')
                        .ok_or_else(|| ProtocolError::malformed("info", "score is not old+gain"))?;
                    scores.push(ScoreLine {
                        username: username.clone(),
                        old: parse_number(old)?,
                        gain: parse_number(gain)?,
                    });
                }
                Ok(Info::Result { scores })
            }
            "ALERT" => Ok(Info::Alert {
                text: params[1..].join(":"),
            }),
            other => Err(ProtocolError::malformed("info", format!("unknown kind {other}"))),
        }
    }
}

fn parse_number<T: FromStr>(raw: &str) -> Result<T, ProtocolError> {
    raw.parse()
        .map_err(|_| ProtocolError::malformed("info", format!("'{raw}' is not a number")))
}

fn parse_fraction(raw: &str) -> Result<(u32, u32), ProtocolError> {
    let (left, right) = raw
        .split_once('/')
        .ok_or_else(|| ProtocolError::malformed("info", format!("'{raw}' is not a/b")))?;
    Ok((parse_number(left)?, parse_number(right)?))
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    LoginPrompt,
    Ret { domain: Domain, code: RetCode },
    Info(Info),
    Assign { word: String },
    PlayPrompt { seconds: u64 },
    ChoicePrompt { seconds: u64 },
}

impl ServerPacket {
    pub fn ret(domain: Domain, code: RetCode) -> Self {
        ServerPacket::Ret { domain, code }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        ServerPacket::Info(Info::Alert { text: text.into() })
    }

    pub fn to_command(&self) -> Command {
        match self {
            ServerPacket::LoginPrompt => Command::bare("login"),
            ServerPacket::Ret { domain, code } => Command::new(
                "ret",
                vec![domain.as_str().to_string(), code.code().to_string()],
            ),
            ServerPacket::Info(info) => Command::new("info", info.to_params()),
            ServerPacket::Assign { word } => Command::new("assign", vec![word.clone()]),
            ServerPacket::PlayPrompt { seconds } => Command::new("play", vec![seconds.to_string()]),
            ServerPacket::ChoicePrompt { seconds } => {
                Command::new("choice", vec![seconds.to_string()])
            }
        }
    }

    pub fn encode(&self) -> String {
        self.to_command().encode()
    }

    pub fn from_command(command: &Command) -> Result<Self, ProtocolError> {
        let first = || {
            command
                .param(0)
                .ok_or_else(|| ProtocolError::malformed(&command.name, "missing parameter"))
        };
        let seconds = || -> Result<u64, ProtocolError> {
            first()?
                .parse()
                .map_err(|_| ProtocolError::malformed(&command.name, "timeout is not a number"))
        };

        match command.name.as_str() {
            "login" => Ok(ServerPacket::LoginPrompt),
            "ret" => {
                let domain = first()?.parse()?;
                let code = command
                    .param(1)
                    .ok_or_else(|| ProtocolError::malformed("ret", "missing code"))?
                    .parse()?;
                Ok(ServerPacket::Ret { domain, code })
            }
            "info" => Ok(ServerPacket::Info(Info::from_params(&command.params)?)),
            "assign" => Ok(ServerPacket::Assign {
                word: first()?.to_string(),
            }),
            "play" => Ok(ServerPacket::PlayPrompt { seconds: seconds()? }),
            "choice" => Ok(ServerPacket::ChoicePrompt { seconds: seconds()? }),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        Self::from_command(&Command::parse(line)?)
    }
}

/// Messages sent by a client. A payload is `None` when the line did not carry
/// exactly one parameter (missing, or split by a `:` inside the value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    Login { username: Option<String> },
    Play { word: Option<String> },
    Choice { target: Option<String> },
}

impl ClientPacket {
    pub fn domain(&self) -> Domain {
        match self {
            ClientPacket::Login { .. } => Domain::Login,
            ClientPacket::Play { .. } => Domain::Play,
            ClientPacket::Choice { .. } => Domain::Choice,
        }
    }

    pub fn from_command(command: &Command) -> Result<Self, ProtocolError> {
        let payload = command.single_param().map(str::to_string);
        match command.name.as_str() {
            "login" => Ok(ClientPacket::Login { username: payload }),
            "play" => Ok(ClientPacket::Play { word: payload }),
            "choice" => Ok(ClientPacket::Choice { target: payload }),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    pub fn to_command(&self) -> Command {
        let (name, payload) = match self {
            ClientPacket::Login { username } => ("login", username),
            ClientPacket::Play { word } => ("play", word),
            ClientPacket::Choice { target } => ("choice", target),
        };
        Command::new(name, payload.iter().cloned().collect())
    }

    pub fn encode(&self) -> String {
        self.to_command().encode()
    }
}

/// Accumulates raw bytes from a stream and hands out complete lines.
///
/// Bytes are appended with [`extend`](Self::extend); [`next_line`](Self::next_line)
/// scans for `\n`, drains the consumed prefix and strips a trailing `\r`.
/// A read boundary never has to line up with a line boundary.
#[derive(Debug)]
pub struct LineBuffer {
    buf: Vec<u8>,
    max_len: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_LEN)
    }

    pub fn with_limit(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Drops a partial line that has grown past the limit without a
    /// terminator. Returns how many bytes were discarded.
    pub fn discard_overflow(&mut self) -> Option<usize> {
        if self.buf.len() > self.max_len && !self.buf.contains(&b'\n') {
            let dropped = self.buf.len();
            self.buf.clear();
            Some(dropped)
        } else {
            None
        }
    }

}

/// Trims a requested username and cuts it to [`MAX_USERNAME_LEN`] characters,
/// the form the server registers it under.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().chars().take(MAX_USERNAME_LEN).collect()
}
