//! Text rendering of the game view

use crate::game::{GameView, LocalPhase};
use std::io::{self, Write};
use std::time::Instant;

/// Remaining seconds at which the status line is reprinted even if nothing else changed
const COUNTDOWN_MARKS: &[u64] = &[30, 10, 5, 3, 2, 1];

/// One-line summary of where the game stands.
pub fn status_line(view: &GameView, now: Instant) -> String {
    let mut parts = vec![format!(
        "[{}]",
        view.server_name.as_deref().unwrap_or("not connected")
    )];
    if let Some(name) = &view.username {
        parts.push(name.clone());
    }
    parts.push(view.phase.to_string());
    if let Some(round) = &view.round {
        parts.push(format!("round {round}"));
    }
    if let Some(word) = &view.secret_word {
        parts.push(format!("word: {word}"));
    }
    if let Some(turn) = &view.turn {
        parts.push(format!("turn: {turn}"));
    }
    if let Some(countdown) = &view.countdown {
        parts.push(format!("{}s", countdown.remaining_secs(now)));
    }
    parts.join(" | ")
}

/// Table of players with their words and the latest score line.
pub fn scoreboard(view: &GameView) -> Vec<String> {
    let mut lines = vec![format!("{:<15} {:>6}  words", "player", "score")];
    for row in &view.players {
        let score = match &row.last_score {
            Some(score) if score.gain > 0 => format!("{} +{}", score.total(), score.gain),
            Some(score) => score.total().to_string(),
            None => "-".to_string(),
        };
        let marker = match &view.reveal {
            Some(reveal) if reveal.impostor == row.name => " (impostor)",
            _ => "",
        };
        lines.push(format!(
            "{:<15} {:>6}  {}{}",
            row.name,
            score,
            row.words.join(", "),
            marker
        ));
    }
    lines
}

pub struct Renderer {
    last_status: Option<String>,
    last_phase: Option<LocalPhase>,
    last_remaining: Option<u64>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            last_status: None,
            last_phase: None,
            last_remaining: None,
        }
    }

    /// Prints new events, then the status line when it is worth repeating.
    pub fn render(&mut self, view: &mut GameView, now: Instant) {
        let mut out = io::stdout().lock();
        for event in view.take_unread() {
            let _ = writeln!(out, "  {event}");
        }

        if view.phase == LocalPhase::Results && self.last_phase != Some(LocalPhase::Results) {
            for line in scoreboard(view) {
                let _ = writeln!(out, "{line}");
            }
        }
        self.last_phase = Some(view.phase);

        let remaining = view.countdown.map(|c| c.remaining_secs(now));
        let status = status_line(view, now);
        let without_timer = status_without_timer(&status, remaining);
        let changed = self.last_status.as_deref() != Some(without_timer.as_str());
        let at_mark = remaining.is_some_and(|r| COUNTDOWN_MARKS.contains(&r))
            && remaining != self.last_remaining;

        if changed || at_mark {
            let _ = writeln!(out, "{status}");
            self.last_status = Some(without_timer);
        }
        self.last_remaining = remaining;
        let _ = out.flush();
    }
}

fn status_without_timer(status: &str, remaining: Option<u64>) -> String {
    match remaining {
        Some(secs) => status
            .strip_suffix(&format!(" | {secs}s"))
            .unwrap_or(status)
            .to_string(),
        None => status.to_string(),
    }
}
