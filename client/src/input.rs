//! Maps typed lines to protocol messages based on the current phase

use crate::game::{GameView, LocalPhase};
use shared::ClientPacket;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Send(ClientPacket),
    /// A line starting with `/`, passed through untouched
    Raw(String),
    Quit,
    Ignored(&'static str),
}

impl InputAction {
    /// The protocol line to write, if this action sends anything.
    pub fn line(&self) -> Option<String> {
        match self {
            InputAction::Send(packet) => Some(packet.encode()),
            InputAction::Raw(text) => Some(format!("{text}\n")),
            InputAction::Quit | InputAction::Ignored(_) => None,
        }
    }
}

pub fn interpret(view: &GameView, input: &str) -> InputAction {
    let text = input.trim();
    if text.is_empty() {
        return InputAction::Ignored("");
    }
    if text == "/quit" {
        return InputAction::Quit;
    }
    if text.starts_with('/') {
        return InputAction::Raw(text.to_string());
    }

    let payload = Some(text.to_string());
    match view.phase {
        LocalPhase::WaitingUsername => InputAction::Send(ClientPacket::Login { username: payload }),
        LocalPhase::Playing => InputAction::Send(ClientPacket::Play { word: payload }),
        LocalPhase::Voting => InputAction::Send(ClientPacket::Choice { target: payload }),
        LocalPhase::Waiting | LocalPhase::Assigned | LocalPhase::WaitingTurn => {
            InputAction::Ignored("Wait for your turn")
        }
        LocalPhase::Results => InputAction::Ignored("The next game starts soon"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_in(phase: LocalPhase) -> GameView {
        let mut view = GameView::new();
        view.phase = phase;
        view
    }

    #[test]
    fn test_text_maps_by_phase() {
        let login = interpret(&view_in(LocalPhase::WaitingUsername), " alice ");
        assert_eq!(login.line().as_deref(), Some("/login alice\n"));

        let play = interpret(&view_in(LocalPhase::Playing), "banana");
        assert_eq!(play.line().as_deref(), Some("/play banana\n"));

        let vote = interpret(&view_in(LocalPhase::Voting), "bob");
        assert_eq!(vote.line().as_deref(), Some("/choice bob\n"));
    }

    #[test]
    fn test_text_outside_prompts_is_ignored() {
        for phase in [LocalPhase::Waiting, LocalPhase::WaitingTurn, LocalPhase::Results] {
            let action = interpret(&view_in(phase), "hello");
            assert!(matches!(action, InputAction::Ignored(_)));
            assert_eq!(action.line(), None);
        }
    }

    #[test]
    fn test_commands_pass_through() {
        let view = view_in(LocalPhase::Waiting);
        assert_eq!(interpret(&view, "/quit"), InputAction::Quit);
        let raw = interpret(&view, "/play a:b");
        assert_eq!(raw.line().as_deref(), Some("/play a:b\n"));
        assert_eq!(interpret(&view, "   "), InputAction::Ignored(""));
    }
}
