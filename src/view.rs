//! View channel
//!
//! The core only ever posts to the view; it never reads back. Events travel
//! over an mpsc channel so any thread can post them.

use crate::recognizer::RecognizerState;
use std::sync::mpsc::{self, Receiver, Sender};

/// What the keyboard shows on its mic control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Initial,
    Loading,
    Ready,
    Listening,
    Paused,
    Error,
}

impl From<RecognizerState> for ViewState {
    fn from(state: RecognizerState) -> Self {
        match state {
            RecognizerState::Uninitialized | RecognizerState::Closed => ViewState::Initial,
            RecognizerState::Initializing => ViewState::Loading,
            RecognizerState::Ready => ViewState::Ready,
            RecognizerState::Error => ViewState::Error,
        }
    }
}

/// Localized-message identifiers for errors shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMessage {
    NoRecognizers,
    MicInUse,
    NotReady,
    ModelLoadFailed,
    ServerUnreachable,
}

impl ErrorMessage {
    /// Translation key
    pub fn key(&self) -> &'static str {
        match self {
            ErrorMessage::NoRecognizers => "mic_error_no_recognizers",
            ErrorMessage::MicInUse => "mic_error_mic_in_use",
            ErrorMessage::NotReady => "mic_error_recognizer_not_ready",
            ErrorMessage::ModelLoadFailed => "mic_error_model_load_failed",
            ErrorMessage::ServerUnreachable => "mic_error_server_unreachable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Display name of the current recognizer
    Name(String),
    State(ViewState),
    Error(ErrorMessage),
    /// Hypothesis for the utterance in progress
    Partial(String),
    /// Finalized text to commit
    Text(String),
}

/// Cloneable sender side of the view channel
#[derive(Debug, Clone)]
pub struct ViewHandle {
    sender: Sender<ViewEvent>,
}

impl ViewHandle {
    pub fn channel() -> (Self, Receiver<ViewEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }

    pub fn post(&self, event: ViewEvent) {
        // A closed view just means nobody is watching any more
        let _ = self.sender.send(event);
    }

    pub fn post_name(&self, name: &str) {
        self.post(ViewEvent::Name(name.to_string()));
    }

    pub fn post_state(&self, state: ViewState) {
        self.post(ViewEvent::State(state));
    }

    pub fn post_error(&self, message: ErrorMessage) {
        self.post(ViewEvent::Error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizer_state_mapping() {
        assert_eq!(ViewState::from(RecognizerState::Closed), ViewState::Initial);
        assert_eq!(
            ViewState::from(RecognizerState::Initializing),
            ViewState::Loading
        );
        assert_eq!(ViewState::from(RecognizerState::Error), ViewState::Error);
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (view, rx) = ViewHandle::channel();
        drop(rx);
        view.post_state(ViewState::Listening);
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (view, rx) = ViewHandle::channel();
        view.post_error(ErrorMessage::MicInUse);
        view.post_state(ViewState::Error);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ViewEvent::Error(ErrorMessage::MicInUse),
                ViewEvent::State(ViewState::Error)
            ]
        );
    }
}
