//! Console presenter.
//!
//! Renders the live toggle and orientation lock from connection state
//! snapshots, and turns classified errors into toasts or dialogs.

use std::fmt;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use livecast_ipc::{ClassifiedError, ConnectionState};
use livecast_session::SessionError;

/// What the screen shows for a connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct View {
    /// The live toggle is checked.
    pub toggle_checked: bool,

    /// The toggle shows a spinner.
    pub busy: bool,

    /// Device orientation is locked to the current rotation.
    pub orientation_locked: bool,
}

impl View {
    pub fn from_state(state: &ConnectionState) -> Self {
        Self {
            toggle_checked: state.is_active(),
            busy: state.is_connecting(),
            orientation_locked: state.is_streaming(),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let toggle = match (self.toggle_checked, self.busy) {
            (_, true) => "[~] connecting",
            (true, false) => "[x] live",
            (false, false) => "[ ] off",
        };
        let orientation = if self.orientation_locked {
            "locked"
        } else {
            "free"
        };
        write!(f, "{toggle} | orientation {orientation}")
    }
}

/// User-facing feedback for an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Short-lived notice.
    Toast(String),

    /// Modal notice that needs acknowledging.
    Dialog(String),
}

impl Feedback {
    pub fn for_error(error: &ClassifiedError) -> Self {
        let message = error.to_string();
        match SessionError::from(error.clone()) {
            SessionError::LinkClosed(_) => Self::Dialog(message),
            _ => Self::Toast(message),
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toast(message) => write!(f, "(toast) {message}"),
            Self::Dialog(message) => write!(f, "(dialog) {message}"),
        }
    }
}

/// Print view updates and error feedback until both streams close.
pub async fn run(
    initial: ConnectionState,
    mut states: broadcast::Receiver<ConnectionState>,
    mut errors: broadcast::Receiver<ClassifiedError>,
) {
    let mut view = View::from_state(&initial);
    println!("{view}");

    loop {
        tokio::select! {
            biased;
            error = errors.recv() => match error {
                Ok(error) => println!("{}", Feedback::for_error(&error)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Presenter missed errors"),
                Err(RecvError::Closed) => break,
            },
            state = states.recv() => match state {
                Ok(state) => {
                    let next = View::from_state(&state);
                    if next != view {
                        view = next;
                        println!("{view}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Presenter missed states"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("Presenter stopped");
}

#[cfg(test)]
mod tests {
    use livecast_ipc::EngineError;

    use super::*;

    #[test]
    fn test_view_tracks_state() {
        let connecting = ConnectionState::Connecting {
            url: "rtmp://host/app".to_string(),
        };

        assert_eq!(View::from_state(&ConnectionState::Idle), View::default());
        assert!(View::from_state(&connecting).toggle_checked);
        assert!(!View::from_state(&connecting).orientation_locked);
        assert!(View::from_state(&ConnectionState::Streaming).orientation_locked);
    }

    #[test]
    fn test_link_closed_opens_dialog() {
        let lost = ClassifiedError::classify(EngineError::Closed("remote closed".to_string()));
        let failed = ClassifiedError::connect_failed(EngineError::Connect("refused".to_string()));

        assert_eq!(
            Feedback::for_error(&lost),
            Feedback::Dialog("Connection lost: remote closed".to_string())
        );
        assert_eq!(
            Feedback::for_error(&failed),
            Feedback::Toast("Error: refused".to_string())
        );
    }

    #[test]
    fn test_closed_before_connecting_is_a_toast() {
        let reset = ClassifiedError::connect_failed(EngineError::Closed("reset".to_string()));
        let stall = ClassifiedError::classify(EngineError::Encoder("stall".to_string()));

        assert_eq!(
            Feedback::for_error(&reset),
            Feedback::Toast("Error: reset".to_string())
        );
        assert_eq!(
            Feedback::for_error(&stall),
            Feedback::Toast("Error: stall".to_string())
        );
    }

    #[test]
    fn test_view_display() {
        let view = View::from_state(&ConnectionState::Streaming);
        assert_eq!(view.to_string(), "[x] live | orientation locked");
    }
}
