//! Status line reporting
//!
//! Maps controller transitions and errors to the short message shown to
//! the user.

use crate::engine::transport::{PlaybackState, StateTransition};
use crate::error::PhantomError;

pub const STATUS_READY: &str = "ready";
pub const STATUS_PLAYING: &str = "playing";
pub const STATUS_STOPPED: &str = "stopped";

/// Something that may change the status line
#[derive(Debug, Clone, Copy)]
pub enum StatusEvent<'a> {
    Transition(&'a StateTransition),
    /// A track finished decoding and playback can be requested
    TrackReady,
    Error(&'a PhantomError),
}

/// Message for an event, or `None` if the status line should not change
pub fn status_message(event: &StatusEvent<'_>) -> Option<String> {
    match event {
        StatusEvent::Transition(t) => match t.to {
            PlaybackState::Idle => Some(STATUS_READY.to_string()),
            PlaybackState::Scheduled => None,
            PlaybackState::Playing => Some(STATUS_PLAYING.to_string()),
            PlaybackState::Stopped => Some(STATUS_STOPPED.to_string()),
        },
        StatusEvent::TrackReady => Some(STATUS_READY.to_string()),
        StatusEvent::Error(e) => Some(e.status_message()),
    }
}

/// Remembers the last message so repeats are not re-announced
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    current: Option<String>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an event; returns the new message only if it differs
    pub fn report(&mut self, event: &StatusEvent<'_>) -> Option<String> {
        let message = status_message(event)?;
        if self.current.as_deref() == Some(message.as_str()) {
            return None;
        }
        self.current = Some(message.clone());
        Some(message)
    }

    /// Most recent message
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}
