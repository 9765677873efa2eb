//! Playback-related type definitions
//!
//! Supporting types for playback controller state.

use serde::{Deserialize, Serialize};

/// Playback controller state
///
/// `Idle → Loading → Ready → Playing ⇄ Paused`; every state returns to
/// `Idle` on reset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No video selected, or the session was reset
    #[default]
    Idle,
    /// Waiting for the video to open and the first seek to complete
    Loading,
    /// First frame available, ready to play
    Ready,
    Playing,
    Paused,
}

impl PlaybackState {
    /// True when a course is loaded and frames can be shown
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        )
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}
