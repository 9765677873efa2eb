//! Shared playback state
//!
//! The playback controller is the only writer; HTTP handlers read snapshots.

use crate::playback::frame_queue::QueueStats;
use bigring_common::events::{EventBus, RideEvent};
use bigring_common::RideSummary;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

// Re-export PlaybackState from bigring-common for handlers and tests
pub use bigring_common::events::PlaybackState;

/// Snapshot of the controller's externally visible state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub route_name: Option<String>,
    pub course_index: Option<usize>,
    pub course_name: Option<String>,
    pub session_id: Option<Uuid>,
    /// Rider distance at the last tick (meters)
    pub distance: f64,
    pub target_frame: Option<u32>,
    pub displayed_frame: Option<u32>,
    /// Frames advanced during the previous second
    pub frame_rate: u32,
    pub buffer_full: bool,
    pub queue_length: usize,
    pub queue_stats: QueueStats,
    /// Totals of the ride on the current course, updated once per sample
    pub ride: Option<RideSummary>,
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    status: RwLock<PlaybackStatus>,

    /// Event distribution for SSE clients
    event_bus: EventBus,
}

impl SharedState {
    /// Create shared state whose event bus buffers `event_capacity` events per subscriber
    pub fn new(event_capacity: usize) -> Self {
        Self {
            status: RwLock::new(PlaybackStatus::default()),
            event_bus: EventBus::new(event_capacity),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: RideEvent) {
        self.event_bus.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<RideEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Current status snapshot
    pub async fn status(&self) -> PlaybackStatus {
        self.status.read().await.clone()
    }

    pub async fn playback_state(&self) -> PlaybackState {
        self.status.read().await.state
    }

    /// Modify the status in place
    pub async fn update_status<F>(&self, update: F)
    where
        F: FnOnce(&mut PlaybackStatus),
    {
        let mut status = self.status.write().await;
        update(&mut status);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_status() {
        let state = SharedState::default();
        let status = state.status().await;
        assert_eq!(status.state, PlaybackState::Idle);
        assert_eq!(status.route_name, None);
        assert_eq!(status.displayed_frame, None);
    }

    #[tokio::test]
    async fn test_update_status() {
        let state = SharedState::default();
        state
            .update_status(|status| {
                status.state = PlaybackState::Playing;
                status.displayed_frame = Some(125);
            })
            .await;

        assert_eq!(state.playback_state().await, PlaybackState::Playing);
        assert_eq!(state.status().await.displayed_frame, Some(125));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscriber() {
        let state = SharedState::new(16);
        let mut rx = state.subscribe_events();
        state.broadcast_event(RideEvent::BufferFull {
            full: false,
            timestamp: chrono::Utc::now(),
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            RideEvent::BufferFull { full: false, .. }
        ));
    }
}
