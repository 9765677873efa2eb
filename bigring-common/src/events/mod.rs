//! Event types for the Big Ring event system
//!
//! Provides the shared event definitions and the EventBus used to push
//! playback notifications to UI clients.

mod playback_types;

pub use playback_types::PlaybackState;

use crate::ride::RideRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events emitted by the playback controller for UI consumption
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
/// Frame images never travel through here; the controller hands those to its
/// frame sink directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RideEvent {
    /// Controller state changed
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A course was selected and a new playback session started
    SessionStarted {
        session_id: Uuid,
        route_name: String,
        course_name: String,
        start_distance: f64,
        /// Frame the decoder was asked to seek to
        seek_frame: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video opened by the decoder
    VideoLoaded {
        frame_count: u32,
        frame_rate: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Video could not be opened; the controller is back in Idle
    VideoUnavailable {
        filename: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Whether the first frame of the selected course is available
    ReadyToPlay {
        ready: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Whether decoded frames are keeping up with the rider
    ///
    /// `full: false` is the "buffering" state.
    BufferFull {
        full: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Frames advanced during the previous wall-clock second
    CurrentFrameRate {
        frames_per_second: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A frame was handed to the renderer
    FrameDisplayed {
        frame_number: u32,
        distance: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Rider reached the end of the selected course
    CourseFinished {
        route_name: String,
        course_name: String,
        distance: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session ended before the course was finished
    UnfinishedRun {
        route_name: String,
        distance: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A course session ended; carries every sample taken during it
    RideRecorded {
        record: RideRecord,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RideEvent {
    /// Event name used as SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RideEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            RideEvent::SessionStarted { .. } => "SessionStarted",
            RideEvent::VideoLoaded { .. } => "VideoLoaded",
            RideEvent::VideoUnavailable { .. } => "VideoUnavailable",
            RideEvent::ReadyToPlay { .. } => "ReadyToPlay",
            RideEvent::BufferFull { .. } => "BufferFull",
            RideEvent::CurrentFrameRate { .. } => "CurrentFrameRate",
            RideEvent::FrameDisplayed { .. } => "FrameDisplayed",
            RideEvent::CourseFinished { .. } => "CourseFinished",
            RideEvent::UnfinishedRun { .. } => "UnfinishedRun",
            RideEvent::RideRecorded { .. } => "RideRecorded",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the controller loop)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use bigring_common::events::{EventBus, RideEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(RideEvent::BufferFull {
///     full: true,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(RideEvent::BufferFull { full: true, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RideEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped. Per-tick `FrameDisplayed` events make ~30 events/s,
    /// so desktop deployments should use several hundred.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RideEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RideEvent,
    ) -> Result<usize, broadcast::error::SendError<RideEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RideEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(100);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(100);
        let event = RideEvent::ReadyToPlay {
            ready: true,
            timestamp: chrono::Utc::now(),
        };

        // Should return error when no subscribers
        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = EventBus::new(100);
        let mut rx = bus.subscribe();

        bus.emit(RideEvent::CurrentFrameRate {
            frames_per_second: 31,
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            RideEvent::CurrentFrameRate {
                frames_per_second, ..
            } => assert_eq!(frames_per_second, 31),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = RideEvent::FrameDisplayed {
            frame_number: 125,
            distance: 150.0,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FrameDisplayed");
        assert_eq!(json["frame_number"], 125);
        assert_eq!(event.event_type(), "FrameDisplayed");
    }

    #[test]
    fn test_ride_recorded_carries_samples() {
        let mut record = RideRecord::new(Uuid::new_v4(), "Valley", "Climb", chrono::Utc::now());
        record.add_sample(crate::ride::RideSample {
            time: 0.0,
            distance: 40.0,
            altitude: 101.5,
            speed: 0.0,
        });
        let event = RideEvent::RideRecorded {
            record,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RideRecorded");
        assert_eq!(json["record"]["course_name"], "Climb");
        assert_eq!(json["record"]["samples"][0]["altitude"], 101.5);

        let back: RideEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(event.event_type(), "RideRecorded");
    }
}
