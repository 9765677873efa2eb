//! Test helpers for bigring-vp integration tests
//!
//! Builds routes backed by a synthetic video file and runs a playback
//! controller fed by a [`SensorDistance`], so tests move the rider explicitly.

#![allow(dead_code)]

use bigring_common::events::{PlaybackState, RideEvent};
use bigring_common::{Course, DistanceMappingEntry, ProfileEntry, Route, VideoInformation};
use bigring_vp::playback::{
    ControllerHandle, ControllerSettings, Frame, PlaybackController, SensorDistance,
    SyntheticDecoder, SyntheticVideo, VideoDecoder, VideoProperties,
};
use bigring_vp::SharedState;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};

/// Frames in the synthetic test video
pub const TEST_FRAME_COUNT: u32 = 2_000;

/// Route at one meter per frame with three courses
///
/// - 0: "Full" 0 → 1000m
/// - 1: "Middle" 100 → 400m
/// - 2: "Sprint" 100 → 110m
pub fn test_route(video: &Path) -> Route {
    Route::new(
        "Test Valley",
        VideoInformation::new(video, 30.0),
        vec![
            Course::new("Full", 0.0, 1000.0),
            Course::new("Middle", 100.0, 400.0),
            Course::new("Sprint", 100.0, 110.0),
        ],
        vec![DistanceMappingEntry::new(0, 1.0)],
        vec![ProfileEntry::new(0.0, 2.0), ProfileEntry::new(500.0, -1.0)],
    )
}

/// 8x4 synthetic video of [`TEST_FRAME_COUNT`] frames
pub fn test_video() -> SyntheticVideo {
    SyntheticVideo {
        frame_count: TEST_FRAME_COUNT,
        frame_rate: 30.0,
        width: 8,
        height: 4,
    }
}

/// Decoder that takes a while to open a video, like a real codec on a large file
pub struct SlowOpenDecoder {
    inner: SyntheticDecoder,
    delay: Duration,
}

impl SlowOpenDecoder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: SyntheticDecoder::new(test_video()),
            delay,
        }
    }
}

impl VideoDecoder for SlowOpenDecoder {
    fn open(&mut self, path: &Path) -> bigring_vp::Result<VideoProperties> {
        std::thread::sleep(self.delay);
        self.inner.open(path)
    }

    fn seek(&mut self, frame_number: u32) -> bigring_vp::Result<()> {
        self.inner.seek(frame_number)
    }

    fn decode_frame(&mut self) -> bigring_vp::Result<Option<Frame>> {
        self.inner.decode_frame()
    }

    fn skip_frame(&mut self) -> bigring_vp::Result<bool> {
        self.inner.skip_frame()
    }
}

/// Temporary folder holding an (empty) video file for the synthetic decoder
pub fn video_dir() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("valley.avi");
    std::fs::write(&path, b"synthetic").unwrap();
    (dir, path)
}

/// Running controller with everything a test needs to drive and observe it
pub struct TestPlayer {
    pub controller: ControllerHandle,
    pub state: Arc<SharedState>,
    pub sensor: Arc<SensorDistance>,
    pub frames: mpsc::UnboundedReceiver<Frame>,
    pub events: broadcast::Receiver<RideEvent>,
}

impl TestPlayer {
    /// Player backed by the synthetic test video
    pub fn start() -> Self {
        Self::with_decoder(Box::new(SyntheticDecoder::new(test_video())))
    }

    pub fn with_decoder(decoder: Box<dyn VideoDecoder>) -> Self {
        let state = Arc::new(SharedState::new(8192));
        let events = state.subscribe_events();
        let sensor = Arc::new(SensorDistance::new());
        let (frame_tx, frames) = mpsc::unbounded_channel();

        let settings = ControllerSettings {
            frame_interval: Duration::from_millis(5),
            ..ControllerSettings::default()
        };
        let controller = PlaybackController::spawn(
            settings,
            decoder,
            sensor.clone(),
            Box::new(frame_tx),
            Arc::clone(&state),
        )
        .unwrap();

        Self {
            controller,
            state,
            sensor,
            frames,
            events,
        }
    }

    /// Wait until the next displayed frame arrives
    pub async fn next_frame(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.frames.recv())
            .await
            .ok()
            .flatten()
    }

    /// Collect displayed frame numbers until `predicate` matches one
    pub async fn frames_until<F>(&mut self, timeout: Duration, predicate: F) -> Vec<u32>
    where
        F: Fn(u32) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut seen = Vec::new();
        while let Ok(Some(frame)) =
            tokio::time::timeout_at(deadline, self.frames.recv()).await
        {
            seen.push(frame.frame_number);
            if predicate(frame.frame_number) {
                break;
            }
        }
        seen
    }
}

/// Wait for the first event matching `predicate`
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<RideEvent>,
    timeout: Duration,
    predicate: F,
) -> Option<RideEvent>
where
    F: Fn(&RideEvent) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Ok(event)) if predicate(&event) => return Some(event),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

/// Poll the shared status until the controller reaches `expected`
pub async fn wait_for_state(state: &SharedState, expected: PlaybackState, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if state.playback_state().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
