//! Distance-synchronized playback controller
//!
//! The controller runs as a single tokio task and is the only mutator of its
//! state. It reacts to three inputs:
//! - commands from [`ControllerHandle`] (route/course selection, play/pause)
//! - events from the decode worker
//! - the fixed-interval tick while playing
//!
//! On every tick the rider's distance is mapped to a target frame. Frames
//! older than the target are discarded from the queue, the target frame is
//! handed to the [`FrameSink`], and decode work is requested once the queue
//! falls below its low watermark. When the rider moves fast, the decoder is
//! told to skip frames so decoding keeps up.
//!
//! # State machine
//!
//! ```text
//! Idle ──route/course──▶ Loading ──video loaded + seek finished──▶ Ready
//!                                                                    │ play
//!                                         Paused ◀──pause/finish── Playing
//! ```
//! Any selection resets to Idle first.

use crate::error::{Error, Result};
use crate::playback::cyclist::DistanceSource;
use crate::playback::decoder::VideoDecoder;
use crate::playback::decoder_worker::{DecoderCommand, DecoderEvent, DecoderWorker};
use crate::playback::frame_queue::{
    FrameQueue, QueueError, DEFAULT_CAPACITY, DEFAULT_LOW_WATERMARK,
};
use crate::playback::types::Frame;
use crate::state::SharedState;
use bigring_common::events::{PlaybackState, RideEvent};
use bigring_common::{RideRecord, RideSample, Route};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Display interval of 30 frames per second
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 30);

/// Time between two ride samples
pub const RIDE_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Frames to step over after each decoded frame for a measured frame rate
///
/// Below 30 fps every frame is decoded, from 30 fps every second one and from
/// 40 fps every third one.
pub fn determine_skip(frames_per_second: u32) -> u32 {
    match frames_per_second {
        0..=29 => 0,
        30..=39 => 1,
        _ => 2,
    }
}

/// Controller tuning
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub queue_capacity: usize,
    pub low_watermark: usize,
    pub frame_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            low_watermark: DEFAULT_LOW_WATERMARK,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

/// Receiver of displayed frames (the renderer)
pub trait FrameSink: Send {
    fn display(&mut self, frame: Frame);
}

/// Sink that drops every frame
pub struct NullSink;

impl FrameSink for NullSink {
    fn display(&mut self, frame: Frame) {
        trace!("Dropping displayed frame {}", frame.frame_number);
    }
}

impl FrameSink for mpsc::UnboundedSender<Frame> {
    fn display(&mut self, frame: Frame) {
        let _ = self.send(frame);
    }
}

enum ControllerCommand {
    SelectRoute {
        route: Box<Route>,
        reply: oneshot::Sender<Result<()>>,
    },
    SelectCourse {
        index: Option<usize>,
        reply: oneshot::Sender<Result<()>>,
    },
    Play {
        play: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for sending commands to the controller task
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerCommand>,
}

impl ControllerHandle {
    async fn request<F>(&self, make: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> ControllerCommand,
    {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::Playback("playback controller stopped".to_string()))?;
        response
            .await
            .map_err(|_| Error::Playback("playback controller stopped".to_string()))?
    }

    /// Select a route; opens its video when it has one
    pub async fn select_route(&self, route: Route) -> Result<()> {
        self.request(|reply| ControllerCommand::SelectRoute {
            route: Box::new(route),
            reply,
        })
        .await
    }

    /// Select a course of the current route, `None` to clear the selection
    pub async fn select_course(&self, index: Option<usize>) -> Result<()> {
        self.request(|reply| ControllerCommand::SelectCourse { index, reply })
            .await
    }

    /// Start (`true`) or pause (`false`) playback
    pub async fn play(&self, play: bool) -> Result<()> {
        self.request(|reply| ControllerCommand::Play { play, reply })
            .await
    }

    /// Stop the controller task and the decode worker
    ///
    /// Succeeds when the controller has already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self
            .tx
            .send(ControllerCommand::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoStatus {
    NoVideo,
    Opening,
    Loaded,
    Failed,
}

/// Ride on one course, from selection until the next reset
struct Session {
    id: Uuid,
    course_name: String,
    start_distance: f64,
    end_distance: f64,
    finished: bool,
    ride: RideRecord,
    /// First tick of the session
    ride_started: Option<Instant>,
    last_sample: Option<Instant>,
}

/// Playback controller task state
pub struct PlaybackController {
    settings: ControllerSettings,
    queue: Arc<FrameQueue>,
    worker: Option<DecoderWorker>,
    decoder_events: mpsc::UnboundedReceiver<DecoderEvent>,
    commands: mpsc::Receiver<ControllerCommand>,
    distance: Arc<dyn DistanceSource>,
    sink: Box<dyn FrameSink>,
    state: Arc<SharedState>,

    route: Route,
    session: Option<Session>,
    playback_state: PlaybackState,
    video: VideoStatus,
    /// Bumped on every route selection; open results carry it back
    open_generation: u64,
    seek_finished: bool,
    /// `play(true)` arrived while loading
    autoplay: bool,

    /// Queue epoch of the current seek
    epoch: u64,
    /// LoadFrames requests without a reply
    in_flight: usize,
    end_of_video: bool,

    last_displayed: Option<u32>,
    /// Frame beyond the current target, shown once the rider reaches it
    pending: Option<Frame>,
    ticker: Option<Interval>,
    buffer_full: bool,
    /// Consecutive ticks that found no frame to show
    empty_ticks: u32,

    rate_window_start: Instant,
    frames_advanced: u32,
    measured_rate: u32,
}

impl PlaybackController {
    /// Start the decode worker and the controller task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        settings: ControllerSettings,
        decoder: Box<dyn VideoDecoder>,
        distance: Arc<dyn DistanceSource>,
        sink: Box<dyn FrameSink>,
        state: Arc<SharedState>,
    ) -> Result<ControllerHandle> {
        let queue = Arc::new(FrameQueue::new(
            settings.queue_capacity,
            settings.low_watermark,
        ));
        let (event_tx, decoder_events) = mpsc::unbounded_channel();
        let worker = DecoderWorker::spawn(decoder, Arc::clone(&queue), event_tx)?;
        let (tx, commands) = mpsc::channel(32);

        let controller = Self {
            settings,
            epoch: queue.epoch(),
            queue,
            worker: Some(worker),
            decoder_events,
            commands,
            distance,
            sink,
            state,
            route: Route::default(),
            session: None,
            playback_state: PlaybackState::Idle,
            video: VideoStatus::NoVideo,
            open_generation: 0,
            seek_finished: false,
            autoplay: false,
            in_flight: 0,
            end_of_video: false,
            last_displayed: None,
            pending: None,
            ticker: None,
            buffer_full: false,
            empty_ticks: 0,
            rate_window_start: Instant::now(),
            frames_advanced: 0,
            measured_rate: 0,
        };

        tokio::spawn(controller.run());
        Ok(ControllerHandle { tx })
    }

    async fn run(mut self) {
        info!(
            "Playback controller started (queue {} / low watermark {}, tick {:?})",
            self.queue.capacity(),
            self.queue.low_watermark(),
            self.settings.frame_interval
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
                Some(event) = self.decoder_events.recv() => {
                    self.handle_decoder_event(event).await;
                }
                _ = next_tick(&mut self.ticker) => {
                    self.on_tick().await;
                }
            }
        }
    }

    /// Returns false when the controller should stop
    async fn handle_command(&mut self, command: ControllerCommand) -> bool {
        match command {
            ControllerCommand::SelectRoute { route, reply } => {
                let result = self.route_selected(*route).await;
                let _ = reply.send(result);
            }
            ControllerCommand::SelectCourse { index, reply } => {
                let result = self.course_selected(index).await;
                let _ = reply.send(result);
            }
            ControllerCommand::Play { play, reply } => {
                let result = self.play(play).await;
                let _ = reply.send(result);
            }
            ControllerCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    // ========================================
    // Commands
    // ========================================

    async fn route_selected(&mut self, route: Route) -> Result<()> {
        self.reset().await;
        info!("Route selected: '{}'", route.name());

        self.route = route;
        self.video = VideoStatus::NoVideo;
        self.open_generation += 1;
        let route_name = self.route.name().to_string();
        self.state
            .update_status(|status| {
                status.route_name = Some(route_name);
                status.course_index = None;
                status.course_name = None;
            })
            .await;

        let video = self.route.video_information();
        if !video.has_video() {
            debug!("Route '{}' has no video", self.route.name());
            return Ok(());
        }

        let path = video.filename.clone();
        self.send_to_worker(DecoderCommand::OpenFile {
            path,
            generation: self.open_generation,
        })?;
        self.video = VideoStatus::Opening;
        self.set_state(PlaybackState::Loading).await;
        Ok(())
    }

    async fn course_selected(&mut self, index: Option<usize>) -> Result<()> {
        self.reset().await;
        self.state
            .update_status(|status| {
                status.course_index = None;
                status.course_name = None;
            })
            .await;

        let Some(index) = index else {
            debug!("Course selection cleared");
            return Ok(());
        };

        if !self.route.is_valid() {
            return Err(Error::InvalidState(format!(
                "route '{}' has no playable courses",
                self.route.name()
            )));
        }
        let course = self.route.course(index).cloned().ok_or_else(|| {
            Error::NotFound(format!(
                "course {} on route '{}'",
                index,
                self.route.name()
            ))
        })?;
        if !matches!(self.video, VideoStatus::Opening | VideoStatus::Loaded) {
            return Err(Error::InvalidState(format!(
                "no video available for route '{}'",
                self.route.name()
            )));
        }

        self.distance.reset(course.start_distance);
        let seek_frame = self.route.frame_for_distance(course.start_distance)?;
        self.send_to_worker(DecoderCommand::SeekFrame {
            frame_number: seek_frame,
            epoch: self.epoch,
        })?;

        let session_id = Uuid::new_v4();
        info!(
            "Course '{}' selected on '{}': start {:.1}m (frame {}), end {:.1}m",
            course.name,
            self.route.name(),
            course.start_distance,
            seek_frame,
            course.end_distance
        );
        self.emit(RideEvent::SessionStarted {
            session_id,
            route_name: self.route.name().to_string(),
            course_name: course.name.clone(),
            start_distance: course.start_distance,
            seek_frame,
            timestamp: Utc::now(),
        });

        let course_name = course.name.clone();
        let start_distance = course.start_distance;
        let ride = RideRecord::new(session_id, self.route.name(), course.name.clone(), Utc::now());
        self.session = Some(Session {
            id: session_id,
            course_name: course.name,
            start_distance: course.start_distance,
            end_distance: course.end_distance,
            finished: false,
            ride,
            ride_started: None,
            last_sample: None,
        });
        self.state
            .update_status(|status| {
                status.course_index = Some(index);
                status.course_name = Some(course_name);
                status.session_id = Some(session_id);
                status.distance = start_distance;
                status.target_frame = Some(seek_frame);
            })
            .await;
        self.set_state(PlaybackState::Loading).await;
        Ok(())
    }

    async fn play(&mut self, play: bool) -> Result<()> {
        if !play {
            self.autoplay = false;
            if self.playback_state == PlaybackState::Playing {
                self.stop_ticking();
                self.set_state(PlaybackState::Paused).await;
            }
            return Ok(());
        }

        match self.playback_state {
            PlaybackState::Ready | PlaybackState::Paused => {
                self.start_ticking();
                self.set_state(PlaybackState::Playing).await;
                Ok(())
            }
            PlaybackState::Playing => Ok(()),
            PlaybackState::Loading if self.session.is_some() => {
                debug!("Play requested while loading; starting once ready");
                self.autoplay = true;
                Ok(())
            }
            PlaybackState::Loading | PlaybackState::Idle => Err(Error::InvalidState(
                "no course selected".to_string(),
            )),
        }
    }

    /// Stop ticking, discard buffered frames and return to Idle
    async fn reset(&mut self) {
        self.stop_ticking();
        self.end_session();

        let discarded = self.queue.drain();
        self.epoch = self.queue.epoch();
        self.pending = None;
        self.last_displayed = None;
        self.in_flight = 0;
        self.seek_finished = false;
        self.end_of_video = false;
        self.autoplay = false;
        self.empty_ticks = 0;
        self.frames_advanced = 0;
        self.measured_rate = 0;

        if matches!(
            self.playback_state,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        ) {
            self.emit(RideEvent::ReadyToPlay {
                ready: false,
                timestamp: Utc::now(),
            });
        }
        self.buffer_full = false;
        self.emit(RideEvent::BufferFull {
            full: false,
            timestamp: Utc::now(),
        });
        self.set_state(PlaybackState::Idle).await;

        let stats = self.queue.stats();
        self.state
            .update_status(|status| {
                status.session_id = None;
                status.target_frame = None;
                status.displayed_frame = None;
                status.frame_rate = 0;
                status.buffer_full = false;
                status.queue_length = 0;
                status.queue_stats = stats;
                status.ride = None;
            })
            .await;
        debug!("Playback reset, {} queued frames discarded", discarded);
    }

    /// Close the current session: publish its ride and remember an unfinished run
    fn end_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if !session.ride.is_empty() {
            let summary = session.ride.summary();
            info!(
                "Ride on '{}' ({}): {:.1}m in {:.0}s, max {:.1} m/s",
                summary.route_name,
                summary.course_name,
                summary.total_distance,
                summary.duration_secs,
                summary.maximum_speed
            );
            self.emit(RideEvent::RideRecorded {
                record: session.ride,
                timestamp: Utc::now(),
            });
        }

        if session.finished {
            return;
        }
        let distance = self.distance.distance();
        if distance <= session.start_distance {
            return;
        }

        info!(
            "Unfinished run on '{}' (session {}) at {:.1}m",
            self.route.name(),
            session.id,
            distance
        );
        self.route.set_unfinished_run(distance);
        self.emit(RideEvent::UnfinishedRun {
            route_name: self.route.name().to_string(),
            distance,
            timestamp: Utc::now(),
        });
    }

    async fn shutdown(&mut self) {
        self.reset().await;
        if let Some(worker) = self.worker.take() {
            match tokio::task::spawn_blocking(move || worker.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Decode worker shutdown failed: {}", e),
                Err(e) => error!("Decode worker shutdown task failed: {}", e),
            }
        }
        info!("Playback controller stopped");
    }

    // ========================================
    // Decoder events
    // ========================================

    /// An open result belongs to the current route only while it is opening
    fn awaiting_open(&self, generation: u64) -> bool {
        generation == self.open_generation && self.video == VideoStatus::Opening
    }

    async fn handle_decoder_event(&mut self, event: DecoderEvent) {
        match event {
            DecoderEvent::VideoLoaded {
                frame_count,
                frame_rate,
                generation,
            } => {
                if !self.awaiting_open(generation) {
                    debug!("Ignoring load result of a superseded video");
                    return;
                }
                self.video = VideoStatus::Loaded;
                self.route.set_number_of_frames(frame_count);
                self.emit(RideEvent::VideoLoaded {
                    frame_count,
                    frame_rate,
                    timestamp: Utc::now(),
                });
                self.check_ready().await;
            }
            DecoderEvent::OpenFailed {
                path,
                reason,
                generation,
            } => {
                if !self.awaiting_open(generation) {
                    debug!("Ignoring open failure of a superseded video");
                    return;
                }
                error!("Video unavailable: {} ({})", path.display(), reason);
                self.video = VideoStatus::Failed;
                self.reset().await;
                self.emit(RideEvent::VideoUnavailable {
                    filename: path.display().to_string(),
                    reason,
                    timestamp: Utc::now(),
                });
            }
            DecoderEvent::SeekFinished {
                frame_number,
                epoch,
            } => {
                if epoch != self.epoch {
                    debug!("Ignoring stale seek result (frame {})", frame_number);
                    return;
                }
                debug!("Seek finished at frame {}", frame_number);
                self.seek_finished = true;
                self.check_ready().await;
            }
            DecoderEvent::FramesReady {
                frame_number,
                epoch,
            } => {
                if epoch == self.epoch {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    trace!(
                        "Frame {} ready ({} queued, {} in flight)",
                        frame_number,
                        self.queue.len(),
                        self.in_flight
                    );
                }
            }
            DecoderEvent::EndOfVideo { epoch } => {
                if epoch != self.epoch {
                    return;
                }
                self.in_flight = self.in_flight.saturating_sub(1);
                if !self.seek_finished {
                    warn!(
                        "Course start of '{}' lies beyond the end of the video",
                        self.route.name()
                    );
                    self.reset().await;
                    return;
                }
                if !self.end_of_video {
                    info!("End of video reached");
                }
                self.end_of_video = true;
            }
            DecoderEvent::DecodeFailed { reason, epoch } => {
                if epoch != self.epoch {
                    return;
                }
                self.in_flight = self.in_flight.saturating_sub(1);
                error!("Decode failed: {}", reason);
                if !self.seek_finished {
                    self.reset().await;
                }
            }
        }
    }

    /// Ready once the video is open and the course start frame is queued
    async fn check_ready(&mut self) {
        if self.playback_state != PlaybackState::Loading
            || self.video != VideoStatus::Loaded
            || !self.seek_finished
            || self.session.is_none()
        {
            return;
        }

        self.set_state(PlaybackState::Ready).await;
        self.emit(RideEvent::ReadyToPlay {
            ready: true,
            timestamp: Utc::now(),
        });
        self.fill_buffers();

        if self.autoplay {
            self.autoplay = false;
            self.start_ticking();
            self.set_state(PlaybackState::Playing).await;
        }
    }

    // ========================================
    // Tick
    // ========================================

    async fn on_tick(&mut self) {
        let distance = self.distance.distance();
        let target = self.route.frame_for_distance(distance).unwrap_or(0);

        match self.last_displayed {
            Some(last) if target <= last => {
                trace!("Target frame {} not ahead of displayed frame {}", target, last);
            }
            _ => {
                self.advance_to(target, distance);
                self.fill_buffers();
            }
        }

        self.update_frame_rate();
        if self.sample_ride(distance, false) {
            self.publish_ride().await;
        }
        self.check_course_finished(distance).await;
        self.publish_tick(distance, target).await;
    }

    /// Add a ride sample once per [`RIDE_SAMPLE_INTERVAL`], or now when `force` is set
    ///
    /// Speed is the distance covered since the previous sample over its time.
    /// Returns whether a sample was taken.
    fn sample_ride(&mut self, distance: f64, force: bool) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let now = Instant::now();
        let started = *session.ride_started.get_or_insert(now);
        if let Some(last) = session.last_sample {
            if !force && now.duration_since(last) < RIDE_SAMPLE_INTERVAL {
                return false;
            }
        }

        let time = now.duration_since(started).as_secs_f64();
        let speed = match session.ride.last_sample() {
            Some(previous) if time > previous.time => {
                ((distance - previous.distance) / (time - previous.time)).max(0.0)
            }
            _ => 0.0,
        };
        session.ride.add_sample(RideSample {
            time,
            distance,
            altitude: self.route.altitude_for_distance(distance),
            speed,
        });
        session.last_sample = Some(now);
        trace!("Ride sample at {:.1}s: {:.1}m, {:.1} m/s", time, distance, speed);
        true
    }

    async fn publish_ride(&mut self) {
        let summary = self.session.as_ref().map(|s| s.ride.summary());
        self.state
            .update_status(|status| status.ride = summary)
            .await;
    }

    /// Take frames from the queue until `target` can be shown
    ///
    /// A frame past the target is held back; the latest frame before it is
    /// shown instead, so the picture never runs ahead of the rider.
    fn advance_to(&mut self, target: u32, distance: f64) {
        let mut candidate: Option<Frame> = None;

        if let Some(frame) = self.pending.take() {
            if frame.frame_number > target {
                self.pending = Some(frame);
                self.frames_available();
                return;
            }
            if frame.frame_number == target {
                self.display(frame, distance);
                self.frames_available();
                return;
            }
            candidate = Some(frame);
        }

        loop {
            match self.queue.try_take() {
                Ok(Some(frame)) if frame.frame_number < target => {
                    candidate = Some(frame);
                }
                Ok(Some(frame)) if frame.frame_number == target => {
                    self.display(frame, distance);
                    self.frames_available();
                    return;
                }
                Ok(Some(frame)) => {
                    self.pending = Some(frame);
                    if let Some(earlier) = candidate {
                        self.display(earlier, distance);
                    }
                    self.frames_available();
                    return;
                }
                Ok(None) | Err(QueueError::Drained) => {
                    if let Some(earlier) = candidate {
                        self.display(earlier, distance);
                    }
                    self.buffering();
                    return;
                }
            }
        }
    }

    fn display(&mut self, frame: Frame, distance: f64) {
        let frame_number = frame.frame_number;
        if let Some(last) = self.last_displayed {
            if frame_number <= last {
                return;
            }
            self.frames_advanced += frame_number - last;
        }
        self.last_displayed = Some(frame_number);

        trace!("Displaying frame {} at {:.2}m", frame_number, distance);
        self.sink.display(frame);
        self.emit(RideEvent::FrameDisplayed {
            frame_number,
            distance,
            timestamp: Utc::now(),
        });
    }

    fn frames_available(&mut self) {
        self.empty_ticks = 0;
        self.set_buffer_full(true);
    }

    fn buffering(&mut self) {
        self.empty_ticks += 1;
        self.set_buffer_full(false);

        let ticks_per_second = (1000 / self.settings.frame_interval.as_millis().max(1)).max(1);
        if u128::from(self.empty_ticks) == ticks_per_second {
            warn!(
                "Frame queue stalled for a second ({} requests in flight, end of video: {})",
                self.in_flight, self.end_of_video
            );
        }
    }

    fn set_buffer_full(&mut self, full: bool) {
        if self.buffer_full != full {
            self.buffer_full = full;
            self.emit(RideEvent::BufferFull {
                full,
                timestamp: Utc::now(),
            });
        }
    }

    /// Request decode work while the queue is below its low watermark
    fn fill_buffers(&mut self) {
        if self.end_of_video || self.video != VideoStatus::Loaded || !self.seek_finished {
            return;
        }
        if !self.queue.is_low_watermark() {
            return;
        }

        let skip = determine_skip(self.measured_rate);
        let capacity = self.queue.capacity();
        let mut requested = 0;
        while self.queue.len() + self.in_flight < capacity {
            let command = DecoderCommand::LoadFrames {
                skip,
                epoch: self.epoch,
            };
            if let Err(e) = self.send_to_worker(command) {
                error!("Cannot request frames: {}", e);
                break;
            }
            self.in_flight += 1;
            requested += 1;
        }
        if requested > 0 {
            trace!("Requested {} frames with skip {}", requested, skip);
        }
    }

    fn update_frame_rate(&mut self) {
        let elapsed = self.rate_window_start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let rate = f64::from(self.frames_advanced) / elapsed.as_secs_f64();
        self.measured_rate = rate.round() as u32;
        self.frames_advanced = 0;
        self.rate_window_start = Instant::now();

        debug!(
            "Frame rate {} fps, skip {}",
            self.measured_rate,
            determine_skip(self.measured_rate)
        );
        self.emit(RideEvent::CurrentFrameRate {
            frames_per_second: self.measured_rate,
            timestamp: Utc::now(),
        });
    }

    async fn check_course_finished(&mut self, distance: f64) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.finished || distance < session.end_distance {
            return;
        }
        session.finished = true;
        let course_name = session.course_name.clone();
        self.sample_ride(distance, true);
        self.publish_ride().await;

        info!(
            "Course '{}' on '{}' finished at {:.1}m",
            course_name,
            self.route.name(),
            distance
        );
        self.route.clear_unfinished_run();
        self.emit(RideEvent::CourseFinished {
            route_name: self.route.name().to_string(),
            course_name,
            distance,
            timestamp: Utc::now(),
        });
        self.autoplay = false;
        self.stop_ticking();
        self.set_state(PlaybackState::Paused).await;
    }

    async fn publish_tick(&mut self, distance: f64, target: u32) {
        let displayed = self.last_displayed;
        let frame_rate = self.measured_rate;
        let buffer_full = self.buffer_full;
        let queue_length = self.queue.len();
        let queue_stats = self.queue.stats();
        self.state
            .update_status(|status| {
                status.distance = distance;
                status.target_frame = Some(target);
                status.displayed_frame = displayed;
                status.frame_rate = frame_rate;
                status.buffer_full = buffer_full;
                status.queue_length = queue_length;
                status.queue_stats = queue_stats;
            })
            .await;
    }

    // ========================================
    // Helpers
    // ========================================

    fn start_ticking(&mut self) {
        let period = self.settings.frame_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.distance.set_running(true);
        self.rate_window_start = Instant::now();
        self.frames_advanced = 0;
    }

    fn stop_ticking(&mut self) {
        self.ticker = None;
        self.distance.set_running(false);
    }

    async fn set_state(&mut self, new_state: PlaybackState) {
        let old_state = self.playback_state;
        if old_state == new_state {
            return;
        }
        self.playback_state = new_state;
        debug!("Playback state: {} -> {}", old_state, new_state);
        self.state
            .update_status(|status| status.state = new_state)
            .await;
        self.emit(RideEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn send_to_worker(&self, command: DecoderCommand) -> Result<()> {
        self.worker
            .as_ref()
            .ok_or_else(|| Error::Playback("decode worker stopped".to_string()))?
            .send(command)
    }

    fn emit(&self, event: RideEvent) {
        self.state.broadcast_event(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determine_skip_thresholds() {
        assert_eq!(determine_skip(0), 0);
        assert_eq!(determine_skip(29), 0);
        assert_eq!(determine_skip(30), 1);
        assert_eq!(determine_skip(39), 1);
        assert_eq!(determine_skip(40), 2);
        assert_eq!(determine_skip(120), 2);
    }

    #[test]
    fn test_default_settings() {
        let settings = ControllerSettings::default();
        assert_eq!(settings.queue_capacity, 100);
        assert_eq!(settings.low_watermark, 50);
        assert_eq!(settings.frame_interval, Duration::from_millis(33));
    }

    #[test]
    fn test_channel_sink_forwards_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sink: Box<dyn FrameSink> = Box::new(tx);
        sink.display(Frame::new(12, 1, 1, vec![1, 2, 3]));
        assert_eq!(rx.try_recv().unwrap().frame_number, 12);
    }
}
