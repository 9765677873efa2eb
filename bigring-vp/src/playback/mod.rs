//! Video pipeline: frame queue, decode worker, distance sources and controller

pub mod controller;
pub mod cyclist;
pub mod decoder;
pub mod decoder_worker;
pub mod frame_queue;
pub mod types;

pub use controller::{
    determine_skip, ControllerHandle, ControllerSettings, FrameSink, NullSink, PlaybackController,
};
pub use cyclist::{DistanceSource, SensorDistance, SimulatedCyclist};
pub use decoder::{SyntheticDecoder, SyntheticVideo, VideoDecoder};
pub use frame_queue::{FrameQueue, QueueError, QueueStats};
pub use types::{Frame, VideoProperties};
