//! Shared types for the video pipeline

use serde::Serialize;

/// One decoded video frame
///
/// Frames are moved from the decoder into the frame queue, out of the queue
/// into the controller and finally into the frame sink. They are never shared.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    /// Position of the frame in the video (0-based)
    pub frame_number: u32,
    pub width: u32,
    pub height: u32,
    /// Packed RGB24 pixels, `width * height * 3` bytes
    pub image: Vec<u8>,
}

impl Frame {
    pub fn new(frame_number: u32, width: u32, height: u32, image: Vec<u8>) -> Self {
        Self {
            frame_number,
            width,
            height,
            image,
        }
    }

    /// Size of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.image.len()
    }
}

/// Properties reported by a decoder after opening a video
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoProperties {
    pub frame_count: u32,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
}
