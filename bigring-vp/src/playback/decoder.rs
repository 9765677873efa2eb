//! Video decoder interface
//!
//! The decode worker drives a [`VideoDecoder`]; real codec backends live
//! outside this crate. [`SyntheticDecoder`] renders a moving test pattern so
//! the player runs end to end without one.

use crate::error::{Error, Result};
use crate::playback::types::{Frame, VideoProperties};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sequential frame decoder
///
/// The decoder keeps a read position. `decode_frame` and `skip_frame` both
/// consume the frame at that position and advance it by one.
pub trait VideoDecoder: Send {
    /// Open a video file, replacing any video opened before
    fn open(&mut self, path: &Path) -> Result<VideoProperties>;

    /// Move the read position to `frame_number`
    fn seek(&mut self, frame_number: u32) -> Result<()>;

    /// Decode the frame at the read position, `None` at end of stream
    fn decode_frame(&mut self) -> Result<Option<Frame>>;

    /// Step over the frame at the read position without producing an image
    ///
    /// Returns `false` at end of stream.
    fn skip_frame(&mut self) -> Result<bool>;
}

/// Default frame count of synthetic videos: one hour at 30 fps
pub const SYNTHETIC_DEFAULT_FRAME_COUNT: u32 = 108_000;

/// Test-pattern video parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticVideo {
    /// Number of frames; 0 selects [`SYNTHETIC_DEFAULT_FRAME_COUNT`]
    pub frame_count: u32,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticVideo {
    fn default() -> Self {
        Self {
            frame_count: 0,
            frame_rate: 30.0,
            width: 64,
            height: 36,
        }
    }
}

/// Decoder producing a diagonal gradient that shifts with the frame number
///
/// Opening checks that the file exists but never reads it.
pub struct SyntheticDecoder {
    video: SyntheticVideo,
    opened: Option<PathBuf>,
    position: u32,
}

impl SyntheticDecoder {
    pub fn new(video: SyntheticVideo) -> Self {
        Self {
            video,
            opened: None,
            position: 0,
        }
    }

    fn frame_count(&self) -> u32 {
        if self.video.frame_count == 0 {
            SYNTHETIC_DEFAULT_FRAME_COUNT
        } else {
            self.video.frame_count
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.opened.is_some() {
            Ok(())
        } else {
            Err(Error::Decode("no video open".to_string()))
        }
    }

    fn render(&self, frame_number: u32) -> Vec<u8> {
        let (width, height) = (self.video.width, self.video.height);
        let mut image = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let shade = x.wrapping_add(y).wrapping_add(frame_number) as u8;
                image.extend_from_slice(&[shade, shade.wrapping_mul(2), 255 - shade]);
            }
        }
        image
    }
}

impl VideoDecoder for SyntheticDecoder {
    fn open(&mut self, path: &Path) -> Result<VideoProperties> {
        if !path.is_file() {
            self.opened = None;
            return Err(Error::DecodeOpenFailed {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }
        self.opened = Some(path.to_path_buf());
        self.position = 0;
        let properties = VideoProperties {
            frame_count: self.frame_count(),
            frame_rate: self.video.frame_rate,
            width: self.video.width,
            height: self.video.height,
        };
        debug!("Synthetic video opened: {} ({:?})", path.display(), properties);
        Ok(properties)
    }

    fn seek(&mut self, frame_number: u32) -> Result<()> {
        self.ensure_open()?;
        self.position = frame_number.min(self.frame_count());
        Ok(())
    }

    fn decode_frame(&mut self) -> Result<Option<Frame>> {
        self.ensure_open()?;
        if self.position >= self.frame_count() {
            return Ok(None);
        }
        let frame = Frame::new(
            self.position,
            self.video.width,
            self.video.height,
            self.render(self.position),
        );
        self.position += 1;
        Ok(Some(frame))
    }

    fn skip_frame(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.position >= self.frame_count() {
            return Ok(false);
        }
        self.position += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_video(frame_count: u32) -> SyntheticVideo {
        SyntheticVideo {
            frame_count,
            frame_rate: 25.0,
            width: 4,
            height: 2,
        }
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut decoder = SyntheticDecoder::new(small_video(10));
        let result = decoder.open(Path::new("/nonexistent/ride.avi"));
        assert!(matches!(result, Err(Error::DecodeOpenFailed { .. })));
        assert!(decoder.decode_frame().is_err());
    }

    #[test]
    fn test_open_reports_properties() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut decoder = SyntheticDecoder::new(small_video(10));
        let properties = decoder.open(file.path()).unwrap();
        assert_eq!(properties.frame_count, 10);
        assert_eq!(properties.frame_rate, 25.0);
    }

    #[test]
    fn test_zero_frame_count_uses_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut decoder = SyntheticDecoder::new(small_video(0));
        let properties = decoder.open(file.path()).unwrap();
        assert_eq!(properties.frame_count, SYNTHETIC_DEFAULT_FRAME_COUNT);
    }

    #[test]
    fn test_seek_decode_and_skip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut decoder = SyntheticDecoder::new(small_video(10));
        decoder.open(file.path()).unwrap();

        decoder.seek(6).unwrap();
        let frame = decoder.decode_frame().unwrap().unwrap();
        assert_eq!(frame.frame_number, 6);
        assert_eq!(frame.byte_len(), 4 * 2 * 3);

        assert!(decoder.skip_frame().unwrap());
        assert_eq!(decoder.decode_frame().unwrap().unwrap().frame_number, 8);
        assert!(decoder.skip_frame().unwrap());
        assert!(!decoder.skip_frame().unwrap());
        assert_eq!(decoder.decode_frame().unwrap(), None);
    }

    #[test]
    fn test_frames_differ_between_positions() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut decoder = SyntheticDecoder::new(small_video(10));
        decoder.open(file.path()).unwrap();
        let first = decoder.decode_frame().unwrap().unwrap();
        let second = decoder.decode_frame().unwrap().unwrap();
        assert_ne!(first.image, second.image);
    }
}
