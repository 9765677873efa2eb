//! # Big Ring Video Player Library (bigring-vp)
//!
//! Plays a route video at the speed the rider actually travels: the rider's
//! distance is mapped to a frame number through the route's distance mapping,
//! and a background decoder keeps a bounded frame queue filled ahead of the
//! display.
//!
//! **Architecture:** decode worker thread feeding a [`playback::FrameQueue`],
//! a tokio controller task that ticks the display, and an HTTP/SSE control
//! interface built on axum.

pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
