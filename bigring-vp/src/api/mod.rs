//! HTTP control API
//!
//! REST endpoints for route/course selection and playback control, plus an SSE
//! stream of ride events for the UI.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, run, spawn_catalog_tracker, AppContext};
