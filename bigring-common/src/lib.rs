//! # Big Ring Common Library
//!
//! Shared code for the Big Ring video player:
//! - Route model (distance ↔ frame mapping, slope and altitude profile, courses)
//! - Route catalog loading
//! - Event types (RideEvent enum) and EventBus
//! - Ride records sampled during a course session
//! - Configuration file and video folder resolution

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod ride;
pub mod route;

pub use error::{Error, Result};
pub use ride::{RideRecord, RideSample, RideSummary};
pub use route::{Course, DistanceMappingEntry, ProfileEntry, Route, RouteDefinition, VideoInformation};
