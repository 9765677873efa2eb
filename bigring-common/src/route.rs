//! Route model: distance ↔ frame mapping and elevation profile
//!
//! A [`Route`] describes the geometry of one recorded road video:
//! - **Distance mapping**: piecewise-constant meters-per-frame breakpoints,
//!   keyed by the cumulative distance at which each breakpoint starts
//! - **Profile**: piecewise-constant slope breakpoints (percent grade)
//! - **Courses**: named, selectable distance ranges
//!
//! All queries are pure. Floor lookups ("greatest breakpoint ≤ distance") use
//! binary search over the sorted breakpoint vectors.
//!
//! A default-constructed Route is *invalid* and stands for "no video selected";
//! every mapping query against it fails with [`Error::InvalidRoute`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Breakpoint of the distance mapping
///
/// From the distance it is keyed under, each frame advances the route by
/// `meters_per_frame` meters until the next breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceMappingEntry {
    pub frame_number: u32,
    pub meters_per_frame: f64,
}

impl DistanceMappingEntry {
    pub fn new(frame_number: u32, meters_per_frame: f64) -> Self {
        Self {
            frame_number,
            meters_per_frame,
        }
    }
}

/// Breakpoint of the slope step function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Distance (meters) from which `slope` applies
    pub distance: f64,
    /// Road grade in percent
    pub slope: f64,
}

impl ProfileEntry {
    pub fn new(distance: f64, slope: f64) -> Self {
        Self { distance, slope }
    }
}

/// Named, user-selectable segment of a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    pub start_distance: f64,
    pub end_distance: f64,
    /// Added by the user as a custom start point rather than shipped with the route
    #[serde(default)]
    pub custom: bool,
}

impl Course {
    pub fn new(name: impl Into<String>, start_distance: f64, end_distance: f64) -> Self {
        Self {
            name: name.into(),
            start_distance,
            end_distance,
            custom: false,
        }
    }

    /// Course length in meters
    pub fn length(&self) -> f64 {
        (self.end_distance - self.start_distance).max(0.0)
    }
}

/// Video file and its nominal frame rate
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoInformation {
    pub filename: PathBuf,
    pub frame_rate: f64,
}

impl VideoInformation {
    pub fn new(filename: impl Into<PathBuf>, frame_rate: f64) -> Self {
        Self {
            filename: filename.into(),
            frame_rate,
        }
    }

    /// True when a video file is associated with the route
    pub fn has_video(&self) -> bool {
        !self.filename.as_os_str().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MappingBreakpoint {
    distance: f64,
    entry: DistanceMappingEntry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProfileBreakpoint {
    entry: ProfileEntry,
    /// Altitude at `entry.distance`, integrated from the start altitude
    altitude: f64,
}

/// Raw, serializable form of a [`Route`]
///
/// The distance mapping is kept as the unaccumulated `(frame, meters_per_frame)`
/// list; cumulative distances are derived when converting into a Route.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub name: String,
    pub video: VideoInformation,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub distance_mappings: Vec<DistanceMappingEntry>,
    #[serde(default)]
    pub profile: Vec<ProfileEntry>,
    #[serde(default)]
    pub start_altitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfinished_run: Option<f64>,
}

/// A recorded road video and its distance geometry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteDefinition", into = "RouteDefinition")]
pub struct Route {
    name: String,
    video: VideoInformation,
    courses: Vec<Course>,
    distance_mappings: Vec<MappingBreakpoint>,
    profile: Vec<ProfileBreakpoint>,
    start_altitude: f64,
    number_of_frames: Option<u32>,
    unfinished_run: Option<f64>,
}

impl Route {
    /// Build a route from raw mapping and profile lists
    ///
    /// Mapping entries are walked in frame order, accumulating
    /// `(frame_number - previous_frame_number) * meters_per_frame` to derive
    /// the distance each breakpoint is keyed under, where the frames in between
    /// are counted at the rate that was in effect for them. Entries landing on
    /// an already used distance replace the earlier one.
    pub fn new(
        name: impl Into<String>,
        video: VideoInformation,
        courses: Vec<Course>,
        mut distance_mappings: Vec<DistanceMappingEntry>,
        mut profile: Vec<ProfileEntry>,
    ) -> Self {
        distance_mappings.sort_by_key(|entry| entry.frame_number);
        profile.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let mut breakpoints: Vec<MappingBreakpoint> = Vec::with_capacity(distance_mappings.len());
        let mut current_distance = 0.0;
        let mut last_frame_number = 0u32;
        let mut last_meters_per_frame: Option<f64> = None;
        for entry in distance_mappings {
            // Frames before this breakpoint advance at the previous breakpoint's rate
            let meters_per_frame = last_meters_per_frame.unwrap_or(entry.meters_per_frame);
            let nr_frames = entry.frame_number - last_frame_number;
            current_distance += f64::from(nr_frames) * meters_per_frame;

            match breakpoints.last_mut() {
                Some(last) if last.distance >= current_distance => {
                    *last = MappingBreakpoint {
                        distance: last.distance,
                        entry,
                    };
                }
                _ => breakpoints.push(MappingBreakpoint {
                    distance: current_distance,
                    entry,
                }),
            }
            last_frame_number = entry.frame_number;
            last_meters_per_frame = Some(entry.meters_per_frame);
        }

        let mut route = Self {
            name: name.into(),
            video,
            courses,
            distance_mappings: breakpoints,
            profile: Vec::new(),
            start_altitude: 0.0,
            number_of_frames: None,
            unfinished_run: None,
        };
        route.set_profile(profile);
        route
    }

    /// Set the altitude at distance 0 (profiles only carry slopes)
    pub fn with_start_altitude(mut self, start_altitude: f64) -> Self {
        self.start_altitude = start_altitude;
        let entries: Vec<ProfileEntry> = self.profile.iter().map(|bp| bp.entry).collect();
        self.set_profile(entries);
        self
    }

    fn set_profile(&mut self, entries: Vec<ProfileEntry>) {
        let mut altitude = self.start_altitude;
        let mut previous: Option<ProfileEntry> = None;
        self.profile = entries
            .into_iter()
            .map(|entry| {
                if let Some(prev) = previous {
                    altitude += prev.slope / 100.0 * (entry.distance - prev.distance);
                }
                previous = Some(entry);
                ProfileBreakpoint { entry, altitude }
            })
            .collect();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn video_information(&self) -> &VideoInformation {
        &self.video
    }

    /// A route is valid when it has both a distance mapping and courses
    pub fn is_valid(&self) -> bool {
        !self.distance_mappings.is_empty() && !self.courses.is_empty()
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::InvalidRoute(format!(
                "route '{}' has {} mapping entries and {} courses",
                self.name,
                self.distance_mappings.len(),
                self.courses.len()
            )))
        }
    }

    /// Floor lookup into the distance mapping
    ///
    /// Returns the key distance and entry of the greatest breakpoint ≤ `distance`,
    /// or the implicit entry at distance 0 (frame 0, meters-per-frame of the
    /// first breakpoint) when the distance precedes every breakpoint.
    fn mapping_entry_for(&self, distance: f64) -> Result<(f64, DistanceMappingEntry)> {
        self.ensure_valid()?;
        let idx = self
            .distance_mappings
            .partition_point(|bp| bp.distance <= distance);
        if idx == 0 {
            let first = &self.distance_mappings[0];
            Ok((0.0, DistanceMappingEntry::new(0, first.entry.meters_per_frame)))
        } else {
            let bp = &self.distance_mappings[idx - 1];
            Ok((bp.distance, bp.entry))
        }
    }

    /// Frame number to show at `distance`
    ///
    /// Monotonic non-decreasing in `distance`. Distances beyond the last
    /// breakpoint extrapolate with the last breakpoint's meters-per-frame.
    pub fn frame_for_distance(&self, distance: f64) -> Result<u32> {
        let (key, entry) = self.mapping_entry_for(distance)?;
        let frames = ((distance - key) / entry.meters_per_frame).floor();
        let frames = if frames.is_finite() && frames > 0.0 {
            frames.min(f64::from(u32::MAX)) as u32
        } else {
            0
        };
        Ok(entry.frame_number.saturating_add(frames))
    }

    /// Meters the route advances per frame at `distance`
    pub fn meters_per_frame(&self, distance: f64) -> Result<f64> {
        self.mapping_entry_for(distance)
            .map(|(_, entry)| entry.meters_per_frame)
    }

    /// Distance at which `frame_number` starts (inverse of [`Route::frame_for_distance`])
    pub fn distance_for_frame(&self, frame_number: u32) -> Result<f64> {
        self.ensure_valid()?;
        let idx = self
            .distance_mappings
            .partition_point(|bp| bp.entry.frame_number <= frame_number);
        let (key, entry) = if idx == 0 {
            let first = &self.distance_mappings[0];
            (0.0, DistanceMappingEntry::new(0, first.entry.meters_per_frame))
        } else {
            let bp = &self.distance_mappings[idx - 1];
            (bp.distance, bp.entry)
        };
        Ok(key + f64::from(frame_number - entry.frame_number) * entry.meters_per_frame)
    }

    /// Slope (percent) of the last profile breakpoint ≤ `distance`, 0 before the first
    pub fn slope_for_distance(&self, distance: f64) -> f64 {
        let idx = self.profile.partition_point(|bp| bp.entry.distance <= distance);
        if idx == 0 {
            0.0
        } else {
            self.profile[idx - 1].entry.slope
        }
    }

    /// Altitude (meters) at `distance`, integrating the slope step function
    pub fn altitude_for_distance(&self, distance: f64) -> f64 {
        let idx = self.profile.partition_point(|bp| bp.entry.distance <= distance);
        if idx == 0 {
            return self.start_altitude;
        }
        let bp = &self.profile[idx - 1];
        bp.altitude + bp.entry.slope / 100.0 * (distance - bp.entry.distance)
    }

    pub fn minimum_altitude(&self) -> f64 {
        self.altitude_extremes().0
    }

    pub fn maximum_altitude(&self) -> f64 {
        self.altitude_extremes().1
    }

    fn altitude_extremes(&self) -> (f64, f64) {
        let end_altitude = self.altitude_for_distance(self.total_distance());
        self.profile
            .iter()
            .map(|bp| bp.altitude)
            .chain([self.start_altitude, end_altitude])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), altitude| {
                (min.min(altitude), max.max(altitude))
            })
    }

    /// Courses in stored order
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn course(&self, index: usize) -> Option<&Course> {
        self.courses.get(index)
    }

    /// Distance of the last known breakpoint
    ///
    /// Once the video's frame count is known, the distance of the final frame
    /// is taken into account as well.
    pub fn total_distance(&self) -> f64 {
        let last_mapping = self.distance_mappings.last().map_or(0.0, |bp| bp.distance);
        let last_profile = self.profile.last().map_or(0.0, |bp| bp.entry.distance);
        let total = last_mapping.max(last_profile);
        match self.number_of_frames {
            Some(frames) if !self.distance_mappings.is_empty() => {
                let last = &self.distance_mappings[self.distance_mappings.len() - 1];
                let extra = frames.saturating_sub(last.entry.frame_number);
                total.max(last.distance + f64::from(extra) * last.entry.meters_per_frame)
            }
            _ => total,
        }
    }

    /// Add a custom course starting at `distance` and running to the end of the route
    pub fn add_start_point(&mut self, distance: f64, name: impl Into<String>) {
        let end_distance = self.total_distance();
        self.courses.push(Course {
            name: name.into(),
            start_distance: distance,
            end_distance,
            custom: true,
        });
    }

    /// Mark a run on this route as interrupted at `distance`
    pub fn set_unfinished_run(&mut self, distance: f64) {
        self.unfinished_run = Some(distance);
    }

    pub fn clear_unfinished_run(&mut self) {
        self.unfinished_run = None;
    }

    pub fn unfinished_run(&self) -> Option<f64> {
        self.unfinished_run
    }

    /// Record the frame count discovered when the video was opened
    pub fn set_number_of_frames(&mut self, number_of_frames: u32) {
        self.number_of_frames = Some(number_of_frames);
    }

    pub fn number_of_frames(&self) -> Option<u32> {
        self.number_of_frames
    }

    /// Resolve a relative video filename against `base`
    pub fn resolve_video_path(&mut self, base: &Path) {
        if self.video.has_video() && self.video.filename.is_relative() {
            self.video.filename = base.join(&self.video.filename);
        }
    }

    /// Sort routes by case-insensitive name
    pub fn sort_by_name(routes: &mut [Route]) {
        routes.sort_by_cached_key(|route| route.name.to_lowercase());
    }
}

impl TryFrom<RouteDefinition> for Route {
    type Error = Error;

    fn try_from(def: RouteDefinition) -> Result<Self> {
        let mut last_frame = 0u32;
        for entry in &def.distance_mappings {
            if !(entry.meters_per_frame.is_finite() && entry.meters_per_frame > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "route '{}': meters per frame must be positive, got {} at frame {}",
                    def.name, entry.meters_per_frame, entry.frame_number
                )));
            }
            if entry.frame_number < last_frame {
                return Err(Error::InvalidInput(format!(
                    "route '{}': frame numbers must not decrease ({} after {})",
                    def.name, entry.frame_number, last_frame
                )));
            }
            last_frame = entry.frame_number;
        }
        if let Some(entry) = def
            .profile
            .iter()
            .find(|entry| !entry.distance.is_finite() || !entry.slope.is_finite())
        {
            return Err(Error::InvalidInput(format!(
                "route '{}': non-finite profile entry at {}",
                def.name, entry.distance
            )));
        }
        if let Some(course) = def
            .courses
            .iter()
            .find(|course| course.start_distance > course.end_distance)
        {
            return Err(Error::InvalidInput(format!(
                "route '{}': course '{}' starts after it ends",
                def.name, course.name
            )));
        }

        let mut route = Route::new(
            def.name,
            def.video,
            def.courses,
            def.distance_mappings,
            def.profile,
        )
        .with_start_altitude(def.start_altitude);
        route.unfinished_run = def.unfinished_run;
        Ok(route)
    }
}

impl From<Route> for RouteDefinition {
    fn from(route: Route) -> Self {
        Self {
            name: route.name,
            video: route.video,
            courses: route.courses,
            distance_mappings: route.distance_mappings.iter().map(|bp| bp.entry).collect(),
            profile: route.profile.iter().map(|bp| bp.entry).collect(),
            start_altitude: route.start_altitude,
            unfinished_run: route.unfinished_run,
        }
    }
}
