//! Ride recording
//!
//! A [`RideRecord`] holds the samples taken while riding one course session:
//! elapsed time, distance, altitude and speed. Totals are derived from the
//! samples on demand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One measurement of a ride
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RideSample {
    /// Seconds since the ride started
    pub time: f64,
    /// Distance along the route (meters)
    pub distance: f64,
    /// Altitude at `distance` (meters)
    pub altitude: f64,
    /// Meters per second
    pub speed: f64,
}

/// Samples of one course session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideRecord {
    pub session_id: Uuid,
    pub route_name: String,
    pub course_name: String,
    pub start_time: DateTime<Utc>,
    samples: Vec<RideSample>,
}

/// Totals of a ride without its samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideSummary {
    pub session_id: Uuid,
    pub route_name: String,
    pub course_name: String,
    pub start_time: DateTime<Utc>,
    pub duration_secs: f64,
    pub total_distance: f64,
    pub maximum_speed: f64,
    pub sample_count: usize,
}

impl RideRecord {
    pub fn new(
        session_id: Uuid,
        route_name: impl Into<String>,
        course_name: impl Into<String>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            route_name: route_name.into(),
            course_name: course_name.into(),
            start_time,
            samples: Vec::new(),
        }
    }

    /// Append a sample
    ///
    /// A sample not later than the last one replaces it.
    pub fn add_sample(&mut self, sample: RideSample) {
        match self.samples.last_mut() {
            Some(last) if sample.time <= last.time => *last = sample,
            _ => self.samples.push(sample),
        }
    }

    pub fn samples(&self) -> &[RideSample] {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<&RideSample> {
        self.samples.last()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the last sample
    pub fn duration(&self) -> Duration {
        self.samples
            .last()
            .map_or(Duration::ZERO, |s| Duration::from_secs_f64(s.time.max(0.0)))
    }

    /// Distance between the first and the last sample
    pub fn total_distance(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.distance - first.distance,
            _ => 0.0,
        }
    }

    pub fn maximum_speed(&self) -> f64 {
        self.samples.iter().map(|s| s.speed).fold(0.0, f64::max)
    }

    pub fn summary(&self) -> RideSummary {
        RideSummary {
            session_id: self.session_id,
            route_name: self.route_name.clone(),
            course_name: self.course_name.clone(),
            start_time: self.start_time,
            duration_secs: self.duration().as_secs_f64(),
            total_distance: self.total_distance(),
            maximum_speed: self.maximum_speed(),
            sample_count: self.samples.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time: f64, distance: f64, speed: f64) -> RideSample {
        RideSample {
            time,
            distance,
            altitude: 0.0,
            speed,
        }
    }

    fn record() -> RideRecord {
        RideRecord::new(Uuid::new_v4(), "Valley", "Climb", Utc::now())
    }

    #[test]
    fn test_empty_record_totals() {
        let ride = record();
        assert!(ride.is_empty());
        assert_eq!(ride.duration(), Duration::ZERO);
        assert_eq!(ride.total_distance(), 0.0);
        assert_eq!(ride.maximum_speed(), 0.0);
        assert_eq!(ride.summary().sample_count, 0);
    }

    #[test]
    fn test_totals_follow_samples() {
        let mut ride = record();
        ride.add_sample(sample(0.0, 250.0, 0.0));
        ride.add_sample(sample(1.0, 258.0, 8.0));
        ride.add_sample(sample(2.0, 269.0, 11.0));
        ride.add_sample(sample(3.0, 278.0, 9.0));

        assert_eq!(ride.samples().len(), 4);
        assert_eq!(ride.duration(), Duration::from_secs(3));
        assert_eq!(ride.total_distance(), 28.0);
        assert_eq!(ride.maximum_speed(), 11.0);

        let summary = ride.summary();
        assert_eq!(summary.route_name, "Valley");
        assert_eq!(summary.course_name, "Climb");
        assert_eq!(summary.duration_secs, 3.0);
        assert_eq!(summary.total_distance, 28.0);
        assert_eq!(summary.sample_count, 4);
    }

    #[test]
    fn test_sample_at_same_time_replaces_last() {
        let mut ride = record();
        ride.add_sample(sample(0.0, 0.0, 0.0));
        ride.add_sample(sample(1.0, 5.0, 5.0));
        ride.add_sample(sample(1.0, 6.0, 6.0));

        assert_eq!(ride.samples().len(), 2);
        assert_eq!(ride.last_sample().map(|s| s.distance), Some(6.0));
    }

    #[test]
    fn test_record_serializes_samples() {
        let mut ride = record();
        ride.add_sample(sample(0.0, 10.0, 0.0));

        let json = serde_json::to_value(&ride).unwrap();
        assert_eq!(json["route_name"], "Valley");
        assert_eq!(json["samples"][0]["distance"], 10.0);

        let back: RideRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, ride);
    }
}
