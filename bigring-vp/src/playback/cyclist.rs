//! Distance sources
//!
//! The controller samples a [`DistanceSource`] on every tick. The rider's
//! distance either comes from an external sensor feed ([`SensorDistance`]) or
//! is simulated at constant speed ([`SimulatedCyclist`]).

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

/// Travelled distance in meters along the selected route
pub trait DistanceSource: Send + Sync {
    /// Current distance
    fn distance(&self) -> f64;

    /// Restart at `start_distance` (course start)
    fn reset(&self, start_distance: f64);

    /// Start or stop advancing
    fn set_running(&self, running: bool);
}

struct SimulationState {
    /// Distance accumulated up to `running_since`
    base_distance: f64,
    running_since: Option<Instant>,
}

/// Rider moving at a constant speed while running
pub struct SimulatedCyclist {
    speed_mps: f64,
    state: Mutex<SimulationState>,
}

impl SimulatedCyclist {
    /// Create a cyclist riding at `speed_mps` meters per second
    pub fn new(speed_mps: f64) -> Self {
        Self {
            speed_mps: speed_mps.max(0.0),
            state: Mutex::new(SimulationState {
                base_distance: 0.0,
                running_since: None,
            }),
        }
    }

    pub fn from_kmh(speed_kmh: f64) -> Self {
        Self::new(speed_kmh / 3.6)
    }

    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    fn lock(&self) -> MutexGuard<'_, SimulationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn distance_at(&self, state: &SimulationState, now: Instant) -> f64 {
        match state.running_since {
            Some(since) => {
                state.base_distance + self.speed_mps * now.duration_since(since).as_secs_f64()
            }
            None => state.base_distance,
        }
    }
}

impl DistanceSource for SimulatedCyclist {
    fn distance(&self) -> f64 {
        let state = self.lock();
        self.distance_at(&state, Instant::now())
    }

    fn reset(&self, start_distance: f64) {
        let mut state = self.lock();
        state.base_distance = start_distance;
        if state.running_since.is_some() {
            state.running_since = Some(Instant::now());
        }
        debug!("Simulated cyclist reset to {:.1}m", start_distance);
    }

    fn set_running(&self, running: bool) {
        let mut state = self.lock();
        let now = Instant::now();
        match (running, state.running_since) {
            (true, None) => state.running_since = Some(now),
            (false, Some(_)) => {
                state.base_distance = self.distance_at(&state, now);
                state.running_since = None;
            }
            _ => {}
        }
    }
}

/// Distance reported by an external sensor feed
///
/// The value only changes through [`SensorDistance::set_distance`],
/// [`SensorDistance::advance`] and `reset`; running state is ignored.
#[derive(Default)]
pub struct SensorDistance {
    distance: Mutex<f64>,
}

impl SensorDistance {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, f64> {
        self.distance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the current distance with a sensor reading
    pub fn set_distance(&self, distance: f64) {
        *self.lock() = distance;
    }

    /// Add `delta` meters to the current distance
    pub fn advance(&self, delta: f64) {
        *self.lock() += delta;
    }
}

impl DistanceSource for SensorDistance {
    fn distance(&self) -> f64 {
        *self.lock()
    }

    fn reset(&self, start_distance: f64) {
        self.set_distance(start_distance);
    }

    fn set_running(&self, _running: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_simulated_cyclist_stands_still_until_running() {
        let cyclist = SimulatedCyclist::new(10.0);
        cyclist.reset(250.0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cyclist.distance(), 250.0);
    }

    #[test]
    fn test_simulated_cyclist_advances_while_running() {
        let cyclist = SimulatedCyclist::new(100.0);
        cyclist.reset(10.0);
        cyclist.set_running(true);
        std::thread::sleep(Duration::from_millis(50));
        cyclist.set_running(false);

        let stopped_at = cyclist.distance();
        // At least 50ms at 100 m/s
        assert!(stopped_at >= 15.0, "distance {stopped_at}");

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cyclist.distance(), stopped_at);
    }

    #[test]
    fn test_simulated_cyclist_from_kmh() {
        let cyclist = SimulatedCyclist::from_kmh(36.0);
        assert!((cyclist.speed_mps() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensor_distance() {
        let sensor = SensorDistance::new();
        assert_eq!(sensor.distance(), 0.0);
        sensor.reset(100.0);
        sensor.advance(2.5);
        assert_eq!(sensor.distance(), 102.5);
        sensor.set_running(true);
        sensor.set_distance(90.0);
        assert_eq!(sensor.distance(), 90.0);
    }
}
