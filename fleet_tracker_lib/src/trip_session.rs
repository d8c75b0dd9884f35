use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{coordinate::{Coordinate, LocationSample}, route::Route};

/// Below this speed the vehicle is treated as standing still.
const MOVING_THRESHOLD_MPS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    AwaitingDestination,
    Tracking,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TripStats {
    pub distance_to_destination_meters: f64,
    pub total_distance_traveled_meters: f64,
    pub current_speed_kph: f64,
    pub elapsed_seconds: f64,
}

impl TripStats {
    /// Recomputes the stats for a new sample. `previous` is the last accepted sample.
    pub fn record_sample(
        &mut self,
        previous: Option<&LocationSample>,
        sample: &LocationSample,
        destination: Option<Coordinate>,
        started_at: Option<DateTime<Utc>>,
    ) {
        let segment_meters = previous
            .map(|prev| prev.coordinate.distance_to(&sample.coordinate))
            .filter(|meters| meters.is_finite())
            .unwrap_or(0.0);

        self.total_distance_traveled_meters += segment_meters;

        if let Some(destination) = destination {
            self.distance_to_destination_meters = sample.coordinate.distance_to(&destination);
        }

        self.current_speed_kph = match (sample.reported_speed_mps(), previous) {
            (Some(speed_mps), _) => speed_mps * 3.6,
            (None, Some(prev)) => {
                let dt = seconds_between(prev.captured_at, sample.captured_at);
                if dt > 0.0 {
                    segment_meters / dt * 3.6
                } else {
                    self.current_speed_kph
                }
            }
            (None, None) => 0.0,
        };

        if let Some(started_at) = started_at {
            self.elapsed_seconds = self.elapsed_seconds.max(seconds_between(started_at, sample.captured_at));
        }
    }

    /// Freezes elapsed time at the end of the trip.
    pub fn finish(&mut self, started_at: Option<DateTime<Utc>>, ended_at: DateTime<Utc>) {
        if let Some(started_at) = started_at {
            self.elapsed_seconds = self.elapsed_seconds.max(seconds_between(started_at, ended_at));
        }
        self.current_speed_kph = 0.0;
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to.signed_duration_since(from).num_milliseconds() as f64 / 1000.0).max(0.0)
}

/// The data of one trip tracking attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSession {
    pub trip_id: Option<i64>,
    pub driver_id: Option<String>,
    pub state: SessionState,
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub route: Option<Route>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub stats: TripStats,
    pub last_sample: Option<LocationSample>,
}

impl TripSession {
    pub fn new(trip_id: Option<i64>, driver_id: Option<String>, origin: Option<Coordinate>) -> Self {
        Self {
            trip_id,
            driver_id,
            state: SessionState::Idle,
            origin,
            destination: None,
            route: None,
            started_at: None,
            ended_at: None,
            stats: TripStats::default(),
            last_sample: None,
        }
    }

    /// Best known position: the last sample, else the origin.
    pub fn current_position(&self) -> Option<Coordinate> {
        self.last_sample.as_ref().map(|s| s.coordinate).or(self.origin)
    }

    /// Seconds left, from current speed when moving, otherwise from the
    /// planned route scaled to what is left of it.
    pub fn estimated_time_remaining(&self) -> Option<f64> {
        let remaining = self.stats.distance_to_destination_meters;
        let speed_mps = self.stats.current_speed_kph / 3.6;
        if speed_mps > MOVING_THRESHOLD_MPS {
            return Some(remaining / speed_mps);
        }

        self.route
            .as_ref()
            .filter(|route| route.distance_meters > 0.0)
            .map(|route| route.duration_seconds * (remaining / route.distance_meters).min(1.0))
    }

    pub fn has_arrived(&self, radius_meters: f64) -> bool {
        match (&self.last_sample, self.destination) {
            (Some(sample), Some(destination)) => sample.coordinate.distance_to(&destination) <= radius_meters,
            _ => false,
        }
    }
}
