use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "cycling",
        }
    }
}

impl std::str::FromStr for TravelMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "driving" | "car" => Ok(TravelMode::Driving),
            "walking" | "foot" => Ok(TravelMode::Walking),
            "cycling" | "bike" => Ok(TravelMode::Cycling),
            other => Err(format!("unknown travel mode `{other}`")),
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path from origin to destination as returned by the routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub geometry: Vec<Coordinate>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

impl Route {
    pub fn new(geometry: Vec<Coordinate>, distance_meters: f64, duration_seconds: f64) -> Self {
        Self {
            geometry,
            distance_meters,
            duration_seconds,
        }
    }

    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            distance: format_distance(self.distance_meters),
            duration: format_duration(self.duration_seconds),
        }
    }
}

/// Display strings for a route, e.g. `"24.3 km"` / `"35 mins"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSummary {
    pub distance: String,
    pub duration: String,
}

impl fmt::Display for RouteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.distance, self.duration)
    }
}

pub fn format_distance(meters: f64) -> String {
    let meters = meters.max(0.0);
    if meters < 1000.0 {
        format!("{} m", meters.round() as u64)
    } else {
        format!("{:.1} km", meters / 1000.0)
    }
}

pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds.max(0.0) / 60.0).round() as u64;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    let mins = match minutes {
        1 => "1 min".to_string(),
        m => format!("{m} mins"),
    };

    match hours {
        0 => mins,
        1 if minutes == 0 => "1 hour".to_string(),
        1 => format!("1 hour {mins}"),
        h if minutes == 0 => format!("{h} hours"),
        h => format!("{h} hours {mins}"),
    }
}
