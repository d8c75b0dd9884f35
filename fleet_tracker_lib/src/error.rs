use thiserror::Error;

use crate::{coordinate::Coordinate, trip_session::SessionState};

/// Raw error as reported by a positioning device. Codes follow the
/// geolocation convention: 1 permission denied, 2 unavailable, 3 timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device error {code}: {message}")]
pub struct DeviceError {
    pub code: u16,
    pub message: String,
}

impl DeviceError {
    pub const PERMISSION_DENIED: u16 = 1;
    pub const POSITION_UNAVAILABLE: u16 = 2;
    pub const TIMEOUT: u16 = 3;

    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a position")]
    Timeout,
}

impl LocationError {
    /// Permission loss ends tracking, the others are transient.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LocationError::PermissionDenied)
    }
}

impl From<DeviceError> for LocationError {
    fn from(err: DeviceError) -> Self {
        match err.code {
            DeviceError::PERMISSION_DENIED => LocationError::PermissionDenied,
            DeviceError::TIMEOUT => LocationError::Timeout,
            _ => LocationError::PositionUnavailable,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("routing service answered {0}")]
    Status(u16),
    #[error("malformed routing response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend answered {0}")]
    Status(u16),
    #[error("telemetry queue is closed")]
    Closed,
    #[error("telemetry queue is full")]
    QueueFull,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("map container unavailable: {0}")]
    MissingContainer(String),
    #[error("map is already initialized, dispose it first")]
    AlreadyInitialized,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Errors observable on a tracking session.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("`{operation}` is not allowed while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("invalid coordinate {0:?}")]
    InvalidCoordinate(Coordinate),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("route unavailable: {0}")]
    RouteUnavailable(#[from] RouteError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl TrackingError {
    pub fn is_fatal(&self) -> bool {
        match self {
            TrackingError::Location(err) => err.is_fatal(),
            TrackingError::Render(_) => true,
            _ => false,
        }
    }
}
