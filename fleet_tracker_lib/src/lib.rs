pub mod clock;
pub mod configuration;
pub mod coordinate;
pub mod driver;
pub mod error;
pub mod renderer;
pub mod route;
pub mod services;
pub mod tracking_session;
pub mod trip_session;

pub use configuration::Configuration;
pub use coordinate::{Coordinate, LocationSample};
pub use error::{DeviceError, LocationError, RenderError, RouteError, TelemetryError, TrackingError};
pub use renderer::{Bounds, GeoRenderer, MapSurface};
pub use route::{Route, RouteSummary, TravelMode};
pub use tracking_session::{SessionOptions, SessionView, TripTrackingSession};
pub use trip_session::{SessionState, TripSession, TripStats};
