pub mod location_watcher;
pub mod route_service;
pub mod telemetry;

pub use location_watcher::{DeviceWatch, LocationWatcher, PositionOptions, PositioningDevice, Subscription, WatchHandle, WatchId};
pub use route_service::{OsrmRouteService, RouteProvider};
pub use telemetry::{HttpTelemetrySink, LoggingSink, TelemetryReport, TelemetryReporter, TelemetrySink, TelemetryWorker};
