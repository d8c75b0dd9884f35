use futures::StreamExt;

use crate::{
    clock::{Clock, SystemClock},
    configuration::Configuration,
    coordinate::{Coordinate, LocationSample},
    error::{LocationError, TrackingError},
    renderer::{GeoRenderer, MapSurface},
    route::{Route, RouteSummary, TravelMode},
    services::{LocationWatcher, PositioningDevice, RouteProvider, Subscription, TelemetryReporter},
    trip_session::{SessionState, TripSession, TripStats},
};

const DESTINATION_LABEL: &str = "Destination";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub trip_id: Option<i64>,
    pub driver_id: Option<String>,
    pub mode: TravelMode,
    pub arrival_radius_m: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            trip_id: None,
            driver_id: None,
            mode: TravelMode::Driving,
            arrival_radius_m: 30.0,
        }
    }
}

impl From<&Configuration> for SessionOptions {
    fn from(config: &Configuration) -> Self {
        Self {
            trip_id: None,
            driver_id: config.driver_id.clone(),
            mode: config.routing_profile,
            arrival_radius_m: config.arrival_radius_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    pub message: String,
    pub fatal: bool,
}

/// Snapshot for the UI. Every flag is derived from the session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub stats: TripStats,
    pub origin: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub position: Option<Coordinate>,
    pub route_summary: Option<RouteSummary>,
    pub error: Option<ErrorView>,
    pub arrived: bool,
}

impl SessionView {
    pub fn can_set_destination(&self) -> bool {
        matches!(self.state, SessionState::Idle | SessionState::AwaitingDestination)
    }

    pub fn can_start(&self) -> bool {
        self.state == SessionState::AwaitingDestination && self.destination.is_some()
    }

    pub fn can_stop(&self) -> bool {
        self.state == SessionState::Tracking
    }

    pub fn is_tracking(&self) -> bool {
        self.state == SessionState::Tracking
    }
}

/// Live tracking of one trip: destination, route, running stats.
///
/// Samples are handled one at a time in arrival order. Rendering and stat
/// updates happen synchronously per sample; telemetry is queued and never
/// awaited.
pub struct TripTrackingSession<S: MapSurface, D: PositioningDevice, R: RouteProvider> {
    trip: TripSession,
    options: SessionOptions,
    renderer: GeoRenderer<S>,
    watcher: LocationWatcher<D>,
    routes: R,
    reporter: TelemetryReporter,
    clock: Box<dyn Clock>,
    subscription: Option<Subscription>,
    start_reported: bool,
    last_error: Option<TrackingError>,
}

impl<S: MapSurface, D: PositioningDevice, R: RouteProvider> TripTrackingSession<S, D, R> {
    /// Creates the session, draws its map into `container` and fixes the
    /// origin from a one-shot position reading. A failed reading leaves the
    /// origin unknown and is recorded as the last error. A map that cannot
    /// be created fails the session before any position is read.
    pub async fn open(
        options: SessionOptions,
        container: &S::Container,
        watcher: LocationWatcher<D>,
        routes: R,
        reporter: TelemetryReporter,
    ) -> Self {
        let mut session = Self {
            trip: TripSession::new(options.trip_id, options.driver_id.clone(), None),
            options,
            renderer: GeoRenderer::new(),
            watcher,
            routes,
            reporter,
            clock: Box::new(SystemClock),
            subscription: None,
            start_reported: false,
            last_error: None,
        };

        if let Err(err) = session.renderer.initialize(container) {
            tracing::error!("Map unavailable: {}", err);
            session.trip.state = SessionState::Failed;
            session.last_error = Some(err.into());
            return session;
        }

        match session.watcher.current_position().await {
            Ok(sample) if sample.coordinate.is_valid() => {
                tracing::info!("Session origin {:?}", sample.coordinate);
                session.trip.origin = Some(sample.coordinate);
                session.renderer.set_current_position(sample.coordinate);
            }
            Ok(sample) => tracing::warn!("Ignoring invalid origin {:?}", sample.coordinate),
            Err(err) => {
                tracing::warn!("Origin unknown: {}", err);
                session.last_error = Some(err.into());
            }
        }

        session
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn trip(&self) -> &TripSession {
        &self.trip
    }

    pub fn state(&self) -> SessionState {
        self.trip.state
    }

    pub fn stats(&self) -> &TripStats {
        &self.trip.stats
    }

    pub fn route(&self) -> Option<&Route> {
        self.trip.route.as_ref()
    }

    pub fn route_summary(&self) -> Option<RouteSummary> {
        self.trip.route.as_ref().map(Route::summary)
    }

    pub fn last_error(&self) -> Option<&TrackingError> {
        self.last_error.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn has_arrived(&self) -> bool {
        self.trip.has_arrived(self.options.arrival_radius_m)
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.trip.state,
            stats: self.trip.stats,
            origin: self.trip.origin,
            destination: self.trip.destination,
            position: self.trip.current_position(),
            route_summary: self.route_summary(),
            error: self.last_error.as_ref().map(|err| ErrorView {
                message: err.to_string(),
                fatal: err.is_fatal(),
            }),
            arrived: self.has_arrived(),
        }
    }

    /// Sets the destination and asks for a route to it. Finding no route,
    /// or failing to reach the routing service, still moves the session to
    /// `AwaitingDestination`; tracking then runs without a route line.
    pub async fn set_destination(&mut self, destination: Coordinate) -> Result<(), TrackingError> {
        self.ensure(&[SessionState::Idle, SessionState::AwaitingDestination], "set_destination")?;
        if !destination.is_valid() {
            return Err(TrackingError::InvalidCoordinate(destination));
        }
        if matches!(self.last_error, Some(TrackingError::RouteUnavailable(_))) {
            self.last_error = None;
        }

        self.trip.destination = Some(destination);
        self.trip.route = None;
        self.trip.state = SessionState::AwaitingDestination;
        self.renderer.set_destination(destination, DESTINATION_LABEL);
        self.renderer.clear_route();

        let Some(from) = self.trip.current_position() else {
            tracing::info!("Position unknown, no route requested");
            return Ok(());
        };

        match self.routes.calculate_route(from, destination, self.options.mode).await {
            Ok(Some(route)) => {
                tracing::info!("Route found: {}", route.summary());
                self.renderer.draw_route(&route.geometry);
                self.trip.route = Some(route);
            }
            Ok(None) => tracing::info!("No route to {:?}", destination),
            Err(err) => {
                tracing::warn!("Route request failed: {}", err);
                self.last_error = Some(err.into());
            }
        }

        Ok(())
    }

    pub fn start(&mut self) -> Result<(), TrackingError> {
        self.ensure(&[SessionState::AwaitingDestination], "start")?;
        let Some(destination) = self.trip.destination else {
            return Err(self.invalid_state("start"));
        };

        self.trip.started_at = Some(self.clock.now());
        self.trip.state = SessionState::Tracking;
        if let Some(origin) = self.trip.origin {
            self.trip.stats.distance_to_destination_meters = origin.distance_to(&destination);
        }

        self.subscription = Some(self.watcher.start_watching());
        self.start_reported = self.reporter.report_start(&self.trip);
        tracing::info!("Tracking started");

        Ok(())
    }

    /// Waits for the next watcher event and handles it. Returns `false` when
    /// there is no active subscription.
    pub async fn process_next(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };

        match subscription.next().await {
            Some(Ok(sample)) => {
                if let Err(err) = self.on_sample(sample) {
                    tracing::debug!("Sample dropped: {}", err);
                }
                true
            }
            Some(Err(err)) => {
                self.on_location_error(err);
                true
            }
            None => {
                tracing::warn!("Position feed ended");
                self.stop_watching();
                false
            }
        }
    }

    pub fn on_sample(&mut self, sample: LocationSample) -> Result<(), TrackingError> {
        self.ensure(&[SessionState::Tracking], "on_sample")?;
        if !sample.coordinate.is_valid() {
            tracing::warn!("Dropping sample with invalid coordinate {:?}", sample.coordinate);
            return Ok(());
        }

        if self.trip.origin.is_none() {
            self.trip.origin = Some(sample.coordinate);
        }

        let previous = self.trip.last_sample.take();
        self.trip.stats.record_sample(previous.as_ref(), &sample, self.trip.destination, self.trip.started_at);
        self.renderer.set_current_position(sample.coordinate);

        if !self.start_reported {
            self.start_reported = self.reporter.report_start(&self.trip);
        }
        self.reporter.report_sample(&self.trip, &sample);

        tracing::debug!(
            "Sample {:?}: {:.0} m traveled, {:.0} m to go",
            sample.coordinate,
            self.trip.stats.total_distance_traveled_meters,
            self.trip.stats.distance_to_destination_meters
        );
        self.trip.last_sample = Some(sample);

        Ok(())
    }

    pub fn on_location_error(&mut self, err: LocationError) {
        if err.is_fatal() && matches!(self.trip.state, SessionState::AwaitingDestination | SessionState::Tracking) {
            tracing::error!("Tracking failed: {}", err);
            self.stop_watching();
            self.trip.state = SessionState::Failed;
        } else {
            tracing::warn!("Location error: {}", err);
        }
        self.last_error = Some(err.into());
    }

    pub fn stop(&mut self) -> Result<(), TrackingError> {
        self.ensure(&[SessionState::Tracking], "stop")?;

        self.stop_watching();
        let ended_at = self.clock.now();
        self.trip.ended_at = Some(ended_at);
        self.trip.stats.finish(self.trip.started_at, ended_at);
        self.trip.state = SessionState::Completed;
        self.reporter.report_stop(&self.trip);

        tracing::info!(
            "Tracking stopped after {:.0} s and {:.0} m",
            self.trip.stats.elapsed_seconds,
            self.trip.stats.total_distance_traveled_meters
        );

        Ok(())
    }

    fn stop_watching(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.watcher.stop_watching(subscription.handle());
        }
    }

    fn ensure(&self, allowed: &[SessionState], operation: &'static str) -> Result<(), TrackingError> {
        if allowed.contains(&self.trip.state) {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> TrackingError {
        tracing::warn!("Rejected `{}` while {:?}", operation, self.trip.state);
        TrackingError::InvalidState {
            operation,
            state: self.trip.state,
        }
    }
}

impl<S: MapSurface, D: PositioningDevice, R: RouteProvider> Drop for TripTrackingSession<S, D, R> {
    fn drop(&mut self) {
        self.stop_watching();
        self.renderer.dispose();
    }
}
