use std::time::Duration;

use futures::{
    channel::mpsc::{self, Receiver, Sender},
    StreamExt,
};
use serde::Serialize;

use crate::{coordinate::LocationSample, error::TelemetryError, trip_session::TripSession};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,
    pub driver_id: Option<String>,
    pub start_lat: f64,
    pub start_lng: f64,
    pub start_address: String,
}

/// Distances in meters, times in seconds, speed in km/h.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,
    pub current_lat: f64,
    pub current_lng: f64,
    pub distance_covered: f64,
    pub time_elapsed: f64,
    pub estimated_time_remaining: Option<f64>,
    pub estimated_distance_remaining: f64,
    pub current_speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<i64>,
    pub driver_id: Option<String>,
    pub end_lat: f64,
    pub end_lng: f64,
    pub end_address: String,
    pub total_distance: f64,
    pub total_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryReport {
    Start(StartReport),
    Progress(ProgressReport),
    Stop(StopReport),
}

impl TelemetryReport {
    /// Returns `None` while the session has no known position.
    pub fn start(session: &TripSession) -> Option<Self> {
        let position = session.origin.or_else(|| session.current_position())?;
        Some(TelemetryReport::Start(StartReport {
            trip_id: session.trip_id,
            driver_id: session.driver_id.clone(),
            start_lat: position.lat,
            start_lng: position.lng,
            start_address: position.to_address(),
        }))
    }

    pub fn progress(session: &TripSession, sample: &LocationSample) -> Self {
        TelemetryReport::Progress(ProgressReport {
            trip_id: session.trip_id,
            current_lat: sample.coordinate.lat,
            current_lng: sample.coordinate.lng,
            distance_covered: session.stats.total_distance_traveled_meters,
            time_elapsed: session.stats.elapsed_seconds,
            estimated_time_remaining: session.estimated_time_remaining(),
            estimated_distance_remaining: session.stats.distance_to_destination_meters,
            current_speed: session.stats.current_speed_kph,
        })
    }

    pub fn stop(session: &TripSession) -> Option<Self> {
        let position = session.current_position()?;
        Some(TelemetryReport::Stop(StopReport {
            trip_id: session.trip_id,
            driver_id: session.driver_id.clone(),
            end_lat: position.lat,
            end_lng: position.lng,
            end_address: position.to_address(),
            total_distance: session.stats.total_distance_traveled_meters,
            total_duration: session.stats.elapsed_seconds,
        }))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryReport::Start(_) => "start",
            TelemetryReport::Progress(_) => "progress",
            TelemetryReport::Stop(_) => "stop",
        }
    }

    pub fn body(&self) -> serde_json::Value {
        let body = match self {
            TelemetryReport::Start(report) => serde_json::to_value(report),
            TelemetryReport::Progress(report) => serde_json::to_value(report),
            TelemetryReport::Stop(report) => serde_json::to_value(report),
        };
        // Plain structs of numbers and strings always serialize
        body.unwrap_or_default()
    }
}

#[async_trait::async_trait(?Send)]
pub trait TelemetrySink {
    async fn send(&self, report: &TelemetryReport) -> Result<(), TelemetryError>;
}

pub const DEFAULT_TELEMETRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts reports to `{base_url}/trips/{kind}` with a bearer credential.
/// A request that gets no answer within the timeout counts as failed, so
/// one stuck request cannot hold up the reports queued behind it.
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    credentials: Box<dyn Fn() -> Option<String>>,
}

impl HttpTelemetrySink {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TELEMETRY_TIMEOUT,
            credentials: Box::new(|| None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.with_credentials(move || Some(token.clone()))
    }

    /// The credential is looked up for every request, so a refreshed token is picked up.
    pub fn with_credentials(mut self, credentials: impl Fn() -> Option<String> + 'static) -> Self {
        self.credentials = Box::new(credentials);
        self
    }

    pub fn endpoint(&self, report: &TelemetryReport) -> String {
        format!("{}/trips/{}", self.base_url, report.kind())
    }
}

#[async_trait::async_trait(?Send)]
impl TelemetrySink for HttpTelemetrySink {
    async fn send(&self, report: &TelemetryReport) -> Result<(), TelemetryError> {
        let mut request = self
            .client
            .post(self.endpoint(report))
            .timeout(self.timeout)
            .json(&report.body());
        if let Some(token) = (self.credentials)() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TelemetryError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}

/// Sink used when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait::async_trait(?Send)]
impl TelemetrySink for LoggingSink {
    async fn send(&self, report: &TelemetryReport) -> Result<(), TelemetryError> {
        tracing::info!("{} report: {}", report.kind(), report.body());
        Ok(())
    }
}

/// Fire-and-forget front end of the telemetry queue. Nothing here ever
/// fails towards the caller; lost reports are only logged.
#[derive(Debug, Clone)]
pub struct TelemetryReporter {
    queue: Sender<TelemetryReport>,
}

/// Delivers queued reports one at a time, in order. Runs until every
/// reporter is dropped.
pub struct TelemetryWorker<S: TelemetrySink> {
    sink: S,
    queue: Receiver<TelemetryReport>,
}

impl TelemetryReporter {
    pub fn new<S: TelemetrySink>(sink: S, capacity: usize) -> (Self, TelemetryWorker<S>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { queue: tx }, TelemetryWorker { sink, queue: rx })
    }

    /// Returns `false` when there was no position to report yet.
    pub fn report_start(&mut self, session: &TripSession) -> bool {
        match TelemetryReport::start(session) {
            Some(report) => {
                self.enqueue(report);
                true
            }
            None => {
                tracing::debug!("No position yet, start report deferred");
                false
            }
        }
    }

    pub fn report_sample(&mut self, session: &TripSession, sample: &LocationSample) {
        self.enqueue(TelemetryReport::progress(session, sample));
    }

    pub fn report_stop(&mut self, session: &TripSession) {
        match TelemetryReport::stop(session) {
            Some(report) => self.enqueue(report),
            None => tracing::warn!("No position known, stop report skipped"),
        }
    }

    fn enqueue(&mut self, report: TelemetryReport) {
        if let Err(err) = self.queue.try_send(report) {
            let reason = if err.is_full() {
                TelemetryError::QueueFull
            } else {
                TelemetryError::Closed
            };
            tracing::warn!("Dropping {} report: {}", err.into_inner().kind(), reason);
        }
    }
}

impl<S: TelemetrySink> TelemetryWorker<S> {
    pub async fn run(mut self) {
        while let Some(report) = self.queue.next().await {
            match self.sink.send(&report).await {
                Ok(()) => tracing::debug!("Delivered {} report", report.kind()),
                Err(err) => tracing::warn!("Failed to deliver {} report: {}", report.kind(), err),
            }
        }
        tracing::debug!("Telemetry worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use crate::coordinate::Coordinate;

    use super::*;

    #[test]
    fn test_payload_field_names() {
        let mut session = TripSession::new(Some(9), Some("driver-1".into()), Some(Coordinate::new(6.837, 80.9999)));
        session.stats.total_distance_traveled_meters = 1800.0;
        session.stats.elapsed_seconds = 120.0;

        let start = TelemetryReport::start(&session).unwrap().body();
        assert_eq!(start["tripId"], 9);
        assert_eq!(start["driverId"], "driver-1");
        assert_eq!(start["startLat"], 6.837);
        assert_eq!(start["startLng"], 80.9999);
        assert_eq!(start["startAddress"], "6.837000, 80.999900");

        let stop = TelemetryReport::stop(&session).unwrap().body();
        assert_eq!(stop["totalDistance"], 1800.0);
        assert_eq!(stop["totalDuration"], 120.0);
        assert_eq!(stop["endLat"], 6.837);
    }

    #[test]
    fn test_trip_id_omitted_when_unknown() {
        let session = TripSession::new(None, None, Some(Coordinate::new(1.0, 2.0)));
        let body = TelemetryReport::start(&session).unwrap().body();
        assert!(body.get("tripId").is_none());
        assert!(body["driverId"].is_null());
    }

    #[test]
    fn test_no_position_no_report() {
        let session = TripSession::new(None, None, None);
        assert!(TelemetryReport::start(&session).is_none());
        assert!(TelemetryReport::stop(&session).is_none());
    }

    #[test]
    fn test_endpoint() {
        let session = TripSession::new(None, None, Some(Coordinate::new(1.0, 2.0)));
        let sink = HttpTelemetrySink::new("http://backend/api/");
        let report = TelemetryReport::stop(&session).unwrap();
        assert_eq!(sink.endpoint(&report), "http://backend/api/trips/stop");
    }

    #[test]
    fn test_full_queue_drops_silently() {
        let session = TripSession::new(None, None, Some(Coordinate::new(1.0, 2.0)));
        let (mut reporter, worker) = TelemetryReporter::new(LoggingSink, 1);
        for _ in 0..10 {
            assert!(reporter.report_start(&session));
        }
        drop(worker);
        assert!(reporter.report_start(&session));
    }
}
