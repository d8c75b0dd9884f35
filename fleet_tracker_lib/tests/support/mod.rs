#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
};

use chrono::{DateTime, Duration, Utc};
use fleet_tracker_lib::{
    clock::Clock,
    services::{DeviceWatch, PositionOptions, PositioningDevice, RouteProvider, TelemetrySink, TelemetryReport, WatchId},
    Bounds, Coordinate, DeviceError, LocationSample, MapSurface, RenderError, Route, RouteError, TelemetryError,
    TravelMode,
};
use futures::{
    channel::mpsc::{self, UnboundedSender},
    StreamExt,
};

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn sample(lat: f64, lng: f64, secs: i64) -> LocationSample {
    LocationSample::new(Coordinate::new(lat, lng), t0() + Duration::seconds(secs))
}

/// Device whose readings are pushed by the test.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    state: Rc<RefCell<DeviceState>>,
}

#[derive(Default)]
struct DeviceState {
    next_id: i32,
    watches: HashMap<WatchId, UnboundedSender<Result<LocationSample, DeviceError>>>,
    cleared: Vec<WatchId>,
    fix: Option<Result<LocationSample, DeviceError>>,
    last_options: Option<PositionOptions>,
}

impl ScriptedDevice {
    pub fn with_fix(fix: LocationSample) -> Self {
        let device = Self::default();
        device.state.borrow_mut().fix = Some(Ok(fix));
        device
    }

    pub fn failing_fix(code: u16) -> Self {
        let device = Self::default();
        device.state.borrow_mut().fix = Some(Err(DeviceError::new(code, "scripted")));
        device
    }

    pub fn push(&self, sample: LocationSample) {
        self.send(Ok(sample));
    }

    pub fn fail(&self, code: u16) {
        self.send(Err(DeviceError::new(code, "scripted")));
    }

    fn send(&self, reading: Result<LocationSample, DeviceError>) {
        for tx in self.state.borrow().watches.values() {
            let _ = tx.unbounded_send(reading.clone());
        }
    }

    pub fn active_watches(&self) -> usize {
        self.state.borrow().watches.len()
    }

    pub fn cleared(&self) -> Vec<WatchId> {
        self.state.borrow().cleared.clone()
    }

    pub fn last_options(&self) -> Option<PositionOptions> {
        self.state.borrow().last_options
    }
}

#[async_trait::async_trait(?Send)]
impl PositioningDevice for ScriptedDevice {
    fn watch_position(&self, options: &PositionOptions) -> DeviceWatch {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.last_options = Some(*options);
        let id = WatchId(state.next_id);
        let (tx, rx) = mpsc::unbounded();
        state.watches.insert(id, tx);
        DeviceWatch {
            id,
            readings: rx.boxed_local(),
        }
    }

    fn clear_watch(&self, id: WatchId) {
        let mut state = self.state.borrow_mut();
        state.watches.remove(&id);
        state.cleared.push(id);
    }

    async fn current_position(&self, options: &PositionOptions) -> Result<LocationSample, DeviceError> {
        self.state.borrow_mut().last_options = Some(*options);
        self.state
            .borrow()
            .fix
            .clone()
            .unwrap_or_else(|| Err(DeviceError::new(DeviceError::POSITION_UNAVAILABLE, "no fix")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    AddMarker(usize, Coordinate, Option<String>),
    MoveMarker(usize, Coordinate),
    Label(usize, String),
    AddLine(usize, usize),
    RemoveLine(usize),
    FitBounds(Bounds),
    Destroy,
}

/// Map container for [`RecordingSurface`]; every surface created in it
/// records into the same log.
#[derive(Clone, Default)]
pub struct SurfaceLog {
    ops: Rc<RefCell<Vec<SurfaceOp>>>,
    missing: bool,
}

impl SurfaceLog {
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::default()
        }
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.borrow().clone()
    }

    pub fn count(&self, matches: impl Fn(&SurfaceOp) -> bool) -> usize {
        self.ops.borrow().iter().filter(|op| matches(op)).count()
    }
}

pub struct RecordingSurface {
    log: SurfaceLog,
    next_id: usize,
}

impl RecordingSurface {
    fn record(&self, op: SurfaceOp) {
        self.log.ops.borrow_mut().push(op);
    }

    fn next(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }
}

impl MapSurface for RecordingSurface {
    type Container = SurfaceLog;
    type Marker = usize;
    type Line = usize;

    fn create(container: &SurfaceLog) -> Result<Self, RenderError> {
        if container.missing {
            return Err(RenderError::MissingContainer("map".into()));
        }
        Ok(Self {
            log: container.clone(),
            next_id: 0,
        })
    }

    fn add_marker(&mut self, at: Coordinate, label: Option<&str>) -> usize {
        let id = self.next();
        self.record(SurfaceOp::AddMarker(id, at, label.map(str::to_string)));
        id
    }

    fn move_marker(&mut self, marker: &usize, to: Coordinate) {
        self.record(SurfaceOp::MoveMarker(*marker, to));
    }

    fn set_marker_label(&mut self, marker: &usize, label: &str) {
        self.record(SurfaceOp::Label(*marker, label.to_string()));
    }

    fn add_line(&mut self, path: &[Coordinate]) -> usize {
        let id = self.next();
        self.record(SurfaceOp::AddLine(id, path.len()));
        id
    }

    fn remove_line(&mut self, line: usize) {
        self.record(SurfaceOp::RemoveLine(line));
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.record(SurfaceOp::FitBounds(bounds));
    }

    fn destroy(&mut self) {
        self.record(SurfaceOp::Destroy);
    }
}

/// Answers every route request with the same result and counts calls.
#[derive(Clone)]
pub struct StubRoutes {
    answer: Rc<dyn Fn() -> Result<Option<Route>, RouteError>>,
    calls: Rc<RefCell<Vec<(Coordinate, Coordinate, TravelMode)>>>,
}

impl StubRoutes {
    pub fn found(route: Route) -> Self {
        Self::answering(move || Ok(Some(route.clone())))
    }

    pub fn none() -> Self {
        Self::answering(|| Ok(None))
    }

    pub fn unavailable() -> Self {
        Self::answering(|| Err(RouteError::Status(503)))
    }

    /// Fails the first request, then finds `route`.
    pub fn unavailable_once(route: Route) -> Self {
        let failed = Cell::new(false);
        Self::answering(move || {
            if failed.replace(true) {
                Ok(Some(route.clone()))
            } else {
                Err(RouteError::Status(503))
            }
        })
    }

    fn answering(answer: impl Fn() -> Result<Option<Route>, RouteError> + 'static) -> Self {
        Self {
            answer: Rc::new(answer),
            calls: Rc::default(),
        }
    }

    pub fn calls(&self) -> Vec<(Coordinate, Coordinate, TravelMode)> {
        self.calls.borrow().clone()
    }
}

#[async_trait::async_trait(?Send)]
impl RouteProvider for StubRoutes {
    async fn calculate_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Option<Route>, RouteError> {
        self.calls.borrow_mut().push((origin, destination, mode));
        (self.answer)()
    }
}

/// Keeps every report it is given; optionally fails each delivery.
#[derive(Clone, Default)]
pub struct RecordingSink {
    reports: Rc<RefCell<Vec<TelemetryReport>>>,
    failing: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<TelemetryReport> {
        self.reports.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.reports.borrow().iter().map(TelemetryReport::kind).collect()
    }
}

#[async_trait::async_trait(?Send)]
impl TelemetrySink for RecordingSink {
    async fn send(&self, report: &TelemetryReport) -> Result<(), TelemetryError> {
        self.reports.borrow_mut().push(report.clone());
        if self.failing {
            return Err(TelemetryError::Status(500));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ManualClock(Rc<Cell<DateTime<Utc>>>);

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.0.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}
