use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use chrono::Utc;
use fleet_tracker_lib::{
    services::{DeviceWatch, PositionOptions, PositioningDevice, WatchId},
    Coordinate, DeviceError, LocationSample,
};
use futures::StreamExt;

const SIMULATED_ACCURACY_M: f64 = 5.0;

/// Positions every `step_m` meters along `path`, from its first point to its last.
pub fn walk(path: &[Coordinate], step_m: f64) -> Vec<Coordinate> {
    let Some(&first) = path.first() else {
        return Vec::new();
    };
    if step_m <= 0.0 {
        return path.to_vec();
    }

    let mut positions = vec![first];
    let mut next_at = step_m;
    let mut travelled = 0.0;

    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let length = a.distance_to(&b);
        if length <= 0.0 {
            continue;
        }

        while next_at <= travelled + length {
            let fraction = (next_at - travelled) / length;
            positions.push(Coordinate::new(
                a.lat + (b.lat - a.lat) * fraction,
                a.lng + (b.lng - a.lng) * fraction,
            ));
            next_at += step_m;
        }
        travelled += length;
    }

    // Snap the final step onto the exact end of the path
    if let Some(&last) = path.last() {
        match positions.last_mut() {
            Some(tail) if tail.distance_to(&last) < 1.0 => *tail = last,
            _ => positions.push(last),
        }
    }
    positions
}

/// Positioning device that drives along a fixed path at constant speed,
/// one sample per interval.
pub struct SimulatedDevice {
    positions: Rc<[Coordinate]>,
    speed_mps: f64,
    interval: Duration,
    next_id: Cell<i32>,
    watches: RefCell<HashMap<WatchId, Rc<Cell<bool>>>>,
    finished: Rc<Cell<bool>>,
}

impl SimulatedDevice {
    pub fn along(path: &[Coordinate], speed_kph: f64, interval: Duration) -> Self {
        let speed_mps = speed_kph / 3.6;
        let positions = walk(path, speed_mps * interval.as_secs_f64());
        tracing::info!("Simulating {} samples at {:.0} km/h", positions.len(), speed_kph);

        Self {
            positions: positions.into(),
            speed_mps,
            interval,
            next_id: Cell::new(0),
            watches: RefCell::new(HashMap::new()),
            finished: Rc::new(Cell::new(false)),
        }
    }

    /// Set once a watch has emitted the final position.
    pub fn finished(&self) -> Rc<Cell<bool>> {
        self.finished.clone()
    }
}

#[async_trait::async_trait(?Send)]
impl PositioningDevice for SimulatedDevice {
    fn watch_position(&self, _options: &PositionOptions) -> DeviceWatch {
        let id = WatchId(self.next_id.get() + 1);
        self.next_id.set(id.0);

        let stopped = Rc::new(Cell::new(false));
        self.watches.borrow_mut().insert(id, stopped.clone());

        let positions = self.positions.clone();
        let finished = self.finished.clone();
        let (interval, speed_mps) = (self.interval, self.speed_mps);

        let readings = futures::stream::unfold(0usize, move |index| {
            let positions = positions.clone();
            let stopped = stopped.clone();
            let finished = finished.clone();
            async move {
                if index > 0 {
                    tokio::time::sleep(interval).await;
                }
                if stopped.get() {
                    return None;
                }
                let Some(&at) = positions.get(index) else {
                    finished.set(true);
                    return None;
                };

                let sample = LocationSample::new(at, Utc::now())
                    .with_speed(speed_mps)
                    .with_accuracy(SIMULATED_ACCURACY_M);
                Some((Ok(sample), index + 1))
            }
        })
        .boxed_local();

        DeviceWatch { id, readings }
    }

    fn clear_watch(&self, id: WatchId) {
        if let Some(stopped) = self.watches.borrow_mut().remove(&id) {
            stopped.set(true);
        }
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<LocationSample, DeviceError> {
        self.positions
            .first()
            .map(|&at| LocationSample::new(at, Utc::now()).with_accuracy(SIMULATED_ACCURACY_M))
            .ok_or_else(|| DeviceError::new(DeviceError::POSITION_UNAVAILABLE, "empty path"))
    }
}
