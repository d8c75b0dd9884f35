use std::{
    collections::HashSet,
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{stream::LocalBoxStream, Stream, StreamExt};

use crate::{
    coordinate::LocationSample,
    error::{DeviceError, LocationError},
};

/// Options handed to the device untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout_ms: u32,
    pub max_sample_age_ms: u32,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout_ms: 10_000,
            max_sample_age_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub i32);

/// A running device watch. The stream ends once the watch is cleared.
pub struct DeviceWatch {
    pub id: WatchId,
    pub readings: LocalBoxStream<'static, Result<LocationSample, DeviceError>>,
}

/// The platform's positioning capability (GNSS receiver, browser geolocation, simulator).
#[async_trait::async_trait(?Send)]
pub trait PositioningDevice {
    fn watch_position(&self, options: &PositionOptions) -> DeviceWatch;

    fn clear_watch(&self, id: WatchId);

    async fn current_position(&self, options: &PositionOptions) -> Result<LocationSample, DeviceError>;
}

/// Identifies one subscription. Copyable so it can outlive the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(WatchId);

/// Continuous stream of samples or normalized sensor errors.
pub struct Subscription {
    handle: WatchHandle,
    readings: LocalBoxStream<'static, Result<LocationSample, LocationError>>,
}

impl Subscription {
    pub fn handle(&self) -> WatchHandle {
        self.handle
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription {{ {:?} }}", self.handle)
    }
}

impl Stream for Subscription {
    type Item = Result<LocationSample, LocationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.readings.poll_next_unpin(cx)
    }
}

pub struct LocationWatcher<D: PositioningDevice> {
    device: D,
    options: PositionOptions,
    active: HashSet<WatchId>,
}

impl<D: PositioningDevice> LocationWatcher<D> {
    pub fn new(device: D, options: PositionOptions) -> Self {
        Self {
            device,
            options,
            active: HashSet::new(),
        }
    }

    /// Starts continuous sampling. Sensor errors are delivered in the stream
    /// and do not end it; only [`Self::stop_watching`] does.
    pub fn start_watching(&mut self) -> Subscription {
        let watch = self.device.watch_position(&self.options);
        self.active.insert(watch.id);
        tracing::debug!("Started watch {:?}", watch.id);

        let readings = watch
            .readings
            .map(|reading| {
                reading.map_err(|err| {
                    tracing::debug!("Device reported {}", err);
                    LocationError::from(err)
                })
            })
            .boxed_local();

        Subscription {
            handle: WatchHandle(watch.id),
            readings,
        }
    }

    /// Stops a subscription. Unknown or already stopped handles are ignored.
    pub fn stop_watching(&mut self, handle: WatchHandle) {
        if self.active.remove(&handle.0) {
            self.device.clear_watch(handle.0);
            tracing::debug!("Stopped watch {:?}", handle.0);
        }
    }

    pub fn stop_all(&mut self) {
        for id in self.active.drain() {
            self.device.clear_watch(id);
        }
    }

    pub fn is_watching(&self) -> bool {
        !self.active.is_empty()
    }

    /// One-shot position reading.
    pub async fn current_position(&self) -> Result<LocationSample, LocationError> {
        self.device
            .current_position(&self.options)
            .await
            .map_err(LocationError::from)
    }
}

impl<D: PositioningDevice> Drop for LocationWatcher<D> {
    fn drop(&mut self) {
        self.stop_all();
    }
}
