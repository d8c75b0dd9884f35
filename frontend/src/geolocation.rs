use std::{cell::RefCell, collections::HashMap, rc::Rc};

use chrono::{DateTime, Utc};
use fleet_tracker_lib::{
    services::{DeviceWatch, PositionOptions, PositioningDevice, WatchId},
    Coordinate, DeviceError, LocationSample,
};
use futures::{
    channel::{mpsc, oneshot},
    StreamExt,
};
use gloo_console::warn;
use gloo_utils::window;
use wasm_bindgen::{closure::Closure, JsCast};
use web_sys::{Geolocation, Position as GeolocationPosition, PositionError as GeolocationPositionError};

type Reading = Result<LocationSample, DeviceError>;

struct Callbacks {
    _on_position: Closure<dyn FnMut(GeolocationPosition)>,
    _on_error: Closure<dyn FnMut(GeolocationPositionError)>,
}

/// `navigator.geolocation` as a positioning device.
#[derive(Default)]
pub struct BrowserGeolocation {
    // The browser keeps calling these until the watch is cleared
    watches: RefCell<HashMap<WatchId, Callbacks>>,
}

fn geolocation() -> Result<Geolocation, DeviceError> {
    window()
        .navigator()
        .geolocation()
        .map_err(|_| DeviceError::new(DeviceError::POSITION_UNAVAILABLE, "geolocation is not supported"))
}

fn browser_options(options: &PositionOptions) -> web_sys::PositionOptions {
    let opts = web_sys::PositionOptions::new();
    opts.set_enable_high_accuracy(options.enable_high_accuracy);
    opts.set_timeout(options.timeout_ms);
    opts.set_maximum_age(options.max_sample_age_ms);
    opts
}

fn to_sample(position: &GeolocationPosition) -> LocationSample {
    let coords = position.coords();
    let captured_at = DateTime::from_timestamp_millis(position.timestamp() as i64).unwrap_or_else(Utc::now);

    let mut sample = LocationSample::new(Coordinate::new(coords.latitude(), coords.longitude()), captured_at)
        .with_accuracy(coords.accuracy());
    if let Some(speed) = coords.speed() {
        sample = sample.with_speed(speed);
    }
    if let Some(heading) = coords.heading() {
        sample = sample.with_heading(heading);
    }
    sample
}

fn to_device_error(err: &GeolocationPositionError) -> DeviceError {
    DeviceError::new(err.code(), err.message())
}

#[async_trait::async_trait(?Send)]
impl PositioningDevice for BrowserGeolocation {
    fn watch_position(&self, options: &PositionOptions) -> DeviceWatch {
        let (tx, rx) = mpsc::unbounded::<Reading>();

        let geolocation = match geolocation() {
            Ok(geolocation) => geolocation,
            Err(err) => {
                let _ = tx.unbounded_send(Err(err));
                return DeviceWatch {
                    id: WatchId(-1),
                    readings: rx.boxed_local(),
                };
            }
        };

        let positions = tx.clone();
        let on_position = Closure::<dyn FnMut(GeolocationPosition)>::new(move |position: GeolocationPosition| {
            let _ = positions.unbounded_send(Ok(to_sample(&position)));
        });
        let on_error = Closure::<dyn FnMut(GeolocationPositionError)>::new(move |err: GeolocationPositionError| {
            let _ = tx.unbounded_send(Err(to_device_error(&err)));
        });

        let id = match geolocation.watch_position_with_error_callback_and_options(
            on_position.as_ref().unchecked_ref(),
            Some(on_error.as_ref().unchecked_ref()),
            &browser_options(options),
        ) {
            Ok(id) => WatchId(id),
            Err(_) => {
                warn!("watchPosition was rejected");
                let (tx, rx) = mpsc::unbounded::<Reading>();
                let _ = tx.unbounded_send(Err(DeviceError::new(DeviceError::POSITION_UNAVAILABLE, "watch rejected")));
                return DeviceWatch {
                    id: WatchId(-1),
                    readings: rx.boxed_local(),
                };
            }
        };

        self.watches.borrow_mut().insert(
            id,
            Callbacks {
                _on_position: on_position,
                _on_error: on_error,
            },
        );

        DeviceWatch {
            id,
            readings: rx.boxed_local(),
        }
    }

    fn clear_watch(&self, id: WatchId) {
        if let Ok(geolocation) = geolocation() {
            geolocation.clear_watch(id.0);
        }
        // Dropping the callbacks closes the stream
        self.watches.borrow_mut().remove(&id);
    }

    async fn current_position(&self, options: &PositionOptions) -> Result<LocationSample, DeviceError> {
        let geolocation = geolocation()?;
        let (tx, rx) = oneshot::channel::<Reading>();
        let tx = Rc::new(RefCell::new(Some(tx)));

        let on_position = {
            let tx = tx.clone();
            Closure::<dyn FnMut(GeolocationPosition)>::new(move |position: GeolocationPosition| {
                if let Some(tx) = tx.borrow_mut().take() {
                    let _ = tx.send(Ok(to_sample(&position)));
                }
            })
        };
        let on_error = Closure::<dyn FnMut(GeolocationPositionError)>::new(move |err: GeolocationPositionError| {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(Err(to_device_error(&err)));
            }
        });

        geolocation
            .get_current_position_with_error_callback_and_options(
                on_position.as_ref().unchecked_ref(),
                Some(on_error.as_ref().unchecked_ref()),
                &browser_options(options),
            )
            .map_err(|_| DeviceError::new(DeviceError::POSITION_UNAVAILABLE, "getCurrentPosition was rejected"))?;

        // The callbacks must stay alive until one of them has fired
        let reading = rx.await;
        drop((on_position, on_error));
        reading.unwrap_or_else(|_| Err(DeviceError::new(DeviceError::POSITION_UNAVAILABLE, "no answer")))
    }
}
