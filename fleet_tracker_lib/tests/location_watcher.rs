mod support;

use fleet_tracker_lib::{
    services::{LocationWatcher, PositionOptions},
    LocationError,
};
use futures::StreamExt;
use support::{sample, ScriptedDevice};

#[tokio::test]
async fn test_samples_flow_in_order() {
    let device = ScriptedDevice::default();
    let mut watcher = LocationWatcher::new(device.clone(), PositionOptions::default());
    let mut subscription = watcher.start_watching();

    device.push(sample(6.83, 80.99, 0));
    device.push(sample(6.84, 80.99, 1));

    assert_eq!(subscription.next().await.unwrap().unwrap().coordinate.lat, 6.83);
    assert_eq!(subscription.next().await.unwrap().unwrap().coordinate.lat, 6.84);
    assert!(watcher.is_watching());
}

#[tokio::test]
async fn test_errors_are_normalized_and_stream_continues() {
    let device = ScriptedDevice::default();
    let mut watcher = LocationWatcher::new(device.clone(), PositionOptions::default());
    let mut subscription = watcher.start_watching();

    device.fail(3);
    device.fail(2);
    device.fail(1);
    device.push(sample(6.83, 80.99, 0));

    assert_eq!(subscription.next().await.unwrap(), Err(LocationError::Timeout));
    assert_eq!(subscription.next().await.unwrap(), Err(LocationError::PositionUnavailable));
    assert_eq!(subscription.next().await.unwrap(), Err(LocationError::PermissionDenied));
    assert!(subscription.next().await.unwrap().is_ok());
}

#[tokio::test]
async fn test_stop_is_idempotent_and_ends_stream() {
    let device = ScriptedDevice::default();
    let mut watcher = LocationWatcher::new(device.clone(), PositionOptions::default());
    let mut subscription = watcher.start_watching();

    watcher.stop_watching(subscription.handle());
    watcher.stop_watching(subscription.handle());

    assert_eq!(device.cleared().len(), 1);
    assert!(!watcher.is_watching());
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn test_options_reach_the_device() {
    let options = PositionOptions {
        enable_high_accuracy: false,
        timeout_ms: 5_000,
        max_sample_age_ms: 1_000,
    };
    let device = ScriptedDevice::with_fix(sample(6.83, 80.99, 0));
    let watcher = LocationWatcher::new(device.clone(), options);

    let fix = watcher.current_position().await.unwrap();

    assert_eq!(fix.coordinate.lng, 80.99);
    assert_eq!(device.last_options(), Some(options));
}

#[tokio::test]
async fn test_one_shot_failure_is_mapped() {
    let watcher = LocationWatcher::new(ScriptedDevice::failing_fix(1), PositionOptions::default());

    assert_eq!(watcher.current_position().await, Err(LocationError::PermissionDenied));
}

#[test]
fn test_drop_clears_every_watch() {
    let device = ScriptedDevice::default();
    let mut watcher = LocationWatcher::new(device.clone(), PositionOptions::default());
    let _first = watcher.start_watching();
    let _second = watcher.start_watching();
    assert_eq!(device.active_watches(), 2);

    drop(watcher);

    assert_eq!(device.active_watches(), 0);
    assert_eq!(device.cleared().len(), 2);
}
