mod support;

use std::{cell::RefCell, rc::Rc};

use fleet_tracker_lib::{
    driver::{drive, SessionCommand},
    services::{LocationWatcher, PositionOptions, TelemetryReporter},
    Coordinate, SessionOptions, SessionState, SessionView, TripTrackingSession,
};
use futures::channel::mpsc;
use support::{sample, ManualClock, RecordingSink, RecordingSurface, ScriptedDevice, StubRoutes, SurfaceLog, t0};

type Session = TripTrackingSession<RecordingSurface, ScriptedDevice, StubRoutes>;

async fn open(device: &ScriptedDevice, map: &SurfaceLog) -> Session {
    let (reporter, _worker) = TelemetryReporter::new(RecordingSink::default(), 16);

    Session::open(
        SessionOptions::default(),
        map,
        LocationWatcher::new(device.clone(), PositionOptions::default()),
        StubRoutes::none(),
        reporter,
    )
    .await
    .with_clock(ManualClock::at(t0()))
}

#[tokio::test]
async fn test_drive_full_trip() {
    let device = ScriptedDevice::with_fix(sample(6.837, 80.9999, 0));
    let map = SurfaceLog::default();
    let session = open(&device, &map).await;

    let (commands, rx) = mpsc::unbounded();
    commands.unbounded_send(SessionCommand::SetDestination(Coordinate::new(6.98, 81.05))).unwrap();
    commands.unbounded_send(SessionCommand::Start).unwrap();

    let views: Rc<RefCell<Vec<SessionView>>> = Rc::default();
    let seen = views.clone();
    let feed = device.clone();
    let mut fed = false;
    let mut stopping = false;

    let trip = drive(session, rx, move |view: SessionView| {
        match view.state {
            SessionState::Tracking if !fed => {
                feed.push(sample(6.837, 80.9999, 1));
                feed.push(sample(6.840, 80.9999, 20));
                fed = true;
            }
            SessionState::Tracking if view.stats.total_distance_traveled_meters > 0.0 && !stopping => {
                commands.unbounded_send(SessionCommand::Stop).unwrap();
                stopping = true;
            }
            SessionState::Completed => commands.unbounded_send(SessionCommand::Close).unwrap(),
            _ => {}
        }
        seen.borrow_mut().push(view);
    })
    .await;

    assert_eq!(trip.state, SessionState::Completed);
    assert!(trip.stats.total_distance_traveled_meters > 300.0);
    assert_eq!(device.active_watches(), 0);

    let states: Vec<_> = views.borrow().iter().map(|view| view.state).collect();
    assert_eq!(
        states,
        vec![
            SessionState::Idle,
            SessionState::AwaitingDestination,
            SessionState::Tracking,
            SessionState::Tracking,
            SessionState::Tracking,
            SessionState::Completed,
        ]
    );
}

#[tokio::test]
async fn test_rejected_commands_keep_the_loop_running() {
    let device = ScriptedDevice::with_fix(sample(6.837, 80.9999, 0));
    let map = SurfaceLog::default();
    let session = open(&device, &map).await;

    let commands = futures::stream::iter(vec![
        SessionCommand::Stop,
        SessionCommand::Start,
        SessionCommand::SetDestination(Coordinate::new(6.98, 81.05)),
    ]);

    let mut last = None;
    let trip = drive(session, commands, |view| last = Some(view)).await;

    assert_eq!(trip.state, SessionState::AwaitingDestination);
    assert!(last.unwrap().can_start());
    assert_eq!(map.count(|op| *op == support::SurfaceOp::Destroy), 1);
}

#[tokio::test]
async fn test_fatal_error_is_shown_until_dismissed() {
    let device = ScriptedDevice::with_fix(sample(6.837, 80.9999, 0));
    let map = SurfaceLog::default();
    let session = open(&device, &map).await;

    let (commands, rx) = mpsc::unbounded();
    commands.unbounded_send(SessionCommand::SetDestination(Coordinate::new(6.98, 81.05))).unwrap();
    commands.unbounded_send(SessionCommand::Start).unwrap();

    let feed = device.clone();
    let mut views = Vec::new();
    let trip = drive(session, rx, |view: SessionView| {
        match (view.state, view.error.is_some()) {
            (SessionState::Tracking, _) => feed.fail(1),
            (SessionState::Failed, true) => commands.unbounded_send(SessionCommand::DismissError).unwrap(),
            (SessionState::Failed, false) => commands.unbounded_send(SessionCommand::Close).unwrap(),
            _ => {}
        }
        views.push(view);
    })
    .await;

    assert_eq!(trip.state, SessionState::Failed);
    let failed: Vec<_> = views.iter().filter(|view| view.state == SessionState::Failed).collect();
    assert_eq!(failed.len(), 2);
    assert!(failed[0].error.as_ref().unwrap().fatal);
    assert!(failed[1].error.is_none());
}
