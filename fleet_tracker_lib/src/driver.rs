use futures::{future::Either, pin_mut, Stream, StreamExt};

use crate::{
    coordinate::Coordinate,
    renderer::MapSurface,
    services::{PositioningDevice, RouteProvider},
    tracking_session::{SessionView, TripTrackingSession},
    trip_session::TripSession,
};

/// User actions fed into [`drive`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    SetDestination(Coordinate),
    Start,
    Stop,
    DismissError,
    Close,
}

enum Event {
    Command(Option<SessionCommand>),
    Sample,
}

/// Runs a session until `Close` arrives or the command stream ends.
///
/// Commands and position samples are handled strictly one after the other,
/// and `observer` sees a fresh view after each of them. Returns the final
/// trip record; the session itself is torn down on return.
pub async fn drive<S, D, R, C, F>(
    mut session: TripTrackingSession<S, D, R>,
    mut commands: C,
    mut observer: F,
) -> TripSession
where
    S: MapSurface,
    D: PositioningDevice,
    R: RouteProvider,
    C: Stream<Item = SessionCommand> + Unpin,
    F: FnMut(SessionView),
{
    observer(session.view());

    loop {
        let event = if session.is_watching() {
            let next_sample = session.process_next();
            pin_mut!(next_sample);
            let event = match futures::future::select(commands.next(), next_sample).await {
                Either::Left((command, _)) => Event::Command(command),
                Either::Right(_) => Event::Sample,
            };
            event
        } else {
            Event::Command(commands.next().await)
        };

        match event {
            Event::Sample => {}
            Event::Command(None) | Event::Command(Some(SessionCommand::Close)) => break,
            Event::Command(Some(command)) => {
                let result = match command {
                    SessionCommand::SetDestination(destination) => session.set_destination(destination).await,
                    SessionCommand::Start => session.start(),
                    SessionCommand::Stop => session.stop(),
                    SessionCommand::DismissError => {
                        session.dismiss_error();
                        Ok(())
                    }
                    SessionCommand::Close => Ok(()),
                };
                if let Err(err) = result {
                    tracing::warn!("{:?} rejected: {}", command, err);
                }
            }
        }

        observer(session.view());
    }

    tracing::info!("Session closed in state {:?}", session.state());
    session.trip().clone()
}
