use fleet_tracker_lib::{
    driver::{drive, SessionCommand},
    services::{HttpTelemetrySink, LocationWatcher, LoggingSink, OsrmRouteService, TelemetryReporter, TelemetrySink},
    Configuration, Coordinate, SessionOptions, SessionState, SessionView, TripTrackingSession,
};
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use gloo_console::{error, info};
use gloo_utils::{document, window};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlElement, HtmlInputElement, Node};
use yew::prelude::*;

use crate::{geolocation::BrowserGeolocation, leaflet_surface::LeafletSurface};

const TOKEN_KEY: &str = "api_token";

pub enum Msg {
    View(SessionView),
    DestinationInput(String),
    Send(SessionCommand),
}

#[derive(PartialEq, Properties, Clone)]
pub struct Props {
    pub config: Configuration,
    #[prop_or_default]
    pub trip_id: Option<i64>,
}

/// Map plus trip controls for one tracking session.
pub struct TrackerView {
    container: HtmlElement,
    commands: UnboundedSender<SessionCommand>,
    pending: Option<UnboundedReceiver<SessionCommand>>,
    view: Option<SessionView>,
    destination_input: String,
}

impl TrackerView {
    fn render_map(&self) -> Html {
        let node: &Node = &self.container.clone().into();
        Html::VRef(node.clone())
    }

    fn parsed_destination(&self) -> Option<Coordinate> {
        let (lat, lng) = self.destination_input.split_once(',')?;
        let coordinate = Coordinate::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?);
        coordinate.is_valid().then_some(coordinate)
    }
}

impl Component for TrackerView {
    type Message = Msg;
    type Properties = Props;

    fn create(_ctx: &Context<Self>) -> Self {
        let container: Element = document().create_element("div").unwrap();
        let container: HtmlElement = container.dyn_into().unwrap();
        container.set_class_name("map");
        container.set_id("tracker-map");

        let (commands, pending) = mpsc::unbounded();

        Self {
            container,
            commands,
            pending: Some(pending),
            view: None,
            destination_input: String::new(),
        }
    }

    fn rendered(&mut self, ctx: &Context<Self>, first_render: bool) {
        // The map needs its container attached to the page
        if !first_render {
            return;
        }
        let Some(commands) = self.pending.take() else {
            return;
        };

        let config = ctx.props().config.clone();
        let mut options = SessionOptions::from(&config);
        options.trip_id = ctx.props().trip_id;
        let container = self.container.clone();
        let on_view = ctx.link().callback(Msg::View);

        match config.backend_url.clone() {
            Some(url) => {
                let sink = HttpTelemetrySink::new(url)
                    .with_timeout(config.telemetry_timeout())
                    .with_credentials(|| {
                        window()
                            .local_storage()
                            .ok()
                            .flatten()
                            .and_then(|storage| storage.get_item(TOKEN_KEY).ok().flatten())
                    });
                spawn_local(run_session(config, options, container, commands, on_view, sink));
            }
            None => spawn_local(run_session(config, options, container, commands, on_view, LoggingSink)),
        }
    }

    fn update(&mut self, _ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::View(view) => {
                self.view = Some(view);
                true
            }
            Msg::DestinationInput(text) => {
                self.destination_input = text;
                true
            }
            Msg::Send(command) => {
                if self.commands.unbounded_send(command).is_err() {
                    error!("Tracking session is gone");
                }
                false
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let link = ctx.link();
        let view = self.view.as_ref();

        let on_input = link.callback(|e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            Msg::DestinationInput(input.value())
        });
        let destination = self.parsed_destination();
        let on_set = link.batch_callback(move |_: MouseEvent| {
            destination.map(|at| Msg::Send(SessionCommand::SetDestination(at)))
        });
        let on_start = link.callback(|_: MouseEvent| Msg::Send(SessionCommand::Start));
        let on_stop = link.callback(|_: MouseEvent| Msg::Send(SessionCommand::Stop));
        let on_dismiss = link.callback(|_: MouseEvent| Msg::Send(SessionCommand::DismissError));

        let can_set = view.is_some_and(SessionView::can_set_destination) && destination.is_some();
        let can_start = view.is_some_and(SessionView::can_start);
        let can_stop = view.is_some_and(SessionView::can_stop);

        html! {
            <div class="tracker">
                <div class="map">
                    {self.render_map()}
                </div>
                <div class="panel">
                    <div class="state">{ view.map(|v| state_label(v.state)).unwrap_or("Locating...") }</div>
                    <div class="controls">
                        <input placeholder="lat, lng" value={self.destination_input.clone()} oninput={on_input} />
                        <button onclick={on_set} disabled={!can_set}>{"Set destination"}</button>
                        <button onclick={on_start} disabled={!can_start}>{"Start trip"}</button>
                        <button onclick={on_stop} disabled={!can_stop}>{"Stop trip"}</button>
                    </div>
                    if let Some(summary) = view.and_then(|v| v.route_summary.as_ref()) {
                        <div class="route">{format!("Route: {} / {}", summary.distance, summary.duration)}</div>
                    }
                    if let Some(view) = view {
                        <table class="stats">
                            <tr><td>{"Traveled"}</td><td>{format!("{:.2} km", view.stats.total_distance_traveled_meters / 1000.0)}</td></tr>
                            <tr><td>{"Remaining"}</td><td>{format!("{:.2} km", view.stats.distance_to_destination_meters / 1000.0)}</td></tr>
                            <tr><td>{"Speed"}</td><td>{format!("{:.0} km/h", view.stats.current_speed_kph)}</td></tr>
                            <tr><td>{"Elapsed"}</td><td>{format_elapsed(view.stats.elapsed_seconds)}</td></tr>
                        </table>
                        if view.arrived && view.is_tracking() {
                            <div class="arrived">{"You have arrived"}</div>
                        }
                    }
                    if let Some(err) = view.and_then(|v| v.error.as_ref()) {
                        <div class={classes!("error", err.fatal.then_some("fatal"))}>
                            {&err.message}
                            <button onclick={on_dismiss}>{"Dismiss"}</button>
                        </div>
                    }
                </div>
            </div>
        }
    }
}

async fn run_session<S: TelemetrySink + 'static>(
    config: Configuration,
    options: SessionOptions,
    container: HtmlElement,
    commands: UnboundedReceiver<SessionCommand>,
    on_view: Callback<SessionView>,
    sink: S,
) {
    let watcher = LocationWatcher::new(BrowserGeolocation::default(), config.position_options());
    let routes = OsrmRouteService::new(config.routing_url.as_str());
    let (reporter, worker) = TelemetryReporter::new(sink, config.telemetry_queue);

    let session = TripTrackingSession::<LeafletSurface, _, _>::open(options, &container, watcher, routes, reporter).await;
    let (trip, ()) = futures::join!(drive(session, commands, move |view| on_view.emit(view)), worker.run());
    info!(format!("Trip ended {:?}", trip.state));
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "Choose a destination",
        SessionState::AwaitingDestination => "Ready to start",
        SessionState::Tracking => "Tracking",
        SessionState::Completed => "Trip completed",
        SessionState::Failed => "Tracking failed",
    }
}

fn format_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    format!("{:02}h {:02}m {:02}s", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}
