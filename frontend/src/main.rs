use components::tracker_view::TrackerView;
use fleet_tracker_lib::Configuration;
use gloo_console::info;
use gloo_utils::window;
use yew::prelude::*;
use yew_router::{BrowserRouter, Routable, Switch};

mod components;
mod geolocation;
mod leaflet_surface;

#[derive(Clone, Debug, PartialEq, Routable)]
enum Route {
    #[at("/")]
    Default,
    #[at("/trip/:id")]
    Trip { id: i64 },
    #[not_found]
    #[at("/404")]
    Invalid,
}

/// Telemetry goes to the serving backend, routing to the public OSRM server.
fn page_configuration() -> Configuration {
    let mut config = Configuration::default();
    if let Ok(origin) = window().location().origin() {
        config.backend_url = Some(format!("{}/api", origin));
    }
    config
}

/// A tracker view only reads its props when mounted, so each trip gets its
/// own key and switching trips replaces the running session.
fn view_key(trip_id: Option<i64>) -> String {
    match trip_id {
        Some(id) => format!("trip-{id}"),
        None => "untracked".to_string(),
    }
}

#[function_component]
fn Model() -> Html {
    let config = use_memo((), |_| page_configuration());

    html! {
        <BrowserRouter>
            <Switch<Route> render={move |route| match route {
                Route::Default => html! { <TrackerView key={view_key(None)} config={(*config).clone()} /> },
                Route::Trip { id } => {
                    info!(format!("Tracking trip {}", id));
                    html! { <TrackerView key={view_key(Some(id))} config={(*config).clone()} trip_id={Some(id)} /> }
                }
                Route::Invalid => html! { <p>{"Unknown page"}</p> },
            }} />
        </BrowserRouter>
    }
}

fn main() {
    yew::Renderer::<Model>::new().render();
}
