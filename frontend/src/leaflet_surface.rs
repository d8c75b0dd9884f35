use fleet_tracker_lib::{Bounds, Coordinate, MapSurface, RenderError};
use gloo_console::info;
use leaflet::{
    LatLng, LatLngBounds, Map, MapOptions, Marker, Polyline, PolylineOptions, TileLayer, TileLayerOptions, Tooltip,
    TooltipOptions,
};
use web_sys::{js_sys::Array, HtmlElement};

const ROUTE_COLOR: &str = "rgb(0, 96, 255)";
const INITIAL_ZOOM: f64 = 13.0;

/// Leaflet map living in a DOM element.
pub struct LeafletSurface {
    map: Map,
    centered: bool,
}

fn lat_lng(at: Coordinate) -> LatLng {
    LatLng::new(at.lat, at.lng)
}

fn tooltip(label: &str) -> Tooltip {
    let opts = TooltipOptions::default();
    opts.set_permanent(true);
    opts.set_direction("top".into());
    let tooltip = Tooltip::new(&opts, None);
    tooltip.set_content(&label.into());
    tooltip
}

impl MapSurface for LeafletSurface {
    type Container = HtmlElement;
    type Marker = Marker;
    type Line = Polyline;

    fn create(container: &HtmlElement) -> Result<Self, RenderError> {
        if !container.is_connected() {
            return Err(RenderError::MissingContainer(container.id()));
        }

        let map = Map::new_with_element(container, &MapOptions::default());
        map.set_max_zoom(19.);

        let opts = TileLayerOptions::new();
        opts.set_update_when_idle(true);
        TileLayer::new_options("https://tile.openstreetmap.org/{z}/{x}/{y}.png", &opts).add_to(&map);

        Ok(Self { map, centered: false })
    }

    fn add_marker(&mut self, at: Coordinate, label: Option<&str>) -> Marker {
        let marker = Marker::new(&lat_lng(at));
        if let Some(label) = label {
            marker.bind_tooltip(&tooltip(label));
        }
        marker.add_to(&self.map);

        if !self.centered {
            self.map.set_view(&lat_lng(at), INITIAL_ZOOM);
            self.centered = true;
        }
        marker
    }

    fn move_marker(&mut self, marker: &Marker, to: Coordinate) {
        marker.set_lat_lng(&lat_lng(to));
    }

    fn set_marker_label(&mut self, marker: &Marker, label: &str) {
        // Binding replaces the previous tooltip
        marker.bind_tooltip(&tooltip(label));
    }

    fn add_line(&mut self, path: &[Coordinate]) -> Polyline {
        let opts = PolylineOptions::new();
        opts.set_color(ROUTE_COLOR.into());
        opts.set_smooth_factor(1.5);

        let points = path.iter().map(|at| lat_lng(*at));
        let line = Polyline::new_with_options(&Array::from_iter(points), &opts);
        line.add_to(&self.map);
        info!(format!("Route with {} points", path.len()));
        line
    }

    fn remove_line(&mut self, line: Polyline) {
        line.remove();
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.map.invalidate_size(false);
        self.map
            .fit_bounds(&LatLngBounds::new(&lat_lng(bounds.south_west), &lat_lng(bounds.north_east)));
        self.centered = true;
    }

    fn destroy(&mut self) {
        self.map.remove();
    }
}
