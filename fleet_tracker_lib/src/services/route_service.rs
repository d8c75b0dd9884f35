use serde::Deserialize;

use crate::{
    coordinate::Coordinate,
    error::RouteError,
    route::{Route, TravelMode},
};

#[async_trait::async_trait(?Send)]
pub trait RouteProvider {
    /// `Ok(None)` when the service knows no path between the two points.
    async fn calculate_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Option<Route>, RouteError>;
}

/// Client for an OSRM compatible `route/v1` endpoint.
#[derive(Debug, Clone)]
pub struct OsrmRouteService {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouteService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The service expects `lng,lat` pairs.
    pub fn request_url(&self, origin: Coordinate, destination: Coordinate, mode: TravelMode) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url,
            mode.as_str(),
            origin.lng,
            origin.lat,
            destination.lng,
            destination.lat,
        )
    }
}

#[async_trait::async_trait(?Send)]
impl RouteProvider for OsrmRouteService {
    async fn calculate_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<Option<Route>, RouteError> {
        let url = self.request_url(origin, destination, mode);
        tracing::debug!("Requesting route {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // "NoRoute" may come with an error status, so look at the body first
        match serde_json::from_str::<OsrmResponse>(&body) {
            Ok(parsed) if parsed.is_no_route() => {
                tracing::info!("No route between {:?} and {:?}", origin, destination);
                Ok(None)
            }
            Ok(_) if !status.is_success() => Err(RouteError::Status(status.as_u16())),
            Ok(parsed) => Ok(parsed.into_route()),
            Err(_) if !status.is_success() => Err(RouteError::Status(status.as_u16())),
            Err(err) => Err(RouteError::Malformed(err)),
        }
    }
}

/// Parses a routing response body. The first candidate is the preferred route.
pub fn parse_route_response(body: &str) -> Result<Option<Route>, RouteError> {
    let parsed: OsrmResponse = serde_json::from_str(body)?;
    Ok(parsed.into_route())
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

impl OsrmResponse {
    fn is_no_route(&self) -> bool {
        matches!(self.code.as_deref(), Some("NoRoute") | Some("NoSegment"))
    }

    fn into_route(self) -> Option<Route> {
        let route = self.routes.into_iter().next()?;
        let geometry = route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lng, lat]| Coordinate::new(lat, lng))
            .collect();

        Some(Route::new(geometry, route.distance, route.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_axis_order() {
        let body = r#"{
            "code": "Ok",
            "routes": [{
                "distance": 24300,
                "duration": 2100,
                "geometry": { "type": "LineString", "coordinates": [[80.9999, 6.837], [81.02, 6.9], [81.057, 6.981]] }
            }]
        }"#;

        let route = parse_route_response(body).unwrap().unwrap();
        assert_eq!(route.distance_meters, 24300.0);
        assert_eq!(route.duration_seconds, 2100.0);
        assert_eq!(route.geometry.first(), Some(&Coordinate::new(6.837, 80.9999)));
        assert_eq!(route.geometry.last(), Some(&Coordinate::new(6.981, 81.057)));
    }

    #[test]
    fn test_empty_routes_is_no_route() {
        assert!(parse_route_response(r#"{"code": "Ok", "routes": []}"#).unwrap().is_none());
        assert!(parse_route_response(r#"{"code": "NoRoute"}"#).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(parse_route_response("<html>"), Err(RouteError::Malformed(_))));
    }

    #[test]
    fn test_request_url_uses_lng_lat() {
        let service = OsrmRouteService::new("http://router/");
        let url = service.request_url(Coordinate::new(6.837, 80.9999), Coordinate::new(6.981, 81.057), TravelMode::Driving);
        assert_eq!(url, "http://router/route/v1/driving/80.9999,6.837;81.057,6.981?overview=full&geometries=geojson");
    }
}
