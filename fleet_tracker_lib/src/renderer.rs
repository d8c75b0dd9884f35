use geo::BoundingRect;
use geo_types::{Coord, LineString};

use crate::{coordinate::Coordinate, error::RenderError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl Bounds {
    /// Smallest box around the path, `None` for an empty path.
    pub fn around(path: &[Coordinate]) -> Option<Self> {
        let line: LineString = path.iter().map(|c| Coord { x: c.lng, y: c.lat }).collect();
        let rect = line.bounding_rect()?;
        Some(Self {
            south_west: Coordinate::new(rect.min().y, rect.min().x),
            north_east: Coordinate::new(rect.max().y, rect.max().x),
        })
    }
}

/// A concrete map backend (leaflet in the browser, a log in the CLI).
pub trait MapSurface: Sized {
    type Container: ?Sized;
    type Marker;
    type Line;

    fn create(container: &Self::Container) -> Result<Self, RenderError>;

    fn add_marker(&mut self, at: Coordinate, label: Option<&str>) -> Self::Marker;

    fn move_marker(&mut self, marker: &Self::Marker, to: Coordinate);

    fn set_marker_label(&mut self, marker: &Self::Marker, label: &str);

    fn add_line(&mut self, path: &[Coordinate]) -> Self::Line;

    fn remove_line(&mut self, line: Self::Line);

    fn fit_bounds(&mut self, bounds: Bounds);

    /// Releases the map and everything drawn on it.
    fn destroy(&mut self);
}

/// Owns one map with a current position marker, a destination marker and
/// a route line. Holds no trip logic.
pub struct GeoRenderer<S: MapSurface> {
    surface: Option<S>,
    current: Option<S::Marker>,
    destination: Option<S::Marker>,
    route: Option<S::Line>,
}

impl<S: MapSurface> Default for GeoRenderer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MapSurface> GeoRenderer<S> {
    pub fn new() -> Self {
        Self {
            surface: None,
            current: None,
            destination: None,
            route: None,
        }
    }

    /// Creates the map inside `container`. A renderer holds at most one map,
    /// so an initialized renderer must be disposed first.
    pub fn initialize(&mut self, container: &S::Container) -> Result<(), RenderError> {
        if self.surface.is_some() {
            return Err(RenderError::AlreadyInitialized);
        }
        self.surface = Some(S::create(container)?);
        tracing::debug!("Map initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn set_current_position(&mut self, position: Coordinate) {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("Map not initialized, position not drawn");
            return;
        };

        match &self.current {
            Some(marker) => surface.move_marker(marker, position),
            None => self.current = Some(surface.add_marker(position, None)),
        }
    }

    pub fn set_destination(&mut self, destination: Coordinate, label: &str) {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("Map not initialized, destination not drawn");
            return;
        };

        match &self.destination {
            Some(marker) => {
                surface.move_marker(marker, destination);
                surface.set_marker_label(marker, label);
            }
            None => self.destination = Some(surface.add_marker(destination, Some(label))),
        }
    }

    /// Replaces the drawn route and fits the view to it.
    pub fn draw_route(&mut self, geometry: &[Coordinate]) {
        let Some(surface) = self.surface.as_mut() else {
            tracing::debug!("Map not initialized, route not drawn");
            return;
        };

        if let Some(old) = self.route.take() {
            surface.remove_line(old);
        }

        if geometry.is_empty() {
            return;
        }

        self.route = Some(surface.add_line(geometry));
        if let Some(bounds) = Bounds::around(geometry) {
            surface.fit_bounds(bounds);
        }
        tracing::debug!("Route drawn with {} points", geometry.len());
    }

    pub fn clear_route(&mut self) {
        if let (Some(surface), Some(line)) = (self.surface.as_mut(), self.route.take()) {
            surface.remove_line(line);
        }
    }

    /// Releases the map. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.current = None;
        self.destination = None;
        if let Some(mut surface) = self.surface.take() {
            if let Some(line) = self.route.take() {
                surface.remove_line(line);
            }
            surface.destroy();
            tracing::debug!("Map disposed");
        }
    }
}

impl<S: MapSurface> Drop for GeoRenderer<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_around_path() {
        let bounds = Bounds::around(&[
            Coordinate::new(6.98, 81.05),
            Coordinate::new(6.83, 81.10),
            Coordinate::new(6.90, 80.99),
        ])
        .unwrap();

        assert_eq!(bounds.south_west, Coordinate::new(6.83, 80.99));
        assert_eq!(bounds.north_east, Coordinate::new(6.98, 81.10));
    }

    #[test]
    fn test_no_bounds_for_empty_path() {
        assert!(Bounds::around(&[]).is_none());
    }
}
