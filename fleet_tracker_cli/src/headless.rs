use fleet_tracker_lib::{Bounds, Coordinate, MapSurface, RenderError};

/// Map surface for terminals: every drawing operation becomes a log line.
pub struct LogSurface {
    name: String,
    next_id: u32,
}

impl LogSurface {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl MapSurface for LogSurface {
    type Container = str;
    type Marker = u32;
    type Line = u32;

    fn create(container: &str) -> Result<Self, RenderError> {
        if container.is_empty() {
            return Err(RenderError::MissingContainer(container.to_string()));
        }
        tracing::debug!("[{}] created", container);
        Ok(Self {
            name: container.to_string(),
            next_id: 0,
        })
    }

    fn add_marker(&mut self, at: Coordinate, label: Option<&str>) -> u32 {
        let id = self.next();
        tracing::debug!("[{}] marker {} at {} {}", self.name, id, at.to_address(), label.unwrap_or(""));
        id
    }

    fn move_marker(&mut self, marker: &u32, to: Coordinate) {
        tracing::trace!("[{}] marker {} -> {}", self.name, marker, to.to_address());
    }

    fn set_marker_label(&mut self, marker: &u32, label: &str) {
        tracing::debug!("[{}] marker {} labeled {}", self.name, marker, label);
    }

    fn add_line(&mut self, path: &[Coordinate]) -> u32 {
        let id = self.next();
        tracing::debug!("[{}] line {} with {} points", self.name, id, path.len());
        id
    }

    fn remove_line(&mut self, line: u32) {
        tracing::debug!("[{}] line {} removed", self.name, line);
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        tracing::debug!(
            "[{}] view {} .. {}",
            self.name,
            bounds.south_west.to_address(),
            bounds.north_east.to_address()
        );
    }

    fn destroy(&mut self) {
        tracing::debug!("[{}] destroyed", self.name);
    }
}
