use std::{fs::File, io::{BufReader, Read}, path::Path};

use anyhow::{bail, Context};
use fleet_tracker_lib::Coordinate;

/// Reads every track point of a GPX file, in file order.
pub fn read_track(path: &Path) -> anyhow::Result<Vec<Coordinate>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    parse_track(BufReader::new(file)).with_context(|| format!("Failed to read track from {}", path.display()))
}

pub fn parse_track(reader: impl Read) -> anyhow::Result<Vec<Coordinate>> {
    let gpx = gpx::read(reader)?;

    let mut track = Vec::new();
    for segment in gpx.tracks.into_iter().flat_map(|track| track.segments) {
        for point in segment.points {
            let point = point.point();
            track.push(Coordinate::new(point.y(), point.x()));
        }
    }

    if track.is_empty() {
        bail!("no track points");
    }
    Ok(track)
}
