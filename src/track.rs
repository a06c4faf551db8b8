/// GPX track decoding for the `gpx` column.
///
/// A `Route` is the GPX document viewed as ordered segments of points: every
/// track segment in document order, followed by the point list of every GPX
/// `<rte>`. Metadata is carried along untouched so `serialize` can write the
/// document back into the record.
use gpx::{read, write, Gpx, GpxVersion, Waypoint};

use crate::error::TrackParseError;

#[derive(Debug, Clone)]
pub struct Route {
    gpx: Gpx,
}

impl Route {
    pub fn from_gpx(gpx: Gpx) -> Self {
        Route { gpx }
    }

    pub fn segments(&self) -> impl Iterator<Item = &[Waypoint]> {
        let tracks = self
            .gpx
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter().map(|s| s.points.as_slice()));
        let routes = self.gpx.routes.iter().map(|r| r.points.as_slice());
        tracks.chain(routes)
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut Vec<Waypoint>> {
        let tracks = self
            .gpx
            .tracks
            .iter_mut()
            .flat_map(|track| track.segments.iter_mut().map(|s| &mut s.points));
        let routes = self.gpx.routes.iter_mut().map(|r| &mut r.points);
        tracks.chain(routes)
    }

    /// Track segments only; elevation statistics are computed over these.
    pub fn track_segments(&self) -> impl Iterator<Item = &[Waypoint]> {
        self.gpx
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter().map(|s| s.points.as_slice()))
    }

    pub fn points(&self) -> impl Iterator<Item = &Waypoint> {
        self.segments().flat_map(|segment| segment.iter())
    }

    pub fn point_count(&self) -> usize {
        self.segments().map(|segment| segment.len()).sum()
    }
}

pub fn parse(raw: &str) -> Result<Route, TrackParseError> {
    let gpx = read(raw.as_bytes())?;
    Ok(Route { gpx })
}

/// Writes the route back as GPX 1.1, whatever version it was read from.
pub fn serialize(route: &Route) -> Result<String, TrackParseError> {
    let mut gpx = route.gpx.clone();
    gpx.version = GpxVersion::Gpx11;

    let mut buffer = Vec::new();
    write(&gpx, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn has_all_elevations(route: &Route) -> bool {
    route.points().all(|point| point.elevation.is_some())
}
