use crate::coordinator::MapSurface;
use crate::dlog;
use crate::error::{Result, WorkoutError};
use crate::types::{Coords, MarkerHandle};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Extra margin added on each side when fitting the view, as a fraction of
/// the span.
const FIT_PADDING: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub at: Coords,
    pub name: String,
}

/// Rectangle shown on the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: Coords,
    pub north_east: Coords,
}

impl Bounds {
    fn around<'a>(points: impl IntoIterator<Item = &'a Coords>) -> Option<Self> {
        let mut it = points.into_iter();
        let first = *it.next()?;
        let (mut sw, mut ne) = (first, first);
        for c in it {
            sw.lat = sw.lat.min(c.lat);
            sw.lng = sw.lng.min(c.lng);
            ne.lat = ne.lat.max(c.lat);
            ne.lng = ne.lng.max(c.lng);
        }
        Some(Self {
            south_west: sw,
            north_east: ne,
        })
    }

    #[must_use]
    fn pad(self, ratio: f64) -> Self {
        let dlat = (self.north_east.lat - self.south_west.lat) * ratio;
        let dlng = (self.north_east.lng - self.south_west.lng) * ratio;
        Self {
            south_west: Coords::new(self.south_west.lat - dlat, self.south_west.lng - dlng),
            north_east: Coords::new(self.north_east.lat + dlat, self.north_east.lng + dlng),
        }
    }
}

/// Map surface that keeps markers as GPX waypoints, for terminals with no
/// map widget. The current layer can be written out as a `.gpx` file.
#[derive(Debug, Default)]
pub struct WaypointMap {
    next: u64,
    waypoints: BTreeMap<MarkerHandle, Waypoint>,
    center: Option<Coords>,
    view: Option<Bounds>,
}

impl WaypointMap {
    pub fn new(center: Option<Coords>) -> Self {
        Self {
            center,
            ..Self::default()
        }
    }

    pub fn waypoints(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.values()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub const fn center(&self) -> Option<Coords> {
        self.center
    }

    pub const fn view(&self) -> Option<Bounds> {
        self.view
    }

    pub fn write_gpx_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| WorkoutError::Export(format!("creating {}: {e}", path.display())))?;
        let mut out = BufWriter::new(file);
        self.write_gpx(&mut out)?;
        out.flush()
            .map_err(|e| WorkoutError::Export(format!("writing {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), waypoints = self.len(), "gpx written");
        Ok(())
    }

    /// GPX 1.1 document with one `<wpt>` per marker.
    pub fn write_gpx<W: Write>(&self, out: W) -> Result<()> {
        let mut xml = Writer::new_with_indent(out, b' ', 2);

        emit(&mut xml, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        emit(
            &mut xml,
            Event::Start(BytesStart::new("gpx").with_attributes([
                ("version", "1.1"),
                ("creator", "mapty"),
                ("xmlns", "http://www.topografix.com/GPX/1/1"),
            ])),
        )?;

        if let Some(b) = self.view {
            let (minlat, minlon) = (b.south_west.lat.to_string(), b.south_west.lng.to_string());
            let (maxlat, maxlon) = (b.north_east.lat.to_string(), b.north_east.lng.to_string());
            emit(&mut xml, Event::Start(BytesStart::new("metadata")))?;
            emit(
                &mut xml,
                Event::Empty(BytesStart::new("bounds").with_attributes([
                    ("minlat", minlat.as_str()),
                    ("minlon", minlon.as_str()),
                    ("maxlat", maxlat.as_str()),
                    ("maxlon", maxlon.as_str()),
                ])),
            )?;
            emit(&mut xml, Event::End(BytesEnd::new("metadata")))?;
        }

        for wpt in self.waypoints.values() {
            let (lat, lon) = (wpt.at.lat.to_string(), wpt.at.lng.to_string());
            emit(
                &mut xml,
                Event::Start(
                    BytesStart::new("wpt")
                        .with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]),
                ),
            )?;
            emit(&mut xml, Event::Start(BytesStart::new("name")))?;
            emit(&mut xml, Event::Text(BytesText::new(&wpt.name)))?;
            emit(&mut xml, Event::End(BytesEnd::new("name")))?;
            emit(&mut xml, Event::End(BytesEnd::new("wpt")))?;
        }

        emit(&mut xml, Event::End(BytesEnd::new("gpx")))
    }
}

fn emit<W: Write>(xml: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    xml.write_event(event)
        .map_err(|e| WorkoutError::Export(format!("GPX write error: {e}")))
}

impl MapSurface for WaypointMap {
    fn add_marker(&mut self, at: Coords, popup: &str) -> MarkerHandle {
        self.next = self.next.saturating_add(1);
        let handle = MarkerHandle(self.next);
        self.waypoints.insert(
            handle,
            Waypoint {
                at,
                name: popup.to_string(),
            },
        );
        dlog!("marker add handle={} at={at}", handle.0);
        handle
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if self.waypoints.remove(&handle).is_none() {
            tracing::warn!(handle = handle.0, "removing unknown marker");
        }
    }

    fn fit_to_markers(&mut self, handles: &[MarkerHandle]) {
        let points = handles
            .iter()
            .filter_map(|h| self.waypoints.get(h))
            .map(|w| &w.at);
        self.view = Bounds::around(points).map(|b| b.pad(FIT_PADDING));
    }

    fn recenter(&mut self, at: Coords) {
        self.center = Some(at);
    }
}
