//! Latitude/longitude grids as GML line strings.
//!
//! The walker samples each gridline in ground coordinates, projects every
//! sample and splits the line wherever the projection is undefined or two
//! consecutive projected points are farther apart than the jump distance
//! (a wrap across the projection seam, say).

use cube_common::{CubeError, Result};
use projection::{GroundRange, MapProjection};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridLineKind {
    Latitude,
    Longitude,
}

impl GridLineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
        }
    }
}

/// One gridline, split into runs of projected (x, y) points.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub kind: GridLineKind,
    /// Latitude or longitude of the line in degrees.
    pub value: f64,
    pub segments: Vec<Vec<(f64, f64)>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOptions {
    pub lat_spacing: f64,
    pub lon_spacing: f64,
    /// Ground increment between samples along a line, in degrees.
    pub step: f64,
    /// Largest projected distance between consecutive points of one run.
    pub jump_distance: f64,
    /// Ground range to cover. Defaults to the projection's range.
    pub range: Option<GroundRange>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            lat_spacing: 10.0,
            lon_spacing: 10.0,
            step: 1.0,
            jump_distance: f64::INFINITY,
            range: None,
        }
    }
}

impl GridOptions {
    pub fn with_spacing(mut self, lat: f64, lon: f64) -> Self {
        self.lat_spacing = lat;
        self.lon_spacing = lon;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    pub fn with_jump_distance(mut self, distance: f64) -> Self {
        self.jump_distance = distance;
        self
    }

    pub fn with_range(mut self, range: GroundRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("latitude spacing", self.lat_spacing),
            ("longitude spacing", self.lon_spacing),
            ("step", self.step),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(CubeError::user(format!("grid {} must be positive, got {}", name, v)));
            }
        }
        if self.jump_distance.is_nan() || self.jump_distance <= 0.0 {
            return Err(CubeError::user(format!(
                "grid jump distance must be positive, got {}",
                self.jump_distance
            )));
        }
        Ok(())
    }
}

pub struct GridWalker<'a> {
    projection: &'a dyn MapProjection,
    options: GridOptions,
}

impl<'a> GridWalker<'a> {
    pub fn new(projection: &'a dyn MapProjection, options: GridOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { projection, options })
    }

    fn range(&self) -> Result<GroundRange> {
        let range = self
            .options
            .range
            .or_else(|| self.projection.ground_range())
            .ok_or_else(|| {
                CubeError::user(format!(
                    "{} projection has no ground range; give one explicitly",
                    self.projection.name()
                ))
            })?;
        if range.min_lat > range.max_lat || range.min_lon > range.max_lon {
            return Err(CubeError::user(format!(
                "empty ground range lat {}..{} lon {}..{}",
                range.min_lat, range.max_lat, range.min_lon, range.max_lon
            )));
        }
        Ok(range)
    }

    /// Walk every latitude line, then every longitude line.
    pub fn walk(&self) -> Result<Vec<GridLine>> {
        let range = self.range()?;
        let mut lines = Vec::new();
        for lat in grid_values(range.min_lat, range.max_lat, self.options.lat_spacing) {
            let points = samples(range.min_lon, range.max_lon, self.options.step).map(|lon| (lat, lon));
            lines.push(self.trace(GridLineKind::Latitude, lat, points));
        }
        for lon in grid_values(range.min_lon, range.max_lon, self.options.lon_spacing) {
            let points = samples(range.min_lat, range.max_lat, self.options.step).map(|lat| (lat, lon));
            lines.push(self.trace(GridLineKind::Longitude, lon, points));
        }
        debug!(
            projection = self.projection.name(),
            lines = lines.len(),
            "Walked grid"
        );
        Ok(lines)
    }

    fn trace(&self, kind: GridLineKind, value: f64, ground: impl Iterator<Item = (f64, f64)>) -> GridLine {
        let mut segments = Vec::new();
        let mut current: Vec<(f64, f64)> = Vec::new();
        for (lat, lon) in ground {
            match self.projection.set_ground(lat, lon) {
                Some(p) => {
                    if let Some(&(x, y)) = current.last() {
                        if (p.0 - x).hypot(p.1 - y) > self.options.jump_distance {
                            flush(&mut segments, &mut current);
                        }
                    }
                    current.push(p);
                }
                None => flush(&mut segments, &mut current),
            }
        }
        flush(&mut segments, &mut current);
        GridLine { kind, value, segments }
    }
}

fn flush(segments: &mut Vec<Vec<(f64, f64)>>, current: &mut Vec<(f64, f64)>) {
    if current.len() >= 2 {
        segments.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Multiples of `spacing` inside `[min, max]`.
fn grid_values(min: f64, max: f64, spacing: f64) -> impl Iterator<Item = f64> {
    let first = (min / spacing - EPSILON).ceil() as i64;
    let last = (max / spacing + EPSILON).floor() as i64;
    (first..=last).map(move |k| k as f64 * spacing)
}

/// `min`, `min + step`, ... ending exactly on `max`.
fn samples(min: f64, max: f64, step: f64) -> impl Iterator<Item = f64> {
    let n = ((max - min) / step - EPSILON).ceil().max(0.0) as usize;
    (0..=n).map(move |i| (min + i as f64 * step).min(max))
}

fn xml_err(e: quick_xml::Error) -> CubeError {
    CubeError::parse(format!("GML error: {e}"))
}

fn write_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_err)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_err)?;
    Ok(())
}

fn start(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_err)
}

fn end(writer: &mut Writer<Vec<u8>>, tag: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_err)
}

fn write_coord(writer: &mut Writer<Vec<u8>>, x: f64, y: f64) -> Result<()> {
    start(writer, "gml:coord")?;
    write_text(writer, "gml:X", &x.to_string())?;
    write_text(writer, "gml:Y", &y.to_string())?;
    end(writer, "gml:coord")
}

/// Encode gridlines as a GML feature collection. Each line is a feature
/// with a `MultiLineString` of its segments; lines with no segment are
/// left out.
pub fn to_gml(lines: &[GridLine]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    let root = BytesStart::new("ogr:FeatureCollection").with_attributes([
        ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ("xmlns:ogr", "http://ogr.maptools.org/"),
        ("xmlns:gml", "http://www.opengis.net/gml"),
    ]);
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    let points = lines.iter().flat_map(|l| l.segments.iter().flatten());
    let bounds = points.fold(None, |acc: Option<(f64, f64, f64, f64)>, &(x, y)| {
        Some(match acc {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        })
    });
    if let Some((x0, y0, x1, y1)) = bounds {
        start(&mut writer, "gml:boundedBy")?;
        start(&mut writer, "gml:Box")?;
        write_coord(&mut writer, x0, y0)?;
        write_coord(&mut writer, x1, y1)?;
        end(&mut writer, "gml:Box")?;
        end(&mut writer, "gml:boundedBy")?;
    }

    for (fid, line) in lines.iter().filter(|l| !l.segments.is_empty()).enumerate() {
        start(&mut writer, "gml:featureMember")?;
        let fid = fid.to_string();
        let feature = BytesStart::new("ogr:grid").with_attributes([("fid", fid.as_str())]);
        writer.write_event(Event::Start(feature)).map_err(xml_err)?;
        write_text(&mut writer, "ogr:Type", line.kind.as_str())?;
        write_text(&mut writer, "ogr:Value", &line.value.to_string())?;
        start(&mut writer, "ogr:geometryProperty")?;
        start(&mut writer, "gml:MultiLineString")?;
        for segment in &line.segments {
            start(&mut writer, "gml:lineStringMember")?;
            start(&mut writer, "gml:LineString")?;
            let coords: Vec<String> = segment.iter().map(|(x, y)| format!("{},{}", x, y)).collect();
            write_text(&mut writer, "gml:coordinates", &coords.join(" "))?;
            end(&mut writer, "gml:LineString")?;
            end(&mut writer, "gml:lineStringMember")?;
        }
        end(&mut writer, "gml:MultiLineString")?;
        end(&mut writer, "ogr:geometryProperty")?;
        end(&mut writer, "ogr:grid")?;
        end(&mut writer, "gml:featureMember")?;
    }

    end(&mut writer, "ogr:FeatureCollection")?;
    String::from_utf8(writer.into_inner()).map_err(|e| CubeError::parse(e.to_string()))
}
