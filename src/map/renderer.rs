use std::fmt;

use crate::braille::BrailleCanvas;
use crate::geo::{haversine_km, LatLng};
use crate::map::geometry::{draw_circle, draw_line, draw_ring};
use crate::map::projection::Viewport;
use crate::map::spatial::SpatialGrid;

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<(f64, f64)>;

/// Largest ring radius worth drawing, in pixels
const MAX_RING_RADIUS: f64 = 50_000.0;

/// Level of detail for map data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lod {
    Low,    // 110m - world view
    Medium, // 50m - continental
    High,   // 10m - regional
}

impl Lod {
    /// Select LOD based on zoom level
    pub fn from_zoom(zoom: u8) -> Self {
        match zoom {
            0..=3 => Lod::Low,
            4..=6 => Lod::Medium,
            _ => Lod::High,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Lod::Low => "110m",
            Lod::Medium => "50m",
            Lod::High => "10m",
        }
    }
}

/// A point of interest (populated place) with position, name, and population
#[derive(Clone, Debug, PartialEq)]
pub struct Poi {
    pub lon: f64,
    pub lat: f64,
    pub name: String,
    pub population: u64,
}

/// Display settings for map layers
#[derive(Clone, Debug)]
pub struct DisplaySettings {
    pub show_coastlines: bool,
    pub show_borders: bool,
    pub show_pois: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_coastlines: true,
            show_borders: true,
            show_pois: true,
            show_labels: true,
        }
    }
}

/// One frame of rendered base map, split by color
pub struct MapLayers {
    pub coastlines: BrailleCanvas,
    pub borders: BrailleCanvas,
    pub pois: BrailleCanvas,
    pub overlay: BrailleCanvas,
    /// (column, row, text) relative to the map area
    pub labels: Vec<(u16, u16, String)>,
}

/// Map renderer with multi-resolution coastline data
pub struct MapRenderer {
    pub coastlines_low: Vec<LineString>,
    pub coastlines_medium: Vec<LineString>,
    pub coastlines_high: Vec<LineString>,
    pub borders_medium: Vec<LineString>,
    pub borders_high: Vec<LineString>,
    pub pois: SpatialGrid<Poi>,
    pub settings: DisplaySettings,
}

impl MapRenderer {
    pub fn new() -> Self {
        Self {
            coastlines_low: Vec::new(),
            coastlines_medium: Vec::new(),
            coastlines_high: Vec::new(),
            borders_medium: Vec::new(),
            borders_high: Vec::new(),
            pois: SpatialGrid::new(1.0),
            settings: DisplaySettings::default(),
        }
    }

    /// Get coastlines for the given LOD, falling back to whatever is loaded
    fn get_coastlines(&self, lod: Lod) -> &[LineString] {
        let order = match lod {
            Lod::High => [&self.coastlines_high, &self.coastlines_medium, &self.coastlines_low],
            Lod::Medium => [&self.coastlines_medium, &self.coastlines_low, &self.coastlines_high],
            Lod::Low => [&self.coastlines_low, &self.coastlines_medium, &self.coastlines_high],
        };
        order
            .into_iter()
            .find(|lines| !lines.is_empty())
            .map(|lines| lines.as_slice())
            .unwrap_or(&[])
    }

    /// Get borders for the given LOD
    fn get_borders(&self, lod: Lod) -> &[LineString] {
        match lod {
            Lod::High if !self.borders_high.is_empty() => &self.borders_high,
            _ => &self.borders_medium,
        }
    }

    /// Smallest population shown at a zoom level
    fn min_population(zoom: u8) -> u64 {
        match zoom {
            12..=u8::MAX => 0,
            10..=11 => 50_000,
            8..=9 => 200_000,
            7 => 1_000_000,
            5..=6 => 5_000_000,
            _ => 10_000_000,
        }
    }

    /// POIs worth drawing in the viewport
    fn visible_pois<'a>(&'a self, viewport: &Viewport) -> Box<dyn Iterator<Item = &'a Poi> + 'a> {
        let min_pop = Self::min_population(viewport.zoom);
        match viewport.bounds() {
            Some((min_lon, min_lat, max_lon, max_lat)) => Box::new(
                self.pois
                    .query_bbox(min_lon, min_lat, max_lon, max_lat)
                    .filter(move |p| p.population >= min_pop),
            ),
            None => Box::new(
                self.pois
                    .items()
                    .iter()
                    .filter(move |p| p.population >= min_pop),
            ),
        }
    }

    /// Render all base map features for a canvas of `width` x `height` cells
    pub fn render(&self, width: usize, height: usize, viewport: &Viewport) -> MapLayers {
        let lod = Lod::from_zoom(viewport.zoom);
        let mut layers = MapLayers {
            coastlines: BrailleCanvas::new(width, height),
            borders: BrailleCanvas::new(width, height),
            pois: BrailleCanvas::new(width, height),
            overlay: BrailleCanvas::new(width, height),
            labels: Vec::new(),
        };

        if self.settings.show_coastlines {
            for line in self.get_coastlines(lod) {
                draw_linestring(&mut layers.coastlines, line, viewport);
            }
        }

        if self.settings.show_borders {
            for line in self.get_borders(lod) {
                draw_linestring(&mut layers.borders, line, viewport);
            }
        }

        if self.settings.show_pois && viewport.zoom >= 4 {
            let radius = match viewport.zoom {
                12..=u8::MAX => 2,
                8..=11 => 1,
                _ => 0,
            };
            for poi in self.visible_pois(viewport) {
                let (px, py) = viewport.project(poi.lon, poi.lat);
                if !viewport.is_visible(px, py) {
                    continue;
                }
                draw_circle(&mut layers.pois, px, py, radius);

                // Label sits two cells right of the dot
                if self.settings.show_labels && px >= 0 && py >= 0 {
                    let char_x = (px / 2) as u16;
                    let char_y = (py / 4) as u16;
                    if let Some(label_x) = char_x.checked_add(2) {
                        layers.labels.push((label_x, char_y, poi.name.clone()));
                    }
                }
            }
        }

        layers
    }

    /// Draw a ground-distance circle around a point onto a canvas
    pub fn draw_radius(
        &self,
        canvas: &mut BrailleCanvas,
        viewport: &Viewport,
        center: LatLng,
        radius_m: f64,
    ) {
        let (cx, cy) = viewport.project(center.lng, center.lat);
        let radius_px = (radius_m / viewport.meters_per_pixel(center.lat)).round();
        if radius_px > MAX_RING_RADIUS {
            return;
        }
        draw_ring(canvas, cx, cy, radius_px as i32);
    }

    /// Closest POI within `max_km` of a point, with its distance
    pub fn nearest_poi(&self, point: LatLng, max_km: f64) -> Option<(&Poi, f64)> {
        // One degree of latitude is ~111 km; widen for longitude shrinkage
        let radius_degrees = max_km / (111.0 * point.lat.to_radians().cos().max(0.1));
        self.pois
            .query_radius(point.lng, point.lat, radius_degrees)
            .map(|poi| (poi, haversine_km(point, LatLng::new(poi.lat, poi.lon))))
            .filter(|(_, d)| *d <= max_km)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Add coastline data at a specific LOD
    pub fn add_coastline(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::Low => self.coastlines_low.push(line),
            Lod::Medium => self.coastlines_medium.push(line),
            Lod::High => self.coastlines_high.push(line),
        }
    }

    /// Add border data at a specific LOD
    pub fn add_border(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::High => self.borders_high.push(line),
            Lod::Medium | Lod::Low => self.borders_medium.push(line),
        }
    }

    /// Add a point of interest
    pub fn add_poi(&mut self, lon: f64, lat: f64, name: &str, population: u64) {
        self.pois.insert(
            lon,
            lat,
            Poi {
                lon,
                lat,
                name: name.to_string(),
                population,
            },
        );
    }

    /// Check if any coastline data is loaded
    pub fn has_data(&self) -> bool {
        !self.coastlines_low.is_empty()
            || !self.coastlines_medium.is_empty()
            || !self.coastlines_high.is_empty()
    }

    /// Toggle POI labels
    pub fn toggle_labels(&mut self) {
        self.settings.show_labels = !self.settings.show_labels;
    }

    /// Toggle borders
    pub fn toggle_borders(&mut self) {
        self.settings.show_borders = !self.settings.show_borders;
    }

    /// Toggle POIs
    pub fn toggle_pois(&mut self) {
        self.settings.show_pois = !self.settings.show_pois;
    }
}

impl fmt::Debug for MapRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapRenderer")
            .field("coastlines_low", &self.coastlines_low.len())
            .field("coastlines_medium", &self.coastlines_medium.len())
            .field("coastlines_high", &self.coastlines_high.len())
            .field("borders_medium", &self.borders_medium.len())
            .field("borders_high", &self.borders_high.len())
            .field("pois", &self.pois.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a linestring with viewport culling
fn draw_linestring(canvas: &mut BrailleCanvas, line: &LineString, viewport: &Viewport) {
    if line.len() < 2 {
        return;
    }

    let mut prev: Option<(i32, i32)> = None;

    for &(lon, lat) in line {
        let (px, py) = viewport.project(lon, lat);

        if let Some((prev_x, prev_y)) = prev {
            // Skip segments that jump across the antimeridian
            let dist = (px - prev_x).unsigned_abs() as f64 + (py - prev_y).unsigned_abs() as f64;
            if dist < viewport.world_size() / 2.0
                && viewport.line_might_be_visible((prev_x, prev_y), (px, py))
            {
                draw_line(canvas, prev_x, prev_y, px, py);
            }
        }

        prev = Some((px, py));
    }
}
