use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use geojson::{GeoJson, Geometry, Value};

use crate::map::{Lod, MapRenderer};

/// Coastline files per LOD, first match wins within a LOD
const COASTLINE_FILES: [(&str, Lod); 4] = [
    ("ne_110m_coastline.json", Lod::Low),
    ("natural-earth.json", Lod::Medium),
    ("ne_50m_coastline.json", Lod::Medium),
    ("ne_10m_coastline.json", Lod::High),
];

const BORDER_FILES: [(&str, Lod); 2] = [
    ("ne_50m_borders.json", Lod::Medium),
    ("ne_10m_borders.json", Lod::High),
];

const POI_FILES: [&str; 2] = ["ne_10m_populated_places.json", "ne_10m_cities.json"];

/// Build the rendering surface from a Natural Earth data directory.
///
/// A missing directory falls back to the built-in outlines unless it was
/// configured explicitly, in which case the surface fails to load.
/// Individual unreadable files are logged and skipped.
pub fn load_map(data_dir: &Path, explicit: bool) -> Result<MapRenderer> {
    let mut renderer = MapRenderer::new();

    if data_dir.is_dir() {
        load_all_geojson(&mut renderer, data_dir);
    } else if explicit {
        bail!("map data directory {} does not exist", data_dir.display());
    }

    if !renderer.has_data() {
        if explicit {
            bail!("no coastline data found in {}", data_dir.display());
        }
        tracing::info!(dir = %data_dir.display(), "no map data found; using built-in outlines");
        generate_simple_world(&mut renderer);
    }

    tracing::info!(
        coastlines = renderer.coastlines_low.len()
            + renderer.coastlines_medium.len()
            + renderer.coastlines_high.len(),
        pois = renderer.pois.len(),
        "map data loaded"
    );
    Ok(renderer)
}

/// Load all available Natural Earth GeoJSON data into the map renderer
pub fn load_all_geojson(renderer: &mut MapRenderer, data_dir: &Path) {
    for (filename, lod) in COASTLINE_FILES {
        let path = data_dir.join(filename);
        if path.exists() {
            if let Err(e) = load_lines(&path, |line| renderer.add_coastline(line, lod)) {
                tracing::warn!(file = filename, error = %e, "failed to load coastlines");
            }
        }
    }

    for (filename, lod) in BORDER_FILES {
        let path = data_dir.join(filename);
        if path.exists() {
            if let Err(e) = load_lines(&path, |line| renderer.add_border(line, lod)) {
                tracing::warn!(file = filename, error = %e, "failed to load borders");
            }
        }
    }

    if let Some(path) = POI_FILES
        .iter()
        .map(|f| data_dir.join(f))
        .find(|p| p.exists())
    {
        if let Err(e) = load_pois(renderer, &path) {
            tracing::warn!(file = %path.display(), error = %e, "failed to load places");
        }
    }
}

fn read_geojson(path: &Path) -> Result<GeoJson> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    content
        .parse()
        .with_context(|| format!("parsing {}", path.display()))
}

/// Load every line feature of a GeoJSON file
fn load_lines<F>(path: &Path, add_line: F) -> Result<()>
where
    F: FnMut(Vec<(f64, f64)>),
{
    let geojson = read_geojson(path)?;
    process_geojson_lines(&geojson, add_line);
    Ok(())
}

/// Load populated places as points of interest
fn load_pois(renderer: &mut MapRenderer, path: &Path) -> Result<()> {
    let GeoJson::FeatureCollection(fc) = read_geojson(path)? else {
        bail!("{} is not a feature collection", path.display());
    };

    for feature in fc.features {
        let props = feature.properties.as_ref();

        let name = props
            .and_then(|p| p.get("name").or_else(|| p.get("NAME")))
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string();

        // Natural Earth spells population several ways
        let population = props
            .and_then(|p| {
                p.get("pop_max")
                    .or_else(|| p.get("POP_MAX"))
                    .or_else(|| p.get("pop_min"))
                    .or_else(|| p.get("population"))
            })
            .and_then(|v| v.as_f64())
            .map(|v| v as u64)
            .unwrap_or(0);

        if let Some(Value::Point(coords)) = feature.geometry.map(|g| g.value) {
            if coords.len() >= 2 {
                renderer.add_poi(coords[0], coords[1], &name, population);
            }
        }
    }

    Ok(())
}

/// Process GeoJSON and extract line features
fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(Vec<(f64, f64)>),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn to_line(coords: &[Vec<f64>]) -> Vec<(f64, f64)> {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| (c[0], c[1]))
        .collect()
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(Vec<(f64, f64)>),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        // Polygons contribute their exterior ring only
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for exterior in polygons.iter().filter_map(|rings| rings.first()) {
                add_line(to_line(exterior));
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

/// Coarse continent outlines, closed rings of (lon, lat)
const WORLD_OUTLINES: &[&[(f64, f64)]] = &[
    // North America
    &[
        (-166.0, 68.5), (-156.0, 71.3), (-140.0, 69.6), (-125.0, 70.0), (-95.0, 68.0),
        (-82.0, 64.5), (-77.0, 60.0), (-66.0, 58.5), (-60.5, 54.0), (-56.0, 51.5),
        (-59.5, 47.5), (-64.5, 46.0), (-66.0, 44.5), (-70.5, 41.8), (-74.0, 40.5),
        (-76.0, 37.0), (-75.5, 35.2), (-81.0, 31.5), (-80.0, 26.5), (-81.5, 25.0),
        (-82.8, 28.0), (-84.5, 30.0), (-89.5, 30.2), (-94.0, 29.5), (-97.3, 27.5),
        (-97.5, 22.0), (-95.0, 18.8), (-91.0, 18.5), (-87.5, 21.3), (-88.5, 16.0),
        (-83.5, 15.0), (-83.5, 11.0), (-79.5, 9.0), (-82.5, 8.2), (-87.5, 13.0),
        (-92.5, 14.8), (-96.5, 15.7), (-105.5, 20.0), (-109.5, 23.5), (-112.5, 29.0),
        (-114.8, 31.5), (-117.2, 32.6), (-120.5, 34.5), (-122.5, 37.8), (-124.3, 42.0),
        (-124.0, 46.2), (-124.7, 48.4), (-130.0, 54.5), (-136.0, 58.0), (-146.0, 60.5),
        (-152.0, 59.0), (-158.0, 57.0), (-162.5, 55.0), (-165.0, 60.5), (-166.0, 68.5),
    ],
    // South America
    &[
        (-77.5, 8.5), (-72.0, 12.0), (-62.0, 10.5), (-52.0, 5.0), (-50.0, 0.0),
        (-44.0, -2.5), (-35.0, -5.5), (-39.0, -13.5), (-41.0, -22.0), (-48.5, -26.5),
        (-53.5, -34.0), (-57.5, -38.0), (-62.0, -39.0), (-65.0, -45.0), (-69.0, -51.0),
        (-68.5, -55.0), (-74.0, -52.0), (-73.5, -44.0), (-73.5, -37.0), (-71.5, -30.0),
        (-70.3, -18.5), (-76.0, -14.0), (-81.0, -6.0), (-80.0, -1.0), (-78.5, 2.5),
        (-77.5, 8.5),
    ],
    // Africa
    &[
        (-6.0, 35.8), (10.0, 37.2), (11.0, 33.5), (20.0, 30.8), (32.0, 31.3),
        (34.5, 27.5), (39.0, 21.0), (43.5, 12.5), (51.2, 11.8), (48.0, 4.5),
        (40.0, -3.5), (39.5, -10.5), (40.5, -15.0), (35.5, -24.0), (32.5, -28.5),
        (27.5, -33.8), (18.5, -34.3), (15.5, -27.0), (11.8, -17.0), (13.5, -11.0),
        (12.0, -5.0), (9.5, 1.0), (8.5, 4.5), (4.5, 6.3), (-4.0, 5.2),
        (-8.0, 4.5), (-13.0, 8.0), (-17.0, 14.5), (-16.5, 21.0), (-13.0, 27.5),
        (-9.5, 30.5), (-6.0, 35.8),
    ],
    // Eurasia
    &[
        (-9.5, 43.0), (-9.0, 38.8), (-6.0, 36.5), (-0.5, 38.5), (3.2, 42.0),
        (8.5, 44.3), (12.5, 41.8), (16.0, 38.0), (18.5, 40.3), (13.5, 45.5),
        (19.5, 42.0), (23.0, 36.5), (26.5, 40.5), (28.5, 41.2), (36.0, 36.5),
        (35.0, 32.5), (34.0, 28.0), (43.0, 13.0), (52.0, 16.0), (59.5, 22.5),
        (56.5, 26.5), (51.5, 24.5), (48.5, 30.0), (57.0, 25.8), (66.5, 25.0),
        (72.8, 19.0), (77.5, 8.0), (80.3, 13.0), (87.0, 21.0), (91.5, 22.5),
        (94.5, 17.0), (98.0, 8.5), (100.5, 3.5), (103.5, 1.5), (104.0, 10.5),
        (109.0, 12.0), (106.5, 20.5), (113.5, 22.2), (121.5, 31.0), (119.5, 34.5),
        (122.0, 40.0), (121.0, 41.0), (129.5, 42.5), (135.5, 43.5), (141.5, 52.5),
        (135.0, 54.5), (143.0, 59.5), (156.5, 61.5), (163.0, 60.0), (156.5, 51.0),
        (162.0, 56.5), (170.0, 60.0), (179.5, 65.0), (179.5, 69.0), (160.0, 70.0),
        (140.0, 72.5), (113.0, 73.5), (104.0, 77.5), (87.0, 74.5), (73.5, 68.5),
        (66.0, 69.5), (44.0, 68.5), (33.0, 69.5), (25.0, 71.0), (14.5, 68.0),
        (5.0, 61.5), (5.5, 58.0), (10.5, 59.0), (12.0, 56.0), (8.5, 55.5),
        (8.0, 53.5), (4.5, 52.5), (1.5, 51.0), (-1.5, 49.5), (-4.5, 48.5),
        (-1.5, 46.0), (-1.8, 43.5), (-9.5, 43.0),
    ],
    // Australia
    &[
        (113.5, -22.0), (114.0, -26.5), (115.0, -34.0), (118.0, -35.0), (123.5, -34.0),
        (131.0, -31.5), (137.5, -35.0), (140.5, -38.0), (146.0, -39.0), (150.0, -37.5),
        (153.5, -28.0), (153.0, -25.0), (146.0, -19.0), (142.5, -10.8), (141.5, -17.0),
        (136.5, -12.0), (130.5, -11.5), (129.0, -15.0), (122.0, -17.5), (113.5, -22.0),
    ],
];

/// Great Lakes shorelines around the default view
const LAKE_OUTLINES: &[&[(f64, f64)]] = &[
    // Lake Ontario
    &[
        (-79.8, 43.3), (-79.4, 43.6), (-78.5, 43.9), (-77.2, 43.9), (-76.4, 44.1),
        (-76.2, 43.5), (-77.6, 43.25), (-79.0, 43.27), (-79.8, 43.3),
    ],
    // Lake Erie
    &[
        (-83.4, 41.8), (-82.5, 42.0), (-81.3, 42.65), (-80.2, 42.8), (-78.9, 42.9),
        (-79.8, 42.25), (-81.7, 41.5), (-82.7, 41.45), (-83.4, 41.8),
    ],
    // Lake Huron and Georgian Bay
    &[
        (-82.4, 43.0), (-81.7, 43.5), (-81.7, 44.2), (-80.1, 44.5), (-80.6, 45.6),
        (-81.3, 46.1), (-84.0, 46.0), (-84.7, 45.8), (-83.4, 45.0), (-83.3, 44.3),
        (-83.9, 43.9), (-82.4, 43.0),
    ],
];

/// Places around the default view plus a few world anchors: (lon, lat, name, population)
const BUILTIN_PLACES: &[(f64, f64, &str, u64)] = &[
    (-79.38, 43.65, "Toronto", 5_600_000),
    (-79.87, 43.26, "Hamilton", 730_000),
    (-80.49, 43.45, "Kitchener", 520_000),
    (-81.25, 42.98, "London ON", 400_000),
    (-78.88, 42.89, "Buffalo", 1_100_000),
    (-83.05, 42.33, "Detroit", 4_300_000),
    (-75.70, 45.42, "Ottawa", 1_400_000),
    (-73.57, 45.50, "Montreal", 4_200_000),
    (-73.94, 40.67, "New York", 18_800_000),
    (-87.63, 41.88, "Chicago", 9_500_000),
    (-0.13, 51.51, "London", 9_000_000),
    (139.69, 35.69, "Tokyo", 37_400_000),
    (-99.13, 19.43, "Mexico City", 21_800_000),
];

/// Built-in outlines and a handful of places, used when no data directory exists
pub fn generate_simple_world(renderer: &mut MapRenderer) {
    for outline in WORLD_OUTLINES.iter().chain(LAKE_OUTLINES) {
        renderer.add_coastline(outline.to_vec(), Lod::Low);
    }
    for &(lon, lat, name, population) in BUILTIN_PLACES {
        renderer.add_poi(lon, lat, name, population);
    }
}
