use std::f64::consts::PI;

use crate::geo::{wrap_lng, EARTH_CIRCUMFERENCE_M};

pub const MIN_ZOOM: u8 = 0;
pub const MAX_ZOOM: u8 = 20;

/// Braille pixels spanning the whole world at zoom 0 (doubles per level)
pub const WORLD_PIXELS: f64 = 64.0;

/// Web Mercator latitude limit
const MAX_LAT: f64 = 85.051_128_78;

/// Viewport representing the visible map area and zoom level
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Integer zoom level, same scale as web map tiles
    pub zoom: u8,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

/// Normalized Mercator x in 0..1
#[inline(always)]
fn mercator_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

/// Normalized Mercator y in 0..1 (0 = north)
#[inline(always)]
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

#[inline(always)]
fn inverse_mercator_y(y: f64) -> f64 {
    (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees()
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: u8, width: usize, height: usize) -> Self {
        Self {
            center_lon: wrap_lng(center_lon),
            center_lat: center_lat.clamp(-MAX_LAT, MAX_LAT),
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    /// World width in pixels at the current zoom
    #[inline(always)]
    pub fn world_size(&self) -> f64 {
        WORLD_PIXELS * f64::from(1u32 << self.zoom)
    }

    /// Ground meters covered by one pixel at a latitude
    pub fn meters_per_pixel(&self, lat: f64) -> f64 {
        EARTH_CIRCUMFERENCE_M * lat.to_radians().cos() / self.world_size()
    }

    /// Recenter without touching zoom
    pub fn set_center(&mut self, lon: f64, lat: f64) {
        self.center_lon = wrap_lng(lon);
        self.center_lat = lat.clamp(-MAX_LAT, MAX_LAT);
    }

    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let world = self.world_size();
        let x = mercator_x(self.center_lon) + f64::from(dx) / world;
        let y = (mercator_y(self.center_lat) + f64::from(dy) / world).clamp(0.0, 1.0);
        self.set_center(x * 360.0 - 180.0, inverse_mercator_y(y));
    }

    /// Zoom in one level
    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom.saturating_add(1));
    }

    /// Zoom out one level
    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom.saturating_sub(1));
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, self.zoom.saturating_add(1));
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, self.zoom.saturating_sub(1));
    }

    /// Change zoom while keeping the point under (px, py) in place
    fn zoom_at(&mut self, px: i32, py: i32, zoom: u8) {
        let (lon, lat) = self.unproject(px, py);
        self.set_zoom(zoom);
        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    /// Unproject pixel coordinates back to geographic coordinates (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let world = self.world_size();
        let x = (f64::from(px) - self.width as f64 / 2.0) / world + mercator_x(self.center_lon);
        let y = (f64::from(py) - self.height as f64 / 2.0) / world + mercator_y(self.center_lat);

        (wrap_lng(x * 360.0 - 180.0), inverse_mercator_y(y.clamp(0.0, 1.0)))
    }

    /// Project a geographic coordinate (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let world = self.world_size();
        let mut dx = mercator_x(lon) - mercator_x(self.center_lon);
        // Take the short way around the antimeridian
        if dx > 0.5 {
            dx -= 1.0;
        } else if dx < -0.5 {
            dx += 1.0;
        }
        let dy = mercator_y(lat) - mercator_y(self.center_lat);

        let px = (dx * world + self.width as f64 / 2.0) as i32;
        let py = (dy * world + self.height as f64 / 2.0) as i32;

        (px, py)
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10
            && px < self.width as i32 + 10
            && py >= -10
            && py < self.height as i32 + 10
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0
            && min_x < self.width as i32
            && max_y >= 0
            && min_y < self.height as i32
    }

    /// Geographic bounds of the canvas as (min_lon, min_lat, max_lon, max_lat),
    /// or None when the view wraps the antimeridian
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        if self.width as f64 >= self.world_size() {
            return None;
        }
        let (west, north) = self.unproject(0, 0);
        let (east, south) = self.unproject(self.width as i32, self.height as i32);
        (west <= east).then_some((west, south, east, north))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(0.0, 0.0, 1, 100, 100);
        let (x, y) = vp.project(0.0, 0.0);
        assert_eq!(x, 50);
        assert_eq!(y, 50);
    }

    #[test]
    fn test_unproject_roundtrip_near_center() {
        let vp = Viewport::new(-80.0, 43.0, 9, 400, 200);
        let (px, py) = vp.project(-79.9, 43.05);
        let (lon, lat) = vp.unproject(px, py);
        assert!((lon + 79.9).abs() < 0.01);
        assert!((lat - 43.05).abs() < 0.01);
    }

    #[test]
    fn test_pan() {
        let mut vp = Viewport::new(0.0, 0.0, 1, 100, 100);
        vp.pan(10, 0);
        assert!(vp.center_lon > 0.0);
        vp.pan(0, 10);
        assert!(vp.center_lat < 0.0);
    }

    #[test]
    fn test_pan_wraps_longitude() {
        let mut vp = Viewport::new(179.0, 0.0, 3, 100, 100);
        vp.pan(100, 0);
        assert!(vp.center_lon < 0.0 && vp.center_lon >= -180.0);
    }

    #[test]
    fn test_zoom_clamps() {
        let mut vp = Viewport::new(0.0, 0.0, MAX_ZOOM, 100, 100);
        vp.zoom_in();
        assert_eq!(vp.zoom, MAX_ZOOM);
        vp.set_zoom(MIN_ZOOM);
        vp.zoom_out();
        assert_eq!(vp.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_zoom_at_keeps_point_under_cursor() {
        let mut vp = Viewport::new(-80.0, 43.0, 8, 400, 200);
        let before = vp.unproject(300, 50);
        vp.zoom_in_at(300, 50);
        assert_eq!(vp.zoom, 9);
        let after = vp.unproject(300, 50);
        assert!((before.0 - after.0).abs() < 0.05);
        assert!((before.1 - after.1).abs() < 0.05);
    }

    #[test]
    fn test_meters_per_pixel_halves_per_level() {
        let mut vp = Viewport::new(0.0, 0.0, 10, 100, 100);
        let at10 = vp.meters_per_pixel(0.0);
        vp.zoom_in();
        assert!((vp.meters_per_pixel(0.0) * 2.0 - at10).abs() < 1e-6);
    }
}
