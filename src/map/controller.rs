//! Camera state and the handle to the rendering surface.

use thiserror::Error;

use crate::geo::LatLng;
use crate::map::projection::Viewport;
use crate::marker::Marker;

/// Hit radius for clicking a marker, in braille pixels
const HIT_RADIUS_PX: i32 = 3;

/// Map viewport center and zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub center: LatLng,
    pub zoom: u8,
}

#[derive(Debug, Error, PartialEq)]
pub enum ControllerError {
    #[error("map surface has not finished loading")]
    NotLoaded,
    #[error("coordinate out of range: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

/// Owns the camera. Move operations are refused until the surface is loaded.
pub struct MapController {
    viewport: Viewport,
    initial: Camera,
    move_to_zoom: u8,
    loaded: bool,
    /// Top-left terminal cell of the map area
    origin: (u16, u16),
}

impl MapController {
    pub fn new(initial: Camera, move_to_zoom: u8) -> Self {
        Self {
            viewport: Viewport::new(initial.center.lng, initial.center.lat, initial.zoom, 0, 0),
            initial,
            move_to_zoom,
            loaded: false,
            origin: (0, 0),
        }
    }

    pub fn camera(&self) -> Camera {
        Camera {
            center: LatLng::new(self.viewport.center_lat, self.viewport.center_lon),
            zoom: self.viewport.zoom,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// The surface signalled it is ready
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Place the map area at `origin` with `cols` x `rows` character cells.
    /// Braille gives 2x4 resolution per character.
    pub fn resize_surface(&mut self, origin: (u16, u16), cols: u16, rows: u16) {
        self.origin = origin;
        self.viewport.width = usize::from(cols) * 2;
        self.viewport.height = usize::from(rows) * 4;
    }

    /// Pan to a coordinate and apply the fixed move-to zoom.
    ///
    /// Web Mercator cannot show the poles, so the camera's latitude is
    /// clamped to ±85.0511. Longitude is only wrapped into range.
    pub fn move_to(&mut self, target: LatLng) -> Result<(), ControllerError> {
        if !self.loaded {
            return Err(ControllerError::NotLoaded);
        }
        if !target.is_valid() {
            return Err(ControllerError::InvalidCoordinate {
                lat: target.lat,
                lng: target.lng,
            });
        }
        self.viewport.set_center(target.lng, target.lat);
        self.viewport.set_zoom(self.move_to_zoom);
        Ok(())
    }

    /// Back to the initial camera
    pub fn reset(&mut self) {
        self.viewport.set_center(self.initial.center.lng, self.initial.center.lat);
        self.viewport.set_zoom(self.initial.zoom);
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = self.cell_to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
    }

    /// Zoom out from a screen position (terminal column/row)
    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = self.cell_to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
    }

    /// Whether a terminal cell lies inside the map area
    pub fn contains_cell(&self, col: u16, row: u16) -> bool {
        let (px, py) = self.cell_to_pixel(col, row);
        px >= 0 && py >= 0 && (px as usize) < self.viewport.width && (py as usize) < self.viewport.height
    }

    /// Terminal cell to braille pixel, at the cell's center dot
    pub fn cell_to_pixel(&self, col: u16, row: u16) -> (i32, i32) {
        let px = (i32::from(col) - i32::from(self.origin.0)) * 2;
        let py = (i32::from(row) - i32::from(self.origin.1)) * 4;
        (px + 1, py + 2)
    }

    /// Geographic coordinate under a terminal cell
    pub fn unproject_cell(&self, col: u16, row: u16) -> LatLng {
        let (px, py) = self.cell_to_pixel(col, row);
        let (lng, lat) = self.viewport.unproject(px, py);
        LatLng::new(lat, lng)
    }

    /// Map-relative character cell of a coordinate, if on screen
    pub fn cell_of(&self, point: LatLng) -> Option<(u16, u16)> {
        let (px, py) = self.viewport.project(point.lng, point.lat);
        if px < 0 || py < 0 {
            return None;
        }
        let (cx, cy) = (px / 2, py / 4);
        let cols = (self.viewport.width / 2) as i32;
        let rows = (self.viewport.height / 4) as i32;
        (cx < cols && cy < rows).then_some((cx as u16, cy as u16))
    }

    /// Marker drawn closest to a terminal cell, within the hit radius
    pub fn marker_at<'a>(
        &self,
        markers: impl Iterator<Item = &'a Marker>,
        col: u16,
        row: u16,
    ) -> Option<&'a Marker> {
        let (px, py) = self.cell_to_pixel(col, row);
        markers
            .map(|m| {
                let (mx, my) = self.viewport.project(m.lng, m.lat);
                (m, (mx - px).abs().max((my - py).abs()))
            })
            .filter(|(_, d)| *d <= HIT_RADIUS_PX)
            .min_by_key(|(_, d)| *d)
            .map(|(m, _)| m)
    }

    /// Center as "43.0°N, 80.0°W"
    pub fn center_coords(&self) -> String {
        let lat = self.viewport.center_lat;
        let lon = self.viewport.center_lon;
        format!(
            "{:.4}°{}, {:.4}°{}",
            lat.abs(),
            if lat >= 0.0 { "N" } else { "S" },
            lon.abs(),
            if lon >= 0.0 { "E" } else { "W" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerId;
    use chrono::Utc;

    fn controller() -> MapController {
        let mut c = MapController::new(
            Camera {
                center: LatLng::new(43.0, -80.0),
                zoom: 9,
            },
            16,
        );
        c.resize_surface((1, 2), 100, 30);
        c
    }

    #[test]
    fn test_move_to_requires_loaded_surface() {
        let mut c = controller();
        assert_eq!(
            c.move_to(LatLng::new(43.65, -79.38)),
            Err(ControllerError::NotLoaded)
        );
        assert_eq!(c.camera().zoom, 9);
    }

    #[test]
    fn test_move_to_sets_exact_center_and_fixed_zoom() {
        let mut c = controller();
        c.mark_loaded();
        c.zoom_out();
        c.pan(123, -45);

        c.move_to(LatLng::new(43.65, -79.38)).unwrap();
        let camera = c.camera();
        assert_eq!(camera.center, LatLng::new(43.65, -79.38));
        assert_eq!(camera.zoom, 16);
    }

    #[test]
    fn test_move_to_clamps_latitude_to_mercator_limit() {
        let mut c = controller();
        c.mark_loaded();

        c.move_to(LatLng::new(89.0, 10.0)).unwrap();
        let camera = c.camera();
        assert!((camera.center.lat - 85.0511).abs() < 1e-4);
        assert_eq!(camera.center.lng, 10.0);
        assert_eq!(camera.zoom, 16);

        c.move_to(LatLng::new(-90.0, 10.0)).unwrap();
        assert!((c.camera().center.lat + 85.0511).abs() < 1e-4);
    }

    #[test]
    fn test_move_to_rejects_invalid() {
        let mut c = controller();
        c.mark_loaded();
        assert!(matches!(
            c.move_to(LatLng::new(f64::NAN, 0.0)),
            Err(ControllerError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_unproject_center_cell() {
        let c = controller();
        // Map is 100x30 cells starting at (1, 2): center cell is (51, 17)
        let point = c.unproject_cell(51, 17);
        assert!((point.lat - 43.0).abs() < 0.05);
        assert!((point.lng + 80.0).abs() < 0.05);
    }

    #[test]
    fn test_marker_hit_testing() {
        let c = controller();
        let marker = Marker {
            id: MarkerId::Int(5),
            lat: 43.0,
            lng: -80.0,
            time: Utc::now(),
        };
        let markers = [marker];
        assert_eq!(c.marker_at(markers.iter(), 51, 17).map(|m| &m.id), Some(&MarkerId::Int(5)));
        assert!(c.marker_at(markers.iter(), 70, 5).is_none());
        assert_eq!(c.cell_of(markers[0].position()), Some((50, 15)));
    }

    #[test]
    fn test_reset_restores_initial_camera() {
        let mut c = controller();
        c.mark_loaded();
        c.move_to(LatLng::new(10.0, 10.0)).unwrap();
        c.reset();
        assert_eq!(c.camera().zoom, 9);
        assert_eq!(c.camera().center, LatLng::new(43.0, -80.0));
    }

    #[test]
    fn test_contains_cell() {
        let c = controller();
        assert!(c.contains_cell(1, 2));
        assert!(!c.contains_cell(0, 2));
        assert!(!c.contains_cell(101, 10));
    }
}
