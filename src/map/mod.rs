mod controller;
mod geometry;
mod projection;
mod renderer;
mod spatial;

pub use controller::{Camera, ControllerError, MapController};
pub use projection::{Viewport, MAX_ZOOM, MIN_ZOOM};
pub use renderer::{Lod, MapLayers, MapRenderer, Poi};
pub use spatial::SpatialGrid;
