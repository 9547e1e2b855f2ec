use std::collections::HashMap;

/// Spatial hash grid for region queries over points of interest.
/// Divides the world into square cells of `cell_size` degrees.
pub struct SpatialGrid<T> {
    /// Grid cells indexed by (cell_x, cell_y)
    cells: HashMap<(i32, i32), Vec<usize>>,
    /// All items (indices into this vec stored in cells)
    items: Vec<T>,
    /// Cell size in degrees
    cell_size: f64,
}

impl<T> SpatialGrid<T> {
    /// Create a new spatial grid with given cell size in degrees
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            items: Vec::new(),
            cell_size,
        }
    }

    /// Convert lon/lat to cell coordinates
    #[inline(always)]
    fn to_cell(&self, lon: f64, lat: f64) -> (i32, i32) {
        let x = (lon / self.cell_size).floor() as i32;
        let y = (lat / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Insert an item at a geographic position
    pub fn insert(&mut self, lon: f64, lat: f64, item: T) {
        let idx = self.items.len();
        self.items.push(item);

        let cell = self.to_cell(lon, lat);
        self.cells.entry(cell).or_default().push(idx);
    }

    /// Items in the cells covering a radius around a point.
    /// Conservative: callers filter by exact distance.
    pub fn query_radius(&self, lon: f64, lat: f64, radius_degrees: f64) -> impl Iterator<Item = &T> {
        let r = radius_degrees.max(0.0);
        self.query_bbox(lon - r, lat - r, lon + r, lat + r)
    }

    /// Items in the cells covering a bounding box
    pub fn query_bbox(
        &self,
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> impl Iterator<Item = &T> {
        let min_cell = self.to_cell(min_lon, min_lat);
        let max_cell = self.to_cell(max_lon, max_lat);

        (min_cell.1..=max_cell.1)
            .flat_map(move |y| (min_cell.0..=max_cell.0).map(move |x| (x, y)))
            .filter_map(move |cell| self.cells.get(&cell))
            .flatten()
            .filter_map(move |&idx| self.items.get(idx))
    }

    /// All items in insertion order
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
