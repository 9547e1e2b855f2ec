/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell represents a 2x4 pixel grid (8 dots).
/// Unicode Braille patterns: U+2800 to U+28FF
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    /// Bit pattern per cell, row-major
    cells: Vec<u8>,
}

/// Dot bit for a pixel offset inside a cell:
/// ```text
/// (0,0) (1,0)   bits: 0x01 0x08
/// (0,1) (1,1)   bits: 0x02 0x10
/// (0,2) (1,2)   bits: 0x04 0x20
/// (0,3) (1,3)   bits: 0x40 0x80
/// ```
#[inline(always)]
fn dot_bit(x: usize, y: usize) -> u8 {
    const BITS: [[u8; 2]; 4] = [[0x01, 0x08], [0x02, 0x10], [0x04, 0x20], [0x40, 0x80]];
    BITS[y % 4][x % 2]
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        let (cx, cy) = (x / 2, y / 4);
        (cx < self.width && cy < self.height).then_some(cy * self.width + cx)
    }

    /// Set a pixel at the given coordinates; out-of-bounds pixels are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] |= dot_bit(x, y);
        }
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    /// Whether a pixel is lit
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.index(x, y)
            .is_some_and(|idx| self.cells[idx] & dot_bit(x, y) != 0)
    }

    /// Non-empty cells as (column, row, glyph)
    pub fn glyphs(&self) -> impl Iterator<Item = (usize, usize, char)> + '_ {
        self.cells.iter().enumerate().filter_map(|(idx, &bits)| {
            if bits == 0 {
                return None;
            }
            let ch = char::from_u32(0x2800 + u32::from(bits))?;
            Some((idx % self.width, idx / self.width, ch))
        })
    }

    /// Convert the canvas to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| {
                row.iter()
                    .map(|&b| char::from_u32(0x2800 + u32::from(b)).unwrap_or(' '))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
