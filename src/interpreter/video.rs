use chip8_base::Pixel;

pub const PIXEL_ON: u32 = 0xFFFF_FFFF;
pub const PIXEL_OFF: u32 = 0;

pub const DEFAULT_WIDTH: usize = 64;
pub const DEFAULT_HEIGHT: usize = 32;

/// Row-major grid of pixels. A lit cell holds [`PIXEL_ON`], a dark one
/// [`PIXEL_OFF`], so a renderer can hand the cells straight to a 32-bit surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl Video {
    pub fn new(width: usize, height: usize) -> Self {
        Video {
            width,
            height,
            cells: vec![PIXEL_OFF; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per row of [`Video::cells`].
    pub fn pitch(&self) -> usize {
        self.width * std::mem::size_of::<u32>()
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == Some(PIXEL_ON)
    }

    pub fn clear(&mut self) {
        self.cells.fill(PIXEL_OFF);
    }

    /// XOR a sprite onto the grid with its top-left corner at `(x, y)`.
    ///
    /// The origin wraps around the grid; the sprite body is clipped at the
    /// right and bottom edges. Each row is 8 pixels wide, most significant bit
    /// leftmost. Returns true if any lit pixel was turned off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, rows: &[u8]) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let x = x as usize % self.width;
        let y = y as usize % self.height;
        let mut collision = false;

        for (i, row) in rows.iter().enumerate() {
            let pix_y = y + i;
            if pix_y >= self.height {
                break;
            }
            for j in 0..8 {
                let pix_x = x + j;
                if pix_x >= self.width {
                    break;
                }
                if row & (0x80 >> j) == 0 {
                    continue;
                }
                let cell = &mut self.cells[pix_y * self.width + pix_x];
                if *cell == PIXEL_ON {
                    collision = true;
                }
                *cell ^= PIXEL_ON;
            }
        }
        collision
    }

    /// Sample the grid into the frontend's fixed 64x32 display. Cells outside
    /// this grid stay dark.
    pub fn to_display(&self) -> chip8_base::Display {
        let lit = Pixel::try_from(1_u8).unwrap_or_default();
        let mut display = [[Pixel::default(); DEFAULT_WIDTH]; DEFAULT_HEIGHT];
        for (y, row) in display.iter_mut().enumerate() {
            for (x, pixel) in row.iter_mut().enumerate() {
                if self.is_lit(x, y) {
                    *pixel = lit;
                }
            }
        }
        display
    }
}

impl Default for Video {
    fn default() -> Self {
        Video::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}
