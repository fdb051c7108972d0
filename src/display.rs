pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
/// One bit per pixel, row-major, most significant bit first.
pub const BUFFER_SIZE: usize = WIDTH * HEIGHT / 8;

/// The monochrome framebuffer. Only the CPU mutates it; everyone else gets
/// copies through [`Display::render`].
pub struct Display {
    buffer: [u8; BUFFER_SIZE],
}

/// A snapshot of the framebuffer handed to the presentation layer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Frame([u8; BUFFER_SIZE]);

impl Default for Display {
    fn default() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
        }
    }
}

impl Display {
    pub fn clear(&mut self) {
        self.buffer = [0; BUFFER_SIZE];
    }

    /// XORs `rows` onto the screen with the top left corner at (x, y) and
    /// returns whether any lit pixel was switched off.
    ///
    /// The origin wraps around the screen. A bit that falls past the right
    /// edge wraps back onto the same row, while rows below the bottom edge
    /// are dropped.
    pub fn draw_sprite(&mut self, rows: &[u8], x: usize, y: usize) -> bool {
        let x = x % WIDTH;
        let y = y % HEIGHT;
        let mut collided = false;

        for (line, &row) in rows.iter().enumerate() {
            let py = y + line;
            if py >= HEIGHT {
                break;
            }

            for bit in 0..8 {
                if (row >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let px = (x + bit) % WIDTH;
                collided |= self.flip(px + py * WIDTH);
            }
        }

        collided
    }

    pub fn render(&self) -> Frame {
        Frame(self.buffer)
    }

    /// Toggles one pixel, returning whether it was lit before
    fn flip(&mut self, pixel: usize) -> bool {
        let mask = 0x80 >> (pixel % 8);
        let byte = &mut self.buffer[pixel / 8];
        let was_on = *byte & mask != 0;
        *byte ^= mask;
        was_on
    }
}

impl Frame {
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let pixel = x % WIDTH + (y % HEIGHT) * WIDTH;
        self.0[pixel / 8] & (0x80 >> (pixel % 8)) != 0
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&byte| byte == 0)
    }

    pub fn as_bytes(&self) -> &[u8; BUFFER_SIZE] {
        &self.0
    }

    /// The frame as a row-major grid of lit/unlit pixels
    pub fn to_grid(&self) -> [[bool; WIDTH]; HEIGHT] {
        let mut grid = [[false; WIDTH]; HEIGHT];
        for (y, row) in grid.iter_mut().enumerate() {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = self.pixel(x, y);
            }
        }
        grid
    }
}
