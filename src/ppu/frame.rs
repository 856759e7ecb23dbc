pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// A 256x240 pixel buffer. The length is fixed at construction so renderers
/// never need to bounds-check the buffer itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<P> {
    data: Vec<P>,
}

/// 0xAARRGGBB output of [`Ppu::render`](super::Ppu::render).
pub type TrueColorFrame = Frame<u32>;
/// RGB565 output of [`Ppu::render_compact`](super::Ppu::render_compact).
pub type CompactFrame = Frame<u16>;

impl<P: Copy + Default> Default for Frame<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy + Default> Frame<P> {
    pub fn new() -> Self {
        Frame {
            data: vec![P::default(); FRAME_PIXELS],
        }
    }
}

impl<P: Copy> Frame<P> {
    pub fn filled(value: P) -> Self {
        Frame {
            data: vec![value; FRAME_PIXELS],
        }
    }

    pub fn fill(&mut self, value: P) {
        self.data.fill(value);
    }

    pub fn pixel(&self, x: usize, y: usize) -> P {
        self.data[y * FRAME_WIDTH + x]
    }

    /// Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, value: P) {
        if (0..FRAME_WIDTH as i32).contains(&x) && (0..FRAME_HEIGHT as i32).contains(&y) {
            self.data[y as usize * FRAME_WIDTH + x as usize] = value;
        }
    }

    pub fn row(&self, y: usize) -> &[P] {
        &self.data[y * FRAME_WIDTH..(y + 1) * FRAME_WIDTH]
    }

    pub fn data(&self) -> &[P] {
        &self.data
    }
}
