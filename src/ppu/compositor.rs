use bitflags::bitflags;

use super::palette::{rgb_to_rgb565, MasterPalette};
use super::pattern::{PatternMemory, TileId};

pub const TILE_PIXELS: usize = 64;

/// An 8x8 block in row-major order, leftmost pixel first.
pub type TileBlock<P> = [P; TILE_PIXELS];

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flip: u8 {
        const HORIZONTAL = 0b01;
        const VERTICAL   = 0b10;
    }
}

impl Flip {
    pub fn from_sprite_attributes(attributes: u8) -> Self {
        let mut flip = Flip::empty();
        flip.set(Flip::HORIZONTAL, attributes & 0x40 != 0);
        flip.set(Flip::VERTICAL, attributes & 0x80 != 0);
        flip
    }
}

/// Which four palette RAM entries a tile is colored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TilePalette {
    /// Background palette picked from the attribute table (0-3).
    Background { attribute: u8 },
    /// Sprite palette 0-3 from the OAM attribute byte.
    Sprite(u8),
}

impl TilePalette {
    pub fn background(attribute: u8) -> Self {
        TilePalette::Background {
            attribute: attribute & 0x03,
        }
    }

    pub fn sprite(palette: u8) -> Self {
        TilePalette::Sprite(palette & 0x03)
    }

    /// 0 for background tiles, 1-4 for sprite palettes 0-3.
    pub fn selector(self) -> u8 {
        match self {
            TilePalette::Background { .. } => 0,
            TilePalette::Sprite(palette) => (palette & 0x03) + 1,
        }
    }

    pub fn attribute(self) -> u8 {
        match self {
            TilePalette::Background { attribute } => attribute & 0x03,
            TilePalette::Sprite(_) => 0,
        }
    }
}

/// Output pixel encoding.
pub trait Pixel: Copy + PartialEq {
    /// Marker left in sprite blocks where the pattern index is 0.
    const TRANSPARENT: Self;

    fn from_rgb(rgb: u32) -> Self;

    /// Like `from_rgb`, but never collides with `TRANSPARENT`.
    fn opaque_from_rgb(rgb: u32) -> Self;
}

impl Pixel for u32 {
    const TRANSPARENT: u32 = 0;

    fn from_rgb(rgb: u32) -> u32 {
        0xFF00_0000 | (rgb & 0x00FF_FFFF)
    }

    fn opaque_from_rgb(rgb: u32) -> u32 {
        Self::from_rgb(rgb)
    }
}

impl Pixel for u16 {
    const TRANSPARENT: u16 = 0;

    fn from_rgb(rgb: u32) -> u16 {
        rgb_to_rgb565(rgb)
    }

    fn opaque_from_rgb(rgb: u32) -> u16 {
        // Pure black becomes the darkest blue so it stays visible.
        rgb_to_rgb565(rgb).max(1)
    }
}

/// Turns pattern data plus palette RAM into colored 8x8 blocks.
pub struct Compositor<'a, C: ?Sized> {
    chr: &'a C,
    palette_ram: &'a [u8; 32],
    master: &'a MasterPalette,
}

impl<'a, C: PatternMemory + ?Sized> Compositor<'a, C> {
    pub fn new(chr: &'a C, palette_ram: &'a [u8; 32], master: &'a MasterPalette) -> Self {
        Compositor {
            chr,
            palette_ram,
            master,
        }
    }

    /// 2-bit pattern indices in natural orientation. Bit 7 of each plane is
    /// the leftmost pixel.
    pub fn decode(&self, tile: TileId) -> TileBlock<u8> {
        let mut block = [0u8; TILE_PIXELS];
        for row in 0..8u8 {
            let plane1 = self.chr.read_plane(tile.get(), row);
            let plane2 = self.chr.read_plane(tile.get(), row + 8);

            for column in 0..8usize {
                let index = ((plane1 >> column) & 1) | (((plane2 >> column) & 1) << 1);
                block[row as usize * 8 + (7 - column)] = index;
            }
        }
        block
    }

    /// Palette RAM value for a pattern index, `None` for transparent sprite pixels.
    pub fn color_index(&self, palette: TilePalette, index: u8) -> Option<u8> {
        let index = index & 0x03;
        match palette {
            TilePalette::Background { .. } if index == 0 => Some(self.palette_ram[0]),
            TilePalette::Background { attribute } => {
                Some(self.palette_ram[((attribute & 0x03) * 4 + index) as usize])
            }
            TilePalette::Sprite(_) if index == 0 => None,
            TilePalette::Sprite(sprite) => {
                Some(self.palette_ram[0x10 + ((sprite & 0x03) * 4 + index) as usize])
            }
        }
    }

    pub fn universal<P: Pixel>(&self) -> P {
        P::from_rgb(self.master.rgb(self.palette_ram[0]))
    }

    pub fn compose<P: Pixel>(&self, tile: TileId, palette: TilePalette) -> TileBlock<P> {
        self.decode(tile).map(|index| match self.color_index(palette, index) {
            None => P::TRANSPARENT,
            Some(color) => match palette {
                TilePalette::Background { .. } => P::from_rgb(self.master.rgb(color)),
                TilePalette::Sprite(_) => P::opaque_from_rgb(self.master.rgb(color)),
            },
        })
    }
}

/// Remap `(row, col)` to `(7 - row, 7 - col)` per the requested axes.
pub fn flip_block<T: Copy>(block: &TileBlock<T>, flip: Flip) -> TileBlock<T> {
    if flip.is_empty() {
        return *block;
    }

    let mut flipped = *block;
    for row in 0..8 {
        let dst_row = if flip.contains(Flip::VERTICAL) { 7 - row } else { row };
        for column in 0..8 {
            let dst_column = if flip.contains(Flip::HORIZONTAL) { 7 - column } else { column };
            flipped[dst_row * 8 + dst_column] = block[row * 8 + column];
        }
    }
    flipped
}

/// Shift of a tile's 2-bit palette within its attribute byte (0, 2, 4 or 6).
pub fn attribute_shift(tile_x: usize, tile_y: usize) -> u8 {
    let quad_x = (tile_x / 2) & 1;
    let quad_y = (tile_y / 2) & 1;
    (quad_y * 4 + quad_x * 2) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_with_row(row: usize, plane1: u8, plane2: u8) -> Vec<u8> {
        let mut chr = vec![0u8; 0x2000];
        chr[row] = plane1;
        chr[row + 8] = plane2;
        chr
    }

    fn palette_ram() -> [u8; 32] {
        let mut ram = [0u8; 32];
        for (i, entry) in ram.iter_mut().enumerate() {
            *entry = i as u8;
        }
        ram
    }

    #[test]
    fn test_decode_bit_order() {
        let chr = tile_with_row(2, 0b1000_0001, 0b1000_0000);
        let ram = palette_ram();
        let master = MasterPalette::default();
        let compositor = Compositor::new(&chr[..], &ram, &master);

        let block = compositor.decode(TileId::from_table(false, 0));
        assert_eq!(block[2 * 8], 3); // bit 7 of both planes
        assert_eq!(block[2 * 8 + 7], 1); // bit 0 of plane 1
        assert!(block[2 * 8 + 1..2 * 8 + 7].iter().all(|&i| i == 0));
        assert!(block[..16].iter().all(|&i| i == 0));
    }

    #[test]
    fn test_color_index_background() {
        let chr = vec![0u8; 0x2000];
        let ram = palette_ram();
        let master = MasterPalette::default();
        let compositor = Compositor::new(&chr[..], &ram, &master);

        let palette = TilePalette::background(2);
        assert_eq!(compositor.color_index(palette, 0), Some(0)); // universal
        assert_eq!(compositor.color_index(palette, 1), Some(9));
        assert_eq!(compositor.color_index(palette, 3), Some(11));
    }

    #[test]
    fn test_color_index_sprite() {
        let chr = vec![0u8; 0x2000];
        let ram = palette_ram();
        let master = MasterPalette::default();
        let compositor = Compositor::new(&chr[..], &ram, &master);

        let palette = TilePalette::sprite(3);
        assert_eq!(compositor.color_index(palette, 0), None);
        assert_eq!(compositor.color_index(palette, 1), Some(0x1D));
        assert_eq!(compositor.color_index(palette, 3), Some(0x1F));
    }

    #[test]
    fn test_compose_background_never_transparent() {
        let chr = tile_with_row(0, 0b0000_0001, 0);
        let mut ram = [0u8; 32];
        ram[0] = 0x0F;
        ram[1] = 0x21;
        let master = MasterPalette::default();
        let compositor = Compositor::new(&chr[..], &ram, &master);

        let block: TileBlock<u32> =
            compositor.compose(TileId::from_table(false, 0), TilePalette::background(0));
        assert_eq!(block[7], 0xFF3C_BCFC);
        assert!(block.iter().enumerate().filter(|&(i, _)| i != 7).all(|(_, &p)| p == 0xFF00_0000));
    }

    #[test]
    fn test_compose_sprite_keeps_black_visible() {
        let chr = tile_with_row(0, 0b1000_0000, 0);
        let mut ram = [0u8; 32];
        ram[0x11] = 0x0F; // sprite palette 0, index 1 = black
        let master = MasterPalette::default();
        let compositor = Compositor::new(&chr[..], &ram, &master);

        let block: TileBlock<u16> =
            compositor.compose(TileId::from_table(false, 0), TilePalette::sprite(0));
        assert_eq!(block[0], 1);
        assert!(block[1..].iter().all(|&p| p == u16::TRANSPARENT));
    }

    #[test]
    fn test_flip_block() {
        let block: TileBlock<u8> = std::array::from_fn(|i| i as u8);

        let h = flip_block(&block, Flip::HORIZONTAL);
        assert_eq!(h[0], 7);
        assert_eq!(h[8 * 3 + 2], (8 * 3 + 5) as u8);

        let v = flip_block(&block, Flip::VERTICAL);
        assert_eq!(v[0], 56);
        assert_eq!(v[63], 7);

        let both = flip_block(&block, Flip::all());
        assert_eq!(both[0], 63);
        assert_eq!(both[63], 0);

        assert_eq!(flip_block(&block, Flip::empty()), block);
    }

    #[test]
    fn test_flip_from_sprite_attributes() {
        assert_eq!(Flip::from_sprite_attributes(0x40), Flip::HORIZONTAL);
        assert_eq!(Flip::from_sprite_attributes(0x80), Flip::VERTICAL);
        assert_eq!(Flip::from_sprite_attributes(0xE3), Flip::all());
        assert_eq!(Flip::from_sprite_attributes(0x23), Flip::empty());
    }

    #[test]
    fn test_attribute_shift() {
        assert_eq!(attribute_shift(0, 0), 0);
        assert_eq!(attribute_shift(2, 0), 2);
        assert_eq!(attribute_shift(1, 2), 4);
        assert_eq!(attribute_shift(3, 3), 6);
        assert_eq!(attribute_shift(5, 4), 2);
    }

    #[test]
    fn test_selector() {
        assert_eq!(TilePalette::background(3).selector(), 0);
        assert_eq!(TilePalette::sprite(0).selector(), 1);
        assert_eq!(TilePalette::sprite(3).selector(), 4);
        assert_eq!(TilePalette::sprite(3).attribute(), 0);
        assert_eq!(TilePalette::background(7).attribute(), 3);
    }
}
