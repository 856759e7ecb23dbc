use super::cache::TileCache;
use super::compositor::{flip_block, Compositor, Flip, Pixel, TileBlock, TilePalette};
use super::frame::{CompactFrame, Frame, TrueColorFrame};
use super::pattern::{PatternMemory, TileId};
use super::registers::{PpuCtrl, PpuMask};
use super::{Nametables, Ppu};

pub const SPRITE_COUNT: usize = 64;

// OAM positions at or past these park a sprite off screen.
const SPRITE_HIDDEN_Y: u8 = 0xEF;
const SPRITE_HIDDEN_X: u8 = 0xF9;

const NAMETABLE_COLUMNS: usize = 32;
const NAMETABLE_ROWS: usize = 30;
const STATUS_BAR_ROWS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sprite {
    pub index: usize,
    pub y: u8,
    pub tile: u8,
    pub attributes: u8,
    pub x: u8,
}

impl Sprite {
    pub fn from_oam(oam: &[u8; 256], index: usize) -> Self {
        let base = (index % SPRITE_COUNT) * 4;
        Sprite {
            index: index % SPRITE_COUNT,
            y: oam[base],
            tile: oam[base + 1],
            attributes: oam[base + 2],
            x: oam[base + 3],
        }
    }

    pub fn is_visible(&self) -> bool {
        self.y < SPRITE_HIDDEN_Y && self.x < SPRITE_HIDDEN_X
    }

    pub fn behind_background(&self) -> bool {
        self.attributes & 0x20 != 0
    }

    pub fn flip(&self) -> Flip {
        Flip::from_sprite_attributes(self.attributes)
    }

    pub fn palette(&self) -> TilePalette {
        TilePalette::sprite(self.attributes & 0x03)
    }

    /// Sprite 0 showing tile $FF is part of the status bar coin and always
    /// draws in front of the background.
    pub fn is_coin_indicator(&self) -> bool {
        self.index == 0 && self.tile == 0xFF
    }

    fn screen_x(&self) -> i32 {
        self.x as i32
    }

    fn screen_y(&self) -> i32 {
        // Sprite data is delayed by one scanline
        self.y as i32 + 1
    }
}

/// Where one background tile lands on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundPlacement {
    pub addr: u16,
    pub x: i32,
    pub y: i32,
}

/// Background tiles for one frame: the fixed status bar rows, then the
/// playfield rows scrolled by `scroll_x` (0-511).
pub fn background_placements(scroll_x: i32) -> impl Iterator<Item = BackgroundPlacement> {
    let status_bar = (0..NAMETABLE_COLUMNS).flat_map(|column| {
        (0..STATUS_BAR_ROWS).map(move |row| BackgroundPlacement {
            addr: 0x2000 + (row * NAMETABLE_COLUMNS + column) as u16,
            x: column as i32 * 8,
            y: row as i32 * 8,
        })
    });

    let first_column = scroll_x / 8;
    let last_column = (scroll_x + 256) / 8;
    let playfield = (first_column..=last_column).flat_map(move |column| {
        (STATUS_BAR_ROWS..NAMETABLE_ROWS).map(move |row| BackgroundPlacement {
            addr: playfield_addr(column, row),
            x: column * 8 - scroll_x,
            y: row as i32 * 8,
        })
    });

    status_bar.chain(playfield)
}

fn playfield_addr(column: i32, row: usize) -> u16 {
    let (base, column) = match column {
        0..=31 => (0x2000, column),
        32..=63 => (0x2400, column - 32),
        _ => (0x2800, column - 64),
    };
    base + (row * NAMETABLE_COLUMNS) as u16 + column as u16
}

/// Behind-background pass: lowest index drawn last so it ends on top.
fn behind_pass_order() -> impl Iterator<Item = usize> {
    (0..SPRITE_COUNT).rev()
}

/// Front pass: sprite 0 first, then 63 down to 1.
fn front_pass_order() -> impl Iterator<Item = usize> {
    (1..=SPRITE_COUNT).rev().map(|j| j % SPRITE_COUNT)
}

/// Supplies colored tile blocks to the frame renderer. Background pixels
/// are `None` where they leave the frame untouched.
trait TileSource<P: Pixel> {
    fn background(&mut self, tile: TileId, attribute: u8) -> TileBlock<Option<P>>;
    fn sprite(&mut self, tile: TileId, palette: TilePalette, flip: Flip) -> TileBlock<P>;
}

/// Decodes every tile on demand.
struct Direct<'a, C: ?Sized> {
    compositor: Compositor<'a, C>,
}

impl<C: PatternMemory + ?Sized, P: Pixel> TileSource<P> for Direct<'_, C> {
    /// Pattern index 0 is see-through, whatever color it maps to.
    fn background(&mut self, tile: TileId, attribute: u8) -> TileBlock<Option<P>> {
        let indices = self.compositor.decode(tile);
        let colors: TileBlock<P> = self.compositor.compose(tile, TilePalette::background(attribute));
        std::array::from_fn(|i| (indices[i] != 0).then_some(colors[i]))
    }

    fn sprite(&mut self, tile: TileId, palette: TilePalette, flip: Flip) -> TileBlock<P> {
        flip_block(&self.compositor.compose(tile, palette), flip)
    }
}

/// Serves RGB565 tiles out of the tile cache.
struct Cached<'a, C: ?Sized> {
    compositor: Compositor<'a, C>,
    cache: &'a mut TileCache,
    universal: u16,
}

impl<C: PatternMemory + ?Sized> TileSource<u16> for Cached<'_, C> {
    /// Cached tiles carry colors only, so a pixel matching the universal
    /// color counts as see-through.
    fn background(&mut self, tile: TileId, attribute: u8) -> TileBlock<Option<u16>> {
        let pixels = *self
            .cache
            .base_tile(&self.compositor, tile, TilePalette::background(attribute));
        pixels.map(|pixel| (pixel != self.universal).then_some(pixel))
    }

    fn sprite(&mut self, tile: TileId, palette: TilePalette, flip: Flip) -> TileBlock<u16> {
        *self.cache.flipped_tile(&self.compositor, tile, palette, flip)
    }
}

/// Register state one frame is rendered from.
struct FrameState<'a> {
    nametables: Nametables<'a>,
    oam: &'a [u8; 256],
    ctrl: PpuCtrl,
    mask: PpuMask,
    scroll_x: i32,
}

impl FrameState<'_> {
    fn render<P: Pixel, S: TileSource<P>>(&self, source: &mut S, universal: P, frame: &mut Frame<P>) {
        frame.fill(universal);

        let show_sprites = self.mask.contains(PpuMask::SHOW_SPR);

        if show_sprites {
            for index in behind_pass_order() {
                let sprite = Sprite::from_oam(self.oam, index);
                if !sprite.behind_background() || !sprite.is_visible() {
                    continue;
                }
                let pixels = source.sprite(self.ctrl.sprite_tile(sprite.tile), sprite.palette(), sprite.flip());
                blit_sprite(frame, &pixels, &sprite);
            }
        }

        if self.mask.contains(PpuMask::SHOW_BG) {
            for placement in background_placements(self.scroll_x) {
                let tile = self.nametables.tile(placement.addr);
                let attribute = self.nametables.attribute(placement.addr);
                let pixels = source.background(tile, attribute);
                blit_background(frame, &pixels, placement.x, placement.y);
            }
        }

        if show_sprites {
            for index in front_pass_order() {
                let sprite = Sprite::from_oam(self.oam, index);
                if sprite.behind_background() && !sprite.is_coin_indicator() {
                    continue;
                }
                if !sprite.is_visible() {
                    continue;
                }
                let mut pixels = source.sprite(self.ctrl.sprite_tile(sprite.tile), sprite.palette(), sprite.flip());
                if sprite.is_coin_indicator() {
                    punch_coin_gap(&mut pixels, sprite.flip());
                }
                blit_sprite(frame, &pixels, &sprite);
            }
        }
    }
}

/// See-through background pixels keep whatever is already there, so
/// behind-background sprites show through them.
fn blit_background<P: Pixel>(frame: &mut Frame<P>, pixels: &TileBlock<Option<P>>, x: i32, y: i32) {
    for (i, pixel) in pixels.iter().enumerate() {
        if let Some(pixel) = *pixel {
            frame.set_pixel(x + (i % 8) as i32, y + (i / 8) as i32, pixel);
        }
    }
}

fn blit_sprite<P: Pixel>(frame: &mut Frame<P>, pixels: &TileBlock<P>, sprite: &Sprite) {
    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel == P::TRANSPARENT {
            continue;
        }
        frame.set_pixel(sprite.screen_x() + (i % 8) as i32, sprite.screen_y() + (i / 8) as i32, pixel);
    }
}

/// The coin never draws row 5, pattern bits 4 and 5 (unflipped columns 3 and 2).
fn punch_coin_gap<P: Pixel>(pixels: &mut TileBlock<P>, flip: Flip) {
    let row = if flip.contains(Flip::VERTICAL) { 2 } else { 5 };
    for column in [2, 3] {
        let column = if flip.contains(Flip::HORIZONTAL) { 7 - column } else { column };
        pixels[row * 8 + column] = P::TRANSPARENT;
    }
}

impl<C: PatternMemory> Ppu<C> {
    fn frame_state(&self) -> FrameState<'_> {
        FrameState {
            nametables: self.nametables(),
            oam: &self.oam,
            ctrl: self.ctrl,
            mask: self.mask,
            scroll_x: self.scroll_origin(),
        }
    }

    /// Horizontal scroll including the nametable select bit (0-511).
    pub fn scroll_origin(&self) -> i32 {
        self.scroll_x as i32 + self.ctrl.scroll_x_base()
    }

    /// Render the full frame as opaque 0xAARRGGBB.
    pub fn render(&self, frame: &mut TrueColorFrame) {
        let compositor = Compositor::new(&self.chr, &self.palette_ram, &self.master_palette);
        let universal = compositor.universal::<u32>();
        self.frame_state().render(&mut Direct { compositor }, universal, frame);
    }

    /// Render the full frame as RGB565 through the tile cache.
    pub fn render_compact(&mut self, frame: &mut CompactFrame) {
        // Field borrows only: the tile cache is borrowed mutably below
        let state = FrameState {
            nametables: Nametables::new(&self.vram, self.mirroring, self.ctrl),
            oam: &self.oam,
            ctrl: self.ctrl,
            mask: self.mask,
            scroll_x: self.scroll_origin(),
        };
        let compositor = Compositor::new(&self.chr, &self.palette_ram, &self.master_palette);
        let universal = compositor.universal::<u16>();
        let mut source = Cached {
            compositor,
            cache: &mut self.tile_cache,
            universal,
        };
        state.render(&mut source, universal, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu::frame::{FRAME_HEIGHT, FRAME_WIDTH};
    use crate::ppu::palette::{rgb_to_rgb565, MasterPalette};

    const BLANK: u8 = 0x00;
    const SOLID: u8 = 0x01; // every pixel index 1
    const CORNER: u8 = 0x02; // top-left pixel index 3
    const COIN: u8 = 0xFF;

    const UNIVERSAL: u8 = 0x0F;
    const BG_COLOR: u8 = 0x21;
    const SPRITE0_COLOR: u8 = 0x30;
    const SPRITE1_COLOR: u8 = 0x11;

    fn test_chr() -> Vec<u8> {
        let mut chr = vec![0u8; 0x2000];
        for row in 0..8 {
            chr[SOLID as usize * 16 + row] = 0xFF;
            chr[COIN as usize * 16 + row] = 0xFF;
        }
        chr[CORNER as usize * 16] = 0x80;
        chr[CORNER as usize * 16 + 8] = 0x80;
        chr
    }

    fn write_vram(ppu: &mut Ppu<Vec<u8>>, addr: u16, bytes: &[u8]) {
        ppu.write_register(0x2006, (addr >> 8) as u8);
        ppu.write_register(0x2006, addr as u8);
        for &b in bytes {
            ppu.write_register(0x2007, b);
        }
    }

    fn set_sprite(ppu: &mut Ppu<Vec<u8>>, index: usize, y: u8, tile: u8, attributes: u8, x: u8) {
        ppu.oam[index * 4..index * 4 + 4].copy_from_slice(&[y, tile, attributes, x]);
    }

    fn test_ppu() -> Ppu<Vec<u8>> {
        let mut ppu = Ppu::new(test_chr());
        let mut palette = [UNIVERSAL; 32];
        palette[0x01] = BG_COLOR;
        palette[0x03] = 0x16;
        palette[0x11] = SPRITE0_COLOR;
        palette[0x13] = 0x27;
        palette[0x15] = SPRITE1_COLOR;
        write_vram(&mut ppu, 0x3F00, &palette);
        ppu.write_register(0x2001, 0x18); // background + sprites
        ppu
    }

    fn argb(color: u8) -> u32 {
        0xFF00_0000 | MasterPalette::default().rgb(color)
    }

    fn rgb565(color: u8) -> u16 {
        rgb_to_rgb565(MasterPalette::default().rgb(color))
    }

    fn render(ppu: &Ppu<Vec<u8>>) -> TrueColorFrame {
        let mut frame = TrueColorFrame::new();
        ppu.render(&mut frame);
        frame
    }

    fn render_compact(ppu: &mut Ppu<Vec<u8>>) -> CompactFrame {
        let mut frame = CompactFrame::new();
        ppu.render_compact(&mut frame);
        frame
    }

    fn block<P: Copy>(frame: &Frame<P>, x: usize, y: usize) -> Vec<P> {
        (0..64).map(|i| frame.pixel(x + i % 8, y + i / 8)).collect()
    }

    #[test]
    fn test_single_tile_end_to_end() {
        let mut chr = vec![0u8; 0x2000];
        chr[0] = 0b0000_0001;
        chr[8] = 0b0000_0000;
        let mut ppu = Ppu::new(chr);
        write_vram(&mut ppu, 0x3F00, &[0x0F, 0x21]);
        // Tile 0 at column 0, row 4; every other cell points at tile 1 (empty)
        let mut nametable = [1u8; 960];
        nametable[4 * 32] = 0;
        write_vram(&mut ppu, 0x2000, &nametable);
        ppu.write_register(0x2001, 0x08);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(7, 32), argb(0x21));
        for x in 0..7 {
            assert_eq!(frame.pixel(x, 32), argb(0x0F), "x = {}", x);
        }
        assert_eq!(frame.pixel(7, 33), argb(0x0F));
    }

    #[test]
    fn test_rendering_disabled_fills_universal() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2000, &[SOLID; 64]);
        set_sprite(&mut ppu, 1, 50, SOLID, 0, 50);
        ppu.write_register(0x2001, 0x00);

        let frame = render(&ppu);
        assert!(frame.data().iter().all(|&p| p == argb(UNIVERSAL)));
        let compact = render_compact(&mut ppu);
        assert!(compact.data().iter().all(|&p| p == rgb565(UNIVERSAL)));
    }

    #[test]
    fn test_status_bar_ignores_scroll() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2000, &[SOLID]); // status bar (0, 0)
        write_vram(&mut ppu, 0x2081, &[SOLID]); // playfield (1, 4)
        ppu.write_register(0x2005, 8);
        ppu.write_register(0x2005, 0);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(0, 0), argb(BG_COLOR));
        assert_eq!(frame.pixel(8, 0), argb(UNIVERSAL));
        assert_eq!(frame.pixel(0, 32), argb(BG_COLOR));
        assert_eq!(frame.pixel(7, 39), argb(BG_COLOR));
        assert_eq!(frame.pixel(8, 32), argb(UNIVERSAL));
    }

    #[test]
    fn test_fine_scroll_splits_tiles() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2081, &[SOLID]); // playfield (1, 4) = x 8..16
        ppu.write_register(0x2005, 3);
        ppu.write_register(0x2005, 0);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(4, 32), argb(UNIVERSAL));
        assert_eq!(frame.pixel(5, 32), argb(BG_COLOR));
        assert_eq!(frame.pixel(12, 32), argb(BG_COLOR));
        assert_eq!(frame.pixel(13, 32), argb(UNIVERSAL));
    }

    #[test]
    fn test_nametable_select_scrolls_into_second_table() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2480, &[SOLID]); // nametable 1, (0, 4)
        ppu.write_register(0x2000, 0x01);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(0, 32), argb(BG_COLOR));
        assert_eq!(frame.pixel(8, 32), argb(UNIVERSAL));
    }

    #[test]
    fn test_scroll_reaches_third_window() {
        let mut ppu = test_ppu();
        // Vertical mirroring maps $2800 onto nametable 0
        write_vram(&mut ppu, 0x2080, &[SOLID]);
        ppu.write_register(0x2000, 0x01);
        ppu.write_register(0x2005, 0xF8); // scroll 504: column 63 at x 0, column 64 at x 8
        ppu.write_register(0x2005, 0);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(8, 32), argb(BG_COLOR));
        assert_eq!(frame.pixel(0, 32), argb(UNIVERSAL));
    }

    #[test]
    fn test_attribute_selects_background_palette() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x3F05, &[0x2A]); // background palette 1, index 1
        write_vram(&mut ppu, 0x2082, &[SOLID]); // (2, 4): attribute cell (0, 1), quadrant x 1
        write_vram(&mut ppu, 0x23C8, &[0b0000_0100]);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(16, 32), argb(0x2A));
    }

    #[test]
    fn test_hidden_sprites_draw_nothing() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 1, 0xEF, SOLID, 0, 20);
        set_sprite(&mut ppu, 2, 20, SOLID, 0, 0xF9);
        set_sprite(&mut ppu, 3, 0xEF, SOLID, 0x20, 100);

        let frame = render(&ppu);
        assert!(frame.data().iter().all(|&p| p == argb(UNIVERSAL)));
        let compact = render_compact(&mut ppu);
        assert!(compact.data().iter().all(|&p| p == rgb565(UNIVERSAL)));
    }

    #[test]
    fn test_sprite_at_edge_is_clipped() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 1, 0xEE, SOLID, 0, 0xF8);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(0xF8, FRAME_HEIGHT - 1), argb(SPRITE0_COLOR));
        assert_eq!(frame.pixel(FRAME_WIDTH - 1, FRAME_HEIGHT - 1), argb(SPRITE0_COLOR));
        assert_eq!(frame.pixel(0xF8, FRAME_HEIGHT - 2), argb(UNIVERSAL));
    }

    #[test]
    fn test_sprite_drawn_one_line_down() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 1, 100, CORNER, 0, 60);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(60, 100), argb(UNIVERSAL));
        assert_eq!(frame.pixel(60, 101), argb(0x27)); // index 3 of sprite palette 0
        assert_eq!(frame.pixel(61, 101), argb(UNIVERSAL));
    }

    #[test]
    fn test_sprite_flips() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 1, 9, CORNER, 0x40, 0); // horizontal
        set_sprite(&mut ppu, 2, 19, CORNER, 0x80, 0); // vertical
        set_sprite(&mut ppu, 3, 29, CORNER, 0xC0, 0); // both

        let frame = render(&ppu);
        assert_eq!(frame.pixel(7, 10), argb(0x27));
        assert_eq!(frame.pixel(0, 27), argb(0x27));
        assert_eq!(frame.pixel(7, 37), argb(0x27));
        assert_eq!(frame.pixel(0, 10), argb(UNIVERSAL));

        let compact = render_compact(&mut ppu);
        assert_eq!(compact.pixel(7, 10), rgb565(0x27));
        assert_eq!(compact.pixel(0, 27), rgb565(0x27));
        assert_eq!(compact.pixel(7, 37), rgb565(0x27));
    }

    #[test]
    fn test_lower_index_sprite_wins() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 1, 50, SOLID, 0x00, 50);
        set_sprite(&mut ppu, 2, 50, SOLID, 0x01, 54);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(55, 51), argb(SPRITE0_COLOR));
        assert_eq!(frame.pixel(58, 51), argb(SPRITE1_COLOR));
    }

    #[test]
    fn test_front_pass_draws_sprite_zero_first() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 0, 50, SOLID, 0x00, 50);
        set_sprite(&mut ppu, 63, 50, SOLID, 0x01, 50);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(50, 51), argb(SPRITE1_COLOR));
    }

    #[test]
    fn test_behind_background_priority() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x20A2, &[SOLID]); // (2, 5) -> x 16, y 40
        set_sprite(&mut ppu, 5, 39, SOLID, 0x20, 16); // hidden by the solid tile
        set_sprite(&mut ppu, 6, 39, SOLID, 0x20, 40); // over a blank tile

        let frame = render(&ppu);
        assert!(block(&frame, 16, 40).iter().all(|&p| p == argb(BG_COLOR)));
        assert!(block(&frame, 40, 40).iter().all(|&p| p == argb(SPRITE0_COLOR)));

        let compact = render_compact(&mut ppu);
        assert!(block(&compact, 16, 40).iter().all(|&p| p == rgb565(BG_COLOR)));
        assert!(block(&compact, 40, 40).iter().all(|&p| p == rgb565(SPRITE0_COLOR)));
    }

    #[test]
    fn test_behind_sprite_shows_through_transparent_background_pixels() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x20A2, &[CORNER]);
        set_sprite(&mut ppu, 5, 39, SOLID, 0x20, 16);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(16, 40), argb(0x16)); // background index 3
        assert_eq!(frame.pixel(17, 40), argb(SPRITE0_COLOR));
        assert_eq!(frame.pixel(23, 47), argb(SPRITE0_COLOR));
    }

    #[test]
    fn test_black_background_hides_behind_sprite_in_true_color() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x3F01, &[0x0D]); // black, like the universal 0x0F
        write_vram(&mut ppu, 0x20A2, &[SOLID]);
        set_sprite(&mut ppu, 1, 39, SOLID, 0x20, 16);

        let frame = render(&ppu);
        assert!(block(&frame, 16, 40).iter().all(|&p| p == argb(0x0D)));

        // The compact path only sees colors, so the sprite shows through
        let compact = render_compact(&mut ppu);
        assert!(block(&compact, 16, 40).iter().all(|&p| p == rgb565(SPRITE0_COLOR)));
    }

    #[test]
    fn test_coin_indicator_always_in_front() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x20A2, &[SOLID]);
        set_sprite(&mut ppu, 0, 39, COIN, 0x20, 16);

        let frame = render(&ppu);
        for y in 0..8 {
            for x in 0..8 {
                let expected = if y == 5 && (x == 2 || x == 3) { BG_COLOR } else { SPRITE0_COLOR };
                assert_eq!(frame.pixel(16 + x, 40 + y), argb(expected), "({}, {})", x, y);
            }
        }

        let compact = render_compact(&mut ppu);
        assert_eq!(compact.pixel(16, 40), rgb565(SPRITE0_COLOR));
        assert_eq!(compact.pixel(18, 45), rgb565(BG_COLOR));
        assert_eq!(compact.pixel(19, 45), rgb565(BG_COLOR));
        assert_eq!(compact.pixel(20, 45), rgb565(SPRITE0_COLOR));
    }

    #[test]
    fn test_coin_gap_follows_flip() {
        let mut ppu = test_ppu();
        set_sprite(&mut ppu, 0, 39, COIN, 0xC0, 16);

        let frame = render(&ppu);
        assert_eq!(frame.pixel(16 + 4, 40 + 2), argb(UNIVERSAL));
        assert_eq!(frame.pixel(16 + 5, 40 + 2), argb(UNIVERSAL));
        assert_eq!(frame.pixel(16 + 2, 40 + 5), argb(SPRITE0_COLOR));
    }

    #[test]
    fn test_coin_rule_only_for_sprite_zero() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x20A2, &[SOLID]);
        set_sprite(&mut ppu, 1, 39, COIN, 0x20, 16);

        let frame = render(&ppu);
        assert!(block(&frame, 16, 40).iter().all(|&p| p == argb(BG_COLOR)));
    }

    #[test]
    fn test_compact_matches_true_color() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2000, &[SOLID, CORNER, SOLID]);
        write_vram(&mut ppu, 0x2090, &[CORNER, SOLID, SOLID, CORNER]);
        set_sprite(&mut ppu, 1, 40, SOLID, 0x41, 130);
        set_sprite(&mut ppu, 2, 31, CORNER, 0x20, 128);
        ppu.write_register(0x2005, 21);
        ppu.write_register(0x2005, 0);

        let true_color = render(&ppu);
        let compact = render_compact(&mut ppu);
        for (rgb, p565) in true_color.data().iter().zip(compact.data()) {
            assert_eq!(rgb_to_rgb565(*rgb), *p565);
        }
    }

    #[test]
    fn test_cached_tiles_reused_across_frames() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2085, &[CORNER]); // (5, 4)
        let first = render_compact(&mut ppu);
        let misses = ppu.tile_cache().stats().base_misses;

        // Move the tile: a different frame that references the same tile and palette
        write_vram(&mut ppu, 0x2085, &[BLANK]);
        write_vram(&mut ppu, 0x20C9, &[CORNER]); // (9, 6)
        let second = render_compact(&mut ppu);

        assert_eq!(block(&first, 40, 32), block(&second, 72, 48));
        assert_eq!(ppu.tile_cache().stats().base_misses, misses);
        assert!(ppu.tile_cache().stats().base_hits > 0);
    }

    #[test]
    fn test_palette_write_recolors_cached_tiles() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2085, &[SOLID]);
        set_sprite(&mut ppu, 1, 99, SOLID, 0x40, 99);
        let before = render_compact(&mut ppu);

        write_vram(&mut ppu, 0x3F01, &[0x2A]);
        write_vram(&mut ppu, 0x3F11, &[0x27]);
        let after = render_compact(&mut ppu);

        assert_eq!(before.pixel(40, 32), rgb565(BG_COLOR));
        assert_eq!(after.pixel(40, 32), rgb565(0x2A));
        assert_eq!(before.pixel(100, 100), rgb565(SPRITE0_COLOR));
        assert_eq!(after.pixel(100, 100), rgb565(0x27));
    }

    #[test]
    fn test_master_palette_swap_recolors() {
        let mut ppu = test_ppu();
        write_vram(&mut ppu, 0x2085, &[SOLID]);
        render_compact(&mut ppu);

        let mut colors = [0u32; 64];
        colors[BG_COLOR as usize] = 0xFF0000;
        ppu.set_master_palette(MasterPalette::new(colors));
        let frame = render_compact(&mut ppu);
        assert_eq!(frame.pixel(40, 32), 0xF800);
    }

    #[test]
    fn test_background_placements_cover_screen() {
        let placements: Vec<_> = background_placements(0).collect();
        assert_eq!(placements.len(), 32 * 4 + 33 * 26);
        assert_eq!(placements[0], BackgroundPlacement { addr: 0x2000, x: 0, y: 0 });

        let scrolled: Vec<_> = background_placements(300).filter(|p| p.y == 32).collect();
        assert_eq!(scrolled.first().map(|p| (p.addr, p.x)), Some((0x2485, -4)));
        assert_eq!(scrolled.last().map(|p| (p.addr, p.x)), Some((0x2885, 252)));
    }

    #[test]
    fn test_front_pass_order() {
        let order: Vec<_> = front_pass_order().collect();
        assert_eq!(order[0], 0);
        assert_eq!(order[1], 63);
        assert_eq!(order[63], 1);
        assert_eq!(order.len(), 64);
    }
}
