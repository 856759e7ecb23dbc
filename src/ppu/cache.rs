use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::compositor::{flip_block, Compositor, Flip, TileBlock, TilePalette, TILE_PIXELS};
use super::pattern::{PatternMemory, TileId, TILE_COUNT};

/// Selectors 0-7 per tile; only 0-4 are produced by [`TilePalette`].
const SELECTORS: usize = 8;
pub const BASE_CAPACITY: usize = TILE_COUNT * SELECTORS;

// TileId < TILE_COUNT and selector < SELECTORS keep every slot in range.
const _: () = assert!((TILE_COUNT - 1) * SELECTORS + (SELECTORS - 1) < BASE_CAPACITY);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub base_hits: u64,
    pub base_misses: u64,
    pub flip_hits: u64,
    pub flip_misses: u64,
    pub invalidations: u64,
}

#[derive(Clone, Copy)]
struct BaseEntry {
    pixels: TileBlock<u16>,
    tile: TileId,
    palette: TilePalette,
    valid: bool,
}

impl BaseEntry {
    const EMPTY: BaseEntry = BaseEntry {
        pixels: [0; TILE_PIXELS],
        tile: TileId::ZERO,
        palette: TilePalette::Background { attribute: 0 },
        valid: false,
    };

    fn matches(&self, tile: TileId, palette: TilePalette) -> bool {
        self.valid && self.tile == tile && self.palette == palette
    }
}

/// Direct-mapped store of natural-orientation RGB565 tiles, one slot per
/// (tile, selector). Background tiles with a different attribute share a
/// slot and evict each other.
struct BaseCache {
    entries: Box<[BaseEntry]>,
}

impl BaseCache {
    fn new() -> Self {
        BaseCache {
            entries: vec![BaseEntry::EMPTY; BASE_CAPACITY].into_boxed_slice(),
        }
    }

    fn slot(tile: TileId, palette: TilePalette) -> usize {
        tile.index() * SELECTORS + palette.selector() as usize
    }

    fn get_or_build<C: PatternMemory + ?Sized>(
        &mut self,
        compositor: &Compositor<'_, C>,
        tile: TileId,
        palette: TilePalette,
        stats: &mut CacheStats,
    ) -> &TileBlock<u16> {
        let entry = &mut self.entries[Self::slot(tile, palette)];
        if entry.matches(tile, palette) {
            stats.base_hits += 1;
        } else {
            stats.base_misses += 1;
            *entry = BaseEntry {
                pixels: compositor.compose(tile, palette),
                tile,
                palette,
                valid: true,
            };
        }
        &entry.pixels
    }

    fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.valid = false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FlipKey {
    tile: TileId,
    palette: TilePalette,
    flip: Flip,
}

/// Pre-decoded tile pixels for the compact renderer.
///
/// Colors are baked into the cached pixels, so any change to palette RAM or
/// to the master palette must be followed by [`TileCache::invalidate`].
pub struct TileCache {
    base: BaseCache,
    flipped: HashMap<FlipKey, TileBlock<u16>>,
    stats: CacheStats,
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileCache {
    pub fn new() -> Self {
        log::debug!(
            "tile cache allocated: {} base slots ({} KB)",
            BASE_CAPACITY,
            BASE_CAPACITY * std::mem::size_of::<BaseEntry>() / 1024
        );
        TileCache {
            base: BaseCache::new(),
            flipped: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn base_tile<C: PatternMemory + ?Sized>(
        &mut self,
        compositor: &Compositor<'_, C>,
        tile: TileId,
        palette: TilePalette,
    ) -> &TileBlock<u16> {
        self.base.get_or_build(compositor, tile, palette, &mut self.stats)
    }

    /// Flipped variant of a tile, derived from (and built after) its base entry.
    pub fn flipped_tile<C: PatternMemory + ?Sized>(
        &mut self,
        compositor: &Compositor<'_, C>,
        tile: TileId,
        palette: TilePalette,
        flip: Flip,
    ) -> &TileBlock<u16> {
        if flip.is_empty() {
            return self.base_tile(compositor, tile, palette);
        }

        match self.flipped.entry(FlipKey { tile, palette, flip }) {
            Entry::Occupied(entry) => {
                self.stats.flip_hits += 1;
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.stats.flip_misses += 1;
                let base = self.base.get_or_build(compositor, tile, palette, &mut self.stats);
                entry.insert(flip_block(base, flip))
            }
        }
    }

    pub fn invalidate(&mut self) {
        log::trace!("tile cache invalidated ({} flipped entries dropped)", self.flipped.len());
        self.base.clear();
        self.flipped.clear();
        self.stats.invalidations += 1;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn flipped_len(&self) -> usize {
        self.flipped.len()
    }
}
