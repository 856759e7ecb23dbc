/// Size of the CHR region visible to the PPU ($0000-$1FFF).
pub const PATTERN_MEMORY_SIZE: usize = 0x2000;
/// Two pattern tables of 256 tiles each.
pub const TILE_COUNT: usize = 512;
const TILE_BYTES: usize = 16;

/// Read-only view over the cartridge's pattern tables.
///
/// Anything that can hand out its bytes as a slice works (`Vec<u8>`,
/// `[u8; 8192]`, `&[u8]`, `Arc<[u8]>`). Reads past $1FFF return 0.
pub trait PatternMemory {
    fn chr_read(&self, addr: u16) -> u8;

    /// One bit-plane row of a tile. Rows 0-7 are the low plane, 8-15 the high plane.
    fn read_plane(&self, tile: u16, row: u8) -> u8 {
        let offset = tile as usize * TILE_BYTES + (row & 0x0F) as usize;
        if offset >= PATTERN_MEMORY_SIZE {
            return 0;
        }
        self.chr_read(offset as u16)
    }
}

impl<T: AsRef<[u8]> + ?Sized> PatternMemory for T {
    fn chr_read(&self, addr: u16) -> u8 {
        let addr = addr as usize;
        if addr >= PATTERN_MEMORY_SIZE {
            return 0;
        }
        self.as_ref().get(addr).copied().unwrap_or(0)
    }
}

/// A tile number in 0..512: pattern table select in bit 8, tile byte below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(u16);

impl TileId {
    pub const ZERO: TileId = TileId(0);

    pub fn new(raw: u16) -> Option<Self> {
        ((raw as usize) < TILE_COUNT).then_some(TileId(raw))
    }

    pub fn from_table(high_table: bool, index: u8) -> Self {
        let table: u16 = if high_table { 0x100 } else { 0 };
        TileId(table | index as u16)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}
