use bitflags::bitflags;

use super::pattern::TileId;

// Only the bits the renderer reads are named. Registers are stored with
// `from_bits_retain`, so the other bits survive a write.

bitflags! {
    /// $2000
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PpuCtrl: u8 {
        const NAMETABLE_LO   = 0x01; // adds 256 to the X scroll
        const VRAM_INCREMENT = 0x04; // 0=+1, 1=+32
        const SPRITE_TABLE   = 0x08;
        const BG_TABLE       = 0x10;
    }
}

bitflags! {
    /// $2001
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PpuMask: u8 {
        const SHOW_BG  = 0x08;
        const SHOW_SPR = 0x10;
    }
}

bitflags! {
    /// $2002, as reported by the alternating status read
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PpuStatus: u8 {
        const SPRITE_ZERO_HIT = 0x40;
        const VBLANK          = 0x80;
    }
}

impl PpuCtrl {
    pub fn vram_increment(&self) -> u16 {
        if self.contains(PpuCtrl::VRAM_INCREMENT) { 32 } else { 1 }
    }

    /// Horizontal scroll origin contributed by the nametable select bit.
    pub fn scroll_x_base(&self) -> i32 {
        if self.contains(PpuCtrl::NAMETABLE_LO) { 256 } else { 0 }
    }

    pub fn sprite_tile(&self, index: u8) -> TileId {
        TileId::from_table(self.contains(PpuCtrl::SPRITE_TABLE), index)
    }

    pub fn bg_tile(&self, index: u8) -> TileId {
        TileId::from_table(self.contains(PpuCtrl::BG_TABLE), index)
    }
}
