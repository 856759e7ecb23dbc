pub mod cache;
pub mod compositor;
pub mod frame;
pub mod palette;
pub mod pattern;
pub mod registers;
pub mod render;
pub mod scaler;

use cache::TileCache;
use compositor::attribute_shift;
use frame::CompactFrame;
use palette::MasterPalette;
use pattern::{PatternMemory, TileId};
use registers::{PpuCtrl, PpuMask, PpuStatus};
use scaler::Scaler;

use crate::cartridge::Mirroring;

pub const NAMETABLE_RAM_SIZE: usize = 2048;
const ATTRIBUTE_TABLE_OFFSET: usize = 0x3C0;

/// Physical nametable RAM offset for a PPU address in $2000-$3EFF.
pub fn nametable_index(addr: u16, mirroring: Mirroring) -> usize {
    let addr = addr.wrapping_sub(0x2000) as usize & 0x0FFF; // $3000-$3EFF mirrors $2000
    let table = addr / 0x400;
    let offset = addr % 0x400;
    (mirroring.nametable_pages()[table] * 0x400 + offset) % NAMETABLE_RAM_SIZE
}

pub struct Ppu<C> {
    chr: C,

    // VRAM
    palette_ram: [u8; 32],
    vram: [u8; NAMETABLE_RAM_SIZE],
    pub oam: [u8; 256],

    // Registers
    pub ctrl: PpuCtrl,
    pub mask: PpuMask,
    pub oam_addr: u8,
    pub scroll_x: u8,
    pub scroll_y: u8,

    // Address latch shared by $2005 and $2006
    vram_addr: u16,
    write_toggle: bool,
    read_buffer: u8,

    // Alternates the vblank bits on successive $2002 reads
    status_reads: u32,

    mirroring: Mirroring,
    master_palette: MasterPalette,
    tile_cache: TileCache,

    // Scaled output
    scaler: Scaler,
    scaled_frame: Option<CompactFrame>,
    scaled_scratch: Vec<u16>,
}

impl<C: PatternMemory> Ppu<C> {
    pub fn new(chr: C) -> Self {
        Self::with_mirroring(chr, Mirroring::Vertical)
    }

    pub fn with_mirroring(chr: C, mirroring: Mirroring) -> Self {
        Ppu {
            chr,
            palette_ram: [0; 32],
            vram: [0; NAMETABLE_RAM_SIZE],
            oam: [0; 256],
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            oam_addr: 0,
            scroll_x: 0,
            scroll_y: 0,
            vram_addr: 0,
            write_toggle: false,
            read_buffer: 0,
            status_reads: 0,
            mirroring,
            master_palette: MasterPalette::default(),
            tile_cache: TileCache::new(),
            scaler: Scaler::new(),
            scaled_frame: None,
            scaled_scratch: Vec::new(),
        }
    }

    pub fn chr(&self) -> &C {
        &self.chr
    }

    pub fn palette_ram(&self) -> &[u8; 32] {
        &self.palette_ram
    }

    pub fn vram(&self) -> &[u8; NAMETABLE_RAM_SIZE] {
        &self.vram
    }

    pub fn vram_addr(&self) -> u16 {
        self.vram_addr
    }

    pub fn write_toggle(&self) -> bool {
        self.write_toggle
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn master_palette(&self) -> &MasterPalette {
        &self.master_palette
    }

    /// Swap the RGB table. Cached tiles hold colors from the old table, so the
    /// tile cache is cleared.
    pub fn set_master_palette(&mut self, palette: MasterPalette) {
        self.master_palette = palette;
        self.tile_cache.invalidate();
    }

    pub fn tile_cache(&self) -> &TileCache {
        &self.tile_cache
    }

    pub fn invalidate_tile_cache(&mut self) {
        self.tile_cache.invalidate();
    }

    /// CPU read from PPU register ($2000-$2007, mirrored through $3FFF)
    pub fn read_register(&mut self, addr: u16) -> u8 {
        match register_address(addr) {
            Some(0x2002) => {
                // PPUSTATUS
                self.write_toggle = false;
                let status = if self.status_reads % 2 == 0 {
                    PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT
                } else {
                    PpuStatus::empty()
                };
                self.status_reads = self.status_reads.wrapping_add(1);
                status.bits()
            }
            Some(0x2004) => {
                // OAMDATA
                self.oam[self.oam_addr as usize]
            }
            Some(0x2007) => self.read_data(),
            _ => 0, // write-only registers return 0
        }
    }

    /// CPU write to PPU register ($2000-$2007, mirrored through $3FFF)
    pub fn write_register(&mut self, addr: u16, val: u8) {
        match register_address(addr) {
            Some(0x2000) => {
                // PPUCTRL
                self.ctrl = PpuCtrl::from_bits_retain(val);
            }
            Some(0x2001) => {
                // PPUMASK
                self.mask = PpuMask::from_bits_retain(val);
            }
            Some(0x2003) => {
                // OAMADDR
                self.oam_addr = val;
            }
            Some(0x2004) => {
                // OAMDATA
                self.oam[self.oam_addr as usize] = val;
                self.oam_addr = self.oam_addr.wrapping_add(1);
            }
            Some(0x2005) => {
                // PPUSCROLL
                if !self.write_toggle {
                    self.scroll_x = val;
                } else {
                    self.scroll_y = val;
                }
                self.write_toggle = !self.write_toggle;
            }
            Some(0x2006) => {
                // PPUADDR, high byte first
                if !self.write_toggle {
                    self.vram_addr = (self.vram_addr & 0x00FF) | ((val as u16) << 8);
                } else {
                    self.vram_addr = (self.vram_addr & 0xFF00) | val as u16;
                }
                self.write_toggle = !self.write_toggle;
            }
            Some(0x2007) => {
                // PPUDATA
                let addr = self.vram_addr;
                self.vram_addr = self.vram_addr.wrapping_add(self.ctrl.vram_increment());
                self.internal_write(addr, val);
            }
            _ => {}
        }
    }

    /// OAM DMA ($4014): copy CPU page `page` into OAM starting at the OAM cursor.
    pub fn write_dma<F: FnMut(u16) -> u8>(&mut self, page: u8, mut cpu_read: F) {
        let base = (page as u16) << 8;
        for offset in 0..256u16 {
            self.oam[self.oam_addr as usize] = cpu_read(base | offset);
            self.oam_addr = self.oam_addr.wrapping_add(1);
        }
    }

    fn read_data(&mut self) -> u8 {
        let addr = self.vram_addr & 0x3FFF;
        self.vram_addr = self.vram_addr.wrapping_add(self.ctrl.vram_increment());

        if addr >= 0x3F00 {
            // Palette reads are not buffered
            let result = self.palette_read(addr);
            // But the buffer gets filled with the nametable "under" the palette
            self.read_buffer = self.internal_read(addr - 0x1000);
            result
        } else {
            let result = self.read_buffer;
            self.read_buffer = self.internal_read(addr);
            result
        }
    }

    /// Read from PPU internal address space
    pub fn internal_read(&self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => self.chr.chr_read(addr),
            0x2000..=0x3EFF => self.vram[nametable_index(addr, self.mirroring)],
            _ => self.palette_read(addr),
        }
    }

    /// Write to PPU internal address space
    fn internal_write(&mut self, addr: u16, val: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => {} // CHR ROM
            0x2000..=0x3EFF => {
                self.vram[nametable_index(addr, self.mirroring)] = val;
            }
            _ => self.palette_write(addr, val),
        }
    }

    fn palette_read(&self, addr: u16) -> u8 {
        self.palette_ram[(addr & 0x1F) as usize]
    }

    fn palette_write(&mut self, addr: u16, val: u8) {
        let index = (addr & 0x1F) as usize;
        self.palette_ram[index] = val;
        // Mirrors: $3F10 -> $3F00, $3F14 -> $3F04, $3F18 -> $3F08, $3F1C -> $3F0C
        if index & 0x13 == 0x10 {
            self.palette_ram[index - 0x10] = val;
        }
        self.tile_cache.invalidate();
    }

    pub fn nametables(&self) -> Nametables<'_> {
        Nametables::new(&self.vram, self.mirroring, self.ctrl)
    }

    pub fn background_tile(&self, addr: u16) -> TileId {
        self.nametables().tile(addr)
    }

    pub fn attribute_value(&self, addr: u16) -> u8 {
        self.nametables().attribute(addr)
    }
}

/// Read-only view of nametable RAM as the background renderer sees it.
#[derive(Clone, Copy)]
pub struct Nametables<'a> {
    vram: &'a [u8; NAMETABLE_RAM_SIZE],
    mirroring: Mirroring,
    ctrl: PpuCtrl,
}

impl<'a> Nametables<'a> {
    fn new(vram: &'a [u8; NAMETABLE_RAM_SIZE], mirroring: Mirroring, ctrl: PpuCtrl) -> Self {
        Nametables {
            vram,
            mirroring,
            ctrl,
        }
    }

    /// Tile number stored at a nametable address, with the background pattern table applied.
    pub fn tile(&self, addr: u16) -> TileId {
        self.ctrl.bg_tile(self.vram[nametable_index(addr, self.mirroring)])
    }

    /// 2-bit background palette for the tile at a nametable address.
    pub fn attribute(&self, addr: u16) -> u8 {
        let index = nametable_index(addr, self.mirroring);

        let tile_x = index & 0x1F;
        let tile_y = (index >> 5) & 0x1F;
        let base = index & 0x400;

        let attr_offset = base + ATTRIBUTE_TABLE_OFFSET + (tile_y / 4) * 8 + tile_x / 4;
        (self.vram[attr_offset] >> attribute_shift(tile_x, tile_y)) & 0x03
    }
}

/// Registers repeat every 8 bytes from $2000 to $3FFF; everything else is not ours.
fn register_address(addr: u16) -> Option<u16> {
    let addr = addr & 0x3FFF;
    (addr >= 0x2000).then(|| 0x2000 + (addr & 0x07))
}
