use std::fmt;

use crate::ppu::pattern::PATTERN_MEMORY_SIZE;

/// Which physical 1KB page each of the four logical nametables lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mirroring {
    Horizontal,
    #[default]
    Vertical,
}

impl Mirroring {
    pub fn nametable_pages(self) -> [usize; 4] {
        match self {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
        }
    }
}

#[derive(Debug)]
pub enum CartridgeError {
    InvalidHeader,
    UnsupportedMapper(u8),
    UnsupportedMirroring,
    TruncatedFile,
}

impl fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeError::InvalidHeader => write!(f, "Invalid iNES header (missing NES\\x1A magic)"),
            CartridgeError::UnsupportedMapper(id) => write!(f, "Unsupported mapper: {}", id),
            CartridgeError::UnsupportedMirroring => write!(f, "Four-screen mirroring is not supported"),
            CartridgeError::TruncatedFile => write!(f, "ROM file is truncated"),
        }
    }
}

impl std::error::Error for CartridgeError {}

const INES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];
const PRG_ROM_PAGE_SIZE: usize = 16384; // 16KB
const CHR_ROM_PAGE_SIZE: usize = 8192; // 8KB
const TRAINER_SIZE: usize = 512;

/// The parts of an NROM cartridge the PPU sees: CHR and the mirroring wiring.
pub struct Cartridge {
    pub chr: Vec<u8>,
    pub mirroring: Mirroring,
}

impl Cartridge {
    pub fn from_ines(raw: &[u8]) -> Result<Self, CartridgeError> {
        if raw.len() < 16 {
            return Err(CartridgeError::TruncatedFile);
        }

        if raw[0..4] != INES_MAGIC {
            return Err(CartridgeError::InvalidHeader);
        }

        let prg_rom_pages = raw[4] as usize;
        let chr_rom_pages = raw[5] as usize;
        let flags6 = raw[6];
        let flags7 = raw[7];

        let mapper_id = (flags7 & 0xF0) | (flags6 >> 4);

        if mapper_id != 0 {
            return Err(CartridgeError::UnsupportedMapper(mapper_id));
        }

        if flags6 & 0x08 != 0 {
            return Err(CartridgeError::UnsupportedMirroring);
        }
        let mirroring = if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let has_trainer = flags6 & 0x04 != 0;

        let prg_rom_size = prg_rom_pages * PRG_ROM_PAGE_SIZE;
        let chr_rom_size = chr_rom_pages * CHR_ROM_PAGE_SIZE;

        let mut offset = 16;
        if has_trainer {
            offset += TRAINER_SIZE;
        }

        if raw.len() < offset + prg_rom_size + chr_rom_size {
            return Err(CartridgeError::TruncatedFile);
        }
        offset += prg_rom_size;

        let chr = if chr_rom_size > 0 {
            if chr_rom_size != PATTERN_MEMORY_SIZE {
                log::warn!(
                    "cartridge carries {} KB of CHR, only the first 8 KB are visible",
                    chr_rom_size / 1024
                );
            }
            raw[offset..offset + PATTERN_MEMORY_SIZE.min(chr_rom_size)].to_vec()
        } else {
            // CHR RAM: 8KB of zeros
            vec![0u8; CHR_ROM_PAGE_SIZE]
        };

        Ok(Cartridge {
            chr,
            mirroring,
        })
    }
}

impl AsRef<[u8]> for Cartridge {
    fn as_ref(&self) -> &[u8] {
        &self.chr
    }
}
