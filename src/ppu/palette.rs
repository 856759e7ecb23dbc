use std::fmt;

/// Default 2C02 master palette as 0xRRGGBB.
pub const NES_PALETTE: [u32; 64] = [
    0x7C7C7C, 0x0000FC, 0x0000BC, 0x4428BC, 0x940084, 0xA80020, 0xA81000, 0x881400,
    0x503000, 0x007800, 0x006800, 0x005800, 0x004058, 0x000000, 0x000000, 0x000000,
    0xBCBCBC, 0x0078F8, 0x0058F8, 0x6844FC, 0xD800CC, 0xE40058, 0xF83800, 0xE45C10,
    0xAC7C00, 0x00B800, 0x00A800, 0x00A844, 0x008888, 0x000000, 0x000000, 0x000000,
    0xF8F8F8, 0x3CBCFC, 0x6888FC, 0x9878F8, 0xF878F8, 0xF85898, 0xF87858, 0xFCA044,
    0xF8B800, 0xB8F818, 0x58D854, 0x58F898, 0x00E8D8, 0x787878, 0x000000, 0x000000,
    0xFCFCFC, 0xA4E4FC, 0xB8B8F8, 0xD8B8F8, 0xF8B8F8, 0xF8A4C0, 0xF0D0B0, 0xFCE0A8,
    0xF8D878, 0xD8F878, 0xB8F8B8, 0xB8F8D8, 0x00FCFC, 0xF8D8F8, 0x000000, 0x000000,
];

const PAL_FILE_SIZE: usize = 64 * 3;
// Emphasis-aware .pal files carry 8 full tables; only the first is used.
const PAL_FILE_SIZE_EMPHASIS: usize = 8 * PAL_FILE_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub enum PaletteError {
    UnsupportedSize(usize),
}

impl fmt::Display for PaletteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaletteError::UnsupportedSize(size) => write!(
                f,
                "Unsupported palette file size: {} bytes (expected {} or {})",
                size, PAL_FILE_SIZE, PAL_FILE_SIZE_EMPHASIS
            ),
        }
    }
}

impl std::error::Error for PaletteError {}

/// The 64-entry hardware color table that palette RAM indexes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPalette {
    colors: [u32; 64],
}

impl Default for MasterPalette {
    fn default() -> Self {
        MasterPalette { colors: NES_PALETTE }
    }
}

impl MasterPalette {
    pub fn new(colors: [u32; 64]) -> Self {
        MasterPalette {
            colors: colors.map(|rgb| rgb & 0x00FF_FFFF),
        }
    }

    /// Parse a raw `.pal` image (64 RGB triples, optionally followed by the
    /// seven emphasis tables).
    pub fn from_pal_bytes(bytes: &[u8]) -> Result<Self, PaletteError> {
        if bytes.len() != PAL_FILE_SIZE && bytes.len() != PAL_FILE_SIZE_EMPHASIS {
            return Err(PaletteError::UnsupportedSize(bytes.len()));
        }

        let mut colors = [0u32; 64];
        for (color, rgb) in colors.iter_mut().zip(bytes.chunks_exact(3)) {
            *color = (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32;
        }
        Ok(MasterPalette { colors })
    }

    pub fn rgb(&self, color_index: u8) -> u32 {
        self.colors[(color_index & 0x3F) as usize]
    }

    pub fn colors(&self) -> &[u32; 64] {
        &self.colors
    }
}

pub fn rgb_to_rgb565(rgb: u32) -> u16 {
    (((rgb & 0xF8_0000) >> 8) | ((rgb & 0x00_FC00) >> 5) | ((rgb & 0x00_00F8) >> 3)) as u16
}

/// Expand RGB565 back to opaque ARGB8888, replicating the high bits into the low ones.
pub fn rgb565_to_argb(pixel: u16) -> u32 {
    let r = ((pixel >> 11) & 0x1F) as u32;
    let g = ((pixel >> 5) & 0x3F) as u32;
    let b = (pixel & 0x1F) as u32;

    let r = (r << 3) | (r >> 2);
    let g = (g << 2) | (g >> 4);
    let b = (b << 3) | (b >> 2);

    0xFF00_0000 | (r << 16) | (g << 8) | b
}
