use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;

use vines_ppu::cartridge::Cartridge;
use vines_ppu::ppu::Ppu;

const DEFAULT_WIDTH: usize = 512;
const DEFAULT_HEIGHT: usize = 480;

// Black, dark grey, light grey, white
const SHEET_PALETTE: [u8; 4] = [0x0F, 0x00, 0x10, 0x30];

// Top-left cell of the 16x16 tile grid, inside the scrolling area
const SHEET_COLUMN: u16 = 8;
const SHEET_ROW: u16 = 6;

fn parse_dimension(arg: Option<&String>, default: usize, name: &str) -> usize {
    match arg {
        None => default,
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                eprintln!("Invalid {}: '{}'", name, value);
                process::exit(1);
            }
        },
    }
}

fn set_vram_addr(ppu: &mut Ppu<Cartridge>, addr: u16) {
    ppu.write_register(0x2006, (addr >> 8) as u8);
    ppu.write_register(0x2006, addr as u8);
}

/// Lay out all 256 tiles of the low pattern table as a grid in nametable 0.
fn load_pattern_sheet(ppu: &mut Ppu<Cartridge>) {
    set_vram_addr(ppu, 0x3F00);
    for &color in SHEET_PALETTE.iter() {
        ppu.write_register(0x2007, color);
    }

    for row in 0..16u16 {
        set_vram_addr(ppu, 0x2000 + (SHEET_ROW + row) * 32 + SHEET_COLUMN);
        for column in 0..16u16 {
            ppu.write_register(0x2007, (row * 16 + column) as u8);
        }
    }

    ppu.write_register(0x2000, 0x00); // nametable 0, pattern table 0
    ppu.write_register(0x2005, 0);
    ppu.write_register(0x2005, 0);
    ppu.write_register(0x2001, 0x08); // background only
}

/// Pixel count of a `width x height` image, `None` if its ARGB buffer size overflows.
fn output_pixels(width: usize, height: usize) -> Option<usize> {
    let pixels = width.checked_mul(height)?;
    pixels.checked_mul(4)?;
    Some(pixels)
}

fn write_ppm<W: Write>(out: &mut W, pixels: &[u32], width: usize, height: usize) -> io::Result<()> {
    write!(out, "P6\n{} {}\n255\n", width, height)?;
    let mut bytes = Vec::with_capacity(width * height * 3);
    for &argb in pixels {
        bytes.extend_from_slice(&[(argb >> 16) as u8, (argb >> 8) as u8, argb as u8]);
    }
    out.write_all(&bytes)
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <rom.nes> <out.ppm> [width height]", args[0]);
        process::exit(1);
    }

    let rom_path = &args[1];
    let out_path = &args[2];
    let width = parse_dimension(args.get(3), DEFAULT_WIDTH, "width");
    let height = parse_dimension(args.get(4), DEFAULT_HEIGHT, "height");

    let rom_data = fs::read(rom_path).unwrap_or_else(|e| {
        eprintln!("Failed to read ROM file '{}': {}", rom_path, e);
        process::exit(1);
    });

    let cartridge = Cartridge::from_ines(&rom_data).unwrap_or_else(|e| {
        eprintln!("Failed to parse ROM: {}", e);
        process::exit(1);
    });
    log::info!("Loaded NROM cartridge, {:?} mirroring", cartridge.mirroring);

    let mirroring = cartridge.mirroring;
    let mut ppu = Ppu::with_mirroring(cartridge, mirroring);
    load_pattern_sheet(&mut ppu);

    let pixel_count = output_pixels(width, height).unwrap_or_else(|| {
        eprintln!("Output size {}x{} is too large", width, height);
        process::exit(1);
    });
    let mut pixels = vec![0u32; pixel_count];
    ppu.render_scaled_true_color(&mut pixels, width, height);
    log::debug!("tile cache after render: {:?}", ppu.tile_cache().stats());

    let result = fs::File::create(out_path).and_then(|file| {
        let mut out = io::BufWriter::new(file);
        write_ppm(&mut out, &pixels, width, height)?;
        out.flush()
    });
    if let Err(e) = result {
        eprintln!("Failed to write '{}': {}", out_path, e);
        process::exit(1);
    }
}
