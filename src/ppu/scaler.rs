use super::frame::{CompactFrame, Frame, FRAME_HEIGHT, FRAME_WIDTH};
use super::palette::rgb565_to_argb;
use super::pattern::PatternMemory;
use super::Ppu;

/// Integer scale and placement for one destination resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleLayout {
    width: usize,
    height: usize,
    factor: usize,
    offset_x: isize,
    offset_y: isize,
    // First destination column/row covered by each source column/row
    source_to_dest_x: Box<[isize]>,
    source_to_dest_y: Box<[isize]>,
}

impl ScaleLayout {
    pub fn new(width: usize, height: usize) -> Self {
        let factor = (width / FRAME_WIDTH).min(height / FRAME_HEIGHT).max(1);
        let offset_x = (width as isize - (FRAME_WIDTH * factor) as isize) / 2;
        let offset_y = (height as isize - (FRAME_HEIGHT * factor) as isize) / 2;

        ScaleLayout {
            width,
            height,
            factor,
            offset_x,
            offset_y,
            source_to_dest_x: (0..FRAME_WIDTH).map(|x| offset_x + (x * factor) as isize).collect(),
            source_to_dest_y: (0..FRAME_HEIGHT).map(|y| offset_y + (y * factor) as isize).collect(),
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Top-left corner of the scaled image. Negative when the destination is
    /// smaller than one source frame.
    pub fn offset(&self) -> (isize, isize) {
        (self.offset_x, self.offset_y)
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    // Offsets round toward zero, so a destination one pixel short still
    // reports offset 0; compare sizes instead.
    fn fits_unclipped(&self) -> bool {
        self.width >= FRAME_WIDTH * self.factor && self.height >= FRAME_HEIGHT * self.factor
    }
}

/// Nearest-neighbor upscaler that keeps its layout between frames.
#[derive(Debug, Default)]
pub struct Scaler {
    layout: Option<ScaleLayout>,
}

impl Scaler {
    pub fn new() -> Self {
        Scaler { layout: None }
    }

    /// Layout for `width x height`, rebuilt only when the size changes.
    pub fn layout(&mut self, width: usize, height: usize) -> &ScaleLayout {
        let stale = !matches!(&self.layout, Some(layout) if layout.dimensions() == (width, height));
        if stale {
            let layout = ScaleLayout::new(width, height);
            log::debug!(
                "scaling layout {}x{}: factor {}, offset ({}, {})",
                width,
                height,
                layout.factor,
                layout.offset_x,
                layout.offset_y
            );
            self.layout = Some(layout);
        }
        self.layout.get_or_insert_with(|| ScaleLayout::new(width, height))
    }

    /// Copy `src` into the row-major `dest` buffer of `width x height`,
    /// centered and replicated by the integer scale factor. Pixels outside
    /// the scaled image are left alone.
    pub fn scale_to_fit<P: Copy>(&mut self, src: &Frame<P>, dest: &mut [P], width: usize, height: usize) {
        if width == 0 {
            return;
        }
        let height = height.min(dest.len() / width);
        if height == 0 {
            return;
        }

        let layout = self.layout(width, height);
        let dest = &mut dest[..width * height];

        if !layout.fits_unclipped() {
            scale_clipped(layout, src, dest);
            return;
        }
        match layout.factor {
            1 => scale_1x(layout, src, dest),
            2 => scale_2x(layout, src, dest),
            3 => scale_3x(layout, src, dest),
            _ => scale_clipped(layout, src, dest),
        }
    }
}

fn row_start(layout: &ScaleLayout, dest_y: usize) -> usize {
    dest_y * layout.width + layout.offset_x as usize
}

fn scale_1x<P: Copy>(layout: &ScaleLayout, src: &Frame<P>, dest: &mut [P]) {
    for y in 0..FRAME_HEIGHT {
        let start = row_start(layout, layout.offset_y as usize + y);
        dest[start..start + FRAME_WIDTH].copy_from_slice(src.row(y));
    }
}

fn scale_2x<P: Copy>(layout: &ScaleLayout, src: &Frame<P>, dest: &mut [P]) {
    for y in 0..FRAME_HEIGHT {
        let dest_y = layout.offset_y as usize + y * 2;
        let start = row_start(layout, dest_y);
        let line = &mut dest[start..start + FRAME_WIDTH * 2];

        for (quad, out) in src.row(y).chunks_exact(4).zip(line.chunks_exact_mut(8)) {
            out[0] = quad[0];
            out[1] = quad[0];
            out[2] = quad[1];
            out[3] = quad[1];
            out[4] = quad[2];
            out[5] = quad[2];
            out[6] = quad[3];
            out[7] = quad[3];
        }

        let next = start + layout.width;
        dest.copy_within(start..start + FRAME_WIDTH * 2, next);
    }
}

fn scale_3x<P: Copy>(layout: &ScaleLayout, src: &Frame<P>, dest: &mut [P]) {
    for y in 0..FRAME_HEIGHT {
        let dest_y = layout.offset_y as usize + y * 3;
        let start = row_start(layout, dest_y);
        let line = &mut dest[start..start + FRAME_WIDTH * 3];

        for (&pixel, out) in src.row(y).iter().zip(line.chunks_exact_mut(3)) {
            out.fill(pixel);
        }

        for repeat in 1..3 {
            dest.copy_within(start..start + FRAME_WIDTH * 3, start + repeat * layout.width);
        }
    }
}

/// Any factor, any placement: walks the coordinate tables and drops pixels
/// that land outside the destination.
fn scale_clipped<P: Copy>(layout: &ScaleLayout, src: &Frame<P>, dest: &mut [P]) {
    let factor = layout.factor as isize;
    let width = layout.width as isize;
    let height = layout.height as isize;

    for (y, &dest_y) in layout.source_to_dest_y.iter().enumerate() {
        let row = src.row(y);
        for dy in 0..factor {
            let out_y = dest_y + dy;
            if !(0..height).contains(&out_y) {
                continue;
            }
            let line = &mut dest[out_y as usize * layout.width..(out_y as usize + 1) * layout.width];

            for (&pixel, &dest_x) in row.iter().zip(layout.source_to_dest_x.iter()) {
                for dx in 0..factor {
                    let out_x = dest_x + dx;
                    if (0..width).contains(&out_x) {
                        line[out_x as usize] = pixel;
                    }
                }
            }
        }
    }
}

impl<C: PatternMemory> Ppu<C> {
    /// Render through the tile cache and scale into `dest` (`width x height`
    /// RGB565). The letterbox is cleared to black.
    pub fn render_scaled(&mut self, dest: &mut [u16], width: usize, height: usize) {
        dest.fill(0);

        let mut frame = self.scaled_frame.take().unwrap_or_default();
        self.render_compact(&mut frame);
        self.scaler.scale_to_fit(&frame, dest, width, height);
        self.scaled_frame = Some(frame);
    }

    /// [`render_scaled`](Self::render_scaled) with the result expanded to
    /// opaque 0xAARRGGBB.
    pub fn render_scaled_true_color(&mut self, dest: &mut [u32], width: usize, height: usize) {
        let mut scratch = std::mem::take(&mut self.scaled_scratch);
        scratch.resize(dest.len(), 0);

        self.render_scaled(&mut scratch, width, height);
        for (out, &pixel) in dest.iter_mut().zip(scratch.iter()) {
            *out = rgb565_to_argb(pixel);
        }
        self.scaled_scratch = scratch;
    }

    /// Last compact frame produced by a scaled render.
    pub fn last_scaled_frame(&self) -> Option<&CompactFrame> {
        self.scaled_frame.as_ref()
    }
}
