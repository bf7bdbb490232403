// src/buffer.rs

//! The compositing pixel buffer every app renders into.
//!
//! `PixelBuffer` is an off-screen RGB grid with a clip-region stack, a
//! coordinate-transform stack, and a fixed set of rasterization primitives.
//! Every primitive funnels through [`PixelBuffer::set_pixel`], which applies
//! the current transform offset and rejects writes outside the clip region
//! or the buffer bounds.
//!
//! There are no error paths in this module: out-of-range writes drop
//! silently and out-of-range reads return black. Drawing code never needs
//! bounds-checking wrappers. Tests assert the no-op behavior explicitly.

use crate::color::Rgb;
use crate::font::{BitmapFont, Font6x8};
use log::trace;

/// An axis-aligned clip rectangle, buffer-absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClipRect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl ClipRect {
    fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.w && y < self.y + self.h
    }

    fn intersect(&self, other: ClipRect) -> ClipRect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x1 = (self.x + self.w).min(other.x + other.w);
        let y1 = (self.y + self.h).min(other.y + other.h);
        ClipRect {
            x,
            y,
            w: (x1 - x).max(0),
            h: (y1 - y).max(0),
        }
    }
}

/// The render surface: a `width x height` RGB grid with nested clip and
/// transform stacks.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    cells: Vec<Rgb>,
    clip_stack: Vec<ClipRect>,
    transform_stack: Vec<(i32, i32)>,
    font: Box<dyn BitmapFont>,
}

impl PixelBuffer {
    /// Creates a buffer of the given dimensions, cleared to black, with the
    /// built-in font.
    pub fn new(width: u32, height: u32) -> Self {
        trace!("PixelBuffer: creating {}x{} surface", width, height);
        PixelBuffer {
            width,
            height,
            cells: vec![Rgb::BLACK; (width as usize) * (height as usize)],
            clip_stack: Vec::new(),
            transform_stack: Vec::new(),
            font: Box::new(Font6x8),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Read access to the backing cells, row-major. Used by the runtime's
    /// blit pass.
    pub fn cells(&self) -> &[Rgb] {
        &self.cells
    }

    /// Replaces the font used by [`PixelBuffer::text`].
    pub fn set_font(&mut self, font: Box<dyn BitmapFont>) {
        self.font = font;
    }

    pub fn font(&self) -> &dyn BitmapFont {
        self.font.as_ref()
    }

    fn full_rect(&self) -> ClipRect {
        ClipRect {
            x: 0,
            y: 0,
            w: self.width as i32,
            h: self.height as i32,
        }
    }

    fn offset(&self) -> (i32, i32) {
        self.transform_stack.last().copied().unwrap_or((0, 0))
    }

    /// Pushes a clip region. The stored region is the intersection of the
    /// given rectangle with the current effective region (or with the full
    /// buffer if the stack is empty). Clip rectangles are buffer-absolute;
    /// the transform offset does not apply to them.
    pub fn push_clip_region(&mut self, x: i32, y: i32, w: i32, h: i32) {
        let current = self.clip_stack.last().copied().unwrap_or(self.full_rect());
        let pushed = ClipRect {
            x,
            y,
            w: w.max(0),
            h: h.max(0),
        };
        self.clip_stack.push(current.intersect(pushed));
    }

    /// Pops the most recent clip region, restoring the previous one
    /// exactly. Popping an empty stack is a no-op.
    pub fn pop_clip_region(&mut self) {
        self.clip_stack.pop();
    }

    /// The current effective clip region as `(x, y, w, h)`, or `None` when
    /// the buffer is unclipped.
    pub fn clip_region(&self) -> Option<(i32, i32, i32, i32)> {
        self.clip_stack.last().map(|c| (c.x, c.y, c.w, c.h))
    }

    /// Pushes a transform offset, accumulated onto the current one.
    /// Composition is additive: pushing `(a,b)` then `(c,d)` is equivalent
    /// to a single push of `(a+c, b+d)`.
    pub fn push_transform(&mut self, dx: i32, dy: i32) {
        let (ox, oy) = self.offset();
        self.transform_stack.push((ox + dx, oy + dy));
    }

    /// Pops the most recent transform, restoring the exact prior offset.
    pub fn pop_transform(&mut self) {
        self.transform_stack.pop();
    }

    /// Writes one pixel. The current transform offset is added to `(x, y)`
    /// first; writes that land outside the clip region or the buffer are
    /// dropped. This is the single choke point for all primitives.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) {
        let (ox, oy) = self.offset();
        let (tx, ty) = (x + ox, y + oy);
        if tx < 0 || ty < 0 || tx >= self.width as i32 || ty >= self.height as i32 {
            return;
        }
        if let Some(clip) = self.clip_stack.last() {
            if !clip.contains(tx, ty) {
                return;
            }
        }
        self.cells[(ty as usize) * (self.width as usize) + tx as usize] = color;
    }

    /// Reads one pixel at buffer-absolute coordinates. Out-of-range reads
    /// return black.
    pub fn get_pixel(&self, x: i32, y: i32) -> Rgb {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return Rgb::BLACK;
        }
        self.cells[(y as usize) * (self.width as usize) + x as usize]
    }

    /// Overwrites every cell with `color`.
    pub fn fill(&mut self, color: Rgb) {
        self.cells.fill(color);
    }

    /// Overwrites every cell with black.
    pub fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    /// Draws a line from `(x0, y0)` to `(x1, y1)` inclusive, using integer
    /// Bresenham stepping. The set of touched lattice points is identical
    /// for either endpoint order.
    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
        // Canonical endpoint order keeps the rasterized set independent of
        // the caller's argument order.
        let ((mut x, mut y), (ex, ey)) = if (x0, y0) <= (x1, y1) {
            ((x0, y0), (x1, y1))
        } else {
            ((x1, y1), (x0, y0))
        };

        let dx = (ex - x).abs();
        let dy = -(ey - y).abs();
        let sx = if x < ex { 1 } else { -1 };
        let sy = if y < ey { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);
            if x == ex && y == ey {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws a rectangle. Filled mode writes every pixel in the `w x h`
    /// block; outline mode writes only the perimeter, corners once.
    pub fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Rgb, fill: bool) {
        if w <= 0 || h <= 0 {
            return;
        }
        if fill || w == 1 || h == 1 {
            for yy in y..y + h {
                for xx in x..x + w {
                    self.set_pixel(xx, yy, color);
                }
            }
            return;
        }
        for xx in x..x + w {
            self.set_pixel(xx, y, color);
            self.set_pixel(xx, y + h - 1, color);
        }
        for yy in y + 1..y + h - 1 {
            self.set_pixel(x, yy, color);
            self.set_pixel(x + w - 1, yy, color);
        }
    }

    /// Draws a circle of radius `r` centered at `(cx, cy)`. Outline mode
    /// uses the eight-way symmetric midpoint algorithm; filled mode draws a
    /// horizontal span per scanline. A radius of 0 plots the center pixel.
    pub fn circle(&mut self, cx: i32, cy: i32, r: i32, color: Rgb, fill: bool) {
        if r < 0 {
            return;
        }
        if fill {
            for dy in -r..=r {
                let half = (((r * r - dy * dy) as f64).sqrt().floor()) as i32;
                for dx in -half..=half {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
            return;
        }

        let mut x = r;
        let mut y = 0;
        let mut err = 0;
        while x >= y {
            self.set_pixel(cx + x, cy + y, color);
            self.set_pixel(cx + y, cy + x, color);
            self.set_pixel(cx - y, cy + x, color);
            self.set_pixel(cx - x, cy + y, color);
            self.set_pixel(cx - x, cy - y, color);
            self.set_pixel(cx - y, cy - x, color);
            self.set_pixel(cx + y, cy - x, color);
            self.set_pixel(cx + x, cy - y, color);

            y += 1;
            err += 1 + 2 * y;
            if 2 * (err - x) + 1 > 0 {
                x -= 1;
                err += 1 - 2 * x;
            }
        }
    }

    /// Draws `text` starting at `(x, y)` using the buffer's font. Set bits
    /// plot in `color`; unset bits plot in `bg` when supplied. The cursor
    /// advances by the font's glyph width times `scale` per character;
    /// unknown glyphs advance without drawing so following text stays
    /// aligned. A scale of 0 draws nothing.
    pub fn text(&mut self, text: &str, x: i32, y: i32, color: Rgb, bg: Option<Rgb>, scale: u32) {
        if scale == 0 {
            return;
        }
        let scale = scale as i32;
        let glyph_w = self.font.glyph_width() as i32;
        let glyph_h = self.font.glyph_height() as usize;
        let mut cursor = x;

        for c in text.chars() {
            if let Some(rows) = self.font.glyph(c) {
                for (row_idx, row) in rows.iter().enumerate().take(glyph_h) {
                    for col in 0..glyph_w {
                        let set = (row >> (7 - col)) & 1 == 1;
                        let pixel = if set { Some(color) } else { bg };
                        if let Some(pixel) = pixel {
                            for sy in 0..scale {
                                for sx in 0..scale {
                                    self.set_pixel(
                                        cursor + col * scale + sx,
                                        y + (row_idx as i32) * scale + sy,
                                        pixel,
                                    );
                                }
                            }
                        }
                    }
                }
            }
            cursor += glyph_w * scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: Rgb = Rgb::new(10, 200, 30);

    fn lit_cells(buffer: &PixelBuffer) -> Vec<(i32, i32)> {
        let mut lit = Vec::new();
        for y in 0..buffer.height() as i32 {
            for x in 0..buffer.width() as i32 {
                if buffer.get_pixel(x, y) != Rgb::BLACK {
                    lit.push((x, y));
                }
            }
        }
        lit
    }

    #[test]
    fn clip_stack_intersects_and_restores() {
        let mut buffer = PixelBuffer::new(256, 192);
        assert_eq!(buffer.clip_region(), None);

        buffer.push_clip_region(10, 10, 50, 50);
        assert_eq!(buffer.clip_region(), Some((10, 10, 50, 50)));

        buffer.push_clip_region(20, 20, 100, 100);
        assert_eq!(buffer.clip_region(), Some((20, 20, 40, 40)));

        buffer.pop_clip_region();
        assert_eq!(buffer.clip_region(), Some((10, 10, 50, 50)));

        buffer.pop_clip_region();
        assert_eq!(buffer.clip_region(), None);
    }

    #[test]
    fn clip_region_suppresses_outside_writes() {
        let mut buffer = PixelBuffer::new(64, 64);
        buffer.push_clip_region(10, 10, 4, 4);
        buffer.set_pixel(9, 10, C);
        buffer.set_pixel(10, 10, C);
        buffer.set_pixel(13, 13, C);
        buffer.set_pixel(14, 13, C);
        assert_eq!(lit_cells(&buffer), vec![(10, 10), (13, 13)]);
    }

    #[test]
    fn transform_composition_is_additive() {
        let mut a = PixelBuffer::new(32, 32);
        a.push_transform(3, 4);
        a.push_transform(2, -1);
        a.set_pixel(0, 0, C);

        let mut b = PixelBuffer::new(32, 32);
        b.push_transform(5, 3);
        b.set_pixel(0, 0, C);

        assert_eq!(lit_cells(&a), lit_cells(&b));
        assert_eq!(lit_cells(&a), vec![(5, 3)]);
    }

    #[test]
    fn pop_transform_restores_prior_offset() {
        let mut buffer = PixelBuffer::new(32, 32);
        buffer.push_transform(10, 10);
        buffer.push_transform(5, 5);
        buffer.pop_transform();
        buffer.set_pixel(0, 0, C);
        assert_eq!(lit_cells(&buffer), vec![(10, 10)]);
    }

    #[test]
    fn line_endpoint_order_does_not_change_pixel_set() {
        let mut forward = PixelBuffer::new(16, 16);
        forward.line(0, 0, 5, 5, C);
        let mut reverse = PixelBuffer::new(16, 16);
        reverse.line(5, 5, 0, 0, C);

        let expected: Vec<(i32, i32)> = (0..=5).map(|i| (i, i)).collect();
        assert_eq!(lit_cells(&forward), expected);
        assert_eq!(lit_cells(&reverse), expected);
    }

    #[test]
    fn shallow_line_is_order_independent() {
        let mut forward = PixelBuffer::new(32, 32);
        forward.line(1, 2, 12, 7, C);
        let mut reverse = PixelBuffer::new(32, 32);
        reverse.line(12, 7, 1, 2, C);
        assert_eq!(lit_cells(&forward), lit_cells(&reverse));
    }

    #[test]
    fn filled_rect_sets_every_cell() {
        let mut buffer = PixelBuffer::new(16, 16);
        buffer.rect(0, 0, 3, 2, C, true);
        assert_eq!(lit_cells(&buffer).len(), 6);
    }

    #[test]
    fn outline_rect_sets_perimeter_only() {
        let mut buffer = PixelBuffer::new(16, 16);
        buffer.rect(0, 0, 3, 2, C, false);
        assert_eq!(lit_cells(&buffer).len(), 2 * 3 + 2 * 2 - 4);

        let mut buffer = PixelBuffer::new(32, 32);
        buffer.rect(2, 3, 7, 5, C, false);
        assert_eq!(lit_cells(&buffer).len(), 2 * 7 + 2 * 5 - 4);
        // Interior untouched.
        assert_eq!(buffer.get_pixel(4, 5), Rgb::BLACK);
    }

    #[test]
    fn zero_radius_circle_plots_center_only() {
        let mut buffer = PixelBuffer::new(32, 32);
        buffer.circle(10, 10, 0, C, false);
        assert_eq!(lit_cells(&buffer), vec![(10, 10)]);

        let mut buffer = PixelBuffer::new(32, 32);
        buffer.circle(10, 10, 0, C, true);
        assert_eq!(lit_cells(&buffer), vec![(10, 10)]);
    }

    #[test]
    fn circle_outline_is_eight_way_symmetric() {
        let mut buffer = PixelBuffer::new(64, 64);
        let (cx, cy) = (20, 20);
        buffer.circle(cx, cy, 7, C, false);
        for (x, y) in lit_cells(&buffer) {
            let (dx, dy) = (x - cx, y - cy);
            assert_eq!(buffer.get_pixel(cx - dx, cy + dy), C);
            assert_eq!(buffer.get_pixel(cx + dx, cy - dy), C);
            assert_eq!(buffer.get_pixel(cx + dy, cy + dx), C);
        }
    }

    #[test]
    fn out_of_bounds_access_is_silent() {
        let mut buffer = PixelBuffer::new(8, 8);
        buffer.set_pixel(-1, -1, C);
        buffer.set_pixel(8, 0, C);
        buffer.set_pixel(0, 8, C);
        assert!(lit_cells(&buffer).is_empty());
        assert_eq!(buffer.get_pixel(-1, -1), Rgb::BLACK);
        assert_eq!(buffer.get_pixel(100, 100), Rgb::BLACK);
    }

    #[test]
    fn transform_moves_writes_out_of_bounds_silently() {
        let mut buffer = PixelBuffer::new(8, 8);
        buffer.push_transform(-5, -5);
        buffer.set_pixel(0, 0, C);
        assert!(lit_cells(&buffer).is_empty());
        buffer.set_pixel(5, 5, C);
        assert_eq!(lit_cells(&buffer), vec![(0, 0)]);
    }

    #[test]
    fn text_advances_over_unknown_glyphs() {
        // '~' is outside the built-in font's range: it must draw nothing
        // but still advance the cursor, keeping following text aligned.
        let mut with_gap = PixelBuffer::new(64, 16);
        with_gap.text("~A", 0, 0, C, None, 1);

        let mut aligned = PixelBuffer::new(64, 16);
        aligned.text(" A", 0, 0, C, None, 1);

        assert_eq!(lit_cells(&with_gap), lit_cells(&aligned));
        assert!(!lit_cells(&with_gap).is_empty());
    }

    #[test]
    fn text_background_fills_unset_bits() {
        let bg = Rgb::new(1, 2, 3);
        let mut buffer = PixelBuffer::new(16, 16);
        buffer.text("!", 0, 0, C, Some(bg), 1);
        // Every cell of the 6x8 glyph box is either fg or bg.
        for y in 0..8 {
            for x in 0..6 {
                let pixel = buffer.get_pixel(x, y);
                assert!(pixel == C || pixel == bg, "untouched cell ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn text_scale_doubles_advance_and_glyph_box() {
        let mut buffer = PixelBuffer::new(64, 32);
        buffer.text("H", 0, 0, C, None, 2);
        let lit = lit_cells(&buffer);
        // 'H' has 17 set bits at scale 1; each becomes a 2x2 block.
        assert_eq!(lit.len(), 17 * 4);
        assert!(lit.iter().all(|&(x, y)| x < 12 && y < 16));
    }
}
