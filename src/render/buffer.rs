//! Cell grid with diff-based flushing.
//!
//! Two buffers exist per screen (current and previous). Drawing happens into
//! the current buffer through the primitives below; [`Buffer::flush`] then
//! emits escape sequences only for positions that differ from the previous
//! frame. Cursor moves are elided for adjacent runs of changed cells and
//! style escapes are only emitted on transitions.

use std::io::{self, Write};

use super::rect::Rect;
use super::{Cell, Style};

/// Unicode block ramp for sparklines, lowest to highest.
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Staging buffer size; flushed to the writer when nearly full so a single
/// frame never accumulates unbounded output in memory.
const STAGE_CAPACITY: usize = 32 * 1024;
const STAGE_HIGH_WATER: usize = STAGE_CAPACITY - 256;

/// A width×height grid of cells.
#[derive(Debug, Clone)]
pub struct Buffer {
    w: u16,
    h: u16,
    cells: Vec<Cell>,
}

impl Buffer {
    /// Create a buffer with every cell zeroed (never-presented sentinel),
    /// so the first flush against it repaints the whole screen.
    pub fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::ZERO; w as usize * h as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.w
    }

    pub fn height(&self) -> u16 {
        self.h
    }

    /// Reset every cell to the default (styled blank). Called at the top of
    /// each frame before drawing.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Force every cell to the zero sentinel so the next flush treats the
    /// entire grid as changed.
    pub fn reset(&mut self) {
        self.cells.fill(Cell::ZERO);
    }

    /// Resize in place. Contents are zeroed; callers are expected to redraw
    /// the full frame afterwards.
    pub fn resize(&mut self, w: u16, h: u16) {
        self.w = w;
        self.h = h;
        self.cells.clear();
        self.cells.resize(w as usize * h as usize, Cell::ZERO);
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x >= self.w || y >= self.h {
            return None;
        }
        self.cells.get(y as usize * self.w as usize + x as usize)
    }

    pub fn get_mut(&mut self, x: u16, y: u16) -> Option<&mut Cell> {
        if x >= self.w || y >= self.h {
            return None;
        }
        let idx = y as usize * self.w as usize + x as usize;
        self.cells.get_mut(idx)
    }

    /// Write a single glyph. Out-of-bounds writes are silently dropped.
    pub fn put(&mut self, x: u16, y: u16, ch: char, style: Style) {
        if let Some(cell) = self.get_mut(x, y) {
            *cell = Cell { ch, style };
        }
    }

    /// Write a string starting at (x, y), one column per glyph. Clips at the
    /// right edge.
    pub fn put_str(&mut self, x: u16, y: u16, s: &str, style: Style) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.w {
                break;
            }
            self.put(cx, y, ch, style);
            cx += 1;
        }
    }

    /// Write a string so its last glyph lands on column `right`.
    pub fn put_str_right(&mut self, right: u16, y: u16, s: &str, style: Style) {
        let len = s.chars().count() as u16;
        let x = (right + 1).saturating_sub(len);
        self.put_str(x, y, s, style);
    }

    /// Horizontal bar filling `frac` (0.0..=1.0) of `w` columns.
    pub fn put_bar(&mut self, x: u16, y: u16, w: u16, frac: f64, style: Style) {
        let frac = frac.clamp(0.0, 1.0);
        let filled = (frac * w as f64).round() as u16;
        for i in 0..filled {
            self.put(x + i, y, '█', style);
        }
    }

    /// Background-fill bar: recolors the background of the leftmost
    /// `frac * w` columns, leaving glyphs and foregrounds alone. Used to
    /// paint cumulative depth behind order-book rows.
    pub fn put_bg_bar(&mut self, x: u16, y: u16, w: u16, frac: f64, bg: super::Color) {
        let frac = frac.clamp(0.0, 1.0);
        let filled = (frac * w as f64).ceil() as u16;
        for i in 0..filled.min(w) {
            if let Some(cell) = self.get_mut(x + i, y) {
                cell.style.bg = bg;
            }
        }
    }

    /// One-row sparkline of `values` scaled to the block ramp. NaN and
    /// non-positive ranges render the lowest block.
    pub fn put_sparkline(&mut self, x: u16, y: u16, w: u16, values: &[f64], style: Style) {
        if values.is_empty() {
            return;
        }
        let shown = values.len().min(w as usize);
        let tail = &values[values.len() - shown..];
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for &v in tail {
            if v.is_finite() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        let range = hi - lo;
        for (i, &v) in tail.iter().enumerate() {
            let level = if !v.is_finite() || range <= f64::EPSILON {
                0
            } else {
                (((v - lo) / range) * 7.0).round() as usize
            };
            self.put(x + i as u16, y, SPARKS[level.min(7)], style);
        }
    }

    /// Box border around `rect` with light box-drawing glyphs.
    pub fn draw_box(&mut self, rect: Rect, style: Style) {
        if rect.w < 2 || rect.h < 2 {
            return;
        }
        let (x1, y1) = (rect.x, rect.y);
        let (x2, y2) = (rect.right() - 1, rect.bottom() - 1);
        self.put(x1, y1, '┌', style);
        self.put(x2, y1, '┐', style);
        self.put(x1, y2, '└', style);
        self.put(x2, y2, '┘', style);
        for x in (x1 + 1)..x2 {
            self.put(x, y1, '─', style);
            self.put(x, y2, '─', style);
        }
        for y in (y1 + 1)..y2 {
            self.put(x1, y, '│', style);
            self.put(x2, y, '│', style);
        }
    }

    /// Copy another buffer's contents into this one. Dimensions are adopted.
    pub fn copy_from(&mut self, other: &Buffer) {
        self.w = other.w;
        self.h = other.h;
        self.cells.clear();
        self.cells.extend_from_slice(&other.cells);
    }

    /// Diff this buffer against `prev` and write escape sequences for the
    /// changed cells to `out`. Returns the number of bytes written.
    ///
    /// If `prev` has different dimensions, every cell compares against the
    /// zero sentinel and the whole screen repaints.
    pub fn flush<W: Write>(&self, prev: &Buffer, out: &mut W) -> io::Result<usize> {
        let dims_match = self.w == prev.w && self.h == prev.h;
        let mut stage = String::with_capacity(STAGE_CAPACITY);
        let mut written = 0usize;

        // Last emitted position/style; cursor moves and style escapes are
        // only emitted on discontinuities.
        let mut last_pos: Option<(u16, u16)> = None;
        let mut last_style: Option<Style> = None;

        for y in 0..self.h {
            for x in 0..self.w {
                let cell = self.cells[y as usize * self.w as usize + x as usize];
                let prev_cell = if dims_match {
                    prev.cells[y as usize * prev.w as usize + x as usize]
                } else {
                    Cell::ZERO
                };
                if cell == prev_cell {
                    continue;
                }

                let adjacent = matches!(last_pos, Some((lx, ly)) if ly == y && lx + 1 == x);
                if !adjacent {
                    // CUP is 1-indexed.
                    stage.push_str(&format!("\x1b[{};{}H", y + 1, x + 1));
                }
                if last_style != Some(cell.style) {
                    cell.style.write_sgr(&mut stage);
                    last_style = Some(cell.style);
                }
                stage.push(cell.ch);
                last_pos = Some((x, y));

                if stage.len() >= STAGE_HIGH_WATER {
                    out.write_all(stage.as_bytes())?;
                    written += stage.len();
                    stage.clear();
                }
            }
        }

        if last_pos.is_some() {
            // Leave the terminal in a neutral style between frames.
            stage.push_str("\x1b[0m");
        }
        if !stage.is_empty() {
            out.write_all(stage.as_bytes())?;
            written += stage.len();
        }
        if written > 0 {
            out.flush()?;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Color;

    /// Strip CSI sequences, leaving only printed glyphs.
    fn visible(bytes: &[u8]) -> String {
        let s = String::from_utf8_lossy(bytes);
        let mut out = String::new();
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                // CSI ... final byte in 0x40..=0x7e
                if chars.peek() == Some(&'[') {
                    chars.next();
                    for t in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&t) {
                            break;
                        }
                    }
                }
                continue;
            }
            out.push(c);
        }
        out
    }

    fn flushed(cur: &Buffer, prev: &Buffer) -> Vec<u8> {
        let mut out = Vec::new();
        cur.flush(prev, &mut out).unwrap();
        out
    }

    #[test]
    fn reflush_of_unchanged_frame_emits_nothing() {
        let mut cur = Buffer::new(20, 5);
        let mut prev = Buffer::new(20, 5);
        cur.clear();
        cur.put_str(2, 1, "BTC 64000", Style::new().fg(Color::Green));

        let first = flushed(&cur, &prev);
        assert!(!first.is_empty());

        prev.copy_from(&cur);
        let second = flushed(&cur, &prev);
        assert!(second.is_empty(), "unchanged frame must be a no-op");
    }

    #[test]
    fn resize_forces_full_repaint() {
        let mut cur = Buffer::new(10, 3);
        let mut prev = Buffer::new(10, 3);
        cur.clear();
        cur.put_str(0, 0, "hello", Style::default());
        prev.copy_from(&cur);

        // Simulate a resize: both buffers change dimensions, previous zeroed.
        cur.resize(8, 4);
        prev.resize(8, 4);
        cur.clear();
        cur.put_str(0, 0, "hi", Style::default());

        let out = flushed(&cur, &prev);
        // Every cell repaints, including blanks: 8 * 4 glyphs.
        assert_eq!(visible(&out).chars().count(), 8 * 4);
    }

    #[test]
    fn adjacent_run_positions_cursor_once() {
        let mut cur = Buffer::new(40, 2);
        let prev = {
            let mut p = Buffer::new(40, 2);
            p.clear();
            p
        };
        cur.clear();
        cur.put_str(5, 1, "RUN", Style::default());

        let out = flushed(&cur, &prev);
        let s = String::from_utf8(out).unwrap();
        let moves = s.matches('H').count();
        assert_eq!(moves, 1, "one cursor move for one contiguous run: {s:?}");
        assert_eq!(visible(s.as_bytes()), "RUN");
    }

    #[test]
    fn style_escape_emitted_only_on_transition() {
        let mut cur = Buffer::new(40, 1);
        let prev = {
            let mut p = Buffer::new(40, 1);
            p.clear();
            p
        };
        cur.clear();
        let green = Style::new().fg(Color::Green);
        cur.put_str(0, 0, "aaaa", green);
        cur.put_str(4, 0, "bb", Style::new().fg(Color::Red));

        let out = String::from_utf8(flushed(&cur, &prev)).unwrap();
        // Two styled runs plus the trailing neutral reset.
        let sgr_count = out.matches("\x1b[0").count();
        assert_eq!(sgr_count, 3, "{out:?}");
    }

    #[test]
    fn multibyte_glyphs_occupy_one_column() {
        let mut cur = Buffer::new(10, 1);
        cur.clear();
        cur.put_str(0, 0, "↑€x", Style::default());
        assert_eq!(cur.get(0, 0).unwrap().ch, '↑');
        assert_eq!(cur.get(1, 0).unwrap().ch, '€');
        assert_eq!(cur.get(2, 0).unwrap().ch, 'x');
    }

    #[test]
    fn put_str_right_aligns_last_glyph() {
        let mut buf = Buffer::new(10, 1);
        buf.clear();
        buf.put_str_right(9, 0, "123", Style::default());
        assert_eq!(buf.get(7, 0).unwrap().ch, '1');
        assert_eq!(buf.get(9, 0).unwrap().ch, '3');
    }

    #[test]
    fn bg_bar_preserves_glyphs() {
        let mut buf = Buffer::new(10, 1);
        buf.clear();
        buf.put_str(0, 0, "64000.5", Style::default());
        buf.put_bg_bar(0, 0, 10, 0.5, Color::Green);
        let c = buf.get(0, 0).unwrap();
        assert_eq!(c.ch, '6');
        assert_eq!(c.style.bg, Color::Green);
        assert_eq!(buf.get(9, 0).unwrap().style.bg, Color::Reset);
    }

    #[test]
    fn sparkline_scales_to_ramp() {
        let mut buf = Buffer::new(4, 1);
        buf.clear();
        buf.put_sparkline(0, 0, 4, &[0.0, 1.0, 2.0, 3.0], Style::default());
        assert_eq!(buf.get(0, 0).unwrap().ch, '▁');
        assert_eq!(buf.get(3, 0).unwrap().ch, '█');
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut buf = Buffer::new(3, 3);
        buf.clear();
        buf.put(5, 5, 'x', Style::default());
        buf.put_str(2, 0, "abc", Style::default());
        assert_eq!(buf.get(2, 0).unwrap().ch, 'a');
    }

    #[test]
    fn draw_box_corners_and_edges() {
        let mut buf = Buffer::new(6, 4);
        buf.clear();
        buf.draw_box(Rect::new(0, 0, 6, 4), Style::default());
        assert_eq!(buf.get(0, 0).unwrap().ch, '┌');
        assert_eq!(buf.get(5, 0).unwrap().ch, '┐');
        assert_eq!(buf.get(0, 3).unwrap().ch, '└');
        assert_eq!(buf.get(5, 3).unwrap().ch, '┘');
        assert_eq!(buf.get(3, 0).unwrap().ch, '─');
        assert_eq!(buf.get(0, 2).unwrap().ch, '│');
    }
}
