//! Rectangular sub-regions of a buffer.

/// A rectangle addressing a sub-region of a [`Buffer`](super::Buffer).
///
/// Pure value type; carries no ownership of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    pub const fn right(&self) -> u16 {
        self.x + self.w
    }

    pub const fn bottom(&self) -> u16 {
        self.y + self.h
    }

    /// Split into a left part of width `at` and the remainder.
    pub fn split_h(&self, at: u16) -> (Rect, Rect) {
        let at = at.min(self.w);
        (
            Rect::new(self.x, self.y, at, self.h),
            Rect::new(self.x + at, self.y, self.w - at, self.h),
        )
    }

    /// Split into a top part of height `at` and the remainder.
    pub fn split_v(&self, at: u16) -> (Rect, Rect) {
        let at = at.min(self.h);
        (
            Rect::new(self.x, self.y, self.w, at),
            Rect::new(self.x, self.y + at, self.w, self.h - at),
        )
    }

    /// Shrink by `margin` cells on every side.
    pub fn inner(&self, margin: u16) -> Rect {
        let m2 = margin.saturating_mul(2);
        if self.w <= m2 || self.h <= m2 {
            return Rect::new(self.x, self.y, 0, 0);
        }
        Rect::new(
            self.x + margin,
            self.y + margin,
            self.w - m2,
            self.h - m2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_h_partitions_width() {
        let r = Rect::new(2, 3, 10, 4);
        let (l, rr) = r.split_h(6);
        assert_eq!(l, Rect::new(2, 3, 6, 4));
        assert_eq!(rr, Rect::new(8, 3, 4, 4));
    }

    #[test]
    fn split_v_partitions_height() {
        let r = Rect::new(0, 0, 5, 9);
        let (t, b) = r.split_v(3);
        assert_eq!(t, Rect::new(0, 0, 5, 3));
        assert_eq!(b, Rect::new(0, 3, 5, 6));
    }

    #[test]
    fn split_clamps_to_bounds() {
        let r = Rect::new(0, 0, 4, 4);
        let (l, rr) = r.split_h(10);
        assert_eq!(l.w, 4);
        assert_eq!(rr.w, 0);
    }

    #[test]
    fn inner_shrinks_by_margin() {
        let r = Rect::new(1, 1, 10, 6);
        assert_eq!(r.inner(1), Rect::new(2, 2, 8, 4));
        assert_eq!(r.inner(4).w, 0);
    }
}
