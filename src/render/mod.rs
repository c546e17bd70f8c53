//! Double-buffered cell-grid renderer.
//!
//! The UI draws into a [`Buffer`] of styled [`Cell`]s each frame; flushing
//! compares the frame against the previously presented one and emits ANSI
//! escapes only for cells that actually changed. Total output per frame is
//! proportional to the number of changed cells plus style/cursor
//! transitions, not to screen area.

pub mod buffer;
pub mod rect;

pub use buffer::Buffer;
pub use rect::Rect;

/// Terminal color, emitted as raw SGR codes (no terminfo negotiation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// The terminal's default foreground/background.
    #[default]
    Reset,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    Rgb(u8, u8, u8),
}

impl Color {
    /// Append the SGR parameters selecting `self` as the foreground.
    fn write_fg(&self, out: &mut String) {
        match self {
            Color::Reset => out.push_str("39"),
            Color::Black => out.push_str("30"),
            Color::Red => out.push_str("31"),
            Color::Green => out.push_str("32"),
            Color::Yellow => out.push_str("33"),
            Color::Blue => out.push_str("34"),
            Color::Magenta => out.push_str("35"),
            Color::Cyan => out.push_str("36"),
            Color::White => out.push_str("37"),
            Color::DarkGrey => out.push_str("90"),
            Color::Rgb(r, g, b) => {
                out.push_str(&format!("38;2;{r};{g};{b}"));
            }
        }
    }

    /// Append the SGR parameters selecting `self` as the background.
    fn write_bg(&self, out: &mut String) {
        match self {
            Color::Reset => out.push_str("49"),
            Color::Black => out.push_str("40"),
            Color::Red => out.push_str("41"),
            Color::Green => out.push_str("42"),
            Color::Yellow => out.push_str("43"),
            Color::Blue => out.push_str("44"),
            Color::Magenta => out.push_str("45"),
            Color::Cyan => out.push_str("46"),
            Color::White => out.push_str("47"),
            Color::DarkGrey => out.push_str("100"),
            Color::Rgb(r, g, b) => {
                out.push_str(&format!("48;2;{r};{g};{b}"));
            }
        }
    }
}

/// Foreground/background colors plus attribute flags for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub dim: bool,
}

impl Style {
    pub const fn new() -> Self {
        Self {
            fg: Color::Reset,
            bg: Color::Reset,
            bold: false,
            dim: false,
        }
    }

    pub const fn fg(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }

    pub const fn bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }

    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub const fn dim(mut self) -> Self {
        self.dim = true;
        self
    }

    /// Emit a full reset + set sequence for this style.
    ///
    /// Styles are always emitted as reset-then-set so the escape is
    /// self-contained and independent of whatever was active before.
    fn write_sgr(&self, out: &mut String) {
        out.push_str("\x1b[0");
        if self.bold {
            out.push_str(";1");
        }
        if self.dim {
            out.push_str(";2");
        }
        out.push(';');
        self.fg.write_fg(out);
        out.push(';');
        self.bg.write_bg(out);
        out.push('m');
    }
}

/// One terminal character position.
///
/// The glyph is a full `char`, so multi-byte code points are supported, but
/// every glyph is treated as exactly one display column. Double-width
/// characters will misalign columns; this is a deliberate simplification
/// shared by all layout arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Cell {
    /// Sentinel used for never-presented buffers. `'\0'` is not producible
    /// by any drawing primitive, so comparing against it never matches and
    /// forces a repaint of the position.
    pub const ZERO: Cell = Cell {
        ch: '\0',
        style: Style::new(),
    };
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_equality_is_structural() {
        let a = Cell {
            ch: 'x',
            style: Style::new().fg(Color::Red),
        };
        let b = Cell {
            ch: 'x',
            style: Style::new().fg(Color::Red),
        };
        let c = Cell {
            ch: 'x',
            style: Style::new().fg(Color::Green),
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Cell::default());
    }

    #[test]
    fn zero_cell_never_matches_drawn_content() {
        assert_ne!(Cell::ZERO, Cell::default());
    }

    #[test]
    fn sgr_contains_reset_and_colors() {
        let mut out = String::new();
        Style::new().fg(Color::Red).bg(Color::Black).bold().write_sgr(&mut out);
        assert!(out.starts_with("\x1b[0"));
        assert!(out.contains(";1"));
        assert!(out.contains(";31"));
        assert!(out.contains(";40"));
        assert!(out.ends_with('m'));
    }

    #[test]
    fn rgb_colors_use_truecolor_sgr() {
        let mut out = String::new();
        Style::new().fg(Color::Rgb(1, 2, 3)).write_sgr(&mut out);
        assert!(out.contains("38;2;1;2;3"));
    }
}
