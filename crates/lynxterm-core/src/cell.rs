//! Terminal cell: the fundamental unit of the screen grid.
//!
//! Each cell stores one Unicode scalar and its resolved SGR state. Colors are
//! stored fully resolved (palette and 256-color lookups happen at parse
//! time); only the scheme-default flag is deferred to render time.

use bitflags::bitflags;

use crate::color::{Color, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};

bitflags! {
    /// SGR text attribute flags carried by a cell and by the pending pen.
    ///
    /// `REVERSE` only ever appears on the pen: writing a cell bakes the
    /// fg/bg swap into the stored colors instead.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        const BOLD      = 1 << 0;
        const ITALIC    = 1 << 1;
        const UNDERLINE = 1 << 2;
        const REVERSE   = 1 << 3;
        const BLINK     = 1 << 4;
    }
}

/// Per-row display attribute (VT100 DECDHL/DECDWL/DECSWL).
///
/// Double-width and double-height rows render each glyph across two columns,
/// which halves the row's effective addressable column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineAttribute {
    /// Single-width, single-height.
    #[default]
    Normal,
    /// DECDWL: double-width line (`ESC # 6`).
    DoubleWidth,
    /// DECDHL: double-height line, top half (`ESC # 3`).
    DoubleTop,
    /// DECDHL: double-height line, bottom half (`ESC # 4`).
    DoubleBottom,
}

impl LineAttribute {
    /// Number of addressable columns on a row with this attribute.
    #[must_use]
    pub fn effective_cols(self, cols: u16) -> u16 {
        match self {
            LineAttribute::Normal => cols,
            _ => cols / 2,
        }
    }
}

/// A single character cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The character content. A space for empty/erased cells.
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: DEFAULT_FOREGROUND,
            bg: DEFAULT_BACKGROUND,
            style: StyleFlags::empty(),
        }
    }
}

impl Cell {
    /// A blank cell carrying the given colors.
    ///
    /// Used by the erase family, which fills with the current pen colors
    /// rather than the scheme defaults.
    #[must_use]
    pub fn blank(fg: Color, bg: Color) -> Self {
        Self {
            ch: ' ',
            fg,
            bg,
            style: StyleFlags::empty(),
        }
    }
}
