//! Cursor state: position, visibility, and style.

/// Cursor glyph shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Cursor blink rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorBlink {
    #[default]
    None,
    Slow,
    Fast,
}

/// Shape + blink pair, settable via DECSCUSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorStyle {
    pub shape: CursorShape,
    pub blink: CursorBlink,
}

impl CursorStyle {
    pub const fn new(shape: CursorShape, blink: CursorBlink) -> Self {
        Self { shape, blink }
    }

    /// Map a DECSCUSR style code (`CSI Ps SP q`) to a cursor style.
    ///
    /// 0/1 blinking block, 2 steady block, 3/4 blinking/steady underline,
    /// 5/6 blinking/steady bar. Unknown codes fall back to blinking block.
    #[must_use]
    pub fn from_style_code(code: u16) -> Self {
        match code {
            2 => Self::new(CursorShape::Block, CursorBlink::None),
            3 => Self::new(CursorShape::Underline, CursorBlink::Slow),
            4 => Self::new(CursorShape::Underline, CursorBlink::None),
            5 => Self::new(CursorShape::Bar, CursorBlink::Slow),
            6 => Self::new(CursorShape::Bar, CursorBlink::None),
            _ => Self::new(CursorShape::Block, CursorBlink::Slow),
        }
    }
}

/// Full cursor state owned by the buffer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor {
    pub x: u16,
    pub y: u16,
    pub visible: bool,
    pub style: CursorStyle,
    /// Single save/restore slot (DECSC/DECRC), last save wins.
    pub saved: (u16, u16),
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            visible: true,
            style: CursorStyle::default(),
            saved: (0, 0),
        }
    }

    /// Clamp the position into `[0, cols) x [0, rows)`.
    pub fn clamp(&mut self, cols: u16, rows: u16) {
        self.x = self.x.min(cols.saturating_sub(1));
        self.y = self.y.min(rows.saturating_sub(1));
    }
}
