#![forbid(unsafe_code)]

//! Host-agnostic ANSI/VT100 terminal engine.
//!
//! `lynxterm-core` decodes the byte stream produced by a child process and
//! maintains the resulting screen state: a grid of styled cells, cursor,
//! scrollback history, and selection. It has no opinion about how any of it
//! is painted and no host I/O dependencies.
//!
//! # Primary responsibilities
//!
//! - **Buffer**: screen grid, scrollback ring, cursor, selection, and the
//!   pending SGR state, behind one read/write lock.
//! - **Parser**: the escape-sequence state machine, resumable across
//!   arbitrary chunk boundaries.
//! - **Cell / Color**: styled-cell and palette leaf types shared by both.
//!
//! # Threading model
//!
//! The buffer is passive and lock-protected: a feeder thread pumps process
//! output through [`Parser::parse`] while a render thread polls the query
//! surface ([`Buffer::visible_cell`], [`Buffer::cursor`], ...) and issues
//! UI-originated mutations (resize, selection, scroll offset). Mutations
//! set a dirty flag and invoke a redraw callback whose only job is to
//! schedule an asynchronous repaint.
//!
//! ```
//! use std::sync::Arc;
//! use lynxterm_core::{Buffer, Parser};
//!
//! let buffer = Arc::new(Buffer::new(80, 24, 1000));
//! let mut parser = Parser::new(Arc::clone(&buffer));
//! parser.parse(b"\x1b[1;31mhello\x1b[0m");
//! assert_eq!(buffer.cell(0, 0).ch, 'h');
//! ```

pub mod buffer;
pub mod cell;
pub mod color;
pub mod cursor;
pub mod parser;
pub mod scrollback;
pub mod selection;

pub use buffer::Buffer;
pub use cell::{Cell, LineAttribute, StyleFlags};
pub use color::{
    ANSI_PALETTE, BlinkMode, Color, ColorScheme, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND, color_256,
};
pub use cursor::{CursorBlink, CursorShape, CursorStyle};
pub use parser::Parser;
pub use scrollback::{Scrollback, ScrollbackLine};
pub use selection::{Selection, SelectionPoint};
