//! The terminal buffer: screen grid, scrollback, cursor, selection, and the
//! pending SGR state, behind a single read/write lock.
//!
//! The buffer is a passive structure with no threads of its own. A feeder
//! thread mutates it through the parser while a render thread reads it (and
//! occasionally mutates it for resize, selection, and scrolling). Every
//! public method holds the lock for its full duration: queries take shared
//! access, mutations exclusive access. No method performs I/O or takes
//! another lock while holding this one.
//!
//! Mutations set a dirty flag and invoke the registered redraw callback
//! while the write lock is still held. The callback must only schedule an
//! asynchronous repaint (post to an event queue) and return; calling back
//! into the buffer from it deadlocks.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::cell::{Cell, LineAttribute, StyleFlags};
use crate::color::{Color, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
use crate::cursor::{Cursor, CursorBlink, CursorShape, CursorStyle};
use crate::scrollback::Scrollback;
use crate::selection::{Selection, SelectionPoint};

type DirtyCallback = Box<dyn Fn() + Send + Sync>;

struct BufferState {
    cols: u16,
    rows: u16,
    /// Row-major grid; every row holds exactly `cols` cells.
    screen: Vec<Vec<Cell>>,
    /// One attribute per screen row.
    line_attrs: Vec<LineAttribute>,

    cursor: Cursor,

    /// Pending SGR state, applied to every subsequently written cell.
    cur_fg: Color,
    cur_bg: Color,
    cur_style: StyleFlags,

    scrollback: Scrollback,
    /// How many scrollback lines are scrolled into view (0 = live screen).
    scroll_offset: usize,

    selection: Option<Selection>,

    bracketed_paste: bool,
    column_132: bool,
    column_40: bool,
    line_density: u16,

    dirty: bool,
    on_dirty: Option<DirtyCallback>,
}

impl BufferState {
    fn blank_row(&self) -> Vec<Cell> {
        vec![Cell::default(); self.cols as usize]
    }

    /// A cell rendered with the pending attributes. When REVERSE is set the
    /// fg/bg swap is baked into the stored colors and the flag dropped.
    fn styled_cell(&self, ch: char) -> Cell {
        let mut style = self.cur_style;
        let (fg, bg) = if style.contains(StyleFlags::REVERSE) {
            style.remove(StyleFlags::REVERSE);
            (self.cur_bg, self.cur_fg)
        } else {
            (self.cur_fg, self.cur_bg)
        };
        Cell { ch, fg, bg, style }
    }

    fn erase_cell(&self) -> Cell {
        Cell::blank(self.cur_fg, self.cur_bg)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        if let Some(cb) = &self.on_dirty {
            cb();
        }
    }

    /// Evict row 0 into scrollback and append a fresh row at the bottom.
    fn scroll_up_once(&mut self) {
        let row = self.screen.remove(0);
        let attr = self.line_attrs.remove(0);
        self.scrollback.push_line(row, attr);
        self.screen.push(self.blank_row());
        self.line_attrs.push(LineAttribute::Normal);
    }

    /// Shift all rows down one; the bottom row is discarded, not restored
    /// from scrollback.
    fn scroll_down_once(&mut self) {
        self.screen.pop();
        self.screen.insert(0, self.blank_row());
        self.line_attrs.pop();
        self.line_attrs.insert(0, LineAttribute::Normal);
    }

    fn line_feed(&mut self) {
        if self.cursor.y + 1 >= self.rows {
            self.scroll_up_once();
        } else {
            self.cursor.y += 1;
        }
    }

    fn set_cursor_clamped(&mut self, x: u16, y: u16) {
        self.cursor.x = x.min(self.cols - 1);
        self.cursor.y = y.min(self.rows - 1);
    }

    fn visible_cell_at(&self, x: u16, y: u16) -> Cell {
        if x >= self.cols || y >= self.rows {
            return Cell::default();
        }
        if (y as usize) < self.scroll_offset {
            let idx = self.scrollback.len() - self.scroll_offset + y as usize;
            return self
                .scrollback
                .get(idx)
                .and_then(|line| line.cells.get(x as usize).copied())
                .unwrap_or_default();
        }
        self.screen[y as usize - self.scroll_offset][x as usize]
    }

    fn visible_line_attribute_at(&self, y: u16) -> LineAttribute {
        if y >= self.rows {
            return LineAttribute::Normal;
        }
        if (y as usize) < self.scroll_offset {
            let idx = self.scrollback.len() - self.scroll_offset + y as usize;
            return self
                .scrollback
                .get(idx)
                .map(|line| line.attr)
                .unwrap_or_default();
        }
        self.line_attrs[y as usize - self.scroll_offset]
    }
}

/// The terminal screen/scrollback data structure.
///
/// Constructed with a fixed size and scrollback capacity; resized explicitly
/// by the host. Shared between the parser's feeder thread and the renderer
/// via `Arc<Buffer>`.
pub struct Buffer {
    state: RwLock<BufferState>,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.read();
        f.debug_struct("Buffer")
            .field("cols", &s.cols)
            .field("rows", &s.rows)
            .field("cursor", &(s.cursor.x, s.cursor.y))
            .field("scrollback", &s.scrollback.len())
            .field("dirty", &s.dirty)
            .finish_non_exhaustive()
    }
}

impl Buffer {
    /// Create a buffer of `cols` x `rows` with the given scrollback
    /// capacity. Dimensions are clamped to at least 1x1.
    #[must_use]
    pub fn new(cols: u16, rows: u16, max_scrollback: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut state = BufferState {
            cols,
            rows,
            screen: Vec::new(),
            line_attrs: Vec::new(),
            cursor: Cursor::new(),
            cur_fg: DEFAULT_FOREGROUND,
            cur_bg: DEFAULT_BACKGROUND,
            cur_style: StyleFlags::empty(),
            scrollback: Scrollback::new(max_scrollback),
            scroll_offset: 0,
            selection: None,
            bracketed_paste: false,
            column_132: false,
            column_40: false,
            line_density: 25,
            dirty: true,
            on_dirty: None,
        };
        let fresh: Vec<Vec<Cell>> = (0..rows).map(|_| state.blank_row()).collect();
        state.screen = fresh;
        state.line_attrs = vec![LineAttribute::Normal; rows as usize];
        Self {
            state: RwLock::new(state),
        }
    }

    /// A panicked holder must not disable the terminal, so poisoning is
    /// absorbed rather than propagated.
    fn read(&self) -> RwLockReadGuard<'_, BufferState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BufferState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the redraw callback, replacing any previous one.
    ///
    /// The callback runs inside the write critical section of every mutation.
    /// It must be non-blocking and must not call back into this buffer; its
    /// only job is to schedule an asynchronous repaint.
    pub fn set_dirty_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.write().on_dirty = Some(Box::new(callback));
    }

    // ── Size ────────────────────────────────────────────────────────

    pub fn size(&self) -> (u16, u16) {
        let s = self.read();
        (s.cols, s.rows)
    }

    /// Resize the grid, preserving the overlapping top-left rectangle of
    /// content and line attributes. No reflow. The cursor is clamped into
    /// the new bounds.
    pub fn resize(&self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut s = self.write();
        if cols == s.cols && rows == s.rows {
            return;
        }
        debug!(
            old_cols = s.cols,
            old_rows = s.rows,
            cols,
            rows,
            "buffer resize"
        );

        let old_screen = std::mem::take(&mut s.screen);
        let old_attrs = std::mem::take(&mut s.line_attrs);
        s.cols = cols;
        s.rows = rows;
        let fresh: Vec<Vec<Cell>> = (0..rows).map(|_| s.blank_row()).collect();
        s.screen = fresh;
        s.line_attrs = vec![LineAttribute::Normal; rows as usize];

        for (y, old_row) in old_screen.into_iter().enumerate().take(rows as usize) {
            for (x, cell) in old_row.into_iter().enumerate().take(cols as usize) {
                s.screen[y][x] = cell;
            }
            s.line_attrs[y] = old_attrs[y];
        }

        s.cursor.clamp(cols, rows);
        s.mark_dirty();
    }

    /// Window-manipulation resize (`CSI 8 ; rows ; cols t`). A zero
    /// parameter keeps the current value.
    pub fn set_logical_size(&self, rows: u16, cols: u16) {
        let (cur_cols, cur_rows) = self.size();
        let rows = if rows == 0 { cur_rows } else { rows };
        let cols = if cols == 0 { cur_cols } else { cols };
        self.resize(cols, rows);
    }

    // ── Cursor ──────────────────────────────────────────────────────

    pub fn cursor(&self) -> (u16, u16) {
        let s = self.read();
        (s.cursor.x, s.cursor.y)
    }

    /// Move the cursor, clamping into the grid.
    pub fn set_cursor(&self, x: u16, y: u16) {
        let mut s = self.write();
        s.set_cursor_clamped(x, y);
        s.mark_dirty();
    }

    pub fn set_cursor_visible(&self, visible: bool) {
        let mut s = self.write();
        s.cursor.visible = visible;
        s.mark_dirty();
    }

    /// Whether the cursor should be drawn. Always false while scrolled into
    /// history: the history view is read-only.
    pub fn is_cursor_visible(&self) -> bool {
        let s = self.read();
        s.cursor.visible && s.scroll_offset == 0
    }

    pub fn set_cursor_style(&self, shape: CursorShape, blink: CursorBlink) {
        let mut s = self.write();
        s.cursor.style = CursorStyle::new(shape, blink);
        s.mark_dirty();
    }

    /// Change only the blink rate, keeping the shape (`CSI ? 12 h/l`).
    pub fn set_cursor_blink(&self, blink: CursorBlink) {
        let mut s = self.write();
        s.cursor.style.blink = blink;
        s.mark_dirty();
    }

    pub fn cursor_style(&self) -> CursorStyle {
        self.read().cursor.style
    }

    /// Save the cursor position into the single save slot, last save wins.
    pub fn save_cursor(&self) {
        let mut s = self.write();
        s.cursor.saved = (s.cursor.x, s.cursor.y);
    }

    /// Restore the saved position, clamped in case the grid shrank since.
    pub fn restore_cursor(&self) {
        let mut s = self.write();
        let (x, y) = s.cursor.saved;
        s.set_cursor_clamped(x, y);
        s.mark_dirty();
    }

    pub fn move_cursor_up(&self, n: u16) {
        let mut s = self.write();
        s.cursor.y = s.cursor.y.saturating_sub(n);
        s.mark_dirty();
    }

    pub fn move_cursor_down(&self, n: u16) {
        let mut s = self.write();
        s.cursor.y = s.cursor.y.saturating_add(n).min(s.rows - 1);
        s.mark_dirty();
    }

    pub fn move_cursor_forward(&self, n: u16) {
        let mut s = self.write();
        s.cursor.x = s.cursor.x.saturating_add(n).min(s.cols - 1);
        s.mark_dirty();
    }

    pub fn move_cursor_backward(&self, n: u16) {
        let mut s = self.write();
        s.cursor.x = s.cursor.x.saturating_sub(n);
        s.mark_dirty();
    }

    // ── Writing ─────────────────────────────────────────────────────

    /// Write one character at the cursor with the pending attributes and
    /// advance. Reaching the right margin wraps to column 0 of the next row
    /// immediately, scrolling if the bottom row overflows, so the cursor is
    /// always in bounds between calls.
    pub fn write_char(&self, ch: char) {
        let mut s = self.write();
        let cell = s.styled_cell(ch);
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        s.screen[y][x] = cell;
        s.cursor.x += 1;
        if s.cursor.x >= s.cols {
            s.cursor.x = 0;
            s.line_feed();
        }
        s.mark_dirty();
    }

    /// Move down one row, scrolling at the bottom. Column unchanged.
    pub fn line_feed(&self) {
        let mut s = self.write();
        s.line_feed();
        s.mark_dirty();
    }

    pub fn carriage_return(&self) {
        let mut s = self.write();
        s.cursor.x = 0;
        s.mark_dirty();
    }

    /// CR + LF in one step (NEL).
    pub fn newline(&self) {
        let mut s = self.write();
        s.cursor.x = 0;
        s.line_feed();
        s.mark_dirty();
    }

    /// Advance to the next multiple-of-8 tab stop, clamped to the last
    /// column.
    pub fn tab(&self) {
        let mut s = self.write();
        s.cursor.x = (s.cursor.x / 8 + 1).saturating_mul(8).min(s.cols - 1);
        s.mark_dirty();
    }

    pub fn backspace(&self) {
        let mut s = self.write();
        s.cursor.x = s.cursor.x.saturating_sub(1);
        s.mark_dirty();
    }

    /// IND: cursor down one row, scrolling at the bottom edge.
    pub fn index(&self) {
        let mut s = self.write();
        s.line_feed();
        s.mark_dirty();
    }

    /// RI: cursor up one row, scrolling down at the top edge.
    pub fn reverse_index(&self) {
        let mut s = self.write();
        if s.cursor.y == 0 {
            s.scroll_down_once();
        } else {
            s.cursor.y -= 1;
        }
        s.mark_dirty();
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll content up `n` rows, evicting the topmost rows (with their
    /// line attributes) into scrollback.
    pub fn scroll_up(&self, n: u16) {
        let mut s = self.write();
        for _ in 0..n {
            s.scroll_up_once();
        }
        s.mark_dirty();
    }

    /// Scroll content down `n` rows. Rows pushed off the bottom are
    /// discarded; scrollback only accumulates from top eviction.
    pub fn scroll_down(&self, n: u16) {
        let mut s = self.write();
        for _ in 0..n {
            s.scroll_down_once();
        }
        s.mark_dirty();
    }

    // ── Erasing ─────────────────────────────────────────────────────

    /// Clear the whole screen with the current colors and reset every line
    /// attribute. Cursor is left where it was.
    pub fn clear_screen(&self) {
        let mut s = self.write();
        let blank = s.erase_cell();
        for row in &mut s.screen {
            row.fill(blank);
        }
        s.line_attrs.fill(LineAttribute::Normal);
        s.mark_dirty();
    }

    pub fn clear_line(&self) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let y = s.cursor.y as usize;
        s.screen[y].fill(blank);
        s.mark_dirty();
    }

    pub fn clear_to_end_of_line(&self) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        s.screen[y][x..].fill(blank);
        s.mark_dirty();
    }

    /// Clear from the start of the line through the cursor, inclusive.
    pub fn clear_to_start_of_line(&self) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        s.screen[y][..=x].fill(blank);
        s.mark_dirty();
    }

    pub fn clear_to_end_of_screen(&self) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        s.screen[y][x..].fill(blank);
        for row in s.screen.iter_mut().skip(y + 1) {
            row.fill(blank);
        }
        s.mark_dirty();
    }

    /// Clear from the top of the screen through the cursor, inclusive.
    pub fn clear_to_start_of_screen(&self) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        for row in s.screen.iter_mut().take(y) {
            row.fill(blank);
        }
        s.screen[y][..=x].fill(blank);
        s.mark_dirty();
    }

    // ── Insert / delete ─────────────────────────────────────────────

    /// Insert `n` blank lines at the cursor row, shifting lines below down.
    /// Lines pushed past the bottom are discarded.
    pub fn insert_lines(&self, n: u16) {
        let mut s = self.write();
        let rows = s.rows as usize;
        let y = s.cursor.y as usize;
        for _ in 0..n.min(s.rows) {
            let blank = s.blank_row();
            s.screen.insert(y, blank);
            s.screen.truncate(rows);
            s.line_attrs.insert(y, LineAttribute::Normal);
            s.line_attrs.truncate(rows);
        }
        s.mark_dirty();
    }

    /// Delete `n` lines at the cursor row, shifting lines below up and
    /// blanking the bottom.
    pub fn delete_lines(&self, n: u16) {
        let mut s = self.write();
        let y = s.cursor.y as usize;
        for _ in 0..n.min(s.rows) {
            s.screen.remove(y);
            let blank = s.blank_row();
            s.screen.push(blank);
            s.line_attrs.remove(y);
            s.line_attrs.push(LineAttribute::Normal);
        }
        s.mark_dirty();
    }

    /// Insert `n` blank cells at the cursor, shifting the rest of the row
    /// right; cells shifted past the margin are lost.
    pub fn insert_chars(&self, n: u16) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let cols = s.cols as usize;
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        let n = (n as usize).min(cols - x);
        let row = &mut s.screen[y];
        for _ in 0..n {
            row.pop();
            row.insert(x, blank);
        }
        s.mark_dirty();
    }

    /// Delete `n` cells at the cursor, shifting the rest of the row left
    /// and filling the margin with blanks.
    pub fn delete_chars(&self, n: u16) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let cols = s.cols as usize;
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        let n = (n as usize).min(cols - x);
        let row = &mut s.screen[y];
        for _ in 0..n {
            row.remove(x);
            row.push(blank);
        }
        s.mark_dirty();
    }

    /// Blank `n` cells at the cursor in place, no shifting.
    pub fn erase_chars(&self, n: u16) {
        let mut s = self.write();
        let blank = s.erase_cell();
        let cols = s.cols as usize;
        let (x, y) = (s.cursor.x as usize, s.cursor.y as usize);
        let end = (x + n as usize).min(cols);
        s.screen[y][x..end].fill(blank);
        s.mark_dirty();
    }

    // ── Pending attributes ──────────────────────────────────────────

    pub fn set_foreground(&self, color: Color) {
        self.write().cur_fg = color;
    }

    pub fn set_background(&self, color: Color) {
        self.write().cur_bg = color;
    }

    pub fn set_bold(&self, on: bool) {
        self.write().cur_style.set(StyleFlags::BOLD, on);
    }

    pub fn set_italic(&self, on: bool) {
        self.write().cur_style.set(StyleFlags::ITALIC, on);
    }

    pub fn set_underline(&self, on: bool) {
        self.write().cur_style.set(StyleFlags::UNDERLINE, on);
    }

    pub fn set_reverse(&self, on: bool) {
        self.write().cur_style.set(StyleFlags::REVERSE, on);
    }

    pub fn set_blink(&self, on: bool) {
        self.write().cur_style.set(StyleFlags::BLINK, on);
    }

    /// Reset all pending attributes to defaults (SGR 0).
    pub fn reset_attributes(&self) {
        let mut s = self.write();
        s.cur_fg = DEFAULT_FOREGROUND;
        s.cur_bg = DEFAULT_BACKGROUND;
        s.cur_style = StyleFlags::empty();
    }

    // ── Line attributes ─────────────────────────────────────────────

    /// Set the display attribute of the current cursor row (DECDHL/DECDWL).
    pub fn set_line_attribute(&self, attr: LineAttribute) {
        let mut s = self.write();
        let y = s.cursor.y as usize;
        s.line_attrs[y] = attr;
        s.mark_dirty();
    }

    pub fn line_attribute(&self, y: u16) -> LineAttribute {
        let s = self.read();
        if y >= s.rows {
            return LineAttribute::Normal;
        }
        s.line_attrs[y as usize]
    }

    /// DECALN screen alignment test: fill every cell with `E` using the
    /// pending attributes, reset line attributes, home the cursor.
    pub fn alignment_fill(&self) {
        let mut s = self.write();
        let cell = s.styled_cell('E');
        for row in &mut s.screen {
            row.fill(cell);
        }
        s.line_attrs.fill(LineAttribute::Normal);
        s.cursor.x = 0;
        s.cursor.y = 0;
        s.mark_dirty();
    }

    // ── Cell queries ────────────────────────────────────────────────

    /// The live screen cell at `(x, y)`, ignoring any scroll offset.
    /// Out-of-bounds coordinates yield a default blank cell.
    pub fn cell(&self, x: u16, y: u16) -> Cell {
        let s = self.read();
        if x >= s.cols || y >= s.rows {
            return Cell::default();
        }
        s.screen[y as usize][x as usize]
    }

    /// The cell at viewport position `(x, y)` with the scroll offset
    /// applied: the first `scroll_offset` rows come from the scrollback
    /// tail (oldest first), the rest from the live screen.
    pub fn visible_cell(&self, x: u16, y: u16) -> Cell {
        self.read().visible_cell_at(x, y)
    }

    /// Line attribute at viewport row `y` with the scroll offset applied.
    pub fn visible_line_attribute(&self, y: u16) -> LineAttribute {
        self.read().visible_line_attribute_at(y)
    }

    // ── Scrollback view ─────────────────────────────────────────────

    pub fn scrollback_len(&self) -> usize {
        self.read().scrollback.len()
    }

    pub fn scroll_offset(&self) -> usize {
        self.read().scroll_offset
    }

    /// Scroll the view `offset` lines into history, clamped to the amount
    /// of history available. 0 returns to the live screen.
    pub fn set_scroll_offset(&self, offset: usize) {
        let mut s = self.write();
        s.scroll_offset = offset.min(s.scrollback.len());
        s.mark_dirty();
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Anchor a new selection at `(x, y)` (clamped into the grid).
    pub fn start_selection(&self, x: u16, y: u16) {
        let mut s = self.write();
        let sel = Selection::at(x.min(s.cols - 1), y.min(s.rows - 1));
        s.selection = Some(sel);
        s.mark_dirty();
    }

    /// Move the floating end of the active selection. No-op when no
    /// selection is active.
    pub fn update_selection(&self, x: u16, y: u16) {
        let mut s = self.write();
        let end = SelectionPoint::new(x.min(s.cols - 1), y.min(s.rows - 1));
        if let Some(sel) = &mut s.selection {
            sel.end = end;
            s.mark_dirty();
        }
    }

    /// Intentionally a no-op: the selection stays active after the pointer
    /// is released so the host can copy from it. Use [`Buffer::clear_selection`]
    /// to drop it.
    pub fn end_selection(&self) {}

    pub fn clear_selection(&self) {
        let mut s = self.write();
        if s.selection.take().is_some() {
            s.mark_dirty();
        }
    }

    /// Select the entire visible grid.
    pub fn select_all(&self) {
        let mut s = self.write();
        s.selection = Some(Selection {
            anchor: SelectionPoint::new(0, 0),
            end: SelectionPoint::new(s.cols - 1, s.rows - 1),
        });
        s.mark_dirty();
    }

    pub fn has_selection(&self) -> bool {
        self.read().selection.is_some()
    }

    /// The active selection in reading order, regardless of drag direction.
    pub fn selection(&self) -> Option<(SelectionPoint, SelectionPoint)> {
        self.read().selection.map(Selection::normalized)
    }

    /// Whether `(x, y)` is inside the active selection. Always false while
    /// scrolled into history, where the selection is hidden.
    pub fn is_in_selection(&self, x: u16, y: u16) -> bool {
        let s = self.read();
        if s.scroll_offset > 0 {
            return false;
        }
        s.selection.is_some_and(|sel| sel.contains(x, y))
    }

    /// Extract the selected text: walk the normalized range row by row,
    /// right-trim trailing blanks per line, join with newlines.
    pub fn selected_text(&self) -> String {
        let s = self.read();
        let Some(sel) = s.selection else {
            return String::new();
        };
        let (start, end) = sel.normalized();
        let cols = s.cols as usize;
        let mut lines = Vec::new();
        for y in start.y..=end.y.min(s.rows - 1) {
            // A selection can outlive a shrinking resize, so both ends
            // clamp to the current width.
            let from = if y == start.y {
                (start.x as usize).min(cols)
            } else {
                0
            };
            let to = if y == end.y {
                (end.x as usize + 1).min(cols)
            } else {
                cols
            };
            let mut line: String = s.screen[y as usize][from..to.max(from)]
                .iter()
                .map(|c| c.ch)
                .collect();
            while line.ends_with(' ') || line.ends_with('\0') {
                line.pop();
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    // ── Modes ───────────────────────────────────────────────────────

    pub fn set_bracketed_paste_mode(&self, enabled: bool) {
        self.write().bracketed_paste = enabled;
    }

    pub fn is_bracketed_paste_mode(&self) -> bool {
        self.read().bracketed_paste
    }

    pub fn set_132_column_mode(&self, enabled: bool) {
        let mut s = self.write();
        s.column_132 = enabled;
        s.mark_dirty();
    }

    pub fn is_132_column_mode(&self) -> bool {
        self.read().column_132
    }

    pub fn set_40_column_mode(&self, enabled: bool) {
        let mut s = self.write();
        s.column_40 = enabled;
        s.mark_dirty();
    }

    pub fn is_40_column_mode(&self) -> bool {
        self.read().column_40
    }

    /// Set the line density (rows per screen at render time: 25, 30, 43,
    /// 50, or 60).
    pub fn set_line_density(&self, density: u16) {
        let mut s = self.write();
        s.line_density = density;
        s.mark_dirty();
    }

    pub fn line_density(&self) -> u16 {
        self.read().line_density
    }

    // ── Dirty tracking ──────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.read().dirty
    }

    pub fn clear_dirty(&self) {
        self.write().dirty = false;
    }
}
