//! ANSI/VT100 escape-sequence parser.
//!
//! A byte-oriented state machine that decodes the output stream of a child
//! process and drives the corresponding [`Buffer`] mutations. All transient
//! decode state (FSM state, CSI accumulators, OSC accumulator, partial
//! UTF-8 bytes) lives on the parser struct, so sequences split across
//! arbitrary chunk boundaries resume correctly on the next [`Parser::parse`]
//! call.
//!
//! The parser never fails: malformed sequences are abandoned and the machine
//! returns to ground, so untrusted process output cannot desynchronize the
//! terminal.

use std::sync::Arc;

use tracing::trace;

use crate::buffer::Buffer;
use crate::cell::LineAttribute;
use crate::color::{ANSI_PALETTE, Color, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND, color_256};
use crate::cursor::{CursorBlink, CursorStyle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    /// After ESC.
    Escape,
    /// Inside `ESC [`, accumulating parameters.
    Csi,
    /// After `ESC ]`, accumulating the command number.
    Osc,
    /// After the first `;` of an OSC, accumulating the string payload.
    OscString,
    /// After `ESC (` or `ESC )`: one designation byte is consumed unread.
    Charset,
    /// After `ESC #`, waiting for the line-attribute digit.
    DecLineAttr,
}

/// Escape-sequence parser bound to a single [`Buffer`].
pub struct Parser {
    buffer: Arc<Buffer>,
    state: State,

    csi_params: Vec<u16>,
    /// Private marker (`?`, `>`, `!`, `<`), only honored directly after
    /// `ESC [`.
    csi_private: Option<u8>,
    /// Intermediate byte (0x20-0x2F), e.g. the space in `CSI Ps SP q`.
    csi_intermediate: Option<u8>,
    /// Value of the parameter currently accumulating, saturating at
    /// `u16::MAX`.
    csi_cur: u32,
    csi_cur_seen: bool,
    /// A `:` sub-parameter makes the whole parameter unparseable; it
    /// commits as 0.
    csi_cur_invalid: bool,

    osc_buf: Vec<u8>,

    utf8_buf: [u8; 4],
    utf8_len: u8,
    /// Continuation bytes still expected; non-zero suspends FSM dispatch.
    utf8_need: u8,
}

impl Parser {
    /// Create a parser in ground state driving `buffer`.
    #[must_use]
    pub fn new(buffer: Arc<Buffer>) -> Self {
        Self {
            buffer,
            state: State::Ground,
            csi_params: Vec::with_capacity(16),
            csi_private: None,
            csi_intermediate: None,
            csi_cur: 0,
            csi_cur_seen: false,
            csi_cur_invalid: false,
            osc_buf: Vec::new(),
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    /// Feed a chunk of bytes. Chunks of any size are fine, including empty
    /// ones and splits inside escape or UTF-8 sequences.
    pub fn parse(&mut self, data: &[u8]) {
        for &b in data {
            self.process_byte(b);
        }
    }

    /// Feed a UTF-8 string.
    pub fn parse_str(&mut self, data: &str) {
        self.parse(data.as_bytes());
    }

    fn process_byte(&mut self, b: u8) {
        // UTF-8 continuation collection runs underneath the state machine.
        if self.utf8_need > 0 {
            if b & 0xC0 == 0x80 {
                self.utf8_buf[self.utf8_len as usize] = b;
                self.utf8_len += 1;
                self.utf8_need -= 1;
                if self.utf8_need == 0 {
                    let ch = decode_utf8(&self.utf8_buf[..self.utf8_len as usize]);
                    self.utf8_len = 0;
                    self.buffer.write_char(ch);
                }
                return;
            }
            // Invalid continuation: drop the partial sequence and process
            // the offending byte as if freshly seen.
            self.utf8_len = 0;
            self.utf8_need = 0;
        }

        // Multi-byte leads only start a sequence in ground state.
        if self.state == State::Ground {
            let need = if b & 0xE0 == 0xC0 {
                1
            } else if b & 0xF0 == 0xE0 {
                2
            } else if b & 0xF8 == 0xF0 {
                3
            } else {
                0
            };
            if need > 0 {
                self.utf8_buf[0] = b;
                self.utf8_len = 1;
                self.utf8_need = need;
                return;
            }
        }

        match self.state {
            State::Ground => self.ground(b),
            State::Escape => self.escape(b),
            State::Csi => self.csi(b),
            State::Osc => self.osc(b),
            State::OscString => self.osc_string(b),
            // The designation byte itself is not interpreted.
            State::Charset => self.state = State::Ground,
            State::DecLineAttr => self.dec_line_attr(b),
        }
    }

    fn ground(&mut self, b: u8) {
        match b {
            0x00 | 0x07 => {} // NUL, BEL
            0x08 => self.buffer.backspace(),
            0x09 => self.buffer.tab(),
            // VT and FF act as line feeds.
            0x0A | 0x0B | 0x0C => self.buffer.line_feed(),
            0x0D => self.buffer.carriage_return(),
            0x1B => self.state = State::Escape,
            0x20..=0x7E => self.buffer.write_char(b as char),
            // Remaining C0 controls and stray non-UTF-8 bytes are dropped.
            _ => {}
        }
    }

    fn escape(&mut self, b: u8) {
        self.state = State::Ground;
        match b {
            b'[' => {
                self.csi_params.clear();
                self.csi_private = None;
                self.csi_intermediate = None;
                self.csi_cur = 0;
                self.csi_cur_seen = false;
                self.csi_cur_invalid = false;
                self.state = State::Csi;
            }
            b']' => {
                self.osc_buf.clear();
                self.state = State::Osc;
            }
            b'(' | b')' => self.state = State::Charset,
            b'#' => self.state = State::DecLineAttr,
            // DECSC / DECRC
            b'7' => self.buffer.save_cursor(),
            b'8' => self.buffer.restore_cursor(),
            // RIS: attributes reset first so the clear fills with defaults.
            b'c' => {
                self.buffer.reset_attributes();
                self.buffer.clear_screen();
                self.buffer.set_cursor(0, 0);
            }
            // IND / RI / NEL
            b'D' => self.buffer.index(),
            b'M' => self.buffer.reverse_index(),
            b'E' => self.buffer.newline(),
            // DECKPAM / DECKPNM: keypad modes are not tracked.
            b'=' | b'>' => {}
            _ => trace!(byte = b, "unknown escape, returning to ground"),
        }
    }

    /// `ESC #` line attributes (DECDHL/DECDWL/DECSWL) and DECALN.
    fn dec_line_attr(&mut self, b: u8) {
        match b {
            b'3' => self.buffer.set_line_attribute(LineAttribute::DoubleTop),
            b'4' => self.buffer.set_line_attribute(LineAttribute::DoubleBottom),
            b'5' => self.buffer.set_line_attribute(LineAttribute::Normal),
            b'6' => self.buffer.set_line_attribute(LineAttribute::DoubleWidth),
            b'8' => self.buffer.alignment_fill(),
            _ => trace!(byte = b, "unknown DEC line attribute"),
        }
        self.state = State::Ground;
    }

    fn csi(&mut self, b: u8) {
        let at_start = self.csi_params.is_empty()
            && !self.csi_cur_seen
            && !self.csi_cur_invalid
            && self.csi_private.is_none()
            && self.csi_intermediate.is_none();
        if at_start && matches!(b, b'?' | b'>' | b'!' | b'<') {
            self.csi_private = Some(b);
            return;
        }

        match b {
            b'0'..=b'9' => {
                self.csi_cur = self
                    .csi_cur
                    .saturating_mul(10)
                    .saturating_add(u32::from(b - b'0'))
                    .min(u32::from(u16::MAX));
                self.csi_cur_seen = true;
            }
            b';' => self.commit_param(),
            b':' => {
                // Sub-parameter syntax is not supported; the parameter
                // becomes unparseable and commits as 0.
                self.csi_cur_seen = true;
                self.csi_cur_invalid = true;
            }
            0x20..=0x2F => {
                self.commit_param();
                self.csi_intermediate = Some(b);
            }
            _ => {
                self.commit_param();
                self.state = State::Ground;
                self.dispatch_csi(b);
            }
        }
    }

    fn commit_param(&mut self) {
        let value = if self.csi_cur_invalid {
            0
        } else {
            self.csi_cur as u16
        };
        self.csi_params.push(value);
        self.csi_cur = 0;
        self.csi_cur_seen = false;
        self.csi_cur_invalid = false;
    }

    /// Parameter at `idx`, with 0 or missing resolving to `default`.
    fn param(&self, idx: usize, default: u16) -> u16 {
        match self.csi_params.get(idx) {
            Some(&v) if v > 0 => v,
            _ => default,
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8) {
        match final_byte {
            // CUU / CUD / CUF / CUB
            b'A' => self.buffer.move_cursor_up(self.param(0, 1)),
            b'B' => self.buffer.move_cursor_down(self.param(0, 1)),
            b'C' => self.buffer.move_cursor_forward(self.param(0, 1)),
            b'D' => self.buffer.move_cursor_backward(self.param(0, 1)),
            // CNL / CPL
            b'E' => {
                self.buffer.move_cursor_down(self.param(0, 1));
                self.buffer.carriage_return();
            }
            b'F' => {
                self.buffer.move_cursor_up(self.param(0, 1));
                self.buffer.carriage_return();
            }
            // CHA: absolute column, 1-indexed.
            b'G' => {
                let x = self.param(0, 1) - 1;
                let (_, y) = self.buffer.cursor();
                self.buffer.set_cursor(x, y);
            }
            // CUP / HVP: row;col, 1-indexed.
            b'H' | b'f' => {
                let row = self.param(0, 1) - 1;
                let col = self.param(1, 1) - 1;
                self.buffer.set_cursor(col, row);
            }
            // ED
            b'J' => match self.param(0, 0) {
                0 => self.buffer.clear_to_end_of_screen(),
                1 => self.buffer.clear_to_start_of_screen(),
                2 | 3 => {
                    self.buffer.clear_screen();
                    self.buffer.set_cursor(0, 0);
                }
                _ => {}
            },
            // EL
            b'K' => match self.param(0, 0) {
                0 => self.buffer.clear_to_end_of_line(),
                1 => self.buffer.clear_to_start_of_line(),
                2 => self.buffer.clear_line(),
                _ => {}
            },
            // IL / DL
            b'L' => self.buffer.insert_lines(self.param(0, 1)),
            b'M' => self.buffer.delete_lines(self.param(0, 1)),
            // DCH / ICH / ECH
            b'P' => self.buffer.delete_chars(self.param(0, 1)),
            b'@' => self.buffer.insert_chars(self.param(0, 1)),
            b'X' => self.buffer.erase_chars(self.param(0, 1)),
            // SU / SD
            b'S' => self.buffer.scroll_up(self.param(0, 1)),
            b'T' => self.buffer.scroll_down(self.param(0, 1)),
            // VPA: absolute row, 1-indexed.
            b'd' => {
                let y = self.param(0, 1) - 1;
                let (x, _) = self.buffer.cursor();
                self.buffer.set_cursor(x, y);
            }
            b'm' => self.sgr(),
            // SM / RM: only DEC private modes are interpreted.
            b'h' => {
                if self.csi_private == Some(b'?') {
                    self.private_mode(true);
                }
            }
            b'l' => {
                if self.csi_private == Some(b'?') {
                    self.private_mode(false);
                }
            }
            // SCP / RCP
            b's' => self.buffer.save_cursor(),
            b'u' => self.buffer.restore_cursor(),
            // DECSTBM (scroll region), DSR, DA: not supported here.
            b'r' | b'n' | b'c' => {
                trace!(final_byte, "ignored CSI sequence");
            }
            b't' => self.window_manipulation(),
            // DECSCUSR, only with the space intermediate.
            b'q' => {
                if self.csi_intermediate == Some(b' ') {
                    let style = CursorStyle::from_style_code(self.param(0, 1));
                    self.buffer.set_cursor_style(style.shape, style.blink);
                }
            }
            _ => trace!(final_byte, "unknown CSI final byte"),
        }
    }

    fn sgr(&self) {
        if self.csi_params.is_empty() {
            self.buffer.reset_attributes();
            return;
        }
        let mut i = 0;
        while i < self.csi_params.len() {
            let p = self.csi_params[i];
            match p {
                0 => self.buffer.reset_attributes(),
                1 => self.buffer.set_bold(true),
                // Dim is folded into normal intensity.
                2 => self.buffer.set_bold(false),
                3 => self.buffer.set_italic(true),
                4 => self.buffer.set_underline(true),
                5 | 6 => self.buffer.set_blink(true),
                7 => self.buffer.set_reverse(true),
                21 | 22 => self.buffer.set_bold(false),
                23 => self.buffer.set_italic(false),
                24 => self.buffer.set_underline(false),
                25 => self.buffer.set_blink(false),
                27 => self.buffer.set_reverse(false),
                30..=37 => self.buffer.set_foreground(ANSI_PALETTE[(p - 30) as usize]),
                90..=97 => self.buffer.set_foreground(ANSI_PALETTE[(p - 90 + 8) as usize]),
                40..=47 => self.buffer.set_background(ANSI_PALETTE[(p - 40) as usize]),
                100..=107 => self.buffer.set_background(ANSI_PALETTE[(p - 100 + 8) as usize]),
                38 | 48 => match &self.csi_params[i..] {
                    // Indexed 256-color: 38;5;N / 48;5;N
                    [_, 5, n, ..] => {
                        let color = color_256(*n);
                        if p == 38 {
                            self.buffer.set_foreground(color);
                        } else {
                            self.buffer.set_background(color);
                        }
                        i += 2;
                    }
                    // Truecolor: 38;2;R;G;B / 48;2;R;G;B
                    [_, 2, r, g, b, ..] => {
                        let color = Color::rgb(*r as u8, *g as u8, *b as u8);
                        if p == 38 {
                            self.buffer.set_foreground(color);
                        } else {
                            self.buffer.set_background(color);
                        }
                        i += 4;
                    }
                    // Missing arguments: ignore, do not consume.
                    _ => {}
                },
                39 => self.buffer.set_foreground(DEFAULT_FOREGROUND),
                49 => self.buffer.set_background(DEFAULT_BACKGROUND),
                _ => {}
            }
            i += 1;
        }
    }

    fn private_mode(&self, set: bool) {
        for &mode in &self.csi_params {
            match mode {
                // DECCOLM
                3 => self.buffer.set_132_column_mode(set),
                // Cursor blink rate: set=fast, reset=slow.
                12 => self.buffer.set_cursor_blink(if set {
                    CursorBlink::Fast
                } else {
                    CursorBlink::Slow
                }),
                // DECTCEM
                25 => self.buffer.set_cursor_visible(set),
                2004 => self.buffer.set_bracketed_paste_mode(set),
                // DECCKM, DECAWM, alternate screen, and the rest.
                _ => trace!(mode, set, "ignored private mode"),
            }
        }
    }

    /// `CSI Ps ; Ps ; Ps t`: window manipulation. `8;rows;cols` sets the
    /// logical size; `9;...` are vendor extensions for 40-column mode and
    /// line density.
    fn window_manipulation(&self) {
        let Some(&cmd) = self.csi_params.first() else {
            return;
        };
        match cmd {
            8 => {
                let rows = self.csi_params.get(1).copied().unwrap_or(0);
                let cols = self.csi_params.get(2).copied().unwrap_or(0);
                self.buffer.set_logical_size(rows, cols);
            }
            9 => match self.csi_params.get(1).copied() {
                Some(40) => {
                    let enabled = self.csi_params.get(2).copied().unwrap_or(0) != 0;
                    self.buffer.set_40_column_mode(enabled);
                }
                Some(density @ (25 | 30 | 43 | 50 | 60)) => {
                    self.buffer.set_line_density(density);
                }
                _ => {}
            },
            _ => trace!(cmd, "ignored window manipulation"),
        }
    }

    fn osc(&mut self, b: u8) {
        match b {
            b'0'..=b'9' => self.osc_buf.push(b),
            b';' => {
                self.osc_buf.clear();
                self.state = State::OscString;
            }
            _ => {
                self.osc_buf.clear();
                self.state = State::Ground;
            }
        }
    }

    fn osc_string(&mut self, b: u8) {
        match b {
            // BEL terminates; a bare ESC is accepted as an approximation of
            // the two-byte ST terminator. Content is discarded either way:
            // no OSC command has a buffer-visible effect.
            0x07 | 0x1B => {
                trace!(len = self.osc_buf.len(), "OSC string discarded");
                self.osc_buf.clear();
                self.state = State::Ground;
            }
            _ => self.osc_buf.push(b),
        }
    }
}

/// Decode an assembled UTF-8 sequence; complete sequences that name an
/// invalid scalar become U+FFFD.
fn decode_utf8(buf: &[u8]) -> char {
    let v = match buf.len() {
        2 => (u32::from(buf[0] & 0x1F) << 6) | u32::from(buf[1] & 0x3F),
        3 => {
            (u32::from(buf[0] & 0x0F) << 12)
                | (u32::from(buf[1] & 0x3F) << 6)
                | u32::from(buf[2] & 0x3F)
        }
        4 => {
            (u32::from(buf[0] & 0x07) << 18)
                | (u32::from(buf[1] & 0x3F) << 12)
                | (u32::from(buf[2] & 0x3F) << 6)
                | u32::from(buf[3] & 0x3F)
        }
        _ => 0xFFFD,
    };
    char::from_u32(v).unwrap_or('\u{FFFD}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::StyleFlags;
    use crate::cursor::CursorShape;

    fn setup(cols: u16, rows: u16) -> (Parser, Arc<Buffer>) {
        let buffer = Arc::new(Buffer::new(cols, rows, 32));
        let parser = Parser::new(Arc::clone(&buffer));
        (parser, buffer)
    }

    fn row_text(buffer: &Buffer, y: u16) -> String {
        let (cols, _) = buffer.size();
        (0..cols).map(|x| buffer.cell(x, y).ch).collect()
    }

    // ── Ground state ───────────────────────────────────────────────

    #[test]
    fn printable_ascii_is_written() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"hi");
        assert_eq!(buf.cell(0, 0).ch, 'h');
        assert_eq!(buf.cell(1, 0).ch, 'i');
        assert_eq!(buf.cursor(), (2, 0));
    }

    #[test]
    fn c0_controls_move_the_cursor() {
        let (mut p, buf) = setup(20, 3);
        p.parse(b"ab\rc");
        assert_eq!(row_text(&buf, 0), "cb                  ");
        p.parse(b"\n");
        assert_eq!(buf.cursor(), (1, 1));
        p.parse(b"\t");
        assert_eq!(buf.cursor(), (8, 1));
        p.parse(b"\x08");
        assert_eq!(buf.cursor(), (7, 1));
    }

    #[test]
    fn vt_and_ff_act_as_line_feeds() {
        let (mut p, buf) = setup(10, 4);
        p.parse(b"\x0b\x0c");
        assert_eq!(buf.cursor(), (0, 2));
    }

    #[test]
    fn nul_and_bel_are_ignored() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"a\x00\x07b");
        assert_eq!(row_text(&buf, 0), "ab        ");
    }

    // ── UTF-8 ──────────────────────────────────────────────────────

    #[test]
    fn multi_byte_utf8_is_written() {
        let (mut p, buf) = setup(10, 2);
        p.parse_str("aé中🎉");
        assert_eq!(buf.cell(0, 0).ch, 'a');
        assert_eq!(buf.cell(1, 0).ch, 'é');
        assert_eq!(buf.cell(2, 0).ch, '中');
        assert_eq!(buf.cell(3, 0).ch, '🎉');
    }

    #[test]
    fn utf8_split_across_parse_calls() {
        let (mut p, buf) = setup(10, 2);
        // 🎉 = F0 9F 8E 89, one byte per call.
        for b in "🎉".as_bytes() {
            p.parse(&[*b]);
        }
        assert_eq!(buf.cell(0, 0).ch, '🎉');
    }

    #[test]
    fn invalid_continuation_reprocesses_the_byte() {
        let (mut p, buf) = setup(10, 2);
        p.parse(&[0xC3, b'a']);
        // The partial sequence is dropped; 'a' lands as itself.
        assert_eq!(buf.cell(0, 0).ch, 'a');
        assert_eq!(buf.cursor(), (1, 0));
    }

    #[test]
    fn escape_interrupting_utf8_is_honored() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"x");
        p.parse(&[0xC3, 0x1B, b'c']);
        // 0x1B aborts the sequence and ESC c performs a full reset.
        assert_eq!(buf.cell(0, 0).ch, ' ');
        assert_eq!(buf.cursor(), (0, 0));
    }

    #[test]
    fn surrogate_encodings_become_replacement_chars() {
        let (mut p, buf) = setup(10, 2);
        // ED A0 80 assembles to U+D800, not a valid scalar.
        p.parse(&[0xED, 0xA0, 0x80]);
        assert_eq!(buf.cell(0, 0).ch, '\u{FFFD}');
    }

    // ── Cursor movement ────────────────────────────────────────────

    #[test]
    fn cup_is_one_indexed_row_col() {
        let (mut p, buf) = setup(20, 10);
        p.parse(b"\x1b[5;10H");
        assert_eq!(buf.cursor(), (9, 4));
        // Zero and omitted parameters mean 1.
        p.parse(b"\x1b[0;0H");
        assert_eq!(buf.cursor(), (0, 0));
        p.parse(b"\x1b[3;7f");
        assert_eq!(buf.cursor(), (6, 2));
        p.parse(b"\x1b[H");
        assert_eq!(buf.cursor(), (0, 0));
    }

    #[test]
    fn relative_moves_default_to_one_and_clamp() {
        let (mut p, buf) = setup(10, 5);
        p.parse(b"\x1b[3;3H");
        p.parse(b"\x1b[A\x1b[2B\x1b[3C\x1b[D");
        assert_eq!(buf.cursor(), (4, 3));
        p.parse(b"\x1b[99A\x1b[99D");
        assert_eq!(buf.cursor(), (0, 0));
        p.parse(b"\x1b[99B\x1b[99C");
        assert_eq!(buf.cursor(), (9, 4));
    }

    #[test]
    fn next_prev_line_reset_the_column() {
        let (mut p, buf) = setup(10, 5);
        p.parse(b"\x1b[3;5H\x1b[E");
        assert_eq!(buf.cursor(), (0, 3));
        p.parse(b"\x1b[3;5H\x1b[2F");
        assert_eq!(buf.cursor(), (0, 0));
    }

    #[test]
    fn column_and_row_absolutes() {
        let (mut p, buf) = setup(10, 5);
        p.parse(b"\x1b[5G");
        assert_eq!(buf.cursor(), (4, 0));
        p.parse(b"\x1b[4d");
        assert_eq!(buf.cursor(), (4, 3));
    }

    #[test]
    fn save_restore_via_esc_and_csi() {
        let (mut p, buf) = setup(10, 5);
        p.parse(b"\x1b[2;3H\x1b7\x1b[5;5H\x1b8");
        assert_eq!(buf.cursor(), (2, 1));
        p.parse(b"\x1b[4;4H\x1b[s\x1b[1;1H\x1b[u");
        assert_eq!(buf.cursor(), (3, 3));
    }

    #[test]
    fn index_and_reverse_index_scroll_at_edges() {
        let (mut p, buf) = setup(4, 2);
        p.parse(b"ab\r\ncd");
        // Cursor on the bottom row: ESC D scrolls up, evicting "ab".
        p.parse(b"\x1bD");
        assert_eq!(buf.scrollback_len(), 1);
        assert_eq!(row_text(&buf, 0), "cd  ");
        // Back to the top row: ESC M scrolls down.
        p.parse(b"\x1b[1;1H\x1bM");
        assert_eq!(row_text(&buf, 1), "cd  ");
    }

    #[test]
    fn nel_is_carriage_return_plus_line_feed() {
        let (mut p, buf) = setup(10, 5);
        p.parse(b"abc\x1bE");
        assert_eq!(buf.cursor(), (0, 1));
    }

    // ── Erase ──────────────────────────────────────────────────────

    #[test]
    fn erase_in_line_variants() {
        let (mut p, buf) = setup(5, 3);
        p.parse(b"abcde\x1b[1;3H\x1b[K");
        assert_eq!(row_text(&buf, 0), "ab   ");

        p.parse(b"\x1b[2;1Hvwxyz\x1b[2;3H\x1b[1K");
        assert_eq!(row_text(&buf, 1), "   yz");

        p.parse(b"\x1b[2K");
        assert_eq!(row_text(&buf, 1), "     ");
    }

    #[test]
    fn erase_in_display_clears_and_homes() {
        let (mut p, buf) = setup(4, 3);
        p.parse(b"aaaabbbbcccc\x1b[2J");
        for y in 0..3 {
            assert_eq!(row_text(&buf, y), "    ");
        }
        assert_eq!(buf.cursor(), (0, 0));
    }

    #[test]
    fn erase_below_and_above() {
        let (mut p, buf) = setup(3, 3);
        p.parse(b"aaabbbcc\x1b[2;2H\x1b[J");
        assert_eq!(row_text(&buf, 0), "aaa");
        assert_eq!(row_text(&buf, 1), "b  ");
        assert_eq!(row_text(&buf, 2), "   ");

        p.parse(b"\x1b[2J\x1b[1;1Haaabbbcc\x1b[2;2H\x1b[1J");
        assert_eq!(row_text(&buf, 0), "   ");
        assert_eq!(row_text(&buf, 1), "  b");
        assert_eq!(row_text(&buf, 2), "cc ");
    }

    #[test]
    fn erase_keeps_current_background() {
        let (mut p, buf) = setup(4, 2);
        p.parse(b"\x1b[41m\x1b[K");
        assert_eq!(buf.cell(3, 0).bg, ANSI_PALETTE[1]);
        // Full reset restores the default background before clearing.
        p.parse(b"\x1bc");
        assert!(buf.cell(3, 0).bg.is_default);
    }

    #[test]
    fn insert_delete_erase_chars_and_lines() {
        let (mut p, buf) = setup(5, 3);
        p.parse(b"abcde\x1b[1;2H\x1b[2@");
        assert_eq!(row_text(&buf, 0), "a  bc");
        p.parse(b"\x1b[2P");
        assert_eq!(row_text(&buf, 0), "abc  ");
        p.parse(b"\x1b[2X");
        assert_eq!(row_text(&buf, 0), "a    ");

        p.parse(b"\x1b[2J\x1b[1;1Hxxx\x1b[1;1H\x1b[L");
        assert_eq!(row_text(&buf, 0), "     ");
        assert_eq!(row_text(&buf, 1), "xxx  ");
        p.parse(b"\x1b[M");
        assert_eq!(row_text(&buf, 0), "xxx  ");
    }

    #[test]
    fn scroll_sequences_move_content() {
        let (mut p, buf) = setup(3, 3);
        p.parse(b"aaabbbcc\x1b[S");
        assert_eq!(row_text(&buf, 0), "bbb");
        assert_eq!(buf.scrollback_len(), 1);
        p.parse(b"\x1b[2T");
        assert_eq!(row_text(&buf, 0), "   ");
        assert_eq!(row_text(&buf, 2), "bbb");
    }

    // ── SGR ────────────────────────────────────────────────────────

    #[test]
    fn sgr_bold_red_round_trip() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[1;31mx\x1b[0my");
        let styled = buf.cell(0, 0);
        assert!(styled.style.contains(StyleFlags::BOLD));
        assert_eq!(styled.fg, ANSI_PALETTE[1]);
        let plain = buf.cell(1, 0);
        assert!(plain.style.is_empty());
        assert!(plain.fg.is_default);
    }

    #[test]
    fn sgr_attribute_offs() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[1;3;4;5;7m\x1b[22;23;24;25;27mx");
        let cell = buf.cell(0, 0);
        assert!(cell.style.is_empty());
        assert_eq!(cell.fg, DEFAULT_FOREGROUND);
        assert_eq!(cell.bg, DEFAULT_BACKGROUND);
    }

    #[test]
    fn sgr_bright_and_background_palette() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[92;105mx");
        let cell = buf.cell(0, 0);
        assert_eq!(cell.fg, ANSI_PALETTE[10]);
        assert_eq!(cell.bg, ANSI_PALETTE[13]);
    }

    #[test]
    fn sgr_reverse_swaps_stored_colors() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[31;44m\x1b[7mx");
        let cell = buf.cell(0, 0);
        assert_eq!(cell.fg, ANSI_PALETTE[4]);
        assert_eq!(cell.bg, ANSI_PALETTE[1]);
        assert!(!cell.style.contains(StyleFlags::REVERSE));
    }

    #[test]
    fn sgr_256_color_indexed() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[38;5;196m\x1b[48;5;240mx");
        let cell = buf.cell(0, 0);
        assert_eq!(cell.fg, color_256(196));
        assert_eq!(cell.bg, color_256(240));
    }

    #[test]
    fn sgr_truecolor() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[38;2;10;20;30mx");
        let cell = buf.cell(0, 0);
        assert_eq!(cell.fg, Color::rgb(10, 20, 30));
        assert!(!cell.fg.is_default);
    }

    #[test]
    fn sgr_default_fg_bg_codes() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[31;41m\x1b[39;49mx");
        let cell = buf.cell(0, 0);
        assert!(cell.fg.is_default);
        assert!(cell.bg.is_default);
    }

    #[test]
    fn sgr_truecolor_components_truncate() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[38;2;300;20;30mx");
        // 300 wraps to 44 via u8 truncation.
        assert_eq!(buf.cell(0, 0).fg, Color::rgb(44, 20, 30));
    }

    #[test]
    fn sgr_malformed_extended_color_is_skipped() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[31m\x1b[38;5mx");
        // "38;5" is incomplete; 38 is skipped and the dangling 5 reads as
        // blink, leaving the foreground untouched.
        let cell = buf.cell(0, 0);
        assert_eq!(cell.fg, ANSI_PALETTE[1]);
        assert!(cell.style.contains(StyleFlags::BLINK));
    }

    #[test]
    fn sgr_colon_subparameters_commit_as_zero() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[31m\x1b[38:5:196mx");
        // The colon form collapses to a single 0 parameter: a full reset.
        assert!(buf.cell(0, 0).fg.is_default);
    }

    // ── Private modes ──────────────────────────────────────────────

    #[test]
    fn cursor_visibility_mode() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[?25l");
        assert!(!buf.is_cursor_visible());
        p.parse(b"\x1b[?25h");
        assert!(buf.is_cursor_visible());
    }

    #[test]
    fn bracketed_paste_and_132_column_modes() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[?2004h\x1b[?3h");
        assert!(buf.is_bracketed_paste_mode());
        assert!(buf.is_132_column_mode());
        p.parse(b"\x1b[?2004l\x1b[?3l");
        assert!(!buf.is_bracketed_paste_mode());
        assert!(!buf.is_132_column_mode());
    }

    #[test]
    fn blink_rate_mode_keeps_shape() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[4 q");
        assert_eq!(buf.cursor_style().shape, CursorShape::Underline);
        p.parse(b"\x1b[?12h");
        assert_eq!(buf.cursor_style().shape, CursorShape::Underline);
        assert_eq!(buf.cursor_style().blink, CursorBlink::Fast);
        p.parse(b"\x1b[?12l");
        assert_eq!(buf.cursor_style().blink, CursorBlink::Slow);
    }

    #[test]
    fn multiple_private_modes_in_one_sequence() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[?25;2004h");
        assert!(buf.is_cursor_visible());
        assert!(buf.is_bracketed_paste_mode());
    }

    #[test]
    fn unknown_private_modes_are_ignored() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[?1049h\x1b[?1h\x1b[?7l");
        p.parse(b"x");
        assert_eq!(buf.cell(0, 0).ch, 'x');
    }

    #[test]
    fn non_private_set_reset_is_ignored() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[4h\x1b[25l");
        // ANSI insert mode is not interpreted and 25 without the marker
        // must not touch cursor visibility.
        assert!(buf.is_cursor_visible());
    }

    // ── DECSCUSR ───────────────────────────────────────────────────

    #[test]
    fn cursor_style_codes() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[2 q");
        assert_eq!(
            buf.cursor_style(),
            CursorStyle::new(CursorShape::Block, CursorBlink::None)
        );
        p.parse(b"\x1b[5 q");
        assert_eq!(
            buf.cursor_style(),
            CursorStyle::new(CursorShape::Bar, CursorBlink::Slow)
        );
        p.parse(b"\x1b[ q");
        assert_eq!(
            buf.cursor_style(),
            CursorStyle::new(CursorShape::Block, CursorBlink::Slow)
        );
    }

    #[test]
    fn q_without_space_intermediate_is_ignored() {
        let (mut p, buf) = setup(10, 2);
        let before = buf.cursor_style();
        p.parse(b"\x1b[2q");
        assert_eq!(buf.cursor_style(), before);
    }

    // ── DEC line attributes ────────────────────────────────────────

    #[test]
    fn dec_line_attribute_sequences() {
        let (mut p, buf) = setup(10, 4);
        p.parse(b"\x1b#6");
        assert_eq!(buf.line_attribute(0), LineAttribute::DoubleWidth);
        p.parse(b"\x1b[2;1H\x1b#3");
        assert_eq!(buf.line_attribute(1), LineAttribute::DoubleTop);
        p.parse(b"\x1b[3;1H\x1b#4");
        assert_eq!(buf.line_attribute(2), LineAttribute::DoubleBottom);
        p.parse(b"\x1b[1;1H\x1b#5");
        assert_eq!(buf.line_attribute(0), LineAttribute::Normal);
    }

    #[test]
    fn alignment_test_fills_screen_with_e() {
        let (mut p, buf) = setup(4, 3);
        p.parse(b"\x1b#6\x1b#8");
        for y in 0..3 {
            assert_eq!(row_text(&buf, y), "EEEE");
            assert_eq!(buf.line_attribute(y), LineAttribute::Normal);
        }
        assert_eq!(buf.cursor(), (0, 0));
    }

    // ── Window manipulation ────────────────────────────────────────

    #[test]
    fn window_size_sequence_resizes() {
        let (mut p, buf) = setup(80, 24);
        p.parse(b"\x1b[8;10;40t");
        assert_eq!(buf.size(), (40, 10));
        // Zero keeps the current dimension.
        p.parse(b"\x1b[8;0;20t");
        assert_eq!(buf.size(), (20, 10));
    }

    #[test]
    fn vendor_extensions_set_modes() {
        let (mut p, buf) = setup(80, 24);
        p.parse(b"\x1b[9;40;1t");
        assert!(buf.is_40_column_mode());
        p.parse(b"\x1b[9;40;0t");
        assert!(!buf.is_40_column_mode());
        p.parse(b"\x1b[9;50t");
        assert_eq!(buf.line_density(), 50);
        // Unsupported density values are ignored.
        p.parse(b"\x1b[9;99t");
        assert_eq!(buf.line_density(), 50);
    }

    // ── Charset designation ────────────────────────────────────────

    #[test]
    fn charset_designation_consumes_one_byte() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b(B\x1b)0x");
        assert_eq!(buf.cell(0, 0).ch, 'x');
        assert_eq!(buf.cursor(), (1, 0));
    }

    // ── OSC ────────────────────────────────────────────────────────

    #[test]
    fn osc_is_consumed_and_discarded() {
        let (mut p, buf) = setup(20, 2);
        p.parse(b"\x1b]0;window title\x07x");
        assert_eq!(buf.cell(0, 0).ch, 'x');
        assert_eq!(buf.cursor(), (1, 0));
    }

    #[test]
    fn osc_esc_terminator_is_approximated() {
        let (mut p, buf) = setup(20, 2);
        // The ESC of a real ST terminator ends the string; the trailing
        // backslash is then processed in ground state and prints.
        p.parse(b"\x1b]2;title\x1b\\x");
        assert_eq!(buf.cell(0, 0).ch, '\\');
        assert_eq!(buf.cell(1, 0).ch, 'x');
    }

    #[test]
    fn malformed_osc_aborts_to_ground() {
        let (mut p, buf) = setup(20, 2);
        p.parse(b"\x1b]Zx");
        // 'Z' is neither a digit nor ';': the OSC is abandoned and 'x'
        // prints normally.
        assert_eq!(buf.cell(0, 0).ch, 'x');
    }

    // ── Resumability and robustness ────────────────────────────────

    #[test]
    fn csi_split_byte_by_byte_matches_single_feed() {
        let (mut split, split_buf) = setup(10, 2);
        for b in b"\x1b[31m" {
            split.parse(&[*b]);
        }
        split.parse(b"x");

        let (mut whole, whole_buf) = setup(10, 2);
        whole.parse(b"\x1b[31mx");

        assert_eq!(split_buf.cell(0, 0), whole_buf.cell(0, 0));
    }

    #[test]
    fn empty_parse_calls_are_noops() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"");
        p.parse(b"a");
        p.parse(b"");
        assert_eq!(buf.cell(0, 0).ch, 'a');
    }

    #[test]
    fn unknown_escape_returns_to_ground() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1bZx");
        assert_eq!(buf.cell(0, 0).ch, 'x');
    }

    #[test]
    fn unknown_csi_final_is_discarded() {
        let (mut p, buf) = setup(10, 2);
        p.parse(b"\x1b[99~x");
        assert_eq!(buf.cell(0, 0).ch, 'x');
    }

    #[test]
    fn oversized_parameters_saturate() {
        let (mut p, buf) = setup(10, 3);
        p.parse(b"\x1b[99999999999999999999Bx");
        // Saturates instead of overflowing; the cursor just clamps to the
        // bottom row.
        assert_eq!(buf.cell(0, 2).ch, 'x');
    }

    #[test]
    fn private_marker_mid_sequence_aborts() {
        let (mut p, buf) = setup(10, 2);
        // '?' after a digit is not a marker; it acts as an unknown final
        // and the remaining bytes print as ordinary text.
        p.parse(b"\x1b[2?5hx");
        assert!(buf.is_cursor_visible());
        assert_eq!(row_text(&buf, 0), "5hx       ");
    }
}
