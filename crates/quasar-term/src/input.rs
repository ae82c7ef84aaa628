// SPDX-License-Identifier: MIT
//
// Terminal input parser.
//
// Turns raw stdin bytes into key and paste events. Handles what
// `terminal.rs` enables:
//
// - Legacy CSI and SS3 sequences (arrows, Home/End, editing keys)
// - Kitty keyboard protocol (unambiguous codepoints + modifiers)
// - Bracketed paste (text between `CSI 200~` and `CSI 201~`)
// - Alt+key (ESC followed by a printable character)
// - UTF-8 multi-byte characters
//
// Escape sequences can span `read()` calls, so the parser keeps a small
// buffer. A lone ESC stays pending until `flush` is called after a quiet
// tick, which turns it into an Escape key press.

use bitflags::bitflags;

// ─── Event Types ────────────────────────────────────────────────────────────

/// A parsed terminal input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard event.
    Key(KeyEvent),
    /// Bracketed paste content, delivered whole.
    Paste(String),
}

/// A keyboard event with key identity, modifiers, and press state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// A press of `code` with no modifiers.
    #[must_use]
    pub const fn press(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
            kind: KeyEventKind::Press,
        }
    }

    /// A press of `code` with `modifiers` held.
    #[must_use]
    pub const fn with_modifiers(code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            code,
            modifiers,
            kind: KeyEventKind::Press,
        }
    }
}

/// Press / repeat / release, as reported by the Kitty protocol.
///
/// Legacy encodings only ever produce [`Press`](KeyEventKind::Press).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Repeat,
    Release,
}

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// A printable Unicode character.
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

bitflags! {
    /// Keyboard modifiers, using the Kitty / xterm bitmask
    /// (`param = 1 + bitmask`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const SUPER = 0b0000_1000;
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

/// Incremental terminal input parser.
pub struct Parser {
    buf: Vec<u8>,
    in_paste: bool,
}

impl Parser {
    /// A parser with an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(64),
            in_paste: false,
        }
    }

    /// Feed raw bytes and return every event that is now complete.
    pub fn advance(&mut self, data: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            let remaining = &self.buf[pos..];

            if self.in_paste {
                let Some(end) = find_subsequence(remaining, PASTE_END) else {
                    break;
                };
                let text = String::from_utf8_lossy(&remaining[..end]).into_owned();
                events.push(Event::Paste(text));
                pos += end + PASTE_END.len();
                self.in_paste = false;
                continue;
            }

            if remaining.starts_with(PASTE_START) {
                self.in_paste = true;
                pos += PASTE_START.len();
                continue;
            }
            // A partial paste opener: wait for the rest.
            if remaining.len() < PASTE_START.len()
                && remaining.len() > 2
                && PASTE_START.starts_with(remaining)
            {
                break;
            }

            match parse_one(remaining) {
                Parsed::Event(event, consumed) => {
                    events.push(event);
                    pos += consumed;
                }
                Parsed::Incomplete => break,
                Parsed::Skip(n) => pos += n.max(1),
            }
        }

        self.buf.drain(..pos);
        events
    }

    /// Whether unconsumed bytes are waiting for more input.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty() && !self.in_paste
    }

    /// Resolve pending bytes as literal keys (a lone ESC becomes Escape).
    pub fn flush(&mut self) -> Vec<Event> {
        if self.in_paste {
            return Vec::new();
        }
        let events = self
            .buf
            .iter()
            .filter_map(|&byte| match byte {
                0x1B => Some(key(KeyCode::Escape)),
                0x7F => Some(key(KeyCode::Backspace)),
                b @ 0x01..=0x1A => Some(ctrl(char::from(b + b'a' - 1))),
                b @ 0x20..=0x7E => Some(key(KeyCode::Char(char::from(b)))),
                _ => None,
            })
            .collect();
        self.buf.clear();
        events
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Stateless Parsing ──────────────────────────────────────────────────────

enum Parsed {
    /// An event and the number of bytes it consumed.
    Event(Event, usize),
    /// Need more bytes.
    Incomplete,
    /// Unrecognized bytes to drop.
    Skip(usize),
}

fn parse_one(buf: &[u8]) -> Parsed {
    match buf[0] {
        0x1B => parse_escape(buf),
        0x09 => Parsed::Event(key(KeyCode::Tab), 1),
        0x0A | 0x0D => Parsed::Event(key(KeyCode::Enter), 1),
        0x08 | 0x7F => Parsed::Event(key(KeyCode::Backspace), 1),
        b @ 0x01..=0x1A => Parsed::Event(ctrl(char::from(b + b'a' - 1)), 1),
        b @ 0x20..=0x7E => Parsed::Event(key(KeyCode::Char(char::from(b))), 1),
        0xC0..=0xF7 => parse_utf8(buf),
        _ => Parsed::Skip(1),
    }
}

fn parse_escape(buf: &[u8]) -> Parsed {
    let Some(&next) = buf.get(1) else {
        return Parsed::Incomplete;
    };

    match next {
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        b @ 0x20..=0x7E => Parsed::Event(
            Event::Key(KeyEvent::with_modifiers(KeyCode::Char(char::from(b)), Modifiers::ALT)),
            2,
        ),
        _ => Parsed::Event(key(KeyCode::Escape), 1),
    }
}

fn parse_csi(buf: &[u8]) -> Parsed {
    // Final byte is 0x40..=0x7E; parameters and intermediates 0x20..=0x3F.
    let mut end = 2;
    while let Some(&b) = buf.get(end) {
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }
    let Some(&final_byte) = buf.get(end) else {
        return Parsed::Incomplete;
    };

    let params = parse_params(&buf[2..end]);
    let consumed = end + 1;
    let modifiers = params.get(1).map_or(Modifiers::empty(), |p| decode_modifiers(p.0));

    let code = match final_byte {
        b'u' => return parse_kitty_key(&params, consumed),
        b'~' => match params.first().map_or(0, |p| p.0) {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            _ => return Parsed::Skip(consumed),
        },
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        _ => return Parsed::Skip(consumed),
    };

    Parsed::Event(Event::Key(KeyEvent::with_modifiers(code, modifiers)), consumed)
}

fn parse_ss3(buf: &[u8]) -> Parsed {
    let Some(&b) = buf.get(2) else {
        return Parsed::Incomplete;
    };
    let code = match b {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        _ => return Parsed::Skip(3),
    };
    Parsed::Event(key(code), 3)
}

/// `CSI codepoint [; modifiers[:event_type]] u`
fn parse_kitty_key(params: &[CsiParam], consumed: usize) -> Parsed {
    let codepoint = params.first().map_or(0, |p| p.0);
    let (modifier_val, event_type) = params.get(1).map_or((0, 0), |p| (p.0, p.1));

    let kind = match event_type {
        2 => KeyEventKind::Repeat,
        3 => KeyEventKind::Release,
        _ => KeyEventKind::Press,
    };

    let code = match codepoint {
        27 | 57344 => KeyCode::Escape,
        13 | 57345 => KeyCode::Enter,
        9 | 57346 => KeyCode::Tab,
        127 | 57347 => KeyCode::Backspace,
        57348 => KeyCode::Insert,
        57349 => KeyCode::Delete,
        57350 => KeyCode::Left,
        57351 => KeyCode::Right,
        57352 => KeyCode::Up,
        57353 => KeyCode::Down,
        57354 => KeyCode::PageUp,
        57355 => KeyCode::PageDown,
        57356 => KeyCode::Home,
        57357 => KeyCode::End,
        cp => match char::from_u32(cp) {
            Some(ch) if !ch.is_control() => KeyCode::Char(ch),
            _ => return Parsed::Skip(consumed),
        },
    };

    Parsed::Event(
        Event::Key(KeyEvent {
            code,
            modifiers: decode_modifiers(modifier_val),
            kind,
        }),
        consumed,
    )
}

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = match buf[0] {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    };
    if buf.len() < expected {
        return Parsed::Incomplete;
    }
    std::str::from_utf8(&buf[..expected])
        .ok()
        .and_then(|s| s.chars().next())
        .map_or(Parsed::Skip(1), |ch| Parsed::Event(key(KeyCode::Char(ch)), expected))
}

// ─── Helpers ────────────────────────────────────────────────────────────────

const fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::press(code))
}

const fn ctrl(ch: char) -> Event {
    Event::Key(KeyEvent::with_modifiers(KeyCode::Char(ch), Modifiers::CTRL))
}

/// `(value, colon sub-parameter)`.
struct CsiParam(u32, u32);

/// Parse `1;5:2`-style parameter lists.
fn parse_params(raw: &[u8]) -> Vec<CsiParam> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            let mut parts = field.split(|&b| b == b':');
            let main = parts.next().map_or(0, parse_number);
            let sub = parts.next().map_or(0, parse_number);
            CsiParam(main, sub)
        })
        .collect()
}

fn parse_number(digits: &[u8]) -> u32 {
    digits
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| acc.saturating_mul(10).saturating_add(u32::from(b - b'0')))
}

/// `1 + bitmask` encoding; 0 and 1 both mean no modifiers.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u32) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate(val as u8)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Vec<Event> {
        Parser::new().advance(data)
    }

    fn parse_single(data: &[u8]) -> Event {
        let events = parse(data);
        assert_eq!(events.len(), 1, "expected 1 event, got {events:?}");
        events.into_iter().next().unwrap()
    }

    fn key_mod(code: KeyCode, modifiers: Modifiers) -> Event {
        Event::Key(KeyEvent::with_modifiers(code, modifiers))
    }

    // ── ASCII ───────────────────────────────────────────────────────────

    #[test]
    fn printable_chars() {
        let events = parse(b"$x");
        assert_eq!(events, vec![key(KeyCode::Char('$')), key(KeyCode::Char('x'))]);
    }

    #[test]
    fn control_chars() {
        assert_eq!(parse_single(b"\x03"), ctrl('c'));
        assert_eq!(parse_single(b"\r"), key(KeyCode::Enter));
        assert_eq!(parse_single(b"\t"), key(KeyCode::Tab));
        assert_eq!(parse_single(b"\x7f"), key(KeyCode::Backspace));
    }

    #[test]
    fn utf8_char() {
        assert_eq!(parse_single("λ".as_bytes()), key(KeyCode::Char('λ')));
    }

    #[test]
    fn utf8_split_across_reads() {
        let mut parser = Parser::new();
        let bytes = "∫".as_bytes();
        assert!(parser.advance(&bytes[..1]).is_empty());
        assert_eq!(parser.advance(&bytes[1..]), vec![key(KeyCode::Char('∫'))]);
    }

    // ── Escape ──────────────────────────────────────────────────────────

    #[test]
    fn lone_escape_waits_for_flush() {
        let mut parser = Parser::new();
        assert!(parser.advance(b"\x1b").is_empty());
        assert!(parser.has_pending());
        assert_eq!(parser.flush(), vec![key(KeyCode::Escape)]);
        assert!(!parser.has_pending());
    }

    #[test]
    fn alt_char() {
        assert_eq!(parse_single(b"\x1bj"), key_mod(KeyCode::Char('j'), Modifiers::ALT));
    }

    // ── CSI ─────────────────────────────────────────────────────────────

    #[test]
    fn arrows() {
        assert_eq!(parse_single(b"\x1b[A"), key(KeyCode::Up));
        assert_eq!(parse_single(b"\x1b[B"), key(KeyCode::Down));
        assert_eq!(parse_single(b"\x1b[C"), key(KeyCode::Right));
        assert_eq!(parse_single(b"\x1b[D"), key(KeyCode::Left));
    }

    #[test]
    fn arrow_with_modifier() {
        assert_eq!(parse_single(b"\x1b[1;5C"), key_mod(KeyCode::Right, Modifiers::CTRL));
    }

    #[test]
    fn tilde_keys() {
        assert_eq!(parse_single(b"\x1b[3~"), key(KeyCode::Delete));
        assert_eq!(parse_single(b"\x1b[1~"), key(KeyCode::Home));
        assert_eq!(parse_single(b"\x1b[4~"), key(KeyCode::End));
        assert_eq!(parse_single(b"\x1b[6~"), key(KeyCode::PageDown));
    }

    #[test]
    fn ss3_arrows() {
        assert_eq!(parse_single(b"\x1bOA"), key(KeyCode::Up));
    }

    #[test]
    fn unknown_csi_is_skipped() {
        assert_eq!(parse(b"\x1b[99~a"), vec![key(KeyCode::Char('a'))]);
    }

    #[test]
    fn incomplete_csi_waits() {
        let mut parser = Parser::new();
        assert!(parser.advance(b"\x1b[1;").is_empty());
        assert_eq!(parser.advance(b"2A"), vec![key_mod(KeyCode::Up, Modifiers::SHIFT)]);
    }

    // ── Kitty keyboard ──────────────────────────────────────────────────

    #[test]
    fn kitty_escape_and_enter() {
        assert_eq!(parse_single(b"\x1b[27u"), key(KeyCode::Escape));
        assert_eq!(parse_single(b"\x1b[13u"), key(KeyCode::Enter));
    }

    #[test]
    fn kitty_ctrl_c() {
        assert_eq!(parse_single(b"\x1b[99;5u"), ctrl('c'));
    }

    #[test]
    fn kitty_release() {
        let Event::Key(k) = parse_single(b"\x1b[97;1:3u") else {
            panic!("expected key");
        };
        assert_eq!(k.code, KeyCode::Char('a'));
        assert_eq!(k.kind, KeyEventKind::Release);
    }

    // ── Paste ───────────────────────────────────────────────────────────

    #[test]
    fn paste_delivers_text() {
        assert_eq!(
            parse_single(b"\x1b[200~$$\nx^2\n$$\x1b[201~"),
            Event::Paste("$$\nx^2\n$$".into())
        );
    }

    #[test]
    fn paste_split_across_reads() {
        let mut parser = Parser::new();
        assert!(parser.advance(b"\x1b[200~ab").is_empty());
        assert!(!parser.has_pending());
        assert_eq!(parser.advance(b"c\x1b[201~d"), vec![
            Event::Paste("abc".into()),
            key(KeyCode::Char('d')),
        ]);
    }

    #[test]
    fn partial_paste_opener_waits() {
        let mut parser = Parser::new();
        assert!(parser.advance(b"\x1b[20").is_empty());
        assert_eq!(parser.advance(b"0~z\x1b[201~"), vec![Event::Paste("z".into())]);
    }
}
