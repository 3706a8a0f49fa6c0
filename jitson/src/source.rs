//! Character/number/identifier scanning over an input buffer (`spec.md`
//! §4.3), grounded on the teacher's hand-rolled tokenizer in
//! `compiler/src/parser.rs` — a byte cursor over a `&str`, advanced one
//! character at a time, with a small set of "scan a token class" helper
//! methods rather than a general lexer-generator table.

use bitflags::bitflags;

bitflags! {
    /// Per-source parser extensions (`spec.md` §4.3/§4.5).
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct SourceFlags: u8 {
        /// `0x...` hex integer literals.
        const ALLOW_HEX    = 0b0001;
        /// Bare identifiers resolved against the constants table.
        const ALLOW_CONSTS = 0b0010;
        /// Unresolved bare identifiers routed through a user hook.
        const ALLOW_IDENTS = 0b0100;
        /// Track running order/homogeneity/uniformity flags on arrays
        /// while they're being built.
        const OPTIMIZE     = 0b1000;
    }
}

/// Whether a scanned number literal should be interpreted as an unsigned
/// integer (`spec.md` §4.5: "integer form with no fraction or exponent").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Unsigned,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    /// No digits followed the sign/prefix.
    Empty,
    /// The literal overflowed its target representation; the caller
    /// should saturate and set `errno = EOVERFLOW` (`spec.md` §4.5).
    Overflow,
}

/// A cursor over UTF-8 source text, with optional name/line diagnostics.
pub struct Source<'a> {
    text: &'a str,
    pos: usize,
    line: u32,
    name: Option<&'a str>,
    pub flags: SourceFlags,
}

impl<'a> Source<'a> {
    pub fn new(text: &'a str) -> Self {
        Source { text, pos: 0, line: 1, name: None, flags: SourceFlags::empty() }
    }

    pub fn with_name(text: &'a str, name: &'a str) -> Self {
        Source { text, pos: 0, line: 1, name: Some(name), flags: SourceFlags::empty() }
    }

    pub fn with_flags(mut self, flags: SourceFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn name(&self) -> Option<&str> {
        self.name
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Look at, but do not consume, the next character.
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume and return the next character, tracking line number.
    pub fn consume(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Consume one character if it equals `c`.
    pub fn consume_if(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.consume();
            true
        } else {
            false
        }
    }

    /// Skip JSON whitespace (space, tab, CR, LF).
    pub fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.consume();
        }
    }

    /// Skip whitespace, then return the next non-whitespace character
    /// without consuming it.
    pub fn peek_non_whitespace(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.peek()
    }

    /// Scan `[A-Za-z0-9_.]+`; the caller enforces any stricter first-char
    /// rule (`spec.md` §4.3).
    pub fn scan_identifier(&mut self) -> Option<&'a str> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            self.consume();
        }
        if self.pos == start {
            None
        } else {
            Some(&self.text[start..self.pos])
        }
    }

    /// Scan a JSON-style number: optional sign, decimal integer or
    /// fraction/exponent, or (if `ALLOW_HEX`) a `0x`-prefixed hex
    /// integer. Returns the raw literal text and its [`NumberKind`].
    pub fn scan_number(&mut self) -> Result<(&'a str, NumberKind), NumberError> {
        let start = self.pos;
        self.consume_if('-');

        if self.flags.contains(SourceFlags::ALLOW_HEX)
            && self.peek() == Some('0')
            && matches!(self.rest().as_bytes().get(1), Some(b'x' | b'X'))
        {
            self.consume();
            self.consume();
            let hex_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.consume();
            }
            if self.pos == hex_start {
                return Err(NumberError::Empty);
            }
            return Ok((&self.text[start..self.pos], NumberKind::Unsigned));
        }

        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.consume();
        }
        if self.pos == digits_start {
            return Err(NumberError::Empty);
        }

        let mut is_double = false;

        if self.peek() == Some('.') {
            let dot_pos = self.pos;
            self.consume();
            let frac_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.consume();
            }
            if self.pos == frac_start {
                // `0.` with no trailing digit is a parse error
                // regardless of ALLOW_HEX (spec.md §9 open question,
                // resolved the stricter way).
                self.pos = dot_pos;
                return Err(NumberError::Empty);
            }
            is_double = true;
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_pos = self.pos;
            self.consume();
            self.consume_if('+');
            self.consume_if('-');
            let exp_digits = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.consume();
            }
            if self.pos == exp_digits {
                self.pos = exp_pos;
            } else {
                is_double = true;
            }
        }

        let kind = if is_double { NumberKind::Double } else { NumberKind::Unsigned };
        Ok((&self.text[start..self.pos], kind))
    }

    /// Scan a quoted string literal, returned verbatim *including* the
    /// surrounding quotes; the parser is responsible for unescaping.
    /// Returns `None` on an unterminated string (no closing `"` found).
    pub fn scan_quoted(&mut self) -> Option<&'a str> {
        if self.peek() != Some('"') {
            return None;
        }
        let start = self.pos;
        self.consume();
        loop {
            match self.consume()? {
                '\\' => {
                    self.consume()?;
                }
                '"' => return Some(&self.text[start..self.pos]),
                _ => {}
            }
        }
    }

    /// A short snapshot of upcoming text for error messages, truncated
    /// to at most 63 characters (`spec.md` §4.3).
    pub fn snapshot(&self) -> String {
        self.rest().chars().take(63).collect()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_tracks_lines() {
        let mut s = Source::new("a\nb");
        assert_eq!(s.consume(), Some('a'));
        assert_eq!(s.line(), 1);
        assert_eq!(s.consume(), Some('\n'));
        assert_eq!(s.line(), 2);
    }

    #[test]
    fn scan_identifier_stops_at_punctuation() {
        let mut s = Source::new("foo_bar.baz(1)");
        assert_eq!(s.scan_identifier(), Some("foo_bar.baz"));
        assert_eq!(s.peek(), Some('('));
    }

    #[test]
    fn scan_number_plain_integer_is_unsigned() {
        let mut s = Source::new("123,");
        let (text, kind) = s.scan_number().unwrap();
        assert_eq!(text, "123");
        assert_eq!(kind, NumberKind::Unsigned);
    }

    #[test]
    fn scan_number_with_fraction_is_double() {
        let mut s = Source::new("1.5}");
        let (text, kind) = s.scan_number().unwrap();
        assert_eq!(text, "1.5");
        assert_eq!(kind, NumberKind::Double);
    }

    #[test]
    fn scan_number_trailing_dot_without_digit_fails() {
        let mut s = Source::new("0.]");
        assert_eq!(s.scan_number(), Err(NumberError::Empty));
    }

    #[test]
    fn scan_number_hex_requires_allow_hex() {
        let mut s = Source::new("0x1F,");
        let (text, kind) = s.scan_number().unwrap();
        // Without ALLOW_HEX the `x` is simply not consumed as part of
        // the decimal digit run.
        assert_eq!(text, "0");
        assert_eq!(kind, NumberKind::Unsigned);

        let mut hex = Source::new("0x1F,").with_flags(SourceFlags::ALLOW_HEX);
        let (text, kind) = hex.scan_number().unwrap();
        assert_eq!(text, "0x1F");
        assert_eq!(kind, NumberKind::Unsigned);
    }

    #[test]
    fn scan_quoted_includes_quotes_and_handles_escapes() {
        let mut s = Source::new(r#""a\"b""#);
        assert_eq!(s.scan_quoted(), Some(r#""a\"b""#));
    }

    #[test]
    fn scan_quoted_unterminated_returns_none() {
        let mut s = Source::new("\"abc");
        assert_eq!(s.scan_quoted(), None);
    }

    #[test]
    fn snapshot_truncates_to_63_chars() {
        let long = "x".repeat(100);
        let s = Source::new(&long);
        assert_eq!(s.snapshot().chars().count(), 63);
    }
}
