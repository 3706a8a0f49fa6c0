//! Recursive-descent parser (`spec.md` §4.5).
//!
//! Grounded on `compiler/src/parser.rs`'s shape: a `Source` cursor plus
//! a set of mutually-recursive `parse_*` methods, one per grammar
//! production, each pushing directly onto a [`Stack`] rather than
//! building an intermediate AST.

use jitson_core::cell::CellFlags;
use jitson_core::error::{EILSEQ, EINVAL, ENAMETOOLONG, ENODATA, ERANGE};

use crate::constants::{CastTable, ConstTable};
use crate::source::{NumberError, NumberKind, Source, SourceFlags};
use crate::stack::Stack;
use crate::value::Value;

/// Pushes a replacement cell for an unresolved identifier when
/// `ALLOW_IDENTS` is set, returning whether it did so (`spec.md` §4.5,
/// "an optional hook is called to push a user-defined cell").
pub type IdentHook = fn(name: &str, stack: &mut Stack) -> bool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub errno: i32,
    pub pos: usize,
    pub line: u32,
    pub snapshot: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at line {} (errno {}): {:?}...", self.line, self.errno, self.snapshot)
    }
}

impl std::error::Error for ParseError {}

pub struct Parser<'a> {
    source: Source<'a>,
    consts: Option<&'a ConstTable>,
    casts: Option<&'a CastTable>,
    ident_hook: Option<IdentHook>,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, flags: SourceFlags) -> Self {
        Parser {
            source: Source::new(text).with_flags(flags),
            consts: None,
            casts: None,
            ident_hook: None,
        }
    }

    pub fn with_consts(mut self, consts: &'a ConstTable) -> Self {
        self.consts = Some(consts);
        self
    }

    pub fn with_casts(mut self, casts: &'a CastTable) -> Self {
        self.casts = Some(casts);
        self
    }

    pub fn with_ident_hook(mut self, hook: IdentHook) -> Self {
        self.ident_hook = Some(hook);
        self
    }

    /// Parse exactly one value, requiring no trailing non-whitespace
    /// content. On failure the parser's own stack is rolled back to its
    /// entry snapshot (`spec.md` §4.5) and `errno` is left set.
    pub fn parse(&mut self) -> Result<Value, ParseError> {
        let mut stack = Stack::new();
        let mark = stack.len();
        match self.parse_value(&mut stack) {
            Ok(()) => {
                self.source.skip_whitespace();
                if !self.source.at_end() {
                    stack.rollback_to(mark);
                    return Err(self.fail(EINVAL));
                }
                Ok(stack.get_jitson())
            }
            Err(e) => {
                stack.rollback_to(mark);
                Err(e)
            }
        }
    }

    fn fail(&self, errno: i32) -> ParseError {
        jitson_core::error::set_errno(errno);
        tracing::debug!(errno, pos = self.source.pos(), line = self.source.line(), "jitson parse failure");
        ParseError {
            errno,
            pos: self.source.pos(),
            line: self.source.line(),
            snapshot: self.source.snapshot(),
        }
    }

    fn parse_value(&mut self, stack: &mut Stack) -> Result<(), ParseError> {
        match self.source.peek_non_whitespace() {
            None => Err(self.fail(ENODATA)),
            Some('{') => self.parse_object(stack),
            Some('[') => self.parse_array(stack),
            Some('"') => self.parse_string(stack),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(stack),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_identifier(stack),
            Some(_) => Err(self.fail(EINVAL)),
        }
    }

    fn parse_object(&mut self, stack: &mut Stack) -> Result<(), ParseError> {
        self.source.consume();
        stack.open_object(CellFlags::empty());
        if self.source.peek_non_whitespace() == Some('}') {
            self.source.consume();
            stack.close_collection();
            return Ok(());
        }
        loop {
            self.source.skip_whitespace();
            let key_lit = self.source.scan_quoted().ok_or_else(|| self.fail(ENODATA))?;
            let key = self.unescape(key_lit)?;
            if key.len() > 65535 {
                return Err(self.fail(ENAMETOOLONG));
            }
            stack.add_member_name(&key);
            self.source.skip_whitespace();
            if !self.source.consume_if(':') {
                return Err(self.fail(EINVAL));
            }
            self.parse_value(stack)?;
            self.source.skip_whitespace();
            match self.source.peek() {
                Some(',') => {
                    self.source.consume();
                }
                Some('}') => {
                    self.source.consume();
                    break;
                }
                _ => return Err(self.fail(EINVAL)),
            }
        }
        stack.close_collection();
        Ok(())
    }

    fn parse_array(&mut self, stack: &mut Stack) -> Result<(), ParseError> {
        self.source.consume();
        let optimize = self.source.flags.contains(SourceFlags::OPTIMIZE);
        stack.open_array(CellFlags::empty(), optimize);
        if self.source.peek_non_whitespace() == Some(']') {
            self.source.consume();
            stack.close_collection();
            return Ok(());
        }
        loop {
            self.parse_value(stack)?;
            self.source.skip_whitespace();
            match self.source.peek() {
                Some(',') => {
                    self.source.consume();
                }
                Some(']') => {
                    self.source.consume();
                    break;
                }
                _ => return Err(self.fail(EINVAL)),
            }
        }
        stack.close_collection();
        Ok(())
    }

    fn parse_string(&mut self, stack: &mut Stack) -> Result<(), ParseError> {
        let raw = self.source.scan_quoted().ok_or_else(|| self.fail(ENODATA))?;
        let s = self.unescape(raw)?;
        stack.add_string(&s);
        Ok(())
    }

    fn parse_number(&mut self, stack: &mut Stack) -> Result<(), ParseError> {
        let (text, kind) = self.source.scan_number().map_err(|e| match e {
            NumberError::Empty => self.fail(EINVAL),
            NumberError::Overflow => self.fail(ERANGE),
        })?;

        let (negative, unsigned_part) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (radix, digits) = match unsigned_part.strip_prefix("0x").or_else(|| unsigned_part.strip_prefix("0X")) {
            Some(hex) => (16, hex),
            None => (10, unsigned_part),
        };

        // Negative literals, integer or not, never carry IS_UINT — a
        // uint is by definition unsigned (`spec.md` §4.5).
        if negative || kind == NumberKind::Double {
            let magnitude = if radix == 16 {
                match u64::from_str_radix(digits, 16) {
                    Ok(v) => v as f64,
                    Err(_) => {
                        jitson_core::error::set_errno(ERANGE);
                        f64::MAX
                    }
                }
            } else {
                unsigned_part.parse::<f64>().expect("scan_number only emits valid float syntax")
            };
            stack.add_number(if negative { -magnitude } else { magnitude });
            return Ok(());
        }

        match u64::from_str_radix(digits, radix) {
            Ok(v) => stack.add_uint(v),
            Err(_) => {
                jitson_core::error::set_errno(ERANGE);
                stack.add_uint(u64::MAX);
            }
        }
        Ok(())
    }

    fn parse_identifier(&mut self, stack: &mut Stack) -> Result<(), ParseError> {
        let name = self.source.scan_identifier().ok_or_else(|| self.fail(EINVAL))?;

        // `true`/`false`/`null` resolve unconditionally (`spec.md` §4.5)
        // regardless of whether a constants table is attached at all.
        match name {
            "true" => {
                stack.add_bool(true);
                return Ok(());
            }
            "false" => {
                stack.add_bool(false);
                return Ok(());
            }
            "null" => {
                stack.add_null();
                return Ok(());
            }
            _ => {}
        }

        if self.source.flags.contains(SourceFlags::ALLOW_CONSTS) {
            if let Some(value) = self.consts.and_then(|t| t.get(name)) {
                stack.add_dup(value);
                return Ok(());
            }
        }

        if let Some(casts) = self.casts {
            if casts.contains(name) {
                self.source.skip_whitespace();
                if self.source.consume_if('(') {
                    return self.parse_cast(name, stack);
                }
            }
        }

        if self.source.flags.contains(SourceFlags::ALLOW_IDENTS) {
            if let Some(hook) = self.ident_hook {
                if hook(name, stack) {
                    return Ok(());
                }
            }
        }

        Err(self.fail(EINVAL))
    }

    /// `identifier ( value )` (`spec.md` §4.5/§4.8): parse the argument
    /// in place, lift a copy off the stack to pass by value to the cast
    /// function, then replace it with the cast's result.
    fn parse_cast(&mut self, name: &str, stack: &mut Stack) -> Result<(), ParseError> {
        let casts = self.casts.expect("checked by caller");
        let arg_mark = stack.len();
        self.parse_value(stack)?;
        self.source.skip_whitespace();
        if !self.source.consume_if(')') {
            return Err(self.fail(EINVAL));
        }
        let arg: Vec<jitson_core::cell::Cell> =
            stack.cells()[arg_mark..].iter().map(crate::value::clone_cell).collect();
        stack.rollback_to(arg_mark);
        let arg_value = Value::from_cells(arg.into_boxed_slice());
        match casts.apply(name, arg_value) {
            Some(result) => {
                stack.add_dup(&result);
                Ok(())
            }
            None => Err(self.fail(EINVAL)),
        }
    }

    fn unescape(&self, raw: &str) -> Result<String, ParseError> {
        unescape_literal(raw).map_err(|e| self.fail(e))
    }
}

/// Unescape a quoted string literal (quotes included, as returned by
/// [`Source::scan_quoted`]) per JSON escape rules (`spec.md` §4.5).
fn unescape_literal(raw: &str) -> Result<String, i32> {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next().ok_or(EILSEQ)? {
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            '/' => out.push('/'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'u' => {
                let cp = read_hex4(&mut chars)?;
                let resolved = if (0xD800..=0xDBFF).contains(&cp) {
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(EILSEQ);
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(EILSEQ);
                    }
                    0x10000 + ((cp - 0xD800) << 10) + (low - 0xDC00)
                } else if (0xDC00..=0xDFFF).contains(&cp) {
                    return Err(EILSEQ); // lone low surrogate
                } else {
                    cp
                };
                let (buf, len) = crate::unicode::utf8_encode(resolved).ok_or(EILSEQ)?;
                out.push_str(std::str::from_utf8(&buf[..len]).expect("utf8_encode emits valid UTF-8"));
            }
            _ => return Err(EILSEQ),
        }
    }
    Ok(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Result<u32, i32> {
    let mut v = 0u32;
    for _ in 0..4 {
        let d = chars.next().ok_or(EILSEQ)?.to_digit(16).ok_or(EILSEQ)?;
        v = v * 16 + d;
    }
    Ok(v)
}
