//! JSON rendering (`spec.md` §6.4 `to_json`), built on the
//! [`crate::strfactory::StringFactory`] collaborator the way
//! `crates/runtime/src/son.rs`'s `format_value`/`format_string` family
//! builds its S-expression output on a growable buffer instead of
//! `format!`-ing pieces and concatenating `String`s.

use jitson_core::cell::{Payload, TYPE_OBJECT};

use crate::strfactory::{ArenaStringFactory, StringFactory};
use crate::value::{object_members, CellRef};

pub fn to_json(root: CellRef<'_>) -> String {
    let mut out = ArenaStringFactory::new();
    render(root, &mut out);
    String::from_utf8(out.remove()).expect("jitson renders only valid UTF-8")
}

fn render(value: CellRef<'_>, out: &mut ArenaStringFactory) {
    let value = value.dereferenced();
    match value_payload(&value) {
        Payload::Null => out.add(b"null"),
        Payload::Bool(true) => out.add(b"true"),
        Payload::Bool(false) => out.add(b"false"),
        Payload::Number(n) => out.add(format_number(*n).as_bytes()),
        Payload::Uint(n) => out.add(n.to_string().as_bytes()),
        Payload::Str(_) => render_string(value.get_string_raw().unwrap_or(""), out),
        Payload::Collection(_) if value.get_type_no_deref() == TYPE_OBJECT => render_object(value, out),
        // Any other collection-backed type (TYPE_ARRAY, or a registered
        // extension type retagged onto an array's root cell, e.g.
        // `range`) renders via its array backing; an extension type
        // that wants its own wrapper (`range::to_json`) renders this
        // output first and wraps it.
        Payload::Collection(_) => render_array(value, out),
        Payload::Reference(_) => unreachable!("dereferenced() already followed the reference"),
        Payload::Partial(_) => unreachable!("sealed values never contain Partial cells"),
    }
}

/// Borrow the dereferenced cell's payload for a `match` without holding
/// onto a temporary `CellRef`.
fn value_payload<'a>(value: &'a CellRef<'_>) -> &'a Payload {
    value.raw_payload()
}

fn render_array(value: CellRef<'_>, out: &mut ArenaStringFactory) {
    out.add(b"[");
    let count = value.len() as usize;
    for i in 0..count {
        if i > 0 {
            out.add(b",");
        }
        render(value.array_get_element(i).expect("index within len()"), out);
    }
    out.add(b"]");
}

fn render_object(value: CellRef<'_>, out: &mut ArenaStringFactory) {
    out.add(b"{");
    for (i, (name, member_value)) in object_members(value).enumerate() {
        if i > 0 {
            out.add(b",");
        }
        render_string(&name, out);
        out.add(b":");
        render(member_value, out);
    }
    out.add(b"}");
}

fn render_string(s: &str, out: &mut ArenaStringFactory) {
    out.add(b"\"");
    for b in s.bytes() {
        match b {
            b'"' => out.add(b"\\\""),
            b'\\' => out.add(b"\\\\"),
            0x08 => out.add(b"\\b"),
            0x0C => out.add(b"\\f"),
            b'\n' => out.add(b"\\n"),
            b'\r' => out.add(b"\\r"),
            b'\t' => out.add(b"\\t"),
            0x00..=0x1F => out.add(format!("\\u{:04x}", b).as_bytes()),
            _ => out.add(&[b]),
        }
    }
    out.add(b"\"");
}

/// Format a double the way JSON expects: integral values without a
/// trailing `.0` are still written with one, since bare `5` would parse
/// back as `IS_UINT` rather than a double and fail the round-trip
/// invariant in `spec.md` §8.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;
    use jitson_core::cell::CellFlags;

    #[test]
    fn scalar_rendering() {
        let mut s = Stack::new();
        s.add_string("hi");
        let v = s.get_jitson();
        assert_eq!(v.to_json(), "\"hi\"");
    }

    #[test]
    fn array_rendering() {
        let mut s = Stack::new();
        s.open_array(CellFlags::empty(), false);
        s.add_number(1.0);
        s.add_number(2.0);
        s.close_collection();
        let v = s.get_jitson();
        assert_eq!(v.to_json(), "[1.0,2.0]");
    }

    #[test]
    fn object_rendering_contains_all_members() {
        let mut s = Stack::new();
        s.open_object(CellFlags::empty());
        s.add_member_name("a");
        s.add_number(1.0);
        s.add_member_name("b");
        s.add_bool(true);
        s.close_collection();
        let v = s.get_jitson();
        let json = v.to_json();
        assert!(json.contains("\"a\":1.0"));
        assert!(json.contains("\"b\":true"));
    }

    #[test]
    fn euro_sign_escape_round_trips_to_literal_bytes() {
        let mut s = Stack::new();
        s.add_string("\u{20AC}");
        let v = s.get_jitson();
        assert_eq!(v.to_json(), "\"\u{20AC}\"");
    }

    #[test]
    fn control_characters_are_escaped() {
        let mut s = Stack::new();
        s.add_string("a\tb");
        let v = s.get_jitson();
        assert_eq!(v.to_json(), "\"a\\tb\"");
    }
}
