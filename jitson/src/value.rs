//! The owned, sealed public value type (`spec.md` §6.4 "Read" group)
//! and [`CellRef`], a borrowed view onto one cell (and, transitively,
//! its subtree) within a value's cell run.
//!
//! A [`Value`] owns exactly one allocation — its `Box<[Cell]>` — the
//! same "one parse, one allocation" property `spec.md` §9 calls out as
//! the whole point of the linearised layout. `CellRef` is how every
//! read operation (`get_type`, `array_get_element`, `object_get_member`,
//! `to_json`, ...) is actually implemented: `Value` just hands out a
//! `CellRef` at offset 0 and forwards to it.

use std::cmp::Ordering;

use jitson_core::cell::{Cell, Payload, StringPayload, TypeId, TYPE_ARRAY, TYPE_OBJECT, TYPE_REFERENCE, TYPE_STRING};

use crate::index;

/// A fully parsed/constructed value: a contiguous cell run beginning
/// with a root cell (`spec.md` glossary, "Value").
#[derive(Debug)]
pub struct Value {
    cells: Box<[Cell]>,
}

impl Value {
    pub fn from_cells(cells: Box<[Cell]>) -> Self {
        assert!(!cells.is_empty(), "a value always has at least a root cell");
        Value { cells }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn root(&self) -> CellRef<'_> {
        CellRef { cells: &self.cells, offset: 0 }
    }

    pub fn get_type(&self) -> TypeId {
        self.root().get_type()
    }

    /// Total cell count of this value's run (`spec.md` §3.2, `size(root)`).
    pub fn size(&self) -> u32 {
        self.cells.len() as u32
    }

    pub fn test(&self) -> bool {
        self.root().test()
    }

    /// Deep-copy this value into a fresh, independent cell run
    /// (`spec.md`'s `dup`). The copy's lazy indexes start unbuilt.
    pub fn dup(&self) -> Value {
        let cells: Vec<Cell> = self.cells.iter().map(clone_cell).collect();
        Value::from_cells(cells.into_boxed_slice())
    }

    pub fn eq(&self, other: &Value) -> bool {
        self.root().eq(&other.root())
    }

    pub fn cmp(&self, other: &Value) -> Option<Ordering> {
        self.root().cmp(&other.root())
    }

    pub fn to_json(&self) -> String {
        crate::json::to_json(self.root())
    }

    /// Overwrite the root cell's type id in place, keeping its flags and
    /// payload untouched. Grounded on `range.rs`'s cast, which is
    /// "exactly an array with the type changed" per
    /// `original_source/lib-sxe-jitson/sxe-jitson-range.c`.
    pub(crate) fn retag_root(&mut self, type_id: TypeId) {
        self.cells[0].type_id = type_id;
    }
}

/// A borrowed view of one cell (and its subtree) inside a [`Value`]'s
/// cell run, looking through reference indirection transparently.
#[derive(Clone, Copy)]
pub struct CellRef<'a> {
    cells: &'a [Cell],
    offset: usize,
}

impl<'a> CellRef<'a> {
    pub fn new(cells: &'a [Cell], offset: usize) -> Self {
        CellRef { cells, offset }
    }

    fn raw(&self) -> &'a Cell {
        &self.cells[self.offset]
    }

    pub(crate) fn raw_payload(&self) -> &'a Payload {
        &self.raw().payload
    }

    /// Follow one level of `REFERENCE` indirection (references to
    /// references are disallowed, so one level always suffices;
    /// `spec.md` §3.2).
    pub fn dereferenced(&self) -> CellRef<'a> {
        match self.raw().as_reference() {
            Some(target) => CellRef { cells: self.cells, offset: target.offset as usize },
            None => *self,
        }
    }

    /// The type id without following a reference.
    pub fn get_type_no_deref(&self) -> TypeId {
        self.raw().type_id
    }

    pub fn get_type(&self) -> TypeId {
        self.dereferenced().raw().type_id
    }

    pub fn flags(&self) -> jitson_core::cell::CellFlags {
        self.dereferenced().raw().flags
    }

    pub fn is_reference(&self) -> bool {
        self.raw().type_id == TYPE_REFERENCE
    }

    pub fn get_bool(&self) -> Option<bool> {
        self.dereferenced().raw().payload_bool()
    }

    pub fn get_number(&self) -> Option<f64> {
        let d = self.dereferenced();
        match &d.raw().payload {
            Payload::Number(n) => Some(*n),
            Payload::Uint(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn get_uint(&self) -> Option<u64> {
        let d = self.dereferenced();
        match &d.raw().payload {
            Payload::Uint(n) => Some(*n),
            Payload::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
            _ => None,
        }
    }

    /// The string's bytes, transparently un-reversed if the cell is
    /// flagged `REVERSED` (`spec.md` §9 open question, resolved in
    /// favour of ordinary `get_string` always returning logical bytes).
    pub fn get_string(&self) -> Option<String> {
        let d = self.dereferenced();
        let cell = d.raw();
        let s = cell.as_str()?;
        if cell.flags.contains(jitson_core::cell::CellFlags::REVERSED) {
            Some(s.chars().rev().collect())
        } else {
            Some(s.to_string())
        }
    }

    /// The raw bytes as stored, without un-reversing (`spec.md` §9 open
    /// question: a separate accessor for callers that built a reversed
    /// string on purpose, e.g. reverse-sorted index construction).
    pub fn get_string_raw(&self) -> Option<&'a str> {
        self.dereferenced().raw().as_str()
    }

    /// Element/member count for arrays and objects (and any registered
    /// extension type retagged onto a collection cell, e.g. `range`),
    /// byte length for strings (`spec.md` §6.4 `len`).
    pub fn len(&self) -> u32 {
        let d = self.dereferenced();
        let raw = d.raw();
        if raw.type_id == TYPE_STRING || raw.as_collection().is_some() {
            raw.len
        } else {
            0
        }
    }

    /// Cell-run span of this subtree (`spec.md` §6.4 `size`; always 1
    /// for a reference cell, per §4.9).
    pub fn size(&self) -> u32 {
        if self.is_reference() {
            return 1;
        }
        index::cell_span(self.cells, self.offset)
    }

    /// JSON truthiness (`spec.md` §4.7 `IN`'s "always returns a truthy
    /// jitson ... or the null value"): null and `false` are falsy,
    /// `0`/empty string/empty array/empty object are falsy, everything
    /// else truthy.
    pub fn test(&self) -> bool {
        let d = self.dereferenced();
        match &d.raw().payload {
            Payload::Null => false,
            Payload::Bool(b) => *b,
            Payload::Number(n) => *n != 0.0,
            Payload::Uint(n) => *n != 0,
            Payload::Str(s) => !s.as_str().is_empty(),
            Payload::Collection(_) => d.raw().len != 0,
            Payload::Reference(_) => unreachable!("dereferenced() already followed the reference"),
            Payload::Partial(_) => unreachable!("sealed values never contain Partial cells"),
        }
    }

    /// Works on any array-shaped collection, not just one still tagged
    /// `TYPE_ARRAY`: a registered extension type built by retagging an
    /// array's root cell (e.g. `range`, `spec.md` §4.8 casts) keeps the
    /// same array-shaped layout underneath, so indexing treats every
    /// non-object collection as array-backed.
    pub fn array_get_element(&self, i: usize) -> Option<CellRef<'a>> {
        let d = self.dereferenced();
        if d.raw().type_id == TYPE_OBJECT || d.raw().as_collection().is_none() {
            return None;
        }
        let off = index::array_element_offset(d.cells, d.offset, i)?;
        Some(CellRef { cells: d.cells, offset: d.offset + off as usize })
    }

    pub fn object_get_member(&self, name: &str) -> Option<CellRef<'a>> {
        let d = self.dereferenced();
        if d.raw().type_id != TYPE_OBJECT {
            return None;
        }
        let off = index::object_member_offset(d.cells, d.offset, name)?;
        Some(CellRef { cells: d.cells, offset: d.offset + off as usize })
    }

    pub fn eq(&self, other: &CellRef<'_>) -> bool {
        let a = self.dereferenced();
        let b = other.dereferenced();
        match (&a.raw().payload, &b.raw().payload) {
            (Payload::Null, Payload::Null) => true,
            (Payload::Bool(x), Payload::Bool(y)) => x == y,
            (Payload::Number(x), Payload::Number(y)) => x == y,
            (Payload::Uint(x), Payload::Uint(y)) => x == y,
            (Payload::Number(x), Payload::Uint(y)) | (Payload::Uint(y), Payload::Number(x)) => {
                *x == *y as f64
            }
            (Payload::Str(x), Payload::Str(y)) => x.as_str() == y.as_str(),
            (Payload::Collection(_), Payload::Collection(_)) => {
                if a.raw().type_id != b.raw().type_id || a.raw().len != b.raw().len {
                    return false;
                }
                match a.raw().type_id {
                    TYPE_ARRAY => (0..a.raw().len as usize)
                        .all(|i| a.array_get_element(i).unwrap().eq(&b.array_get_element(i).unwrap())),
                    TYPE_OBJECT => object_members(a).all(|(name, val)| {
                        b.object_get_member(&name).is_some_and(|bv| val.eq(&bv))
                    }),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Copy this subtree into a fresh, standalone [`Value`] (following
    /// any reference first). Used wherever a borrowed `CellRef` needs to
    /// outlive the [`Value`] it was borrowed from, e.g. lifting a
    /// constant or an `IN`/`INTERSECT` result out of an operand.
    pub fn to_owned_value(&self) -> Value {
        crate::stack::with_thread_stack(|stack| {
            let mark = stack.borrow();
            copy_into_stack(stack, *self);
            stack.return_borrow(mark)
        })
    }

    pub fn cmp(&self, other: &CellRef<'_>) -> Option<Ordering> {
        let a = self.dereferenced();
        let b = other.dereferenced();
        match (&a.raw().payload, &b.raw().payload) {
            (Payload::Null, Payload::Null) => Some(Ordering::Equal),
            (Payload::Bool(x), Payload::Bool(y)) => Some(x.cmp(y)),
            (Payload::Number(x), Payload::Number(y)) => x.partial_cmp(y),
            (Payload::Uint(x), Payload::Uint(y)) => x.partial_cmp(y),
            (Payload::Number(x), Payload::Uint(y)) => x.partial_cmp(&(*y as f64)),
            (Payload::Uint(x), Payload::Number(y)) => (*x as f64).partial_cmp(y),
            (Payload::Str(x), Payload::Str(y)) => Some(x.as_str().cmp(y.as_str())),
            _ => None,
        }
    }
}

/// Iterate an object's `(name, value)` members in parse order.
pub fn object_members<'a>(obj: CellRef<'a>) -> impl Iterator<Item = (String, CellRef<'a>)> {
    let count = obj.raw().len as usize;
    let cells = obj.cells;
    let mut cur = obj.offset + 1;
    (0..count).map(move |_| {
        let key = cells[cur].as_str().expect("member key must be a string cell").to_string();
        let value_offset = cur + 1;
        let value = CellRef { cells, offset: value_offset };
        cur = value_offset + index::cell_span(cells, value_offset) as usize;
        (key, value)
    })
}

/// Recursively copy a borrowed subtree onto the thread-local
/// construction stack (`spec.md` §4.5 construction group).
pub(crate) fn copy_into_stack(stack: &mut crate::stack::Stack, v: CellRef<'_>) {
    let v = v.dereferenced();
    match v.get_type() {
        jitson_core::cell::TYPE_NULL => stack.add_null(),
        jitson_core::cell::TYPE_BOOL => stack.add_bool(v.get_bool().unwrap()),
        jitson_core::cell::TYPE_NUMBER => stack.add_number(v.get_number().unwrap()),
        TYPE_STRING => stack.add_string(&v.get_string().unwrap()),
        TYPE_ARRAY => {
            stack.open_array(jitson_core::cell::CellFlags::empty(), false);
            for i in 0..v.len() as usize {
                copy_into_stack(stack, v.array_get_element(i).unwrap());
            }
            stack.close_collection();
        }
        TYPE_OBJECT => {
            stack.open_object(jitson_core::cell::CellFlags::empty());
            for (name, value) in object_members(v) {
                stack.add_member_name(&name);
                copy_into_stack(stack, value);
            }
            stack.close_collection();
        }
        _ => unreachable!("unsupported type in copy_into_stack"),
    }
}

pub(crate) fn clone_cell(cell: &Cell) -> Cell {
    let payload = match &cell.payload {
        Payload::Null => Payload::Null,
        Payload::Bool(b) => Payload::Bool(*b),
        Payload::Number(n) => Payload::Number(*n),
        Payload::Uint(n) => Payload::Uint(*n),
        Payload::Str(StringPayload::Owned(s)) => Payload::Str(StringPayload::Owned(s.clone())),
        Payload::Str(StringPayload::Ref { ptr, measured_len }) => Payload::Str(StringPayload::Ref {
            ptr,
            measured_len: std::sync::atomic::AtomicU32::new(
                measured_len.load(std::sync::atomic::Ordering::Relaxed),
            ),
        }),
        Payload::Collection(c) => {
            let mut new_c = jitson_core::cell::Collection::new(c.span);
            new_c.uniform_type = c.uniform_type;
            new_c.uniform_elem_span = c.uniform_elem_span;
            Payload::Collection(new_c)
        }
        Payload::Reference(r) => Payload::Reference(*r),
        Payload::Partial(p) => Payload::Partial(*p),
    };
    Cell { type_id: cell.type_id, flags: cell.flags, len: cell.len, payload }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;
    use jitson_core::cell::CellFlags;

    fn parse_simple_array() -> Value {
        let mut s = Stack::new();
        s.open_array(CellFlags::empty(), false);
        s.add_number(1.0);
        s.add_number(2.0);
        s.add_number(3.0);
        s.close_collection();
        s.get_jitson()
    }

    #[test]
    fn dup_produces_equal_but_independent_value() {
        let v = parse_simple_array();
        let d = v.dup();
        assert!(v.eq(&d));
        assert_eq!(v.size(), d.size());
    }

    #[test]
    fn eq_is_reflexive_and_symmetric() {
        let v = parse_simple_array();
        assert!(v.eq(&v));
        let d = v.dup();
        assert_eq!(v.eq(&d), d.eq(&v));
    }

    #[test]
    fn test_is_falsy_for_empty_containers_and_zero() {
        let mut s = Stack::new();
        s.open_array(CellFlags::empty(), false);
        s.close_collection();
        let empty_arr = s.get_jitson();
        assert!(!empty_arr.test());

        let mut s2 = Stack::new();
        s2.add_number(0.0);
        let zero = s2.get_jitson();
        assert!(!zero.test());
    }

    #[test]
    fn cmp_orders_numbers() {
        let mut s1 = Stack::new();
        s1.add_number(1.0);
        let a = s1.get_jitson();
        let mut s2 = Stack::new();
        s2.add_number(2.0);
        let b = s2.get_jitson();
        assert_eq!(a.cmp(&b), Some(Ordering::Less));
    }
}
