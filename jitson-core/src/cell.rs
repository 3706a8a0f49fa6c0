//! The value cell (`spec.md` §3.1).
//!
//! A value is a contiguous run of [`Cell`]s (`cells[0]` is the root);
//! arrays and objects are spans within that same run rather than separate
//! allocations, which is what makes parsing a single-allocation operation
//! (`spec.md` §9, "Linearised vs. tree layout"). The packed 32-bit
//! `(type id, flags)` tag and the `len` word are kept exactly as `spec.md`
//! describes them; the payload is a Rust `enum` rather than a raw C union,
//! per the design note's own suggestion ("Rust-style enums with layout
//! hints work").
//!
//! One deliberate simplification from the C original
//! (`original_source/lib-sxe-jitson/sxe-jitson.h`): strings are not packed
//! into continuation cells. The C layout continues a long string into
//! further 16-byte cells purely to avoid a second `malloc` per string;
//! Rust's `Box<str>` already gives O(1)-indexed, arbitrary-length storage
//! without that workaround, so a string of any length occupies exactly one
//! [`Cell`] in the run. This preserves every invariant in §3.2 (size(v) is
//! still the cell-run length, dup/clone/eq still hold) while dropping a
//! pure memory-layout trick that Rust doesn't need.

use std::sync::atomic::AtomicU32;
use std::sync::OnceLock;

pub type TypeId = u16;

pub const TYPE_INVALID: TypeId = 0;
pub const TYPE_NULL: TypeId = 1;
pub const TYPE_BOOL: TypeId = 2;
pub const TYPE_NUMBER: TypeId = 3;
pub const TYPE_STRING: TypeId = 4;
pub const TYPE_ARRAY: TypeId = 5;
pub const TYPE_OBJECT: TypeId = 6;
pub const TYPE_REFERENCE: TypeId = 7;
/// The first id available to `type_register` (`spec.md` §4.2).
pub const MIN_USER_TYPE: TypeId = 8;

bitflags::bitflags! {
    /// High-bits capability/state flags from `spec.md` §3.1.
    ///
    /// Unlike the C header, each flag gets its own bit rather than
    /// overloading bits across unrelated cell kinds (e.g. `IS_UINT` and
    /// `REVERSED` share a bit in C because a given cell is only ever a
    /// number *or* a string, never both). We don't need that economy here
    /// since the payload is a tagged `enum`, not a raw union, and
    /// `u16` has bits to spare — see `DESIGN.md` for the tradeoff.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct CellFlags: u16 {
        const MK_SORT  = 1 << 0;
        const IS_LOCAL = 1 << 1;
        const IS_HOMO  = 1 << 2;
        const IS_UNIF  = 1 << 3;
        const IS_ORD   = 1 << 4;
        const IS_UINT  = 1 << 5;
        const REVERSED = 1 << 6;
        const IS_KEY   = 1 << 7;
        const IS_REF   = 1 << 8;
        const IS_OWN   = 1 << 9;
        const INDEXED  = 1 << 10;
        const ALLOCED  = 1 << 11;
    }
}

/// An array or object member-lookup index, materialised lazily
/// (`spec.md` §4.6).
#[derive(Debug)]
pub enum Index {
    /// `offsets[i]` is the cell offset (relative to the collection root)
    /// of element `i`; `offsets[len]` is the subtree's total cell count.
    Array(Box<[u32]>),
    Object(ObjectIndex),
}

/// An object's member-lookup index.
///
/// The C original chains bucket collisions through each key cell's
/// `len` field, which avoids a second allocation under its 16-byte
/// budget but requires mutating an otherwise-sealed cell. A sealed
/// [`Cell`] run here is a plain immutable slice (no interior
/// mutability), so the collision chain is kept in its own array
/// instead, parallel to a per-member offset array — one more Rust-side
/// allocation than the original, in exchange for never needing to
/// mutate cell contents after parsing. See `DESIGN.md`.
#[derive(Debug)]
pub struct ObjectIndex {
    /// `buckets[h]` is `member ordinal + 1` of the first key in bucket
    /// `h`, or `0` if the bucket is empty.
    pub buckets: Box<[u32]>,
    /// `member_offset[i]` is the cell offset (relative to the object
    /// root) of member `i`'s key cell, in parse order.
    pub member_offset: Box<[u32]>,
    /// `member_next[i]` is `next member ordinal + 1` in the same
    /// bucket's collision chain, or `0` to terminate.
    pub member_next: Box<[u32]>,
    pub total_span: u32,
}

impl Index {
    pub fn total_span(&self) -> u32 {
        match self {
            Index::Array(offsets) => *offsets.last().expect("index always has a trailing total"),
            Index::Object(obj) => obj.total_span,
        }
    }
}

/// Bookkeeping shared by array and object root cells.
#[derive(Debug)]
pub struct Collection {
    /// Total cell count of this subtree, root included. Known at close
    /// time (`spec.md` §4.4 `close_collection`) and immutable afterward.
    pub span: u32,
    /// Materialised on first `array_get_element` / `object_get_member`
    /// (`spec.md` §4.6). `OnceLock` gives the same "exactly-once,
    /// concurrency-safe publish" guarantee the spec asks for via a raw
    /// atomic pointer and tolerated double-build; here the second racing
    /// builder simply blocks on the first instead of allocating and
    /// leaking a duplicate, which is a strictly stronger safety property
    /// for the same externally observable behaviour (see `DESIGN.md`).
    pub index: OnceLock<Index>,
    /// Present only for arrays: `Some(type_id)` when every element shares
    /// one type id (`IS_HOMO` holds), `None` when the array is merely
    /// `IS_UNIF` (every element spans the same number of cells) without
    /// being homogeneous — the "`uniform.type = INVALID`" case in
    /// `spec.md` §3.2.
    pub uniform_type: Option<TypeId>,
    /// Present only for arrays flagged `IS_UNIF`: the fixed per-element
    /// cell span, letting `array_get_element` compute `1 + i * span`
    /// directly instead of materialising an index (`spec.md` §4.6,
    /// "for arrays flagged IS_UNIF, indexing is skipped").
    pub uniform_elem_span: Option<u32>,
}

impl Collection {
    pub fn new(span: u32) -> Self {
        Collection { span, index: OnceLock::new(), uniform_type: None, uniform_elem_span: None }
    }
}

/// A string cell's backing bytes: either an owned copy or a borrowed
/// external buffer (`spec.md` §3.1 "string (ref)").
#[derive(Debug)]
pub enum StringPayload {
    Owned(Box<str>),
    /// `IS_REF` strings: `measured_len` starts at `u32::MAX` ("not yet
    /// measured") and is atomically updated to the true length the first
    /// time it's observed, per §3.2 ("may be atomically updated to the
    /// true length"). The referenced bytes are assumed immutable for the
    /// lifetime of the cell.
    Ref { ptr: &'static str, measured_len: AtomicU32 },
}

pub const UNMEASURED: u32 = u32::MAX;

impl StringPayload {
    pub fn as_str(&self) -> &str {
        match self {
            StringPayload::Owned(s) => s,
            StringPayload::Ref { ptr, .. } => ptr,
        }
    }
}

/// A reference cell's target: the offset (relative to the start of the
/// owning cell run) of the cell it forwards to. References to references
/// are disallowed (`spec.md` §3.2), so `target` always names a
/// non-reference cell.
#[derive(Debug, Clone, Copy)]
pub struct RefTarget {
    pub offset: u32,
}

/// Transient payload used only while a collection is still open on the
/// construction stack (`spec.md` §3.1 "partial"); never present in a
/// sealed value.
#[derive(Debug, Clone, Copy)]
pub enum Partial {
    Array { collection: u32, last: Option<u32> },
    Object { collection: u32, awaiting_value: bool },
}

#[derive(Debug)]
pub enum Payload {
    Null,
    Bool(bool),
    Number(f64),
    Uint(u64),
    Str(StringPayload),
    Collection(Collection),
    /// Element type id and per-element cell span for a uniform array
    /// (`spec.md` §3.1 "uniform array"); stored alongside a `Collection`
    /// payload is unnecessary since uniform arrays skip indexing
    /// entirely, so this variant stands on its own.
    Reference(RefTarget),
    Partial(Partial),
}

/// The 16-byte tagged cell (`spec.md` §3.1). `type_id` and `flags` are
/// the two halves of the original's packed 32-bit `type` word; `len` is
/// the count field (string length echo, element/member count, or a key
/// cell's hash-bucket chain link once indexed).
#[derive(Debug)]
pub struct Cell {
    pub type_id: TypeId,
    pub flags: CellFlags,
    pub len: u32,
    pub payload: Payload,
}

impl Cell {
    pub fn null() -> Self {
        Cell { type_id: TYPE_NULL, flags: CellFlags::empty(), len: 0, payload: Payload::Null }
    }

    pub fn bool(b: bool) -> Self {
        Cell { type_id: TYPE_BOOL, flags: CellFlags::empty(), len: 0, payload: Payload::Bool(b) }
    }

    pub fn number(n: f64) -> Self {
        Cell { type_id: TYPE_NUMBER, flags: CellFlags::empty(), len: 0, payload: Payload::Number(n) }
    }

    pub fn uint(n: u64) -> Self {
        Cell {
            type_id: TYPE_NUMBER,
            flags: CellFlags::IS_UINT,
            len: 0,
            payload: Payload::Uint(n),
        }
    }

    pub fn string_owned(s: impl Into<Box<str>>) -> Self {
        let s = s.into();
        Cell {
            type_id: TYPE_STRING,
            flags: CellFlags::empty(),
            len: s.len() as u32,
            payload: Payload::Str(StringPayload::Owned(s)),
        }
    }

    /// A member-key string cell. `len` starts at 0, meaning "no next key
    /// in bucket"; it is populated once the owning object is indexed.
    pub fn key_owned(s: impl Into<Box<str>>) -> Self {
        let s = s.into();
        Cell {
            type_id: TYPE_STRING,
            flags: CellFlags::IS_KEY,
            len: 0,
            payload: Payload::Str(StringPayload::Owned(s)),
        }
    }

    pub fn reference(offset: u32) -> Self {
        Cell {
            type_id: TYPE_REFERENCE,
            flags: CellFlags::empty(),
            len: 1,
            payload: Payload::Reference(RefTarget { offset }),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.type_id == TYPE_REFERENCE
    }

    /// The type id a reader should treat this cell as, looking through
    /// one level of reference indirection (references-to-references are
    /// disallowed, so one level always suffices).
    pub fn effective_type_no_deref_hint(&self) -> TypeId {
        self.type_id
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match &self.payload {
            Payload::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_collection_mut(&mut self) -> Option<&mut Collection> {
        match &mut self.payload {
            Payload::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn payload_number(&self) -> Option<f64> {
        match self.payload {
            Payload::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn payload_uint(&self) -> Option<u64> {
        match self.payload {
            Payload::Uint(n) => Some(n),
            _ => None,
        }
    }

    pub fn payload_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<RefTarget> {
        match self.payload {
            Payload::Reference(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_constructors_set_expected_type_ids() {
        assert_eq!(Cell::null().type_id, TYPE_NULL);
        assert_eq!(Cell::bool(true).type_id, TYPE_BOOL);
        assert_eq!(Cell::number(1.5).type_id, TYPE_NUMBER);
        assert_eq!(Cell::uint(7).type_id, TYPE_NUMBER);
        assert!(Cell::uint(7).flags.contains(CellFlags::IS_UINT));
    }

    #[test]
    fn string_cell_tracks_byte_length() {
        let c = Cell::string_owned("hello");
        assert_eq!(c.len, 5);
        assert_eq!(c.as_str(), Some("hello"));
    }

    #[test]
    fn key_cell_is_flagged_and_starts_unlinked() {
        let c = Cell::key_owned("a");
        assert!(c.flags.contains(CellFlags::IS_KEY));
        assert_eq!(c.len, 0);
    }

    #[test]
    fn reference_cell_has_size_one_semantics() {
        let r = Cell::reference(4);
        assert!(r.is_reference());
        assert_eq!(r.len, 1);
    }

    #[test]
    fn collection_index_is_empty_until_materialised() {
        let c = Collection::new(6);
        assert!(c.index.get().is_none());
    }
}
