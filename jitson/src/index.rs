//! Lazy index materialisation for array element and object member
//! access (`spec.md` §4.6).
//!
//! Arrays and objects know their flat cell-run span as soon as they're
//! closed; the per-element/per-member offset index is only built the
//! first time it's actually needed. `Collection::index` is a
//! [`std::sync::OnceLock`] rather than the original's hand-rolled
//! atomic-pointer-publish-with-tolerated-duplicate: `OnceLock` gives
//! the same "build once, every reader sees a fully initialised index"
//! guarantee, except the loser of a race blocks instead of allocating
//! and leaking a throwaway copy — a strictly safer equivalent for
//! identical externally observable behaviour (`spec.md` §9; see
//! `DESIGN.md`).

use jitson_core::cell::{Cell, Collection, Index, ObjectIndex, TYPE_OBJECT};
use jitson_core::hash;

/// Number of cells occupied by the subtree rooted at `cells[idx]`.
/// Scalars and references occupy exactly one cell; a collection's span
/// was computed and stored when it was closed.
pub fn cell_span(cells: &[Cell], idx: usize) -> u32 {
    match cells[idx].as_collection() {
        Some(c) => c.span,
        None => 1,
    }
}

/// Borrow (building it on first use) the array index for the
/// collection at `root`.
pub fn array_index<'a>(cells: &[Cell], root: usize, collection: &'a Collection) -> &'a Index {
    collection.index.get_or_init(|| build_array_index(cells, root, collection))
}

fn build_array_index(cells: &[Cell], root: usize, collection: &Collection) -> Index {
    let count = cells[root].len as usize;
    let mut offsets = Vec::with_capacity(count + 1);
    let mut offset = 1u32;
    let mut cur = root + 1;
    for _ in 0..count {
        offsets.push(offset);
        let span = cell_span(cells, cur);
        offset += span;
        cur += span as usize;
    }
    offsets.push(collection.span);
    jitson_core::alloc::track_alloc();
    Index::Array(offsets.into_boxed_slice())
}

/// Offset (relative to `root`) of array element `i`, or `None` if out
/// of range. Uniform arrays compute this arithmetically and never
/// build an index at all (`spec.md` §4.6, "for arrays flagged IS_UNIF,
/// indexing is skipped").
pub fn array_element_offset(cells: &[Cell], root: usize, i: usize) -> Option<u32> {
    let collection = cells[root].as_collection()?;
    let count = cells[root].len as usize;
    if i >= count {
        return None;
    }
    if let Some(span) = collection.uniform_elem_span {
        return Some(1 + (i as u32) * span);
    }
    let index = array_index(cells, root, collection);
    match index {
        Index::Array(offsets) => Some(offsets[i]),
        Index::Object(_) => unreachable!("array collection produced an object index"),
    }
}

pub fn object_index<'a>(cells: &[Cell], root: usize, collection: &'a Collection) -> &'a Index {
    collection.index.get_or_init(|| build_object_index(cells, root, collection))
}

fn build_object_index(cells: &[Cell], root: usize, collection: &Collection) -> Index {
    let member_count = cells[root].len as usize;
    let bucket_count = (member_count.max(1)) as u32;

    let mut member_offset = Vec::with_capacity(member_count);
    let mut member_next = vec![0u32; member_count];
    let mut buckets = vec![0u32; bucket_count as usize];

    let mut cur = root + 1;
    for ordinal in 0..member_count {
        let key_offset = (cur - root) as u32;
        member_offset.push(key_offset);

        let key_bytes = cells[cur].as_str().expect("object member key must be a string cell").as_bytes();
        let bucket = hash::bucket_of(hash::hash_bytes(key_bytes), bucket_count) as usize;

        member_next[ordinal] = buckets[bucket];
        buckets[bucket] = (ordinal + 1) as u32;

        // Advance past the key cell (1 cell) and its value subtree.
        cur += 1;
        cur += cell_span(cells, cur) as usize;
    }

    jitson_core::alloc::track_alloc();
    Index::Object(ObjectIndex {
        buckets: buckets.into_boxed_slice(),
        member_offset: member_offset.into_boxed_slice(),
        member_next: member_next.into_boxed_slice(),
        total_span: collection.span,
    })
}

/// Look up member `name` in the object rooted at `root`, returning the
/// cell offset of its *value* (not its key) relative to `root`.
pub fn object_member_offset(cells: &[Cell], root: usize, name: &str) -> Option<u32> {
    debug_assert_eq!(cells[root].type_id, TYPE_OBJECT);
    let collection = cells[root].as_collection()?;
    let member_count = cells[root].len as usize;
    if member_count == 0 {
        return None;
    }
    let index = object_index(cells, root, collection);
    let obj = match index {
        Index::Object(o) => o,
        Index::Array(_) => unreachable!("object collection produced an array index"),
    };
    let bucket_count = obj.buckets.len() as u32;
    let bucket = hash::bucket_of(hash::hash_bytes(name.as_bytes()), bucket_count) as usize;

    let mut link = obj.buckets[bucket];
    while link != 0 {
        let ordinal = (link - 1) as usize;
        let key_offset = obj.member_offset[ordinal] as usize;
        let key_cell = &cells[root + key_offset];
        if key_cell.as_str() == Some(name) {
            let value_offset = key_offset + 1;
            return Some(value_offset as u32);
        }
        link = obj.member_next[ordinal];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::Stack;
    use jitson_core::cell::CellFlags;

    #[test]
    fn array_index_finds_every_element_once() {
        let mut s = Stack::new();
        s.open_array(CellFlags::empty(), false);
        for n in 0..5 {
            s.add_number(n as f64);
        }
        s.close_collection();
        let v = s.get_jitson();
        for i in 0..5 {
            let off = array_element_offset(v.cells(), 0, i).unwrap();
            assert_eq!(v.cells()[off as usize].payload_number(), Some(i as f64));
        }
        assert!(array_element_offset(v.cells(), 0, 5).is_none());
    }

    #[test]
    fn uniform_array_never_materialises_an_index() {
        let mut s = Stack::new();
        s.open_array(CellFlags::empty(), true);
        for n in 0..3 {
            s.add_number(n as f64);
        }
        s.close_collection();
        let v = s.get_jitson();
        let collection = v.cells()[0].as_collection().unwrap();
        array_element_offset(v.cells(), 0, 1);
        assert!(collection.index.get().is_none());
    }

    #[test]
    fn object_member_lookup_finds_all_keys() {
        let mut s = Stack::new();
        s.open_object(CellFlags::empty());
        s.add_member_name("a");
        s.add_number(1.0);
        s.add_member_name("biglongname");
        s.add_string("B");
        s.add_member_name("c");
        s.add_number(3.0);
        s.close_collection();
        let v = s.get_jitson();

        let a = object_member_offset(v.cells(), 0, "a").unwrap();
        assert_eq!(v.cells()[a as usize].payload_number(), Some(1.0));

        let big = object_member_offset(v.cells(), 0, "biglongname").unwrap();
        assert_eq!(v.cells()[big as usize].as_str(), Some("B"));

        assert!(object_member_offset(v.cells(), 0, "missing").is_none());
    }

    #[test]
    fn indexed_flag_not_reallocated_on_second_lookup() {
        let mut s = Stack::new();
        s.open_object(CellFlags::empty());
        s.add_member_name("x");
        s.add_number(1.0);
        s.close_collection();
        let v = s.get_jitson();
        object_member_offset(v.cells(), 0, "x");
        let collection = v.cells()[0].as_collection().unwrap();
        assert!(collection.index.get().is_some());
        // Second lookup reuses the same materialised index (OnceLock
        // never re-runs its initialiser).
        object_member_offset(v.cells(), 0, "x");
    }
}
