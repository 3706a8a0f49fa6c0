//! Generic ordered contiguous array (`spec.md` §4.1).
//!
//! Grounded on `original_source/lib-kit/kit-sortedarray.{h,c}`: a class
//! descriptor names the element layout and comparator once, and `add` /
//! `find` / `get` / `delete` / `intersect` are generic over it. The Rust
//! port expresses the class descriptor as a trait (`SortedArrayClass`)
//! instead of a `struct` of function pointers, and represents the
//! `ALLOW_INSERTS` / `ALLOW_GROWTH` / `CMP_CAN_FAIL` behaviours named in
//! `kit-sortedarray.h` as a `bitflags` value; the teacher itself doesn't
//! reach for the `bitflags` crate (`tagged_stack.rs`'s capability bits
//! are raw `u8`/`i64` discriminants), so this is enrichment from the
//! wider pack rather than something the teacher shows directly — see
//! `DESIGN.md`.
//!
//! `ZERO_COPY` (`spec.md`: "return a pointer to uninitialised storage") has
//! no safe equivalent worth keeping unsafe for here — [`SortedArray::reserve_slot`]
//! returns a `&mut` to a freshly default-initialised slot instead, which the
//! caller must still overwrite with a key consistent with its position
//! before any other operation observes the array, matching the original's
//! contract minus the uninitialised-memory hazard.

use std::cmp::Ordering;

bitflags::bitflags! {
    /// Behavioural flags for a [`SortedArray`], named after
    /// `KIT_SORTEDARRAY_*` in `kit-sortedarray.h`.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct SortedArrayFlags: u8 {
        /// Elements may be added out of order (located by binary search).
        const ALLOW_INSERTS = 0b0001;
        /// The backing storage may grow past its initial capacity.
        const ALLOW_GROWTH  = 0b0010;
        /// Caller writes directly into a reserved slot instead of copying.
        const ZERO_COPY      = 0b0100;
        /// The comparator may fail (returns `None`), requiring callers to
        /// handle [`SortedArrayError::CompareFailed`] / [`FindResult::Error`].
        const CMP_CAN_FAIL   = 0b1000;
    }
}

/// A class descriptor: how to extract a key from an element and compare
/// two keys. `fmt` is diagnostics-only, matching `kit_sortedelement_class::fmt`.
pub trait SortedArrayClass {
    type Elem;
    type Key: ?Sized;

    fn key<'a>(&self, elem: &'a Self::Elem) -> &'a Self::Key;

    /// `None` stands for the original's `FAIL` sentinel and is only
    /// meaningful when [`SortedArrayFlags::CMP_CAN_FAIL`] is set.
    fn cmp(&self, lhs: &Self::Key, rhs: &Self::Key) -> Option<Ordering>;

    fn fmt_key(&self, key: &Self::Key) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortedArrayError {
    Duplicate,
    UnsortedInsertNotPermitted,
    Full,
    CompareFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindResult {
    Found(usize),
    /// Miss; the value is the first slot whose key is greater, or `len()`.
    NotFound(usize),
    /// Only produced when [`SortedArrayFlags::CMP_CAN_FAIL`] is set and a
    /// comparison returned `None` partway through the search.
    Error,
}

pub struct SortedArray<C: SortedArrayClass> {
    class: C,
    flags: SortedArrayFlags,
    elems: Vec<C::Elem>,
    fixed_capacity: Option<usize>,
}

impl<C: SortedArrayClass> SortedArray<C> {
    pub fn new(class: C, flags: SortedArrayFlags) -> Self {
        SortedArray { class, flags, elems: Vec::new(), fixed_capacity: None }
    }

    /// A sorted array with storage capped at `capacity`, used when
    /// [`SortedArrayFlags::ALLOW_GROWTH`] is *not* set.
    pub fn with_capacity(class: C, flags: SortedArrayFlags, capacity: usize) -> Self {
        SortedArray {
            class,
            flags,
            elems: Vec::with_capacity(capacity),
            fixed_capacity: (!flags.contains(SortedArrayFlags::ALLOW_GROWTH)).then_some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn as_slice(&self) -> &[C::Elem] {
        &self.elems
    }

    pub fn class(&self) -> &C {
        &self.class
    }

    fn has_room(&self) -> bool {
        match self.fixed_capacity {
            Some(cap) => self.elems.len() < cap,
            None => true,
        }
    }

    fn grow(&mut self) {
        let extra = (self.elems.capacity() / 2).max(10);
        self.elems.reserve(extra);
        crate::alloc::track_alloc();
    }

    /// Locate `key`, returning a matched index, an insertion point, or
    /// [`FindResult::Error`] if the comparator failed.
    pub fn find(&self, key: &C::Key) -> FindResult {
        find_in_slice(&self.elems, key, &self.class)
    }

    pub fn get(&self, key: &C::Key) -> Option<&C::Elem> {
        match self.find(key) {
            FindResult::Found(i) => Some(&self.elems[i]),
            _ => None,
        }
    }

    /// Insert `elem`, keeping the array in non-decreasing order.
    pub fn add(&mut self, elem: C::Elem) -> Result<usize, SortedArrayError> {
        let elem_key_cmp = match self.elems.last() {
            None => None,
            Some(last) => {
                let last_key = self.class.key(last);
                let new_key = self.class.key(&elem);
                self.class.cmp(last_key, new_key)
            }
        };

        match elem_key_cmp {
            None if self.elems.is_empty() => {
                // First element: nothing to compare against.
            }
            None => {
                assert!(
                    self.flags.contains(SortedArrayFlags::CMP_CAN_FAIL),
                    "comparator returned FAIL without CMP_CAN_FAIL set"
                );
                return Err(SortedArrayError::CompareFailed);
            }
            Some(Ordering::Equal) => return Err(SortedArrayError::Duplicate),
            Some(Ordering::Greater) => {
                if !self.flags.contains(SortedArrayFlags::ALLOW_INSERTS) {
                    return Err(SortedArrayError::UnsortedInsertNotPermitted);
                }
                let key = self.class.key(&elem);
                return match find_in_slice(&self.elems, key, &self.class) {
                    FindResult::Found(_) => Err(SortedArrayError::Duplicate),
                    FindResult::Error => Err(SortedArrayError::CompareFailed),
                    FindResult::NotFound(pos) => {
                        if !self.has_room() {
                            if self.flags.contains(SortedArrayFlags::ALLOW_GROWTH) {
                                self.grow();
                            } else {
                                return Err(SortedArrayError::Full);
                            }
                        }
                        self.elems.insert(pos, elem);
                        Ok(pos)
                    }
                };
            }
            Some(Ordering::Less) => {}
        }

        if !self.has_room() {
            if self.flags.contains(SortedArrayFlags::ALLOW_GROWTH) {
                self.grow();
            } else {
                return Err(SortedArrayError::Full);
            }
        }
        let pos = self.elems.len();
        self.elems.push(elem);
        Ok(pos)
    }

    /// Reserve a slot at the correct sorted position for `key` without
    /// copying `elem` into it; the caller must fill in a value whose key
    /// compares equal to `key` before the array is read again. Returns
    /// `Duplicate`/`Full`/etc. the same way `add` does instead of the slot
    /// when insertion isn't possible.
    pub fn reserve_slot(&mut self, key: &C::Key, default: impl FnOnce() -> C::Elem) -> Result<&mut C::Elem, SortedArrayError> {
        debug_assert!(self.flags.contains(SortedArrayFlags::ZERO_COPY));
        let pos = match find_in_slice(&self.elems, key, &self.class) {
            FindResult::Found(_) => return Err(SortedArrayError::Duplicate),
            FindResult::Error => return Err(SortedArrayError::CompareFailed),
            FindResult::NotFound(pos) => pos,
        };
        if !self.has_room() {
            if self.flags.contains(SortedArrayFlags::ALLOW_GROWTH) {
                self.grow();
            } else {
                return Err(SortedArrayError::Full);
            }
        }
        self.elems.insert(pos, default());
        Ok(&mut self.elems[pos])
    }

    pub fn delete(&mut self, key: &C::Key) -> bool {
        match self.find(key) {
            FindResult::Found(i) => {
                self.elems.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Visit every element of `self` whose key also appears in `other`,
    /// in order. Stops early (returning `false`) if `visit` returns
    /// `false` or a comparison fails.
    pub fn intersect(&self, other: &SortedArray<C>, visit: &mut dyn FnMut(&C::Elem) -> bool) -> bool {
        intersect_slices(&self.elems, &other.elems, &self.class, visit)
    }
}

fn find_in_slice<C: SortedArrayClass>(slice: &[C::Elem], key: &C::Key, class: &C) -> FindResult {
    let mut lo = 0usize;
    let mut hi = slice.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let mid_key = class.key(&slice[mid]);
        match class.cmp(mid_key, key) {
            None => return FindResult::Error,
            Some(Ordering::Equal) => return FindResult::Found(mid),
            Some(Ordering::Less) => lo = mid + 1,
            Some(Ordering::Greater) => hi = mid,
        }
    }
    FindResult::NotFound(lo)
}

/// Test-only or caller-supplied intersection over raw slices, used by
/// [`SortedArray::intersect`] and reusable by the `jitson` operator
/// dispatch for arrays that are not wrapped in a `SortedArray`.
pub fn intersect_slices<C: SortedArrayClass>(
    left: &[C::Elem],
    right: &[C::Elem],
    class: &C,
    visit: &mut dyn FnMut(&C::Elem) -> bool,
) -> bool {
    if left.is_empty() {
        return true;
    }
    let mid = left.len() / 2;
    let median_key = class.key(&left[mid]);
    match find_in_slice::<C>(right, median_key, class) {
        FindResult::Error => false,
        FindResult::Found(idx) => {
            if !intersect_slices(&left[..mid], &right[..idx], class, visit) {
                return false;
            }
            if !visit(&left[mid]) {
                return false;
            }
            intersect_slices(&left[mid + 1..], &right[idx + 1..], class, visit)
        }
        FindResult::NotFound(idx) => {
            if !intersect_slices(&left[..mid], &right[..idx], class, visit) {
                return false;
            }
            intersect_slices(&left[mid + 1..], &right[idx..], class, visit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct IntClass;

    impl SortedArrayClass for IntClass {
        type Elem = i64;
        type Key = i64;

        fn key<'a>(&self, elem: &'a i64) -> &'a i64 {
            elem
        }

        fn cmp(&self, lhs: &i64, rhs: &i64) -> Option<Ordering> {
            Some(lhs.cmp(rhs))
        }

        fn fmt_key(&self, key: &i64) -> String {
            key.to_string()
        }
    }

    fn array(flags: SortedArrayFlags) -> SortedArray<IntClass> {
        SortedArray::new(IntClass, flags)
    }

    #[test]
    fn append_only_build_stays_ordered() {
        let mut a = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [1, 2, 3, 4, 5] {
            a.add(v).unwrap();
        }
        assert_eq!(a.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn out_of_order_build_requires_allow_inserts() {
        let flags = SortedArrayFlags::ALLOW_GROWTH;
        let mut a = array(flags);
        a.add(5).unwrap();
        assert_eq!(a.add(3), Err(SortedArrayError::UnsortedInsertNotPermitted));
    }

    #[test]
    fn out_of_order_build_with_allow_inserts_sorts_on_the_fly() {
        let flags = SortedArrayFlags::ALLOW_GROWTH | SortedArrayFlags::ALLOW_INSERTS;
        let mut a = array(flags);
        for v in (1..=32).rev() {
            a.add(v).unwrap();
        }
        let sorted: Vec<i64> = (1..=32).collect();
        assert_eq!(a.as_slice(), sorted.as_slice());
    }

    #[test]
    fn duplicate_is_rejected() {
        let flags = SortedArrayFlags::ALLOW_GROWTH | SortedArrayFlags::ALLOW_INSERTS;
        let mut a = array(flags);
        a.add(1).unwrap();
        a.add(2).unwrap();
        assert_eq!(a.add(1), Err(SortedArrayError::Duplicate));
    }

    #[test]
    fn full_without_growth_fails() {
        let mut a = SortedArray::with_capacity(IntClass, SortedArrayFlags::empty(), 2);
        a.add(1).unwrap();
        a.add(2).unwrap();
        assert_eq!(a.add(3), Err(SortedArrayError::Full));
    }

    #[test]
    fn find_returns_insertion_point_on_miss() {
        let mut a = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [10, 20, 30] {
            a.add(v).unwrap();
        }
        assert_eq!(a.find(&15), FindResult::NotFound(1));
        assert_eq!(a.find(&30), FindResult::Found(2));
        assert_eq!(a.find(&31), FindResult::NotFound(3));
    }

    #[test]
    fn delete_removes_and_keeps_order() {
        let mut a = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [1, 2, 3] {
            a.add(v).unwrap();
        }
        assert!(a.delete(&2));
        assert_eq!(a.as_slice(), &[1, 3]);
        assert!(!a.delete(&2));
    }

    #[test]
    fn intersect_visits_each_common_key_once() {
        let mut left = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [1, 2, 3] {
            left.add(v).unwrap();
        }
        let mut right = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [2, 4] {
            right.add(v).unwrap();
        }
        let mut seen = Vec::new();
        let matched = left.intersect(&right, &mut |v| {
            seen.push(*v);
            true
        });
        assert!(matched);
        assert_eq!(seen, vec![2]);
    }

    #[test]
    fn intersect_empty_result() {
        let mut left = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [1, 3] {
            left.add(v).unwrap();
        }
        let mut right = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [2, 4] {
            right.add(v).unwrap();
        }
        let mut seen = Vec::new();
        let matched = left.intersect(&right, &mut |v| {
            seen.push(*v);
            true
        });
        assert!(matched);
        assert!(seen.is_empty());
    }

    #[test]
    fn intersect_visitor_can_stop_early() {
        let mut left = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [1, 2, 3, 4] {
            left.add(v).unwrap();
        }
        let mut right = array(SortedArrayFlags::ALLOW_GROWTH);
        for v in [1, 2, 3, 4] {
            right.add(v).unwrap();
        }
        let mut seen = Vec::new();
        let matched = left.intersect(&right, &mut |v| {
            seen.push(*v);
            seen.len() < 2
        });
        assert!(!matched);
        assert_eq!(seen.len(), 2);
    }
}
