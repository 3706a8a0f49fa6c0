//! Allocation accounting for the allocator collaborator (`spec.md` §6.1).
//!
//! `spec.md` treats the allocator as an external collaborator the core
//! never bypasses, so that leak accounting stays centralised: "the core
//! never calls the platform allocator directly." We don't hand-roll a
//! `malloc`/`free` pair (Rust's `Vec`/`Box` already give us a sound
//! allocator); instead every growth point in the crate funnels through the
//! counters below, the same way `memory_stats.rs` gives every thread an
//! exclusive slot to update without contention. `allocations()` is the
//! "outstanding allocations" probe `spec.md` §6.1 asks for, consumed by
//! tests that want to assert no leaks across a test (§5, "Shared-resource
//! policy").
//!
//! Open Question (spec.md §9, "initial_mallocs"): this probe counts *all*
//! tracked allocations, including ones made by [`crate::registry`] during
//! process init. A test that wants a clean baseline calls [`allocations`]
//! once after `initialize()` and diffs against it.

use std::sync::atomic::{AtomicU64, Ordering};

static ALLOCS: AtomicU64 = AtomicU64::new(0);
static FREES: AtomicU64 = AtomicU64::new(0);

/// Record that one tracked allocation occurred (a stack grew, an index was
/// materialised, a string was duplicated, ...).
#[inline]
pub fn track_alloc() {
    ALLOCS.fetch_add(1, Ordering::Relaxed);
}

/// Record that one tracked allocation was freed.
#[inline]
pub fn track_free() {
    FREES.fetch_add(1, Ordering::Relaxed);
}

/// Number of tracked allocations that have not yet been matched by a free.
///
/// Negative drift (more frees than allocs) indicates a double-free bug in
/// the caller and is reported as `0` rather than wrapping, since the
/// counters are unsigned.
pub fn allocations() -> u64 {
    let allocs = ALLOCS.load(Ordering::Relaxed);
    let frees = FREES.load(Ordering::Relaxed);
    allocs.saturating_sub(frees)
}

/// A scope guard that tracks one allocation on construction and its
/// matching free on drop; used by owners of a single heap object (a
/// stack's backing buffer, a materialised index) so the counters can never
/// drift out of sync with the object's lifetime.
pub struct Tracked<T> {
    value: T,
}

impl<T> Tracked<T> {
    pub fn new(value: T) -> Self {
        track_alloc();
        Tracked { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn into_inner(self) -> T {
        let Tracked { value } = self;
        track_free();
        std::mem::forget(self);
        value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        track_free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests that touch the global counters run under a lock so they don't
    // observe each other's allocations (the same discipline
    // `memory_stats.rs`'s tests use for its global registry).
    static COUNTER_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn track_alloc_and_free_balance() {
        let _guard = COUNTER_LOCK.lock().unwrap();
        let before = allocations();
        track_alloc();
        assert_eq!(allocations(), before + 1);
        track_free();
        assert_eq!(allocations(), before);
    }

    #[test]
    fn tracked_guard_balances_on_drop() {
        let _guard = COUNTER_LOCK.lock().unwrap();
        let before = allocations();
        {
            let t = Tracked::new(vec![1, 2, 3]);
            assert_eq!(allocations(), before + 1);
            assert_eq!(t.get().len(), 3);
        }
        assert_eq!(allocations(), before);
    }

    #[test]
    fn tracked_into_inner_frees_without_dropping_value() {
        let _guard = COUNTER_LOCK.lock().unwrap();
        let before = allocations();
        let t = Tracked::new(String::from("hi"));
        let s = t.into_inner();
        assert_eq!(s, "hi");
        assert_eq!(allocations(), before);
    }
}
