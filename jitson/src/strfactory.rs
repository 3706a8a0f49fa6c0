//! The string-factory collaborator (`spec.md` §6.2), used by
//! [`crate::json::to_json`] to accumulate output bytes without
//! pre-sizing the result.
//!
//! Grounded on `runtime/src/arena.rs`'s thread-local `bumpalo::Bump`:
//! the default factory here is a `Bump`-backed growable byte buffer
//! rather than a repeated `Vec<u8>` reallocation, matching the
//! teacher's reach for `bumpalo` whenever short-lived, bulk string
//! output is being built.

use bumpalo::Bump;

/// `reserve/commit/add/look/remove` (`spec.md` §6.2). A caller reserves
/// room, writes into it, then commits the bytes actually used; `add` is
/// the common reserve+write+commit in one call. `look` peeks the bytes
/// accumulated so far without taking ownership; `remove` takes
/// ownership and resets the factory to empty.
pub trait StringFactory {
    fn reserve(&mut self, n: usize) -> &mut [u8];
    fn commit(&mut self, n: usize);
    fn add(&mut self, bytes: &[u8]) {
        let buf = self.reserve(bytes.len());
        buf[..bytes.len()].copy_from_slice(bytes);
        self.commit(bytes.len());
    }
    fn look(&self) -> &[u8];
    fn remove(&mut self) -> Vec<u8>;
}

/// The default `StringFactory`: a bump-allocated scratch buffer backed
/// by an owned `Vec<u8>` view over the arena. `bumpalo::Bump` doesn't
/// give growable contiguous byte slices the way `Vec` does, so this
/// wraps a `Vec<u8>` for the actual bytes and keeps a `Bump` around
/// purely so other short-lived allocations made while rendering (e.g.
/// scratch UTF-8 buffers) share one arena, reset between uses.
pub struct ArenaStringFactory {
    bytes: Vec<u8>,
    /// Bytes appended by the most recent `reserve` call, not yet
    /// trimmed down by `commit`.
    pending: usize,
    scratch: Bump,
}

impl ArenaStringFactory {
    pub fn new() -> Self {
        ArenaStringFactory { bytes: Vec::new(), pending: 0, scratch: Bump::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        ArenaStringFactory { bytes: Vec::with_capacity(cap), pending: 0, scratch: Bump::new() }
    }

    /// The shared scratch arena for transient allocations during a
    /// render pass.
    pub fn arena(&self) -> &Bump {
        &self.scratch
    }
}

impl Default for ArenaStringFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl StringFactory for ArenaStringFactory {
    fn reserve(&mut self, n: usize) -> &mut [u8] {
        let start = self.bytes.len();
        self.bytes.resize(start + n, 0);
        self.pending = n;
        &mut self.bytes[start..]
    }

    /// Shrink the most recent reservation down to the `n` bytes actually
    /// used, dropping the unused tail.
    fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.pending, "commit exceeds the last reserve");
        let unused = self.pending - n;
        let new_len = self.bytes.len() - unused;
        self.bytes.truncate(new_len);
        self.pending = 0;
    }

    fn look(&self) -> &[u8] {
        &self.bytes
    }

    fn remove(&mut self) -> Vec<u8> {
        self.scratch.reset();
        self.pending = 0;
        std::mem::take(&mut self.bytes)
    }
}
