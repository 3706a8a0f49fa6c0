//! `jitson`: parser, indexing, operator dispatch, constants/casts and
//! the public read/write API over [`jitson_core::cell`] values.
//!
//! Mirrors the teacher's `crates/core`/`crates/runtime` split: this
//! crate is everything that *acts* on the value representation
//! `jitson_core` defines, the way `crates/runtime` acts on
//! `crates/core`'s `StackValue`/`tagged_stack`.

pub mod constants;
pub mod index;
pub mod json;
pub mod operators;
pub mod parser;
pub mod range;
pub mod source;
pub mod stack;
pub mod strfactory;
pub mod unicode;
pub mod value;

pub use constants::{CastFn, CastTable, ConstTable};
pub use operators::{Arity, BinaryFn, DispatchSide, OperatorError, OperatorTable};
pub use parser::{IdentHook, ParseError, Parser};
pub use source::{NumberError, NumberKind, Source, SourceFlags};
pub use stack::{with_thread_stack, Stack};
pub use strfactory::{ArenaStringFactory, StringFactory};
pub use value::{CellRef, Value};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use jitson_core::cell::TypeId;

bitflags::bitflags! {
    /// Parser-extension defaults an `initialize` caller wants every
    /// subsequently built [`Parser`] to start from (`spec.md` §6.4
    /// `initialize(min_types, flags)`; `SXE_JITSON_FLAG_*` in
    /// `original_source`). Bit-for-bit the same layout as
    /// [`SourceFlags`] — kept as a distinct type since init-time policy
    /// and a single parse call's flags are different concerns, the way
    /// the teacher's `SonConfig` is a separate type from any one
    /// request's per-call options.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct InitFlags: u8 {
        const ALLOW_HEX    = 0b0001;
        const ALLOW_CONSTS = 0b0010;
        const ALLOW_IDENTS = 0b0100;
        const OPTIMIZE     = 0b1000;
    }
}

impl From<InitFlags> for SourceFlags {
    fn from(flags: InitFlags) -> Self {
        SourceFlags::from_bits_truncate(flags.bits())
    }
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);
static RANGE_TYPE: OnceLock<TypeId> = OnceLock::new();

pub fn is_init() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// One-time process startup (`spec.md` §6.4 Lifecycle group):
/// registers the built-in `range` type and returns `flags` unchanged,
/// for the caller's convenience when building a default [`Parser`].
/// Idempotent — a second call skips the registration but still echoes
/// back whatever `flags` it was given.
///
/// `min_types` mirrors the original's capacity-reservation parameter;
/// `jitson_core::registry`'s backing `Vec` grows on demand, so there is
/// no fixed floor to enforce here, and the value is accepted only for
/// call-site parity and diagnostics.
pub fn initialize(min_types: u16, flags: InitFlags) -> InitFlags {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return flags;
    }
    tracing::debug!(min_types, ?flags, "jitson::initialize");
    let _ = RANGE_TYPE.get_or_init(|| range::register_type().expect("range type registration"));
    flags
}

/// The process-wide `range` pseudo-type's id, once [`initialize`] has
/// run.
pub fn range_type() -> Option<TypeId> {
    RANGE_TYPE.get().copied()
}

/// Reset the initialized flag (`spec.md` §6.4 `finalize`). Does not
/// (and per `spec.md` §4.2, cannot) free registered type ids; tests
/// that need a clean `is_init()` baseline between cases call this
/// between them.
pub fn finalize() {
    INITIALIZED.store(false, Ordering::Release);
}

/// `spec.md` §6.4 Parse group convenience: parse one value with no
/// parser extensions enabled. Callers that need `ALLOW_*`/`OPTIMIZE`,
/// a constants table, a cast table, or an identifier hook should build
/// a [`Parser`] directly.
pub fn parse_json(text: &str) -> Result<Value, ParseError> {
    Parser::new(text, SourceFlags::empty()).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_is_idempotent_and_registers_range() {
        finalize();
        assert!(!is_init());
        let got = initialize(16, InitFlags::OPTIMIZE);
        assert!(is_init());
        assert_eq!(got, InitFlags::OPTIMIZE);
        assert!(range_type().is_some());

        // Second call skips registration but still echoes its own flags.
        let second = initialize(0, InitFlags::empty());
        assert_eq!(second, InitFlags::empty());
        finalize();
    }

    #[test]
    fn parse_json_rejects_trailing_content() {
        assert!(parse_json("1 2").is_err());
        assert!(parse_json("1").is_ok());
    }
}
