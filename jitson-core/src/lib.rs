//! Shared low-level building blocks for `jitson`: the packed value cell,
//! the user-type registry, the generic sorted-array engine, allocation
//! accounting and thread-local error state.
//!
//! This crate has no knowledge of JSON syntax or parsing — it only
//! defines the value representation and the primitives the parser and
//! indexer in the `jitson` crate build on, the same split the teacher
//! draws between `crates/core` (value/stack layout) and `crates/runtime`
//! (everything that acts on it).

pub mod alloc;
pub mod cell;
pub mod error;
pub mod hash;
pub mod registry;
pub mod sorted_array;
