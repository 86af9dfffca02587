//! Shared foundational types used across the Strata plane optimizer.
//!
//! This crate provides the dense [`Arena`] used for canonical node storage,
//! content hashing for packing checksums, and the internal error type.

#![warn(missing_docs)]

pub mod arena;
pub mod hash;
pub mod result;

pub use arena::{Arena, ArenaId};
pub use hash::ContentHash;
pub use result::InternalError;
