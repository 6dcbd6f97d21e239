//! Weft core - foundation types for the weft process runtime
//!
//! This crate provides the identifier newtypes, the signed revision counter,
//! and the unified error taxonomy shared by every other weft crate. It has no
//! domain logic of its own: the protocol-type and term models live in
//! `weft-types`, checking in `weft-checker`, persistence in `weft-store`, and
//! the operational semantics in `weft-engine`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Identifier newtypes and label/placeholder atoms
pub mod ids;

/// Signed, strictly monotonic revision counters
pub mod revision;

/// Unified error taxonomy
pub mod errors;

pub use errors::{Result, WeftError};
pub use ids::{ChannelId, Label, Placeholder, PoolId, ProcessId, SignatureName, TypeId, TypeName};
pub use revision::Revision;
