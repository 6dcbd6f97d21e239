//! Weft types - protocol type model and term model
//!
//! Pure domain types for the weft process runtime: the catalog of
//! protocol-type variants (linear-logic propositions) with polarity and
//! structural equality, the catalog of process-action terms, and the
//! persisted state shapes (configurations, pending step records, binding
//! events, signatures) that the checker and the stepper operate on.
//!
//! This crate performs no I/O. Identified protocol types live in an arena of
//! nodes keyed by generated ids with child references as ids; declared
//! (author-facing) types and terms are recursive owned trees that double as
//! the wire shapes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Protocol type model: declared specs, identified arena, polarity,
/// structural equality
pub mod proto;

/// Process-action terms and their wire shape
pub mod term;

/// Persisted state shapes: endpoints, configurations, pending records,
/// binding events, signatures
pub mod state;

/// Per-step resolution environment
pub mod env;

pub use env::Env;
pub use proto::{check_equal, Polarity, TypeArena, TypeNode, TypeSpec, TypeStore};
pub use state::{
    BindingEvent, Configuration, Endpoint, Offer, PendingStep, PoolRecord, Signature,
    SignatureDecl, SignatureParam,
};
pub use term::{Branch, Term, MAX_CASE_BRANCHES};
