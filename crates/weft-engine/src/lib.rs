//! Weft engine - the step/transition engine
//!
//! The operational semantics of the calculus: [`Stepper::take`] advances a
//! process by exactly one communication action at a time, type-checking
//! first, then committing the step's effects transactionally through the
//! persistence port. A step whose partner has not arrived persists a pending
//! record (half-done); a step that finds its partner's record resolves the
//! rendezvous and continues with the unblocked continuation, trampolining
//! until no further work item is produced.
//!
//! There is no in-process parallelism inside a step: the port's commit is
//! the synchronization boundary, and optimistic revision locks are the only
//! mutual exclusion. The loser of a race receives a concurrency conflict and
//! may retry with a freshly loaded configuration; the engine itself never
//! retries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The take loop
pub mod stepper;

/// Per-term-kind transition rules
mod transitions;

/// Service facade: create / take / retrieve
pub mod service;

pub use service::{Declaration, DeclarationRef, ProcessService, Snapshot};
pub use stepper::Stepper;
