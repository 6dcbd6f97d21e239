//! Weft checker - the linear-context type checker
//!
//! Verifies a process-action term against the protocol types of its channels
//! before the stepper mutates anything. The context is linear: the process
//! provides exactly one channel (its liability) and uses any number of
//! others (its assets); every rule consumes, rebinds, or introduces entries
//! so that misuse of a channel is a typed error, never a runtime surprise.
//!
//! Pure and synchronous: all inputs are pre-resolved into a
//! [`weft_types::Env`], and failure leaves no trace anywhere.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The per-process linear context
pub mod context;

/// Checking rules for provider and client roles
pub mod check;

pub use check::check_state;
pub use context::Context;
