//! Weft store - the persistence port and its in-memory reference
//! implementation
//!
//! The stepper consumes persistence only through the [`PersistencePort`]
//! trait: transactional load of process configurations, bulk resolution of
//! referenced types and signatures, and an atomic [`Mod`] commit guarded by
//! optimistic revision locks. The binding-event ledger is append-only; the
//! configuration a step sees is a projection of it.
//!
//! [`MemoryStore`] implements the port over a mutex-held state and is the
//! store used by the test suites and the service facade. A relational
//! implementation would live outside this workspace and implement the same
//! trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// The persistence port trait and the `Mod` commit batch
pub mod port;

/// In-memory reference implementation
pub mod memory;

pub use memory::MemoryStore;
pub use port::{ChannelRecord, Mod, PersistencePort, ProcessLock, ProcessRecord, RevisionLock};
