//! The persistence port.
//!
//! One step produces one [`Mod`]: the batch of revision locks taken, binding
//! events appended, pending-record puts and removals, and process and channel
//! creations. The port applies a `Mod` atomically; if any lock's expected
//! revision no longer matches the stored revision the whole commit fails
//! with a concurrency conflict and leaves no partial state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use weft_core::{ChannelId, PoolId, ProcessId, Result, Revision, SignatureName, TypeId};
use weft_types::{
    BindingEvent, Configuration, Env, PendingStep, PoolRecord, Signature, SignatureDecl, TypeSpec,
};

/// Expected-revision lock on one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionLock {
    /// Locked pool.
    pub pool: PoolId,
    /// Revision the step read; commit fails if it moved.
    pub revision: Revision,
}

/// Expected-revision lock on one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLock {
    /// Locked process.
    pub process: ProcessId,
    /// Revision the step read; commit fails if it moved.
    pub revision: Revision,
}

/// Creation of a channel, recording which pool provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// The new channel.
    pub channel: ChannelId,
    /// Pool providing it.
    pub providing_pool: PoolId,
}

/// Creation of a process liability in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// The new process.
    pub process: ProcessId,
    /// Owning pool.
    pub pool: PoolId,
    /// Revision the process starts at.
    pub revision: Revision,
}

/// The atomic effect batch of one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mod {
    /// Pools whose revision was read and must still match at commit.
    pub locks: Vec<RevisionLock>,
    /// Pre-existing processes whose revision was read and must still match
    /// at commit. Processes created by this batch are not locked.
    pub process_locks: Vec<ProcessLock>,
    /// Ledger appends: grants and revocations.
    pub bindings: Vec<BindingEvent>,
    /// New channels allocated by this step.
    pub channels: Vec<ChannelRecord>,
    /// New processes created by this step (spawn/call).
    pub processes: Vec<ProcessRecord>,
    /// Pending records written, keyed by channel.
    pub pending_put: Vec<(ChannelId, PendingStep)>,
    /// Pending records consumed by a rendezvous.
    pub pending_remove: Vec<ChannelId>,
}

impl Mod {
    /// Empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a revision lock on `pool`, once per pool.
    pub fn lock(&mut self, pool: PoolId, revision: Revision) {
        if !self.locks.iter().any(|l| l.pool == pool) {
            self.locks.push(RevisionLock { pool, revision });
        }
    }

    /// Take a revision lock on `process`, once per process.
    pub fn lock_process(&mut self, process: ProcessId, revision: Revision) {
        if !self.process_locks.iter().any(|l| l.process == process) {
            self.process_locks.push(ProcessLock { process, revision });
        }
    }

    /// The revision a binding granted in `pool` by this batch will carry.
    pub fn next_revision(&self, pool: PoolId) -> Result<Revision> {
        self.locks
            .iter()
            .find(|l| l.pool == pool)
            .map(|l| l.revision.next())
            .ok_or_else(|| {
                weft_core::WeftError::unexpected_variant(format!(
                    "binding written into unlocked pool {pool}"
                ))
            })
    }

    /// Append a binding event.
    pub fn bind(&mut self, event: BindingEvent) {
        self.bindings.push(event);
    }

    /// Record a freshly allocated channel.
    pub fn channel(&mut self, channel: ChannelId, providing_pool: PoolId) {
        self.channels.push(ChannelRecord {
            channel,
            providing_pool,
        });
    }

    /// Record a new process liability.
    pub fn process(&mut self, record: ProcessRecord) {
        self.processes.push(record);
    }

    /// Write a pending record for `channel`.
    pub fn put_pending(&mut self, channel: ChannelId, record: PendingStep) {
        self.pending_put.push((channel, record));
    }

    /// Consume the pending record for `channel`.
    pub fn remove_pending(&mut self, channel: ChannelId) {
        self.pending_remove.push(channel);
    }
}

/// Transactional load/store of process state, consumed by the stepper and
/// the service facade.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Load the configuration of one process: endpoints projected from the
    /// ledger, pending records for its channels, and both revisions.
    async fn select_configuration(&self, process: ProcessId) -> Result<Configuration>;

    /// Current revision of a pool (the lock target for spawn).
    async fn select_pool(&self, pool: PoolId) -> Result<PoolRecord>;

    /// Bulk-resolve the types reachable from `type_roots` and the named
    /// signatures (with their own type closures) for one step.
    async fn select_environment(
        &self,
        type_roots: &[TypeId],
        signatures: &[SignatureName],
    ) -> Result<Env>;

    /// Apply a batch atomically. Every lock's expected revision must equal
    /// the stored revision, or the commit fails with a concurrency conflict
    /// and no partial state.
    async fn commit(&self, batch: Mod) -> Result<()>;

    /// Declare a protocol type: convert to identified form and return the
    /// root id.
    async fn register_type(&self, spec: &TypeSpec) -> Result<TypeId>;

    /// Declare a process signature.
    async fn register_signature(&self, decl: &SignatureDecl) -> Result<SignatureName>;

    /// Create an empty pool.
    async fn register_pool(&self) -> Result<PoolId>;

    /// Create a process owned by `pool`; bindings arrive through commits.
    async fn register_process(&self, pool: PoolId) -> Result<ProcessId>;

    /// Read-only projection of a declared protocol type.
    async fn select_type(&self, id: TypeId) -> Result<TypeSpec>;

    /// Read-only projection of a declared signature.
    async fn select_signature(&self, name: &SignatureName) -> Result<Signature>;
}
