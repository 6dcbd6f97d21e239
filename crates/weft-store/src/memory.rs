//! In-memory reference implementation of the persistence port.
//!
//! State lives behind one mutex; the commit path validates every lock and
//! every pending put before mutating anything, so a failed commit leaves no
//! partial state. Endpoints are projected from the append-only binding
//! ledger on every configuration load.

use crate::port::{Mod, PersistencePort, ProcessLock, ProcessRecord, RevisionLock};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};
use weft_core::{
    ChannelId, PoolId, ProcessId, Result, Revision, SignatureName, TypeId, WeftError,
};
use weft_types::{
    BindingEvent, Configuration, Endpoint, Env, PendingStep, PoolRecord, Signature, SignatureDecl,
    SignatureParam, TypeArena, TypeSpec, TypeStore,
};

#[derive(Debug, Clone, Copy)]
struct ProcessMeta {
    pool: PoolId,
    revision: Revision,
}

#[derive(Default)]
struct StoreState {
    arena: TypeArena,
    signatures: HashMap<SignatureName, Signature>,
    pools: HashMap<PoolId, Revision>,
    processes: HashMap<ProcessId, ProcessMeta>,
    channels: HashMap<ChannelId, PoolId>,
    ledger: Vec<BindingEvent>,
    pending: HashMap<ChannelId, PendingStep>,
}

/// Mutex-held in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the binding ledger, for test assertions.
    pub fn ledger_len(&self) -> usize {
        self.state.lock().ledger.len()
    }

    /// Snapshot of the pending record for `channel`, for test assertions.
    pub fn pending_for(&self, channel: ChannelId) -> Option<PendingStep> {
        self.state.lock().pending.get(&channel).cloned()
    }

    /// Channels that currently carry a pending record, for test assertions.
    pub fn pending_channels(&self) -> Vec<ChannelId> {
        self.state.lock().pending.keys().copied().collect()
    }

    /// Processes owned by `pool`, for test assertions.
    pub fn processes_in(&self, pool: PoolId) -> Vec<ProcessId> {
        self.state
            .lock()
            .processes
            .iter()
            .filter(|(_, meta)| meta.pool == pool)
            .map(|(id, _)| *id)
            .collect()
    }
}

fn project_endpoints(state: &StoreState, process: ProcessId) -> Result<HashMap<weft_core::Placeholder, Endpoint>> {
    let mut endpoints = HashMap::new();
    for event in &state.ledger {
        if event.process != process {
            continue;
        }
        if event.is_grant() {
            let (Some(channel), Some(type_id)) = (event.channel, event.type_id) else {
                return Err(WeftError::unexpected_variant(
                    "grant event without channel or type",
                ));
            };
            let providing_pool = *state
                .channels
                .get(&channel)
                .ok_or_else(|| WeftError::missing_in_environment(channel))?;
            endpoints.insert(
                event.placeholder.clone(),
                Endpoint {
                    placeholder: event.placeholder.clone(),
                    channel,
                    type_id,
                    providing_pool,
                    granted_at: event.revision,
                },
            );
        } else if let Some(existing) = endpoints.get(&event.placeholder) {
            // A revocation only cancels the grant it names.
            if existing.granted_at == event.revision.negated() {
                endpoints.remove(&event.placeholder);
            }
        }
    }
    Ok(endpoints)
}

#[async_trait]
impl PersistencePort for MemoryStore {
    async fn select_configuration(&self, process: ProcessId) -> Result<Configuration> {
        let state = self.state.lock();
        let meta = state
            .processes
            .get(&process)
            .copied()
            .ok_or_else(|| WeftError::missing_in_environment(process))?;
        let pool_revision = *state
            .pools
            .get(&meta.pool)
            .ok_or_else(|| WeftError::missing_in_environment(meta.pool))?;
        let endpoints = project_endpoints(&state, process)?;
        let pending = endpoints
            .values()
            .filter_map(|e| {
                state
                    .pending
                    .get(&e.channel)
                    .map(|record| (e.channel, record.clone()))
            })
            .collect();
        Ok(Configuration {
            process,
            pool: meta.pool,
            endpoints,
            pending,
            pool_revision,
            process_revision: meta.revision,
        })
    }

    async fn select_pool(&self, pool: PoolId) -> Result<PoolRecord> {
        let state = self.state.lock();
        let revision = *state
            .pools
            .get(&pool)
            .ok_or_else(|| WeftError::missing_in_environment(pool))?;
        Ok(PoolRecord { pool, revision })
    }

    async fn select_environment(
        &self,
        type_roots: &[TypeId],
        signatures: &[SignatureName],
    ) -> Result<Env> {
        let state = self.state.lock();
        let mut env = Env::new();
        let mut roots: Vec<TypeId> = type_roots.to_vec();
        for name in signatures {
            let sig = state
                .signatures
                .get(name)
                .ok_or_else(|| WeftError::missing_in_environment(name))?;
            roots.push(sig.provides_type);
            roots.extend(sig.params.iter().map(|p| p.type_id));
            env.signatures.insert(name.clone(), sig.clone());
        }
        for root in roots {
            for id in state.arena.closure(root)? {
                if !env.types.contains_key(&id) {
                    env.types.insert(id, state.arena.resolve(id)?.clone());
                }
            }
        }
        Ok(env)
    }

    async fn commit(&self, batch: Mod) -> Result<()> {
        let mut state = self.state.lock();

        // Validate before mutating: all locks, then pending exclusivity.
        for RevisionLock { pool, revision } in &batch.locks {
            let stored = *state
                .pools
                .get(pool)
                .ok_or_else(|| WeftError::missing_in_environment(pool))?;
            if stored != *revision {
                warn!(%pool, expected = %revision, %stored, "commit lost the revision race");
                return Err(WeftError::concurrency_conflict(stored));
            }
        }
        for ProcessLock { process, revision } in &batch.process_locks {
            let meta = state
                .processes
                .get(process)
                .ok_or_else(|| WeftError::missing_in_environment(*process))?;
            if meta.revision != *revision {
                warn!(
                    %process,
                    expected = %revision,
                    stored = %meta.revision,
                    "commit lost the process revision race"
                );
                return Err(WeftError::concurrency_conflict(meta.revision));
            }
        }
        for (channel, record) in &batch.pending_put {
            if state.pending.contains_key(channel) && !batch.pending_remove.contains(channel) {
                return Err(WeftError::unexpected_variant(format!(
                    "channel {channel} already carries a pending record (put {})",
                    record.kind()
                )));
            }
        }

        for record in &batch.channels {
            state.channels.insert(record.channel, record.providing_pool);
        }
        for ProcessRecord {
            process,
            pool,
            revision,
        } in &batch.processes
        {
            state.processes.insert(
                *process,
                ProcessMeta {
                    pool: *pool,
                    revision: *revision,
                },
            );
        }
        for event in batch.bindings {
            if let Some(meta) = state.processes.get_mut(&event.process) {
                meta.revision = meta.revision.next();
            }
            state.ledger.push(event);
        }
        for channel in &batch.pending_remove {
            state.pending.remove(channel);
        }
        for (channel, record) in batch.pending_put {
            state.pending.insert(channel, record);
        }
        for RevisionLock { pool, revision } in &batch.locks {
            if let Some(stored) = state.pools.get_mut(pool) {
                *stored = revision.next();
            }
        }
        debug!(locks = batch.locks.len(), "commit applied");
        Ok(())
    }

    async fn register_type(&self, spec: &TypeSpec) -> Result<TypeId> {
        let mut state = self.state.lock();
        Ok(state.arena.intern(spec))
    }

    async fn register_signature(&self, decl: &SignatureDecl) -> Result<SignatureName> {
        let mut state = self.state.lock();
        let provides_type = state.arena.intern(&decl.provides_type);
        let params = decl
            .params
            .iter()
            .map(|(placeholder, spec)| SignatureParam {
                placeholder: placeholder.clone(),
                type_id: state.arena.intern(spec),
            })
            .collect();
        let signature = Signature {
            name: decl.name.clone(),
            provides: decl.provides.clone(),
            provides_type,
            params,
        };
        state.signatures.insert(decl.name.clone(), signature);
        Ok(decl.name.clone())
    }

    async fn register_pool(&self) -> Result<PoolId> {
        let mut state = self.state.lock();
        let pool = PoolId::new();
        state.pools.insert(pool, Revision::initial());
        Ok(pool)
    }

    async fn register_process(&self, pool: PoolId) -> Result<ProcessId> {
        let mut state = self.state.lock();
        if !state.pools.contains_key(&pool) {
            return Err(WeftError::missing_in_environment(pool));
        }
        let process = ProcessId::new();
        state.processes.insert(
            process,
            ProcessMeta {
                pool,
                revision: Revision::initial(),
            },
        );
        Ok(process)
    }

    async fn select_type(&self, id: TypeId) -> Result<TypeSpec> {
        let state = self.state.lock();
        state.arena.to_spec(id)
    }

    async fn select_signature(&self, name: &SignatureName) -> Result<Signature> {
        let state = self.state.lock();
        state
            .signatures
            .get(name)
            .cloned()
            .ok_or_else(|| WeftError::missing_in_environment(name))
    }
}
