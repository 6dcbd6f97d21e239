//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use weft_core::{ChannelId, Placeholder, PoolId, ProcessId, TypeId};
use weft_store::{MemoryStore, Mod, PersistencePort};
use weft_types::{BindingEvent, TypeSpec};

/// One store shared between the stepper under test and direct seeding
/// commits.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        tracing_subscriber::fmt()
            .with_test_writer()
            .try_init()
            .ok();
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn port(&self) -> Arc<dyn PersistencePort> {
        self.store.clone()
    }

    pub async fn unit(&self) -> TypeId {
        self.store.register_type(&TypeSpec::Unit).await.unwrap()
    }

    pub async fn register(&self, spec: &TypeSpec) -> TypeId {
        self.store.register_type(spec).await.unwrap()
    }

    pub async fn pool_with_process(&self) -> (PoolId, ProcessId) {
        let pool = self.store.register_pool().await.unwrap();
        let process = self.store.register_process(pool).await.unwrap();
        (pool, process)
    }

    /// Allocate a channel provided by `pool` without binding it anywhere.
    pub async fn new_channel(&self, pool: PoolId) -> ChannelId {
        let revision = self.store.select_pool(pool).await.unwrap().revision;
        let mut batch = Mod::new();
        batch.lock(pool, revision);
        let channel = ChannelId::new();
        batch.channel(channel, pool);
        self.store.commit(batch).await.unwrap();
        channel
    }

    /// Bind an existing channel into `process` under `placeholder`.
    pub async fn bind(
        &self,
        pool: PoolId,
        process: ProcessId,
        placeholder: &str,
        channel: ChannelId,
        ty: TypeId,
    ) {
        let revision = self.store.select_pool(pool).await.unwrap().revision;
        let mut batch = Mod::new();
        batch.lock(pool, revision);
        let granted_at = batch.next_revision(pool).unwrap();
        batch.bind(BindingEvent::grant(
            process,
            Placeholder::from(placeholder),
            channel,
            ty,
            granted_at,
        ));
        self.store.commit(batch).await.unwrap();
    }

    /// Allocate a channel provided by `providing_pool` and bind it into
    /// `process` (owned by `pool`) in one commit.
    pub async fn provide(
        &self,
        providing_pool: PoolId,
        pool: PoolId,
        process: ProcessId,
        placeholder: &str,
        ty: TypeId,
    ) -> ChannelId {
        let revision = self.store.select_pool(pool).await.unwrap().revision;
        let mut batch = Mod::new();
        batch.lock(pool, revision);
        let channel = ChannelId::new();
        batch.channel(channel, providing_pool);
        let granted_at = batch.next_revision(pool).unwrap();
        batch.bind(BindingEvent::grant(
            process,
            Placeholder::from(placeholder),
            channel,
            ty,
            granted_at,
        ));
        self.store.commit(batch).await.unwrap();
        channel
    }
}
