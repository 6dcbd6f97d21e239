//! Optimistic-concurrency behavior of the stepper and failure atomicity.

mod common;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::Fixture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use weft_core::{Label, Placeholder, PoolId, ProcessId, Result, SignatureName, TypeId, WeftError};
use weft_engine::Stepper;
use weft_store::{MemoryStore, Mod, PersistencePort};
use weft_types::{
    Branch, Configuration, Env, PoolRecord, Signature, SignatureDecl, Term, TypeSpec,
};

/// Port wrapper that pins the first configuration it loads per process, so a
/// later step runs against a deliberately stale snapshot.
struct FrozenPort {
    inner: Arc<MemoryStore>,
    frozen: Mutex<HashMap<ProcessId, Configuration>>,
}

impl FrozenPort {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            frozen: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PersistencePort for FrozenPort {
    async fn select_configuration(&self, process: ProcessId) -> Result<Configuration> {
        if let Some(config) = self.frozen.lock().unwrap().get(&process).cloned() {
            return Ok(config);
        }
        let config = self.inner.select_configuration(process).await?;
        self.frozen
            .lock()
            .unwrap()
            .insert(process, config.clone());
        Ok(config)
    }

    async fn select_pool(&self, pool: PoolId) -> Result<PoolRecord> {
        self.inner.select_pool(pool).await
    }

    async fn select_environment(
        &self,
        type_roots: &[TypeId],
        signatures: &[SignatureName],
    ) -> Result<Env> {
        self.inner.select_environment(type_roots, signatures).await
    }

    async fn commit(&self, batch: Mod) -> Result<()> {
        self.inner.commit(batch).await
    }

    async fn register_type(&self, spec: &TypeSpec) -> Result<TypeId> {
        self.inner.register_type(spec).await
    }

    async fn register_signature(&self, decl: &SignatureDecl) -> Result<SignatureName> {
        self.inner.register_signature(decl).await
    }

    async fn register_pool(&self) -> Result<PoolId> {
        self.inner.register_pool().await
    }

    async fn register_process(&self, pool: PoolId) -> Result<ProcessId> {
        self.inner.register_process(pool).await
    }

    async fn select_type(&self, id: TypeId) -> Result<TypeSpec> {
        self.inner.select_type(id).await
    }

    async fn select_signature(&self, name: &SignatureName) -> Result<Signature> {
        self.inner.select_signature(name).await
    }
}

#[tokio::test]
async fn stale_configuration_loses_the_commit_race() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let (pool, provider) = fx.pool_with_process().await;
    fx.provide(pool, pool, provider, "x", unit).await;

    let port = Arc::new(FrozenPort::new(fx.store.clone()));
    port.select_configuration(provider).await.unwrap();
    let ledger_before = fx.store.ledger_len();

    // Another writer advances the pool after the snapshot was taken.
    let revision = fx.store.select_pool(pool).await.unwrap().revision;
    let mut racer = Mod::new();
    racer.lock(pool, revision);
    fx.store.commit(racer).await.unwrap();

    let stepper = Stepper::new(port);
    let err = stepper
        .take(
            pool,
            provider,
            Term::Close {
                via: Placeholder::from("x"),
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, WeftError::ConcurrencyConflict { .. });
    assert!(err.is_retryable());
    // The losing commit left no trace.
    assert_eq!(fx.store.ledger_len(), ledger_before);
    assert!(fx.store.pending_channels().is_empty());
}

#[tokio::test]
async fn check_failure_aborts_before_any_mutation() {
    let fx = Fixture::new();
    let with = fx
        .register(&TypeSpec::With {
            choices: [
                (Label::from("inc"), TypeSpec::Unit),
                (Label::from("dec"), TypeSpec::Unit),
            ]
            .into_iter()
            .collect(),
        })
        .await;
    let (pool, provider) = fx.pool_with_process().await;
    fx.provide(pool, pool, provider, "x", with).await;
    let ledger_before = fx.store.ledger_len();

    // One branch against a two-label choice type.
    let stepper = Stepper::new(fx.port());
    let err = stepper
        .take(
            pool,
            provider,
            Term::Case {
                via: Placeholder::from("x"),
                branches: vec![Branch {
                    label: Label::from("inc"),
                    continuation: Term::Close {
                        via: Placeholder::from("x"),
                    },
                }],
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err, WeftError::arity_mismatch(2, 1));
    assert_eq!(fx.store.ledger_len(), ledger_before);
    assert!(fx.store.pending_channels().is_empty());
}

#[tokio::test]
async fn take_rejects_a_mismatched_pool() {
    let fx = Fixture::new();
    let unit = fx.unit().await;
    let (pool, provider) = fx.pool_with_process().await;
    let (other_pool, _) = fx.pool_with_process().await;
    fx.provide(pool, pool, provider, "x", unit).await;

    let stepper = Stepper::new(fx.port());
    let err = stepper
        .take(
            other_pool,
            provider,
            Term::Close {
                via: Placeholder::from("x"),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, WeftError::UnexpectedVariant { .. });
}
