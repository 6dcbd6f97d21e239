//! Service facade over the runtime.
//!
//! Three operations: `create` registers protocol types and process
//! signatures, `take` advances a process by one externally supplied term,
//! and `retrieve` projects a registered declaration back into its declared
//! wire shape.

use crate::stepper::Stepper;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use weft_core::{PoolId, ProcessId, Result, SignatureName, TypeId};
use weft_store::PersistencePort;
use weft_types::{SignatureDecl, Term, TypeSpec};

/// A declaration submitted through `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Declaration {
    /// A protocol type.
    Type {
        /// The declared type.
        spec: TypeSpec,
    },
    /// A process signature.
    Signature {
        /// The declared signature.
        decl: SignatureDecl,
    },
}

/// Handle returned by `create` and accepted by `retrieve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeclarationRef {
    /// Root id of a registered protocol type.
    Type(TypeId),
    /// Name of a registered signature.
    Signature(SignatureName),
}

/// Read-only projection of a registered declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Snapshot {
    /// The declared form of a registered type.
    Type(TypeSpec),
    /// The declared form of a registered signature.
    Signature(SignatureDecl),
}

/// The outward-facing runtime surface.
pub struct ProcessService {
    port: Arc<dyn PersistencePort>,
    stepper: Stepper,
}

impl ProcessService {
    /// Build the service over a persistence port.
    pub fn new(port: Arc<dyn PersistencePort>) -> Self {
        let stepper = Stepper::new(Arc::clone(&port));
        Self { port, stepper }
    }

    /// Register a declaration and return its handle.
    pub async fn create(&self, declaration: Declaration) -> Result<DeclarationRef> {
        match declaration {
            Declaration::Type { spec } => {
                let id = self.port.register_type(&spec).await?;
                info!(%id, "registered protocol type");
                Ok(DeclarationRef::Type(id))
            }
            Declaration::Signature { decl } => {
                let name = self.port.register_signature(&decl).await?;
                info!(%name, "registered signature");
                Ok(DeclarationRef::Signature(name))
            }
        }
    }

    /// Create an empty pool.
    pub async fn create_pool(&self) -> Result<PoolId> {
        self.port.register_pool().await
    }

    /// Create a process owned by `pool`.
    pub async fn create_process(&self, pool: PoolId) -> Result<ProcessId> {
        self.port.register_process(pool).await
    }

    /// Advance `process` by `term`, running rendezvous to quiescence.
    pub async fn take(&self, pool: PoolId, process: ProcessId, term: Term) -> Result<()> {
        self.stepper.take(pool, process, term).await
    }

    /// Project a registered declaration back into declared form.
    pub async fn retrieve(&self, reference: &DeclarationRef) -> Result<Snapshot> {
        match reference {
            DeclarationRef::Type(id) => {
                let spec = self.port.select_type(*id).await?;
                Ok(Snapshot::Type(spec))
            }
            DeclarationRef::Signature(name) => {
                let signature = self.port.select_signature(name).await?;
                let provides_type = self.port.select_type(signature.provides_type).await?;
                let mut params = Vec::with_capacity(signature.params.len());
                for param in &signature.params {
                    let spec = self.port.select_type(param.type_id).await?;
                    params.push((param.placeholder.clone(), spec));
                }
                Ok(Snapshot::Signature(SignatureDecl {
                    name: signature.name,
                    provides: signature.provides,
                    provides_type,
                    params,
                }))
            }
        }
    }
}
