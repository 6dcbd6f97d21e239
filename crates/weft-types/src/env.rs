//! Per-step resolution environment.
//!
//! The stepper scans the submitted term and the loaded configuration for
//! external references and bulk-loads everything they name into an [`Env`]
//! before checking begins, so checking and transitions never touch storage.

use crate::proto::{TypeNode, TypeStore};
use crate::state::Signature;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use weft_core::{Result, SignatureName, TypeId, WeftError};

/// Bulk-resolved types and signatures for one step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Env {
    /// Identified type nodes, closed under child references.
    pub types: HashMap<TypeId, TypeNode>,
    /// Referenced process signatures, by name.
    pub signatures: HashMap<SignatureName, Signature>,
}

impl Env {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a signature by name.
    pub fn signature(&self, name: &SignatureName) -> Result<&Signature> {
        self.signatures
            .get(name)
            .ok_or_else(|| WeftError::missing_in_environment(name))
    }
}

impl TypeStore for Env {
    fn node(&self, id: TypeId) -> Option<&TypeNode> {
        self.types.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::TypeArena;
    use crate::proto::TypeSpec;

    #[test]
    fn env_resolves_like_the_arena_it_was_loaded_from() {
        let mut arena = TypeArena::new();
        let root = arena.intern(&TypeSpec::Tensor {
            value: Box::new(TypeSpec::Unit),
            cont: Box::new(TypeSpec::Unit),
        });

        let mut env = Env::new();
        for id in arena.closure(root).unwrap() {
            env.types
                .insert(id, arena.resolve(id).unwrap().clone());
        }

        assert!(env.resolve(root).is_ok());
        assert!(env.signature(&SignatureName::from("missing")).is_err());
    }
}
