//! The per-process linear context.
//!
//! Two maps keyed by placeholder: `liabs` holds at most one entry, the
//! channel this process provides; `assets` holds the channels it uses as a
//! client. Built fresh per check from the configuration and consumed by the
//! checking rules.

use std::collections::HashMap;
use weft_core::{Placeholder, PoolId, Result, TypeId, WeftError};
use weft_types::Configuration;

/// Where a placeholder lives in the linear context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The channel this process provides.
    Provider,
    /// A channel this process uses.
    Client,
}

/// Linear typing context for one term evaluation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    liabs: HashMap<Placeholder, TypeId>,
    assets: HashMap<Placeholder, TypeId>,
}

impl Context {
    /// Build the context for `acting_pool` from a loaded configuration.
    ///
    /// An endpoint whose providing pool is the acting pool is the liability;
    /// every other endpoint is an asset. More than one liability is a
    /// data-shape defect: a process provides exactly one channel.
    pub fn from_configuration(acting_pool: PoolId, config: &Configuration) -> Result<Self> {
        let mut ctx = Self::default();
        for endpoint in config.endpoints.values() {
            if endpoint.providing_pool == acting_pool {
                if !ctx.liabs.is_empty() {
                    return Err(WeftError::unexpected_variant(format!(
                        "process {} has more than one liability",
                        config.process
                    )));
                }
                ctx.liabs
                    .insert(endpoint.placeholder.clone(), endpoint.type_id);
            } else {
                ctx.assets
                    .insert(endpoint.placeholder.clone(), endpoint.type_id);
            }
        }
        Ok(ctx)
    }

    /// Role of `placeholder`, or a missing-in-context error.
    pub fn role(&self, placeholder: &Placeholder) -> Result<Role> {
        if self.liabs.contains_key(placeholder) {
            Ok(Role::Provider)
        } else if self.assets.contains_key(placeholder) {
            Ok(Role::Client)
        } else {
            Err(WeftError::missing_in_context(placeholder.clone()))
        }
    }

    /// Type of the liability at `placeholder`.
    pub fn liab(&self, placeholder: &Placeholder) -> Result<TypeId> {
        self.liabs
            .get(placeholder)
            .copied()
            .ok_or_else(|| WeftError::missing_in_context(placeholder.clone()))
    }

    /// Type of the asset at `placeholder`.
    pub fn asset(&self, placeholder: &Placeholder) -> Result<TypeId> {
        self.assets
            .get(placeholder)
            .copied()
            .ok_or_else(|| WeftError::missing_in_context(placeholder.clone()))
    }

    /// Consume the liability at `placeholder`.
    pub fn take_liab(&mut self, placeholder: &Placeholder) -> Result<TypeId> {
        self.liabs
            .remove(placeholder)
            .ok_or_else(|| WeftError::missing_in_context(placeholder.clone()))
    }

    /// Consume the asset at `placeholder`.
    pub fn take_asset(&mut self, placeholder: &Placeholder) -> Result<TypeId> {
        self.assets
            .remove(placeholder)
            .ok_or_else(|| WeftError::missing_in_context(placeholder.clone()))
    }

    /// Rebind the liability at `placeholder` to a new type.
    pub fn set_liab(&mut self, placeholder: &Placeholder, type_id: TypeId) {
        self.liabs.insert(placeholder.clone(), type_id);
    }

    /// Rebind an existing asset to a new type.
    pub fn set_asset(&mut self, placeholder: &Placeholder, type_id: TypeId) {
        self.assets.insert(placeholder.clone(), type_id);
    }

    /// Introduce a new asset at a placeholder not yet in scope.
    pub fn bind_fresh_asset(&mut self, placeholder: &Placeholder, type_id: TypeId) -> Result<()> {
        if self.liabs.contains_key(placeholder) || self.assets.contains_key(placeholder) {
            return Err(WeftError::type_mismatch(
                format!("rebound placeholder '{placeholder}'"),
                "fresh placeholder",
            ));
        }
        self.assets.insert(placeholder.clone(), type_id);
        Ok(())
    }

    /// Number of assets still in the context.
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Whether no assets remain.
    pub fn assets_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
