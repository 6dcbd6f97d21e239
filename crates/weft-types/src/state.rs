//! Persisted state shapes.
//!
//! A process [`Configuration`] is loaded fresh per step; [`BindingEvent`]s
//! form the append-only ledger the configuration's endpoints are projected
//! from; [`PendingStep`] records hold the half-done side of a rendezvous
//! until its partner arrives.

use crate::term::Term;
use crate::proto::TypeSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use weft_core::{
    ChannelId, Placeholder, PoolId, ProcessId, Result, Revision, SignatureName, TypeId, WeftError,
};

/// A channel endpoint bound into a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Placeholder the process knows the channel by.
    pub placeholder: Placeholder,
    /// The channel itself.
    pub channel: ChannelId,
    /// Identified protocol type the channel currently holds.
    pub type_id: TypeId,
    /// Pool providing the channel; role dispatch compares this against the
    /// acting pool.
    pub providing_pool: PoolId,
    /// Ledger revision that established this binding. Revocation stores its
    /// negation.
    pub granted_at: Revision,
}

/// Everything the stepper needs to know about one process, loaded fresh per
/// step call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    /// The process this configuration describes.
    pub process: ProcessId,
    /// The pool owning the process.
    pub pool: PoolId,
    /// Current channel bindings, keyed by placeholder.
    pub endpoints: HashMap<Placeholder, Endpoint>,
    /// Pending step records for every channel the process is bound to.
    pub pending: HashMap<ChannelId, PendingStep>,
    /// Owning pool's revision at load time.
    pub pool_revision: Revision,
    /// Process revision at load time.
    pub process_revision: Revision,
}

impl Configuration {
    /// Endpoint bound at `placeholder`, or a typed missing-in-configuration
    /// error.
    pub fn endpoint(&self, placeholder: &Placeholder) -> Result<&Endpoint> {
        self.endpoints
            .get(placeholder)
            .ok_or_else(|| WeftError::missing_in_configuration(placeholder.clone()))
    }

    /// Endpoint bound to `channel`, if any.
    pub fn endpoint_for_channel(&self, channel: ChannelId) -> Option<&Endpoint> {
        self.endpoints.values().find(|e| e.channel == channel)
    }

    /// Type ids of every endpoint, the roots for bulk environment loading.
    pub fn type_roots(&self) -> Vec<TypeId> {
        self.endpoints.values().map(|e| e.type_id).collect()
    }
}

/// Channels an offering side already advanced onto when it went half-done.
///
/// A send or label rebinds its own via onto a fresh continuation channel in
/// the same commit that writes the record. The offerer may keep stepping and
/// rebind its via again before the partner arrives, so the rendezvous must
/// resolve against the channels captured here, never against the offerer's
/// later bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    /// Fresh channel carrying the offer's continuation.
    pub cont_channel: ChannelId,
    /// Protocol type of the continuation channel.
    pub cont_type: TypeId,
    /// The sent channel and its type; present for send records only.
    pub value: Option<(ChannelId, TypeId)>,
}

/// The half-done side of a rendezvous, keyed by channel id. At most one
/// record may exist per channel at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PendingStep {
    /// A value is offered and awaits a receiver.
    Message {
        /// Pool of the offering process.
        pool: PoolId,
        /// The offering process.
        process: ProcessId,
        /// The blocked value-term.
        term: Term,
        /// Channels the offerer advanced onto; absent for close and forward
        /// records, which advance nothing.
        offer: Option<Offer>,
    },
    /// A receiver is waiting and awaits a value.
    Service {
        /// Pool of the waiting process.
        pool: PoolId,
        /// The waiting process.
        process: ProcessId,
        /// The blocked continuation-carrying term.
        term: Term,
    },
}

impl PendingStep {
    /// Pool of the blocked process.
    pub const fn pool(&self) -> PoolId {
        match self {
            Self::Message { pool, .. } | Self::Service { pool, .. } => *pool,
        }
    }

    /// The blocked process.
    pub const fn process(&self) -> ProcessId {
        match self {
            Self::Message { process, .. } | Self::Service { process, .. } => *process,
        }
    }

    /// The blocked term.
    pub const fn term(&self) -> &Term {
        match self {
            Self::Message { term, .. } | Self::Service { term, .. } => term,
        }
    }

    /// Wire tag of this record.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Service { .. } => "service",
        }
    }

    /// Advanced channels of an offering record, if any were captured.
    pub const fn offer(&self) -> Option<Offer> {
        match self {
            Self::Message { offer, .. } => *offer,
            Self::Service { .. } => None,
        }
    }
}

/// One entry of the append-only binding ledger.
///
/// A positive revision establishes a binding; a negative revision, stored as
/// the negation of the granting revision, revokes it. Entries are never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEvent {
    /// Process the binding belongs to.
    pub process: ProcessId,
    /// Placeholder being bound or revoked.
    pub placeholder: Placeholder,
    /// Channel being bound; absent on revocations.
    pub channel: Option<ChannelId>,
    /// Protocol type of the binding; absent on revocations.
    pub type_id: Option<TypeId>,
    /// Signed ledger revision.
    pub revision: Revision,
}

impl BindingEvent {
    /// Establish a binding at `revision`.
    pub fn grant(
        process: ProcessId,
        placeholder: Placeholder,
        channel: ChannelId,
        type_id: TypeId,
        revision: Revision,
    ) -> Self {
        Self {
            process,
            placeholder,
            channel: Some(channel),
            type_id: Some(type_id),
            revision,
        }
    }

    /// Revoke the binding that was granted at `granted_at`.
    pub fn revoke(process: ProcessId, placeholder: Placeholder, granted_at: Revision) -> Self {
        Self {
            process,
            placeholder,
            channel: None,
            type_id: None,
            revision: granted_at.negated(),
        }
    }

    /// Whether this entry grants (rather than revokes) a binding.
    pub const fn is_grant(&self) -> bool {
        self.revision.is_grant()
    }
}

/// Current revision of a pool, the optimistic-concurrency lock target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    /// The pool.
    pub pool: PoolId,
    /// Its current revision.
    pub revision: Revision,
}

/// One parameter of a declared process signature, in identified form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParam {
    /// Placeholder the callee binds the argument at.
    pub placeholder: Placeholder,
    /// Required protocol type of the argument.
    pub type_id: TypeId,
}

/// A declared process signature in identified form, resolved through the
/// step environment by `spawn`/`call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature name.
    pub name: SignatureName,
    /// Placeholder of the callee's providing channel.
    pub provides: Placeholder,
    /// Protocol type the callee provides.
    pub provides_type: TypeId,
    /// Parameters, matched element-wise against `spawn`/`call` arguments.
    pub params: Vec<SignatureParam>,
}

/// Author-facing declaration of a process signature; the `create` wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDecl {
    /// Signature name.
    pub name: SignatureName,
    /// Placeholder of the providing channel.
    pub provides: Placeholder,
    /// Declared type of the providing channel.
    pub provides_type: TypeSpec,
    /// Declared parameters.
    pub params: Vec<(Placeholder, TypeSpec)>,
}
