//! Process-action terms.
//!
//! A term names the channel it acts on (its "via") and describes exactly one
//! communication action plus, where the calculus allows it, a continuation.
//! The serde shape doubles as the wire/storage form: a tagged union keyed by
//! `kind` with lowercase tags (`close`, `wait`, `send`, `receive`, `label`,
//! `case`, `forward`, `spawn`, `call`).

use serde::{Deserialize, Serialize};
use weft_core::{Label, Placeholder, PoolId, Result, SignatureName, WeftError};

/// Upper bound on the number of branches a `case` payload may carry.
pub const MAX_CASE_BRANCHES: usize = 10;

/// One branch of a `case` term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch label.
    pub label: Label,
    /// Continuation taken when the partner offers this label.
    pub continuation: Term,
}

/// A process-action term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Term {
    /// Close the provided channel (type `Unit`).
    Close {
        /// Acting channel.
        via: Placeholder,
    },
    /// Wait for a used channel to close, then continue.
    Wait {
        /// Acting channel.
        via: Placeholder,
        /// Continuation after the close arrives.
        continuation: Box<Term>,
    },
    /// Send the channel bound at `value` over `via`.
    Send {
        /// Acting channel.
        via: Placeholder,
        /// Placeholder of the channel being sent.
        value: Placeholder,
    },
    /// Receive a channel over `via`, binding it at `bind`.
    Receive {
        /// Acting channel.
        via: Placeholder,
        /// Placeholder the received channel is bound to.
        bind: Placeholder,
        /// Continuation with the new binding in scope.
        continuation: Box<Term>,
    },
    /// Offer a label on `via` (internal choice from the offering side).
    Label {
        /// Acting channel.
        via: Placeholder,
        /// Offered label.
        label: Label,
    },
    /// Accept whichever label the partner offers on `via`.
    Case {
        /// Acting channel.
        via: Placeholder,
        /// One branch per label of the choice type.
        branches: Vec<Branch>,
    },
    /// Identify the provided channel `via` with the used channel `target`.
    Forward {
        /// Acting (provided) channel.
        via: Placeholder,
        /// The asset the provision is forwarded to.
        target: Placeholder,
    },
    /// Spawn a new process from a declared signature, then continue.
    Spawn {
        /// Placeholder the new providing channel is bound to.
        via: Placeholder,
        /// Pool the new process is created in.
        pool: PoolId,
        /// Declared signature of the callee.
        callee: SignatureName,
        /// Argument channels, consumed element-wise against the signature.
        args: Vec<Placeholder>,
        /// Continuation of the spawning process.
        continuation: Box<Term>,
    },
    /// Bulk variant of spawn used across process boundaries; no local
    /// continuation (a tail call).
    Call {
        /// Placeholder the new providing channel is bound to.
        via: Placeholder,
        /// Pool the new process is created in.
        pool: PoolId,
        /// Declared signature of the callee.
        callee: SignatureName,
        /// Argument channels, consumed element-wise against the signature.
        args: Vec<Placeholder>,
    },
}

impl Term {
    /// The channel this term acts on.
    pub fn via(&self) -> &Placeholder {
        match self {
            Self::Close { via }
            | Self::Wait { via, .. }
            | Self::Send { via, .. }
            | Self::Receive { via, .. }
            | Self::Label { via, .. }
            | Self::Case { via, .. }
            | Self::Forward { via, .. }
            | Self::Spawn { via, .. }
            | Self::Call { via, .. } => via,
        }
    }

    /// Wire tag of this term, used in mismatch diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Close { .. } => "close",
            Self::Wait { .. } => "wait",
            Self::Send { .. } => "send",
            Self::Receive { .. } => "receive",
            Self::Label { .. } => "label",
            Self::Case { .. } => "case",
            Self::Forward { .. } => "forward",
            Self::Spawn { .. } => "spawn",
            Self::Call { .. } => "call",
        }
    }

    /// Validate the wire-level constraints of this term and every subterm:
    /// `case` payloads carry 1 to [`MAX_CASE_BRANCHES`] branches with no
    /// duplicate labels.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Close { .. } | Self::Send { .. } | Self::Label { .. } | Self::Forward { .. } => {
                Ok(())
            }
            Self::Wait { continuation, .. } | Self::Receive { continuation, .. } => {
                continuation.validate()
            }
            Self::Case { branches, .. } => {
                if branches.is_empty() || branches.len() > MAX_CASE_BRANCHES {
                    return Err(WeftError::arity_mismatch(MAX_CASE_BRANCHES, branches.len()));
                }
                let mut seen = std::collections::HashSet::new();
                for branch in branches {
                    if !seen.insert(&branch.label) {
                        return Err(WeftError::label_mismatch(
                            seen.iter().map(|l| (*l).clone()).collect(),
                            branch.label.clone(),
                        ));
                    }
                    branch.continuation.validate()?;
                }
                Ok(())
            }
            Self::Spawn { continuation, .. } => continuation.validate(),
            Self::Call { .. } => Ok(()),
        }
    }

    /// Signature names referenced anywhere in this term, for bulk environment
    /// loading.
    pub fn signature_names(&self) -> Vec<SignatureName> {
        let mut out = Vec::new();
        self.collect_signature_names(&mut out);
        out
    }

    fn collect_signature_names(&self, out: &mut Vec<SignatureName>) {
        match self {
            Self::Close { .. } | Self::Send { .. } | Self::Label { .. } | Self::Forward { .. } => {}
            Self::Wait { continuation, .. } | Self::Receive { continuation, .. } => {
                continuation.collect_signature_names(out);
            }
            Self::Case { branches, .. } => {
                for branch in branches {
                    branch.continuation.collect_signature_names(out);
                }
            }
            Self::Spawn {
                callee,
                continuation,
                ..
            } => {
                if !out.contains(callee) {
                    out.push(callee.clone());
                }
                continuation.collect_signature_names(out);
            }
            Self::Call { callee, .. } => {
                if !out.contains(callee) {
                    out.push(callee.clone());
                }
            }
        }
    }

    /// Find the branch for `label` in a `case` term.
    pub fn branch(branches: &[Branch], label: &Label) -> Option<Term> {
        branches
            .iter()
            .find(|b| &b.label == label)
            .map(|b| b.continuation.clone())
    }
}
