//! Unified error taxonomy for the weft runtime.
//!
//! Every failure a caller can observe is one of these variants. Checking and
//! missing-reference errors are detected before any mutation; a concurrency
//! conflict is detected at commit time and leaves no partial state;
//! `UnexpectedVariant` marks a checker/stepper disagreement and is a defect,
//! not a user-facing condition.

use crate::ids::{Label, Placeholder};
use crate::revision::Revision;
use serde::{Deserialize, Serialize};

/// Result alias used throughout the weft crates.
pub type Result<T> = std::result::Result<T, WeftError>;

/// Unified error type for all weft operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WeftError {
    /// A term referenced a placeholder that the process configuration does
    /// not bind.
    #[error("placeholder '{placeholder}' is not bound in the configuration")]
    MissingInConfiguration {
        /// The unbound placeholder.
        placeholder: Placeholder,
    },

    /// A term acted on a placeholder that is neither the liability nor an
    /// asset of the linear context.
    #[error("placeholder '{placeholder}' is not present in the linear context")]
    MissingInContext {
        /// The absent placeholder.
        placeholder: Placeholder,
    },

    /// A referenced type, signature, pool, or process could not be resolved.
    #[error("environment has no entry for '{id}'")]
    MissingInEnvironment {
        /// Rendered identifier of the missing entry.
        id: String,
    },

    /// Variant-level mismatch between an observed and an expected shape.
    #[error("type mismatch: got {got}, want {want}")]
    TypeMismatch {
        /// What was found.
        got: String,
        /// What the rules required.
        want: String,
    },

    /// A label was offered or selected outside the declared choice set.
    #[error("label mismatch: got '{got}', want one of {want:?}")]
    LabelMismatch {
        /// The declared label set.
        want: Vec<Label>,
        /// The offending label.
        got: Label,
    },

    /// Two collections that must correspond element-wise differ in size.
    #[error("want {want} items, got {got} items")]
    ArityMismatch {
        /// Expected cardinality.
        want: usize,
        /// Observed cardinality.
        got: usize,
    },

    /// Two channel ends that must share a polarity do not.
    #[error("polarity mismatch: got {got}, want {want}")]
    PolarityMismatch {
        /// Observed polarity.
        got: String,
        /// Required polarity.
        want: String,
    },

    /// An optimistic-concurrency check failed at commit time. The caller may
    /// retry with a freshly loaded configuration.
    #[error("concurrency conflict: stored revision is {stored}")]
    ConcurrencyConflict {
        /// The revision actually stored when the commit was attempted.
        stored: Revision,
    },

    /// Internal invariant violation. Unreachable if the type checker ran
    /// first; treated as a defect.
    #[error("unexpected variant: {detail}")]
    UnexpectedVariant {
        /// Description of the violated invariant.
        detail: String,
    },
}

impl WeftError {
    /// Placeholder missing from a process configuration.
    pub fn missing_in_configuration(placeholder: impl Into<Placeholder>) -> Self {
        Self::MissingInConfiguration {
            placeholder: placeholder.into(),
        }
    }

    /// Placeholder missing from the linear context.
    pub fn missing_in_context(placeholder: impl Into<Placeholder>) -> Self {
        Self::MissingInContext {
            placeholder: placeholder.into(),
        }
    }

    /// Unresolvable reference in the step environment.
    pub fn missing_in_environment(id: impl std::fmt::Display) -> Self {
        Self::MissingInEnvironment { id: id.to_string() }
    }

    /// Variant-level mismatch.
    pub fn type_mismatch(got: impl Into<String>, want: impl Into<String>) -> Self {
        Self::TypeMismatch {
            got: got.into(),
            want: want.into(),
        }
    }

    /// Label outside the declared choice set.
    pub fn label_mismatch(want: Vec<Label>, got: impl Into<Label>) -> Self {
        Self::LabelMismatch {
            want,
            got: got.into(),
        }
    }

    /// Cardinality mismatch.
    pub const fn arity_mismatch(want: usize, got: usize) -> Self {
        Self::ArityMismatch { want, got }
    }

    /// Polarity mismatch between channel ends.
    pub fn polarity_mismatch(got: impl Into<String>, want: impl Into<String>) -> Self {
        Self::PolarityMismatch {
            got: got.into(),
            want: want.into(),
        }
    }

    /// Optimistic-concurrency failure carrying the stored revision.
    pub const fn concurrency_conflict(stored: Revision) -> Self {
        Self::ConcurrencyConflict { stored }
    }

    /// Internal invariant violation.
    pub fn unexpected_variant(detail: impl Into<String>) -> Self {
        Self::UnexpectedVariant {
            detail: detail.into(),
        }
    }

    /// Whether retrying with a reloaded configuration could succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_mismatch_renders_cardinalities() {
        let err = WeftError::arity_mismatch(2, 1);
        assert_eq!(err.to_string(), "want 2 items, got 1 items");
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(WeftError::concurrency_conflict(Revision::new(5)).is_retryable());
        assert!(!WeftError::missing_in_context("x").is_retryable());
    }
}
