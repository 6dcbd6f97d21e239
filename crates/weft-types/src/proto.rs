//! Protocol type model.
//!
//! A protocol type is a linear-logic proposition describing the allowed
//! communication sequence on a channel. Author-facing *declared* types
//! ([`TypeSpec`]) are recursive trees without identities; the runtime works
//! on *identified* types: an arena of [`TypeNode`]s keyed by [`TypeId`], with
//! child references as ids. Conversion assigns a fresh id to every node (no
//! structural sharing) and is lossless in both directions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use weft_core::{Label, Result, TypeId, TypeName, WeftError};

/// Polarity of a protocol type: who drives the next communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Provider-driven: the provider sends (`Unit`, `Tensor`, `Plus`).
    Positive,
    /// Client-driven: the client sends (`Lolli`, `With`).
    Negative,
    /// Shift or external reference; neither side drives (`Named`, `Up`,
    /// `Down`).
    Neutral,
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

/// Declared (author-facing, unidentified) protocol type.
///
/// This is the wire shape used by the service `create` operation and by
/// read-only snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeSpec {
    /// The closed channel: the provider may only `close`.
    Unit,
    /// External reference to a separately declared type.
    Named {
        /// Referenced type name; never unfolded at this layer.
        name: TypeName,
    },
    /// Provider sends a channel of `value`, continues as `cont`.
    Tensor {
        /// Type of the sent channel.
        value: Box<TypeSpec>,
        /// Continuation type of the carrier.
        cont: Box<TypeSpec>,
    },
    /// Provider receives a channel of `value`, continues as `cont`.
    Lolli {
        /// Type of the received channel.
        value: Box<TypeSpec>,
        /// Continuation type of the carrier.
        cont: Box<TypeSpec>,
    },
    /// Internal choice: the provider selects one label.
    Plus {
        /// Labelled continuations.
        choices: IndexMap<Label, TypeSpec>,
    },
    /// External choice: the client selects one label.
    With {
        /// Labelled continuations.
        choices: IndexMap<Label, TypeSpec>,
    },
    /// Shift up into the synchronous layer.
    Up {
        /// Shifted type.
        inner: Box<TypeSpec>,
    },
    /// Shift down into the asynchronous layer.
    Down {
        /// Shifted type.
        inner: Box<TypeSpec>,
    },
}

/// One node of an identified protocol type. Children are arena ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeNode {
    /// See [`TypeSpec::Unit`].
    Unit,
    /// See [`TypeSpec::Named`].
    Named {
        /// Referenced type name.
        name: TypeName,
    },
    /// See [`TypeSpec::Tensor`].
    Tensor {
        /// Type of the sent channel.
        value: TypeId,
        /// Continuation type of the carrier.
        cont: TypeId,
    },
    /// See [`TypeSpec::Lolli`].
    Lolli {
        /// Type of the received channel.
        value: TypeId,
        /// Continuation type of the carrier.
        cont: TypeId,
    },
    /// See [`TypeSpec::Plus`].
    Plus {
        /// Labelled continuations.
        choices: IndexMap<Label, TypeId>,
    },
    /// See [`TypeSpec::With`].
    With {
        /// Labelled continuations.
        choices: IndexMap<Label, TypeId>,
    },
    /// See [`TypeSpec::Up`].
    Up {
        /// Shifted type.
        inner: TypeId,
    },
    /// See [`TypeSpec::Down`].
    Down {
        /// Shifted type.
        inner: TypeId,
    },
}

impl TypeNode {
    /// Polarity is a fixed function of the variant.
    pub const fn polarity(&self) -> Polarity {
        match self {
            Self::Unit | Self::Tensor { .. } | Self::Plus { .. } => Polarity::Positive,
            Self::Lolli { .. } | Self::With { .. } => Polarity::Negative,
            Self::Named { .. } | Self::Up { .. } | Self::Down { .. } => Polarity::Neutral,
        }
    }

    /// Variant tag, used in mismatch diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Named { .. } => "named",
            Self::Tensor { .. } => "tensor",
            Self::Lolli { .. } => "lolli",
            Self::Plus { .. } => "plus",
            Self::With { .. } => "with",
            Self::Up { .. } => "up",
            Self::Down { .. } => "down",
        }
    }

    /// Continuation of a choice type under `label`, if this is a choice type
    /// and the label is a member.
    pub fn next(&self, label: &Label) -> Option<TypeId> {
        match self {
            Self::Plus { choices } | Self::With { choices } => choices.get(label).copied(),
            _ => None,
        }
    }

    /// Child node ids, in declaration order.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            Self::Unit | Self::Named { .. } => Vec::new(),
            Self::Tensor { value, cont } | Self::Lolli { value, cont } => vec![*value, *cont],
            Self::Plus { choices } | Self::With { choices } => choices.values().copied().collect(),
            Self::Up { inner } | Self::Down { inner } => vec![*inner],
        }
    }
}

/// Resolution of type ids to nodes. Implemented by the arena and by the
/// per-step [`crate::Env`].
pub trait TypeStore {
    /// Look up a node by id.
    fn node(&self, id: TypeId) -> Option<&TypeNode>;

    /// Look up a node by id, failing with a typed error.
    fn resolve(&self, id: TypeId) -> Result<&TypeNode> {
        self.node(id)
            .ok_or_else(|| WeftError::missing_in_environment(id))
    }
}

/// Arena of identified protocol-type nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeArena {
    nodes: std::collections::HashMap<TypeId, TypeNode>,
}

impl TypeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a declared type into identified form, assigning a fresh id to
    /// every subterm, and return the root id.
    pub fn intern(&mut self, spec: &TypeSpec) -> TypeId {
        let node = match spec {
            TypeSpec::Unit => TypeNode::Unit,
            TypeSpec::Named { name } => TypeNode::Named { name: name.clone() },
            TypeSpec::Tensor { value, cont } => TypeNode::Tensor {
                value: self.intern(value),
                cont: self.intern(cont),
            },
            TypeSpec::Lolli { value, cont } => TypeNode::Lolli {
                value: self.intern(value),
                cont: self.intern(cont),
            },
            TypeSpec::Plus { choices } => TypeNode::Plus {
                choices: self.intern_choices(choices),
            },
            TypeSpec::With { choices } => TypeNode::With {
                choices: self.intern_choices(choices),
            },
            TypeSpec::Up { inner } => TypeNode::Up {
                inner: self.intern(inner),
            },
            TypeSpec::Down { inner } => TypeNode::Down {
                inner: self.intern(inner),
            },
        };
        self.insert(node)
    }

    fn intern_choices(&mut self, choices: &IndexMap<Label, TypeSpec>) -> IndexMap<Label, TypeId> {
        choices
            .iter()
            .map(|(label, spec)| (label.clone(), self.intern(spec)))
            .collect()
    }

    /// Insert a pre-built node under a fresh id.
    pub fn insert(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId::new();
        self.nodes.insert(id, node);
        id
    }

    /// Convert an identified type back to declared form, stripping ids.
    pub fn to_spec(&self, root: TypeId) -> Result<TypeSpec> {
        let node = self.resolve(root)?;
        Ok(match node {
            TypeNode::Unit => TypeSpec::Unit,
            TypeNode::Named { name } => TypeSpec::Named { name: name.clone() },
            TypeNode::Tensor { value, cont } => TypeSpec::Tensor {
                value: Box::new(self.to_spec(*value)?),
                cont: Box::new(self.to_spec(*cont)?),
            },
            TypeNode::Lolli { value, cont } => TypeSpec::Lolli {
                value: Box::new(self.to_spec(*value)?),
                cont: Box::new(self.to_spec(*cont)?),
            },
            TypeNode::Plus { choices } => TypeSpec::Plus {
                choices: self.choices_to_spec(choices)?,
            },
            TypeNode::With { choices } => TypeSpec::With {
                choices: self.choices_to_spec(choices)?,
            },
            TypeNode::Up { inner } => TypeSpec::Up {
                inner: Box::new(self.to_spec(*inner)?),
            },
            TypeNode::Down { inner } => TypeSpec::Down {
                inner: Box::new(self.to_spec(*inner)?),
            },
        })
    }

    fn choices_to_spec(
        &self,
        choices: &IndexMap<Label, TypeId>,
    ) -> Result<IndexMap<Label, TypeSpec>> {
        choices
            .iter()
            .map(|(label, id)| Ok((label.clone(), self.to_spec(*id)?)))
            .collect()
    }

    /// Ids of `root` and every node reachable from it.
    pub fn closure(&self, root: TypeId) -> Result<Vec<TypeId>> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if out.contains(&id) {
                continue;
            }
            let node = self.resolve(id)?;
            out.push(id);
            stack.extend(node.children());
        }
        Ok(out)
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TypeStore for TypeArena {
    fn node(&self, id: TypeId) -> Option<&TypeNode> {
        self.nodes.get(&id)
    }
}

/// Structural equality of two identified protocol types.
///
/// Variant tags must match exactly. `Tensor`/`Lolli` check value then
/// continuation and propagate the first failure. Choice types check label-set
/// cardinality before membership so that a size difference reports a precise
/// "want N items, got M items" error. `Named` matches on the referenced name
/// only; no unfolding happens at this layer.
pub fn check_equal<S: TypeStore + ?Sized>(types: &S, got: TypeId, want: TypeId) -> Result<()> {
    let got_node = types.resolve(got)?;
    let want_node = types.resolve(want)?;
    match (got_node, want_node) {
        (TypeNode::Unit, TypeNode::Unit) => Ok(()),
        (TypeNode::Named { name: got_name }, TypeNode::Named { name: want_name }) => {
            if got_name == want_name {
                Ok(())
            } else {
                Err(WeftError::type_mismatch(
                    got_name.as_str(),
                    want_name.as_str(),
                ))
            }
        }
        (
            TypeNode::Tensor {
                value: gv,
                cont: gc,
            },
            TypeNode::Tensor {
                value: wv,
                cont: wc,
            },
        )
        | (
            TypeNode::Lolli {
                value: gv,
                cont: gc,
            },
            TypeNode::Lolli {
                value: wv,
                cont: wc,
            },
        ) => {
            check_equal(types, *gv, *wv)?;
            check_equal(types, *gc, *wc)
        }
        (TypeNode::Plus { choices: gc }, TypeNode::Plus { choices: wc })
        | (TypeNode::With { choices: gc }, TypeNode::With { choices: wc }) => {
            check_equal_choices(types, gc, wc)
        }
        (TypeNode::Up { inner: gi }, TypeNode::Up { inner: wi })
        | (TypeNode::Down { inner: gi }, TypeNode::Down { inner: wi }) => {
            check_equal(types, *gi, *wi)
        }
        _ => Err(WeftError::type_mismatch(
            got_node.kind(),
            want_node.kind(),
        )),
    }
}

fn check_equal_choices<S: TypeStore + ?Sized>(
    types: &S,
    got: &IndexMap<Label, TypeId>,
    want: &IndexMap<Label, TypeId>,
) -> Result<()> {
    if got.len() != want.len() {
        return Err(WeftError::arity_mismatch(want.len(), got.len()));
    }
    for (label, want_id) in want {
        let got_id = got.get(label).ok_or_else(|| {
            WeftError::label_mismatch(want.keys().cloned().collect(), label.clone())
        })?;
        check_equal(types, *got_id, *want_id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> TypeSpec {
        TypeSpec::Unit
    }

    fn plus(labels: &[(&str, TypeSpec)]) -> TypeSpec {
        TypeSpec::Plus {
            choices: labels
                .iter()
                .map(|(l, s)| (Label::from(*l), s.clone()))
                .collect(),
        }
    }

    #[test]
    fn polarity_is_fixed_per_variant() {
        let mut arena = TypeArena::new();
        let u = arena.intern(&unit());
        assert_eq!(arena.resolve(u).unwrap().polarity(), Polarity::Positive);

        let lolli = arena.intern(&TypeSpec::Lolli {
            value: Box::new(unit()),
            cont: Box::new(unit()),
        });
        assert_eq!(
            arena.resolve(lolli).unwrap().polarity(),
            Polarity::Negative
        );

        let up = arena.intern(&TypeSpec::Up {
            inner: Box::new(unit()),
        });
        assert_eq!(arena.resolve(up).unwrap().polarity(), Polarity::Neutral);
    }

    #[test]
    fn intern_assigns_fresh_ids_per_node() {
        let mut arena = TypeArena::new();
        let spec = TypeSpec::Tensor {
            value: Box::new(unit()),
            cont: Box::new(unit()),
        };
        let root = arena.intern(&spec);
        // Root plus two structurally identical but separately identified
        // children.
        assert_eq!(arena.closure(root).unwrap().len(), 3);
    }

    #[test]
    fn round_trip_preserves_declared_shape() {
        let mut arena = TypeArena::new();
        let spec = plus(&[
            ("ok", unit()),
            (
                "more",
                TypeSpec::Lolli {
                    value: Box::new(unit()),
                    cont: Box::new(TypeSpec::Named {
                        name: TypeName::from("counter"),
                    }),
                },
            ),
        ]);
        let root = arena.intern(&spec);
        assert_eq!(arena.to_spec(root).unwrap(), spec);
    }

    #[test]
    fn equal_types_check_equal() {
        let mut arena = TypeArena::new();
        let spec = TypeSpec::With {
            choices: [
                (Label::from("inc"), unit()),
                (Label::from("dec"), unit()),
            ]
            .into_iter()
            .collect(),
        };
        let a = arena.intern(&spec);
        let b = arena.intern(&spec);
        check_equal(&arena, a, b).unwrap();
    }

    #[test]
    fn tag_mismatch_reports_both_kinds() {
        let mut arena = TypeArena::new();
        let tensor = arena.intern(&TypeSpec::Tensor {
            value: Box::new(unit()),
            cont: Box::new(unit()),
        });
        let lolli = arena.intern(&TypeSpec::Lolli {
            value: Box::new(unit()),
            cont: Box::new(unit()),
        });
        let err = check_equal(&arena, tensor, lolli).unwrap_err();
        assert_eq!(
            err,
            WeftError::type_mismatch("tensor", "lolli")
        );
    }

    #[test]
    fn choice_cardinality_is_checked_before_membership() {
        let mut arena = TypeArena::new();
        let small = arena.intern(&plus(&[("ok", unit())]));
        let big = arena.intern(&plus(&[("ok", unit()), ("err", unit())]));
        let err = check_equal(&arena, small, big).unwrap_err();
        assert_eq!(err, WeftError::arity_mismatch(2, 1));
    }

    #[test]
    fn choice_membership_failure_names_the_label() {
        let mut arena = TypeArena::new();
        let got = arena.intern(&plus(&[("yes", unit()), ("no", unit())]));
        let want = arena.intern(&plus(&[("ok", unit()), ("no", unit())]));
        let err = check_equal(&arena, got, want).unwrap_err();
        match err {
            WeftError::LabelMismatch { got, .. } => assert_eq!(got, Label::from("ok")),
            other => panic!("expected label mismatch, got {other:?}"),
        }
    }

    #[test]
    fn named_matches_on_name_only() {
        let mut arena = TypeArena::new();
        let a = arena.intern(&TypeSpec::Named {
            name: TypeName::from("queue"),
        });
        let b = arena.intern(&TypeSpec::Named {
            name: TypeName::from("queue"),
        });
        let c = arena.intern(&TypeSpec::Named {
            name: TypeName::from("stack"),
        });
        check_equal(&arena, a, b).unwrap();
        assert!(check_equal(&arena, a, c).is_err());
    }

    #[test]
    fn first_failure_propagates_from_nested_components() {
        let mut arena = TypeArena::new();
        let got = arena.intern(&TypeSpec::Tensor {
            value: Box::new(unit()),
            cont: Box::new(plus(&[("ok", unit())])),
        });
        let want = arena.intern(&TypeSpec::Tensor {
            value: Box::new(unit()),
            cont: Box::new(plus(&[("ok", unit()), ("err", unit())])),
        });
        let err = check_equal(&arena, got, want).unwrap_err();
        assert_eq!(err, WeftError::arity_mismatch(2, 1));
    }
}
