//! Strongly typed identifiers for pools, processes, channels, and types.
//!
//! Uuid-backed ids are generated fresh by the runtime (every protocol-type
//! node and every channel gets its own identity; there is no structural
//! sharing). Placeholders and labels are author-facing atoms carried on the
//! wire as plain strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh identifier.
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing uuid.
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Borrow the underlying uuid.
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id! {
    /// Identifier for a pool, the owning scope for processes and their
    /// liabilities.
    PoolId
}

uuid_id! {
    /// Identifier for a process within a pool.
    ProcessId
}

uuid_id! {
    /// Identifier for a channel. A channel is a linear resource; each
    /// communication continuation is carried by a freshly allocated channel.
    ChannelId
}

uuid_id! {
    /// Identifier for one node of an identified protocol type.
    TypeId
}

macro_rules! string_atom {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new atom.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_atom! {
    /// Author-facing name a term uses to refer to one of its channels.
    Placeholder
}

string_atom! {
    /// Branch label of an internal (`Plus`) or external (`With`) choice.
    Label
}

string_atom! {
    /// Name of an externally declared protocol type (`Named` reference).
    TypeName
}

string_atom! {
    /// Name of a declared process signature, referenced by `Spawn`/`Call`.
    SignatureName
}
