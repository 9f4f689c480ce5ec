//! Type-safe identifier wrappers.
//!
//! Agents are identified by a time-ordered UUID generated locally. Platform
//! entities (accounts, posts) are identified by whatever opaque string the
//! platform hands back, wrapped in a newtype so a post ID can never be passed
//! where an account name is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

/// Generates a newtype wrapper around a platform-assigned string handle.
macro_rules! define_handle {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap a platform handle.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the handle as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id! {
    /// Unique identifier for an agent in the fleet.
    AgentId
}

define_handle! {
    /// Platform account handle (username) that an agent can engage or follow.
    TargetId
}

define_handle! {
    /// Platform-assigned identifier of a post.
    PostId
}

impl TargetId {
    /// Whether this handle looks like a platform NPC account.
    ///
    /// Team and external accounts on the platform carry an `@` in their
    /// handle; simulated residents never do.
    pub fn is_npc(&self) -> bool {
        !self.0.is_empty() && !self.0.contains('@')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_ids_are_unique() {
        let a = AgentId::new();
        let b = AgentId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn handles_serialize_transparently() {
        let target = TargetId::from("kingston_kate");
        let json = serde_json::to_string(&target).unwrap_or_default();
        assert_eq!(json, "\"kingston_kate\"");
    }

    #[test]
    fn npc_detection() {
        assert!(TargetId::from("kingston_kate").is_npc());
        assert!(!TargetId::from("team@bot").is_npc());
        assert!(!TargetId::from("").is_npc());
    }
}
