//! Identifiers
//!
//! Opaque, stable identities for participants, sessions, arenas and instances.
//! Byte identifiers implement `Ord` so they key `BTreeMap`s with a stable
//! iteration order.

use std::fmt;
use serde::{Serialize, Deserialize};

macro_rules! byte_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Create from raw bytes.
            pub const fn new(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Generate a fresh random identifier.
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().into_bytes())
            }

            /// Create from UUID string.
            pub fn from_uuid_str(s: &str) -> Option<Self> {
                uuid::Uuid::parse_str(s)
                    .ok()
                    .map(|u| Self(*u.as_bytes()))
            }

            /// Convert to UUID string.
            pub fn to_uuid_string(&self) -> String {
                uuid::Uuid::from_bytes(self.0).to_string()
            }

            /// Get raw bytes.
            pub fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            /// Short form (first UUID group) for log lines.
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let full = self.to_uuid_string();
                f.write_str(&full[..8])
            }
        }
    };
}

byte_id! {
    /// Unique participant identifier.
    ///
    /// Identity only: whether the participant can currently be reached is a
    /// separate question answered by the messaging collaborator.
    ParticipantId
}

byte_id! {
    /// Unique session (match) identifier.
    SessionId
}

macro_rules! name_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from any string-like value.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the underlying name.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

name_id! {
    /// Arena definition identifier.
    ArenaId
}

name_id! {
    /// Arena template identifier.
    TemplateId
}

name_id! {
    /// Opaque handle to a structure snapshot understood by the world.
    StructureRef
}

impl From<&ArenaId> for TemplateId {
    /// Arenas are backed by the template of the same name.
    fn from(arena: &ArenaId) -> Self {
        Self(arena.0.clone())
    }
}

/// Arena instance identifier: owning template plus a 1-based ordinal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId {
    /// Template this instance was created from.
    pub template: TemplateId,
    /// Creation ordinal within the template (1-based).
    pub ordinal: u32,
}

impl InstanceId {
    /// Create an instance id.
    pub fn new(template: TemplateId, ordinal: u32) -> Self {
        Self { template, ordinal }
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_instance_{}", self.template, self.ordinal)
    }
}
