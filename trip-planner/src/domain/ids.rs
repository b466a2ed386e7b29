//! Opaque identifier types for trips, stops and users.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when constructing an identifier from an invalid string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {reason}")]
pub struct InvalidId {
    kind: &'static str,
    reason: &'static str,
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string.
            ///
            /// Surrounding whitespace is trimmed; empty strings are rejected.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidId> {
                let s = s.into();
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(InvalidId {
                        kind: $kind,
                        reason: "cannot be empty",
                    });
                }
                if trimmed.len() == s.len() {
                    Ok(Self(s))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a trip.
    ///
    /// Trip ids may be generated on the client before creation; the Trip API
    /// record is authoritative and its id replaces the staged one.
    TripId,
    "trip id"
);

opaque_id!(
    /// Identifier of a stop within a trip.
    StopId,
    "stop id"
);

opaque_id!(
    /// Identifier of the user owning trips.
    UserId,
    "user id"
);

impl TripId {
    /// Generate a fresh client-side trip id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl StopId {
    /// Generate a fresh client-side stop id.
    ///
    /// The Trip API requires the caller to supply stop ids on creation.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
