//! Strongly-typed identifiers.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier threaded through every unit of one dispatched chain.
///
/// Random 128-bit (UUIDv4). Collisions are treated as negligible.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

/// Identifier assigned to a single enqueued unit of work.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal, $ctor:expr) => {
        impl $t {
            /// Create a new identifier.
            pub fn new() -> Self {
                Self($ctor)
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| CoreError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(CorrelationId, "CorrelationId", Uuid::new_v4());
impl_uuid_newtype!(TaskId, "TaskId", Uuid::now_v7());

impl CorrelationId {
    /// First 8 hex characters, handy for human-facing references.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

/// Identifier of a user in the demo user directory.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn correlation_ids_are_random_v4() {
        let id = CorrelationId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn short_form_is_eight_hex_chars() {
        let id = CorrelationId::new();
        let short = id.short();
        assert_eq!(short.len(), 8);
        assert!(short.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.to_string().replace('-', "").starts_with(&short));
    }

    #[test]
    fn malformed_ids_are_rejected() {
        let err = "not-a-uuid".parse::<CorrelationId>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(msg) if msg.starts_with("CorrelationId")));
    }

    proptest! {
        #[test]
        fn generated_batches_never_repeat(n in 1usize..200) {
            let ids: HashSet<_> = (0..n).map(|_| CorrelationId::new()).collect();
            prop_assert_eq!(ids.len(), n);
        }
    }
}
