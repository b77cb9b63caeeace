use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident, $mint:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh id from this id kind's own generation source.
            pub fn new() -> Self {
                Self($mint())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

// `logical_id` is minted from a time-ordered UUIDv7 source and `live_id` from
// an independent random-UUIDv4 source, so the two id spaces can never
// collide even if minted in the same instant (spec: "minted from independent
// sources so they never collide").
uuid_newtype!(
    LogicalId,
    Uuid::now_v7,
    "Persistent identity of one particular entity snapshot."
);
uuid_newtype!(
    LiveId,
    Uuid::new_v4,
    "Process-local identity of one in-memory entity instance."
);
uuid_newtype!(
    LineageId,
    Uuid::now_v7,
    "Stable identity shared by every version of one logical entity."
);
uuid_newtype!(
    ExecutionId,
    Uuid::now_v7,
    "Identity of a single callable invocation, for provenance linking."
);
