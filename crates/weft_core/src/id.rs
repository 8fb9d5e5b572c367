//! Typed identifiers for store records
//!
//! Ids travel through archives as plain strings, so every id type is a
//! string newtype: whatever an archive carries round-trips verbatim, while
//! `generate()` mints fresh `prefix_uuid` ids for append-mode remapping.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use uuid::Uuid;

/// Macro to define string-backed ID newtypes with minimal boilerplate
macro_rules! define_string_id {
    ($type_name:ident, $prefix:expr) => {
        #[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $type_name(pub String);

        impl $type_name {
            /// The prefix used by freshly generated ids of this type
            pub const PREFIX: &'static str = $prefix;

            /// Mint a new id with this type's prefix and a v4 UUID
            pub fn generate() -> Self {
                let mut buf = Uuid::encode_buffer();
                let uuid = Uuid::new_v4().simple().encode_lower(&mut buf);
                Self(format!("{}_{}", Self::PREFIX, uuid))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $type_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $type_name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $type_name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<$type_name> for String {
            fn from(id: $type_name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $type_name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(ChatId, "chat");
define_string_id!(GroupId, "group");
define_string_id!(BinaryObjectId, "bin");
define_string_id!(AttachmentId, "att");
define_string_id!(ProfileId, "prof");
