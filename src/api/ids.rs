//! Newtype IDs for the server-side resources.
//!
//! The server hands out plain integers for every resource kind; wrapping them
//! keeps a label id from being passed where an attribute spec id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Creates a new id.
            #[inline]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value.
            #[inline]
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

resource_id!(
    /// Identifier of a project.
    ProjectId
);
resource_id!(
    /// Identifier of a task.
    TaskId
);
resource_id!(
    /// Identifier of a job within a task.
    JobId
);
resource_id!(
    /// Identifier of a label definition.
    LabelId
);
resource_id!(
    /// Identifier of an attribute specification (`spec_id` in annotation payloads).
    AttributeId
);
