//! Identifier newtypes.
//!
//! Each identifier wraps a `u64` so that storage ids, sequence ids and
//! catalog definition ids cannot be mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Invalid id, used as a sentinel value.
            pub const INVALID: Self = Self(u64::MAX);

            /// Creates a new id from a raw value.
            #[inline]
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the raw value.
            #[inline]
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// Returns the next id.
            #[inline]
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }

            /// Checks if this is a valid id.
            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != u64::MAX
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if *self == Self::INVALID {
                    write!(f, concat!(stringify!($name), "(INVALID)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(id: u64) -> Self {
                Self::new(id)
            }
        }

        impl From<$name> for u64 {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Transaction identifier assigned by the storage engine at begin.
    TxnId
);

define_id!(
    /// Identifier of an opened KV storage (one per index plus system storages).
    StorageId
);

define_id!(
    /// Identifier of a sequence registered with the storage engine.
    ///
    /// ```rust
    /// use jogasaki_common::types::SequenceId;
    ///
    /// let id = SequenceId::new(7);
    /// assert_eq!(id.next().as_u64(), 8);
    /// ```
    SequenceId
);

define_id!(
    /// Identifier of a BLOB/CLOB object held by a blob pool.
    BlobId
);

define_id!(
    /// Catalog definition id of a table, index or sequence.
    DefinitionId
);
