//! BLOB and CLOB references.
//!
//! A LOB column holds only a reference. A reference produced by a client
//! names its content directly (`Provided`); once the write path registers
//! the content with the transaction's blob pool it becomes `Resolved`.
//! References read back from storage are `Fetched`.
//!
//! ```text
//!   Provided(locator) --register--> Resolved(id) --encode--> bytes
//!                                                             |
//!   Fetched(id) <-------------------decode--------------------+
//! ```

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use jogasaki_common::BlobId;

/// Where the content of a provided LOB lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LobLocator {
    /// A file on the local filesystem.
    File {
        /// Path to the file.
        path: PathBuf,
        /// Remove the file once it is no longer referenced.
        temporary: bool,
    },
    /// Inline content.
    Data(Bytes),
}

/// Provenance of a LOB reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LobProvenance {
    /// Supplied by the client, not yet registered.
    Provided(LobLocator),
    /// Read from storage.
    Fetched,
    /// Registered in the transaction's blob pool.
    Resolved,
}

impl LobProvenance {
    /// Tag persisted in the value stream.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            LobProvenance::Provided(_) => 0,
            LobProvenance::Fetched => 1,
            LobProvenance::Resolved => 2,
        }
    }
}

macro_rules! define_lob_reference {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            id: BlobId,
            provenance: LobProvenance,
        }

        impl $name {
            /// A reference to client-supplied content.
            #[must_use]
            pub fn provided(locator: LobLocator) -> Self {
                Self {
                    id: BlobId::INVALID,
                    provenance: LobProvenance::Provided(locator),
                }
            }

            /// A reference to a registered object.
            #[must_use]
            pub const fn resolved(id: BlobId) -> Self {
                Self {
                    id,
                    provenance: LobProvenance::Resolved,
                }
            }

            /// A reference read back from storage.
            #[must_use]
            pub const fn fetched(id: BlobId) -> Self {
                Self {
                    id,
                    provenance: LobProvenance::Fetched,
                }
            }

            /// Object id; invalid while the reference is unresolved.
            #[inline]
            #[must_use]
            pub const fn id(&self) -> BlobId {
                self.id
            }

            /// Provenance.
            #[inline]
            #[must_use]
            pub const fn provenance(&self) -> &LobProvenance {
                &self.provenance
            }

            /// Locator of a provided reference.
            #[must_use]
            pub fn locator(&self) -> Option<&LobLocator> {
                match &self.provenance {
                    LobProvenance::Provided(locator) => Some(locator),
                    _ => None,
                }
            }

            /// Returns true once the reference names a registered object.
            #[must_use]
            pub fn is_resolved(&self) -> bool {
                !matches!(self.provenance, LobProvenance::Provided(_))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match &self.provenance {
                    LobProvenance::Provided(LobLocator::File { path, .. }) => {
                        write!(f, "{}(file {})", $label, path.display())
                    }
                    LobProvenance::Provided(LobLocator::Data(data)) => {
                        write!(f, "{}({} bytes)", $label, data.len())
                    }
                    LobProvenance::Fetched => write!(f, "{}(fetched {})", $label, self.id),
                    LobProvenance::Resolved => write!(f, "{}(resolved {})", $label, self.id),
                }
            }
        }
    };
}

define_lob_reference!(
    /// Reference to a binary large object.
    BlobReference,
    "Blob"
);

define_lob_reference!(
    /// Reference to a character large object.
    ClobReference,
    "Clob"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provided_reference_is_unresolved() {
        let r = BlobReference::provided(LobLocator::Data(Bytes::from_static(b"abc")));
        assert!(!r.is_resolved());
        assert!(!r.id().is_valid());
        assert!(r.locator().is_some());
        assert_eq!(format!("{r:?}"), "Blob(3 bytes)");
    }

    #[test]
    fn test_resolved_and_fetched() {
        let r = ClobReference::resolved(BlobId::new(7));
        assert!(r.is_resolved());
        assert_eq!(r.provenance().tag(), 2);
        let f = ClobReference::fetched(BlobId::new(7));
        assert_eq!(f.id(), r.id());
        assert_ne!(f, r);
        assert!(f.locator().is_none());
    }
}
