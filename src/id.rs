//! Identifier types and lookups by name.
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::borrow::Borrow;
use std::hash::Hash;

/// Define a new ID type.
///
/// IDs wrap an `Arc<str>` so that cloning them while evaluating portfolios on worker threads is
/// cheap.
macro_rules! define_id_type {
    ($name:ident) => {
        /// An identifier read from the model input files
        #[derive(
            Clone,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            std::hash::Hash,
            serde::Deserialize,
            serde::Serialize,
        )]
        pub struct $name(pub std::sync::Arc<str>);

        impl $name {
            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.into())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s.into())
            }
        }
    };
}
pub(crate) use define_id_type;

/// An ordered set of known IDs which input records refer to by name
pub trait IDCollection<ID> {
    /// Look up an ID by name, returning its position in the set along with the ID itself
    fn find_id(&self, name: &str) -> Result<(usize, &ID)>;
}

impl<ID> IDCollection<ID> for IndexSet<ID>
where
    ID: Borrow<str> + Hash + Eq,
{
    fn find_id(&self, name: &str) -> Result<(usize, &ID)> {
        self.get_full(name)
            .with_context(|| format!("Unknown ID {name} found"))
    }
}
