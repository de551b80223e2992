//! Hierarchical, namespaced addresses for graph nodes and edges.
//!
//! An address is an immutable sequence of string parts, conventionally
//! beginning with the namespace of the plugin that owns it, e.g.
//! `["sourcecred", "github", "ISSUE", "repo", "42"]`. Node and edge
//! addresses are separate types, so an edge address can never be looked up
//! in the node table by mistake.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{CredError, CredResult};

fn validate_part(part: &str) -> CredResult<()> {
    if part.contains('\0') {
        return Err(CredError::InvalidAddressPart {
            part: part.to_string(),
        });
    }
    Ok(())
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "Vec<String>", into = "Vec<String>")]
        pub struct $name(Vec<String>);

        impl $name {
            /// The address with no parts. It is a prefix of every address.
            pub fn empty() -> Self {
                Self(Vec::new())
            }

            pub fn from_parts<I, S>(parts: I) -> CredResult<Self>
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
                for part in &parts {
                    validate_part(part)?;
                }
                Ok(Self(parts))
            }

            /// Returns a new address with `parts` appended to this one.
            pub fn append<I, S>(&self, parts: I) -> CredResult<Self>
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                let mut result = self.0.clone();
                for part in parts {
                    let part = part.into();
                    validate_part(&part)?;
                    result.push(part);
                }
                Ok(Self(result))
            }

            pub fn has_prefix(&self, prefix: &Self) -> bool {
                self.0.starts_with(&prefix.0)
            }

            pub fn parts(&self) -> &[String] {
                &self.0
            }

            pub fn to_parts(&self) -> Vec<String> {
                self.0.clone()
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl TryFrom<Vec<String>> for $name {
            type Error = CredError;

            fn try_from(parts: Vec<String>) -> CredResult<Self> {
                Self::from_parts(parts)
            }
        }

        impl From<$name> for Vec<String> {
            fn from(address: $name) -> Vec<String> {
                address.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}[", stringify!($name))?;
                for (i, part) in self.0.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{part:?}")?;
                }
                write!(f, "]")
            }
        }
    };
}

address_type!(
    /// Address of a graph node.
    NodeAddress
);

address_type!(
    /// Address of a graph edge.
    EdgeAddress
);
