#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]
//! Types shared across the deploy pipeline: the manifest document wrapper, [`ObjectId`], the
//! `PodCarrier` nested-path table, and the well-known annotation/label constants the pipeline
//! consumes and produces.

pub mod annotations;
pub mod object;
pub mod podcarrier;

pub use object::{ManifestError, Object};
pub use podcarrier::PodCarrierKind;

use std::fmt;

/// Identifies a Kubernetes object by the tuple the pipeline treats as its value identity.
///
/// Version is deliberately excluded so a kind's stored API version can evolve between runs
/// without the inventory treating the object as a different one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    /// API group. Empty string for the core group.
    pub group: String,
    /// Kind, e.g. "Deployment".
    pub kind: String,
    /// Namespace. Empty string for cluster-scoped objects.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl ObjectId {
    /// Builds an ObjectId from its parts.
    pub fn new(
        group: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Serializes this id as the inventory data-key form: `kind/group/namespace/name`.
    pub fn inventory_key(&self) -> String {
        format!("{}/{}/{}/{}", self.kind, self.group, self.namespace, self.name)
    }

    /// Parses the inventory data-key form back into an ObjectId.
    ///
    /// Returns `None` if the key does not have exactly four `/`-separated components. Group and
    /// namespace may be empty components.
    pub fn parse_inventory_key(key: &str) -> Option<Self> {
        let mut parts = key.splitn(4, '/');
        let kind = parts.next()?;
        let group = parts.next()?;
        let namespace = parts.next()?;
        let name = parts.next()?;
        Some(Self::new(group, kind, namespace, name))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inventory_key())
    }
}
