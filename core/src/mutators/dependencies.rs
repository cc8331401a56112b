//! The Dependencies mutator (§4.3): annotates every PodCarrier with a digest of the
//! ConfigMaps/Secrets it mounts, so a later rollout can be forced purely because mounted
//! configuration changed shape — without the workload's own spec changing at all.

use std::collections::BTreeMap;

use mlp_types::{annotations, Object, PodCarrierKind};

use crate::checksum::{digest_subset, entry_key, whole_object_key, DependencyChecksums};
use crate::client::{BoxFuture, Getter};
use crate::podwalk::collect_pod_references;
use crate::{Error, Result};

use super::Mutator;

/// Writes [`annotations::DEPENDENCIES_CHECKSUM`] onto PodCarriers that reference at least one
/// ConfigMap or Secret.
pub struct DependenciesMutator {
    checksums: DependencyChecksums,
}

impl DependenciesMutator {
    /// Builds the mutator from the checksum map computed once per run over the whole input batch.
    pub fn new(checksums: DependencyChecksums) -> Self {
        Self { checksums }
    }
}

impl Mutator for DependenciesMutator {
    fn can_handle(&self, kind: &str) -> bool {
        PodCarrierKind::from_kind(kind).is_some()
    }

    fn mutate<'a>(&'a self, obj: &'a mut Object, _getter: &'a dyn Getter) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let carrier = PodCarrierKind::require(obj.kind()?).map_err(|_| {
                Error::UnsupportedKind(obj.kind().unwrap_or("").to_string())
            })?;
            let namespace = obj.namespace().to_string();

            let pod_spec = obj
                .map_at(carrier.pod_spec_path())
                .cloned()
                .unwrap_or_default();
            let refs = collect_pod_references(&pod_spec)?;

            let mut subset: BTreeMap<String, String> = BTreeMap::new();
            for r in &refs {
                let key = match &r.key {
                    Some(data_key) => entry_key(r.kind, &r.name, &namespace, data_key),
                    None => whole_object_key(r.kind, &r.name, &namespace),
                };
                if let Some(digest) = self.checksums.get(&key) {
                    subset.insert(key, digest.to_string());
                }
            }

            if !subset.is_empty() {
                let digest = digest_subset(&subset);
                obj.set_map_entry(
                    carrier.pod_annotations_path(),
                    annotations::DEPENDENCIES_CHECKSUM,
                    serde_json::Value::String(digest),
                );
            }

            Ok(())
        })
    }
}
