//! The ExternalSecrets mutator (§4.5): wires explicit apply-ordering edges from PodCarriers to
//! the ExternalSecrets whose produced Secret they mount, and from each ExternalSecret to the
//! SecretStores it references.

use std::collections::{BTreeMap, BTreeSet};

use mlp_types::{annotations, Object, ObjectId, PodCarrierKind};
use serde_json::Value;

use crate::client::{BoxFuture, Getter};
use crate::podwalk::collect_pod_references;
use crate::{Error, Result};

use super::Mutator;

const DEFAULT_STORE_KIND: &str = "SecretStore";
const CLUSTER_STORE_KIND: &str = "ClusterSecretStore";

/// Indexes the input batch once so every ExternalSecret/PodCarrier mutation is a lookup rather
/// than a re-scan (§4.5 "Build-time").
pub struct ExternalSecretsMutator {
    /// `(produced secret name, namespace) -> ExternalSecret id`.
    secret_index: BTreeMap<(String, String), ObjectId>,
    /// `(store kind, store name, namespace) -> store id`.
    store_index: BTreeMap<(String, String, String), ObjectId>,
}

impl ExternalSecretsMutator {
    /// Builds the index from the whole input batch.
    pub fn new(batch: &[Object]) -> Self {
        let mut secret_index = BTreeMap::new();
        let mut store_index = BTreeMap::new();

        for obj in batch {
            let Ok(kind) = obj.kind() else { continue };
            match kind {
                "ExternalSecret" => {
                    if let (Ok(id), Ok(name)) = (obj.id(), obj.name()) {
                        let produced = produced_secret_name(obj).unwrap_or_else(|| name.to_string());
                        secret_index.insert((produced, obj.namespace().to_string()), id);
                    }
                }
                "SecretStore" | "ClusterSecretStore" => {
                    if let (Ok(id), Ok(name)) = (obj.id(), obj.name()) {
                        store_index.insert(
                            (kind.to_string(), name.to_string(), obj.namespace().to_string()),
                            id,
                        );
                    }
                }
                _ => {}
            }
        }

        Self {
            secret_index,
            store_index,
        }
    }

    fn resolve_store(&self, own_namespace: &str, name: &str, kind: Option<&str>) -> Option<ObjectId> {
        let kind = kind.filter(|k| !k.is_empty()).unwrap_or(DEFAULT_STORE_KIND);
        let namespace = if kind == CLUSTER_STORE_KIND {
            ""
        } else {
            own_namespace
        };
        self.store_index
            .get(&(kind.to_string(), name.to_string(), namespace.to_string()))
            .cloned()
    }
}

fn produced_secret_name(obj: &Object) -> Option<String> {
    obj.map_at(&["spec", "target"])
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reads a `{name, kind}`-shaped `secretStoreRef` value.
fn store_ref(v: &Value) -> Option<(String, Option<String>)> {
    let name = v.get("name").and_then(Value::as_str)?.to_string();
    let kind = v.get("kind").and_then(Value::as_str).map(str::to_string);
    Some((name, kind))
}

/// Collects every `secretStoreRef` an ExternalSecret carries: the default one plus each
/// per-entry `sourceRef.secretStoreRef` in `data[*]` and `dataFrom[*]`.
fn collect_store_refs(obj: &Object) -> Vec<(String, Option<String>)> {
    let mut refs = Vec::new();

    if let Some(default_ref) = obj.map_at(&["spec", "secretStoreRef"]).and_then(store_ref) {
        refs.push(default_ref);
    }

    for field in ["data", "dataFrom"] {
        if let Some(entries) = obj.map_at(&["spec", field]).and_then(Value::as_array) {
            for entry in entries {
                if let Some(r) = entry
                    .get("sourceRef")
                    .and_then(|v| v.get("secretStoreRef"))
                    .and_then(store_ref)
                {
                    refs.push(r);
                }
            }
        }
    }

    refs
}

impl Mutator for ExternalSecretsMutator {
    fn can_handle(&self, kind: &str) -> bool {
        !self.secret_index.is_empty() && (kind == "ExternalSecret" || PodCarrierKind::from_kind(kind).is_some())
    }

    fn mutate<'a>(&'a self, obj: &'a mut Object, _getter: &'a dyn Getter) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let kind = obj.kind()?.to_string();
            let namespace = obj.namespace().to_string();

            if kind == "ExternalSecret" {
                let mut edges = BTreeSet::new();
                for (name, store_kind) in collect_store_refs(obj) {
                    if let Some(id) = self.resolve_store(&namespace, &name, store_kind.as_deref()) {
                        edges.insert(id);
                    }
                }
                write_depends_on(obj, &["metadata", "annotations"], edges);
                return Ok(());
            }

            let carrier = PodCarrierKind::require(&kind).map_err(|_| Error::UnsupportedKind(kind.clone()))?;
            let pod_spec = obj
                .map_at(carrier.pod_spec_path())
                .cloned()
                .unwrap_or_default();
            let refs = collect_pod_references(&pod_spec)?;

            let mut edges = BTreeSet::new();
            for r in refs.into_iter().filter(|r| r.kind == "Secret") {
                if let Some(id) = self.secret_index.get(&(r.name, namespace.clone())) {
                    edges.insert(id.clone());
                }
            }
            write_depends_on(obj, carrier.pod_annotations_path(), edges);
            Ok(())
        })
    }
}

fn write_depends_on(obj: &mut Object, path: &[&str], edges: BTreeSet<ObjectId>) {
    if edges.is_empty() {
        return;
    }
    let value = edges
        .iter()
        .map(ObjectId::inventory_key)
        .collect::<Vec<_>>()
        .join(",");
    obj.set_map_entry(path, annotations::DEPENDS_ON, Value::String(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::NullGetter;
    use serde_json::json;

    fn external_secret(name: &str, ns: &str, target: Option<&str>, store: &str) -> Object {
        let mut spec = json!({"secretStoreRef": {"name": store, "kind": "SecretStore"}});
        if let Some(t) = target {
            spec["target"] = json!({"name": t});
        }
        Object::new(json!({
            "apiVersion": "external-secrets.io/v1beta1",
            "kind": "ExternalSecret",
            "metadata": {"name": name, "namespace": ns},
            "spec": spec,
        }))
    }

    fn secret_store(name: &str, ns: &str) -> Object {
        Object::new(json!({
            "apiVersion": "external-secrets.io/v1beta1",
            "kind": "SecretStore",
            "metadata": {"name": name, "namespace": ns},
        }))
    }

    fn deployment_mounting_secret(secret_name: &str, ns: &str) -> Object {
        Object::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "app", "namespace": ns},
            "spec": {"template": {"spec": {
                "volumes": [{"name": "v", "secret": {"secretName": secret_name}}],
                "containers": [{"name": "c", "image": "app:1.0.0"}],
            }}},
        }))
    }

    #[tokio::test]
    async fn external_secret_gets_depends_on_edge_to_its_store() {
        let store = secret_store("vault", "ns");
        let es = external_secret("db-creds", "ns", None, "vault");
        let mutator = ExternalSecretsMutator::new(&[store, es.clone()]);

        let mut es = es;
        mutator.mutate(&mut es, &NullGetter).await.unwrap();

        let value = es
            .map_at(&["metadata", "annotations"])
            .and_then(|v| v.get("mia-platform.eu/depends-on"))
            .and_then(Value::as_str)
            .unwrap();
        assert!(value.contains("vault"));
    }

    #[tokio::test]
    async fn podcarrier_gets_depends_on_edge_to_external_secret_by_produced_name() {
        let es = external_secret("db-creds", "ns", Some("db-secret"), "vault");
        let dep = deployment_mounting_secret("db-secret", "ns");
        let mutator = ExternalSecretsMutator::new(&[es, dep.clone()]);

        let mut dep = dep;
        mutator.mutate(&mut dep, &NullGetter).await.unwrap();

        let value = dep
            .map_at(&["spec", "template", "metadata", "annotations"])
            .and_then(|v| v.get("mia-platform.eu/depends-on"))
            .and_then(Value::as_str)
            .unwrap();
        assert!(value.contains("db-creds"));
    }

    #[test]
    fn can_handle_is_globally_false_with_no_external_secrets_in_batch() {
        let mutator = ExternalSecretsMutator::new(&[]);
        assert!(!mutator.can_handle("Deployment"));
        assert!(!mutator.can_handle("ExternalSecret"));
    }

    #[tokio::test]
    async fn podcarrier_untouched_when_no_reference_resolves() {
        let es = external_secret("db-creds", "ns", None, "vault");
        let dep = deployment_mounting_secret("unrelated-secret", "ns");
        let mutator = ExternalSecretsMutator::new(&[es, dep.clone()]);

        let mut dep = dep;
        mutator.mutate(&mut dep, &NullGetter).await.unwrap();

        assert!(dep.map_at(&["spec", "template", "metadata", "annotations"]).is_none());
    }
}
