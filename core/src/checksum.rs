//! The dependency checksum map (§3): an ephemeral mapping from composite key to hex sha-256
//! digest, built once per run from every ConfigMap and Secret in the input batch.

use std::collections::BTreeMap;

use mlp_types::Object;
use sha2::{Digest, Sha256};

/// Maps a composite reference key (see [`whole_object_key`]/[`entry_key`]) to a hex digest.
#[derive(Debug, Default, Clone)]
pub struct DependencyChecksums(BTreeMap<String, String>);

/// The reference key for a whole ConfigMap/Secret: `<Kind><Name><Namespace>`.
pub fn whole_object_key(kind: &str, name: &str, namespace: &str) -> String {
    format!("{kind}{name}{namespace}")
}

/// The reference key for a single data entry: `<Kind><Name><Namespace><DataKey>`.
pub fn entry_key(kind: &str, name: &str, namespace: &str, data_key: &str) -> String {
    format!("{kind}{name}{namespace}{data_key}")
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// A deterministic digest of a string-keyed map: sorted-key iteration over a length-prefixed
/// key/value stream, so no separator character can create a collision between adjacent entries.
fn digest_map(map: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (k, v) in map {
        hasher.update((k.len() as u64).to_le_bytes());
        hasher.update(k.as_bytes());
        hasher.update((v.len() as u64).to_le_bytes());
        hasher.update(v.as_bytes());
    }
    hex(&hasher.finalize())
}

fn digest_value(v: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(v.as_bytes());
    hex(&hasher.finalize())
}

/// The fields of a ConfigMap/Secret relevant to hashing: kind, name, namespace, and the union of
/// its `data`/`binaryData` (or `data`/`stringData`) maps.
struct Carrier {
    kind: &'static str,
    name: String,
    namespace: String,
    fields: BTreeMap<String, String>,
}

fn carrier_for(obj: &Object) -> Option<Carrier> {
    let kind = obj.kind().ok()?;
    let name = obj.name().ok()?.to_string();
    let namespace = obj.namespace().to_string();

    let (kind, a, b) = match kind {
        "ConfigMap" => ("ConfigMap", "data", "binaryData"),
        "Secret" => ("Secret", "data", "stringData"),
        _ => return None,
    };

    let mut fields = string_map(obj, a);
    fields.extend(string_map(obj, b));
    Some(Carrier {
        kind,
        name,
        namespace,
        fields,
    })
}

fn string_map(obj: &Object, field: &str) -> BTreeMap<String, String> {
    obj.map_at(&[field])
        .and_then(|v| v.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| match v {
                    serde_json::Value::String(s) => Some((k.clone(), s.clone())),
                    other => Some((k.clone(), other.to_string())),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl DependencyChecksums {
    /// Scans `batch` for every ConfigMap and Secret and populates the checksum map (§4.3
    /// "Build-time").
    pub fn build(batch: &[Object]) -> Self {
        let mut map = BTreeMap::new();
        for obj in batch {
            let Some(c) = carrier_for(obj) else { continue };
            map.insert(
                whole_object_key(c.kind, &c.name, &c.namespace),
                digest_map(&c.fields),
            );
            for (k, v) in &c.fields {
                map.insert(entry_key(c.kind, &c.name, &c.namespace, k), digest_value(v));
            }
        }
        Self(map)
    }

    /// Looks up the digest for a composite reference key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Computes a single deterministic digest over a subset map (the per-object view the Dependencies
/// mutator writes into the annotation). Sorted-key iteration over a `BTreeMap` makes the result
/// independent of the order references were discovered in.
pub fn digest_subset(subset: &BTreeMap<String, String>) -> String {
    digest_map(subset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn configmap(name: &str, ns: &str, data: serde_json::Value) -> Object {
        Object::new(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": ns},
            "data": data,
        }))
    }

    #[test]
    fn whole_object_digest_is_stable_under_key_permutation() {
        let a = configmap("example", "ns", json!({"k": "v", "z": "y"}));
        let b = configmap("example", "ns", json!({"z": "y", "k": "v"}));
        let da = DependencyChecksums::build(&[a]);
        let db = DependencyChecksums::build(&[b]);
        let key = whole_object_key("ConfigMap", "example", "ns");
        assert_eq!(da.get(&key), db.get(&key));
    }

    #[test]
    fn per_key_digest_is_independent_of_other_keys() {
        let a = configmap("example", "ns", json!({"k": "v"}));
        let b = configmap("example", "ns", json!({"k": "v", "other": "ignored"}));
        let da = DependencyChecksums::build(&[a]);
        let db = DependencyChecksums::build(&[b]);
        let key = entry_key("ConfigMap", "example", "ns", "k");
        assert_eq!(da.get(&key), db.get(&key));
    }

    #[test]
    fn non_configmap_secret_kinds_contribute_nothing() {
        let svc = Object::new(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {"name": "s", "namespace": "ns"},
        }));
        let checksums = DependencyChecksums::build(&[svc]);
        assert!(checksums.get(&whole_object_key("Service", "s", "ns")).is_none());
    }
}
