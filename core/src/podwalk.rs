//! Shared pod-spec walking logic used by the Dependencies and ExternalSecrets mutators (§4.3,
//! §4.5): both need the same "volumes, then init-containers and containers' env entries" walk to
//! collect ConfigMap/Secret references.

use serde_json::Value;

use crate::{Error, Result};

/// A single ConfigMap/Secret reference found while walking a pod spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodReference {
    /// `"Secret"` or `"ConfigMap"`.
    pub kind: &'static str,
    /// The referenced object's name.
    pub name: String,
    /// The referenced data key, for env-var references. `None` for whole-object volume mounts.
    pub key: Option<String>,
}

fn as_array<'a>(v: &'a Value, what: &str) -> Result<&'a [Value]> {
    v.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::MalformedPodSpec(format!("{what} is not an array")))
}

fn as_object_field<'a>(v: &'a Value, field: &str) -> Option<&'a Value> {
    v.as_object()?.get(field)
}

/// Walks `pod_spec` collecting every Secret/ConfigMap reference, in the order: volumes, then
/// init-containers' env, then containers' env.
pub fn collect_pod_references(pod_spec: &Value) -> Result<Vec<PodReference>> {
    let mut refs = Vec::new();

    if let Some(volumes) = as_object_field(pod_spec, "volumes") {
        for vol in as_array(volumes, "spec.volumes")? {
            if let Some(secret) = as_object_field(vol, "secret") {
                if let Some(name) = as_object_field(secret, "secretName").and_then(Value::as_str) {
                    refs.push(PodReference {
                        kind: "Secret",
                        name: name.to_string(),
                        key: None,
                    });
                }
            }
            if let Some(cm) = as_object_field(vol, "configMap") {
                if let Some(name) = as_object_field(cm, "name").and_then(Value::as_str) {
                    refs.push(PodReference {
                        kind: "ConfigMap",
                        name: name.to_string(),
                        key: None,
                    });
                }
            }
        }
    }

    for field in ["initContainers", "containers"] {
        let Some(containers) = as_object_field(pod_spec, field) else {
            continue;
        };
        for container in as_array(containers, &format!("spec.{field}"))? {
            let Some(env) = as_object_field(container, "env") else {
                continue;
            };
            for entry in as_array(env, &format!("spec.{field}[].env"))? {
                let Some(value_from) = as_object_field(entry, "valueFrom") else {
                    continue;
                };
                if let Some(r) = as_object_field(value_from, "secretKeyRef") {
                    if let (Some(name), Some(key)) = (
                        as_object_field(r, "name").and_then(Value::as_str),
                        as_object_field(r, "key").and_then(Value::as_str),
                    ) {
                        refs.push(PodReference {
                            kind: "Secret",
                            name: name.to_string(),
                            key: Some(key.to_string()),
                        });
                    }
                }
                if let Some(r) = as_object_field(value_from, "configMapKeyRef") {
                    if let (Some(name), Some(key)) = (
                        as_object_field(r, "name").and_then(Value::as_str),
                        as_object_field(r, "key").and_then(Value::as_str),
                    ) {
                        refs.push(PodReference {
                            kind: "ConfigMap",
                            name: name.to_string(),
                            key: Some(key.to_string()),
                        });
                    }
                }
            }
        }
    }

    Ok(refs)
}

/// Collects every container image string in the pod spec (init-containers then containers).
pub fn collect_images(pod_spec: &Value) -> Result<Vec<String>> {
    let mut images = Vec::new();
    for field in ["initContainers", "containers"] {
        let Some(containers) = as_object_field(pod_spec, field) else {
            continue;
        };
        for container in as_array(containers, &format!("spec.{field}"))? {
            if let Some(image) = as_object_field(container, "image").and_then(Value::as_str) {
                images.push(image.to_string());
            }
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_volume_and_env_references_in_order() {
        let spec = json!({
            "volumes": [
                {"name": "v1", "secret": {"secretName": "s1"}},
                {"name": "v2", "configMap": {"name": "cm1"}},
            ],
            "containers": [{
                "name": "c",
                "image": "busybox",
                "env": [
                    {"name": "K", "valueFrom": {"secretKeyRef": {"name": "s2", "key": "password"}}},
                    {"name": "J", "valueFrom": {"configMapKeyRef": {"name": "cm2", "key": "host"}}},
                ],
            }],
        });
        let refs = collect_pod_references(&spec).unwrap();
        assert_eq!(
            refs,
            vec![
                PodReference { kind: "Secret", name: "s1".into(), key: None },
                PodReference { kind: "ConfigMap", name: "cm1".into(), key: None },
                PodReference { kind: "Secret", name: "s2".into(), key: Some("password".into()) },
                PodReference { kind: "ConfigMap", name: "cm2".into(), key: Some("host".into()) },
            ]
        );
    }

    #[test]
    fn missing_sections_are_empty_not_errors() {
        let spec = json!({});
        assert_eq!(collect_pod_references(&spec).unwrap(), Vec::new());
        assert_eq!(collect_images(&spec).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn collects_images_from_init_and_regular_containers() {
        let spec = json!({
            "initContainers": [{"name": "init", "image": "busybox:1.36"}],
            "containers": [{"name": "c", "image": "app:latest"}],
        });
        assert_eq!(
            collect_images(&spec).unwrap(),
            vec!["busybox:1.36".to_string(), "app:latest".to_string()]
        );
    }
}
