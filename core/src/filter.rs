//! The deploy-once filter (§4.6): drops ConfigMaps/Secrets marked `deploy-type: once` once a
//! live copy is already on the cluster.

use mlp_types::{annotations, Object};

use crate::client::Getter;
use crate::Result;

/// Reports whether `obj` should be dropped from this run because it is deploy-once and a copy
/// with the same ObjectID already exists on the cluster.
pub async fn should_drop(obj: &Object, getter: &dyn Getter) -> Result<bool> {
    let kind = obj.kind()?;
    if kind != "ConfigMap" && kind != "Secret" {
        return Ok(false);
    }
    if obj.annotation(annotations::DEPLOY_TYPE) != Some(annotations::DEPLOY_TYPE_ONCE) {
        return Ok(false);
    }
    let id = obj.id()?;
    Ok(getter.get(&id).await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCluster, NullGetter};
    use serde_json::json;

    fn once_configmap(name: &str, ns: &str) -> Object {
        Object::new(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": name,
                "namespace": ns,
                "annotations": {"mia-platform.eu/deploy-type": "once"},
            },
        }))
    }

    #[tokio::test]
    async fn keeps_once_object_on_first_deploy() {
        let cm = once_configmap("bootstrap", "ns");
        assert!(!should_drop(&cm, &NullGetter).await.unwrap());
    }

    #[tokio::test]
    async fn drops_once_object_already_present() {
        let cm = once_configmap("bootstrap", "ns");
        let cluster = MockCluster::new();
        cluster.seed(cm.clone());
        assert!(should_drop(&cm, &cluster).await.unwrap());
    }

    #[tokio::test]
    async fn keeps_objects_without_the_once_annotation() {
        let cm = Object::new(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "normal", "namespace": "ns"},
        }));
        let cluster = MockCluster::new();
        cluster.seed(cm.clone());
        assert!(!should_drop(&cm, &cluster).await.unwrap());
    }

    #[tokio::test]
    async fn ignores_non_configmap_secret_kinds_even_with_annotation() {
        let svc = Object::new(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": "s",
                "namespace": "ns",
                "annotations": {"mia-platform.eu/deploy-type": "once"},
            },
        }));
        assert!(!should_drop(&svc, &NullGetter).await.unwrap());
    }
}
