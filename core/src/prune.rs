//! The pruner (§4.7 step 10): deletes objects this project owns that disappeared from the
//! current run's declared set.

use std::collections::BTreeSet;

use mlp_types::{annotations, ObjectId};

use crate::client::ClusterClient;
use crate::Result;

/// Computes `old − new` and deletes every dropped object this project owns. Objects missing on
/// GET, or not carrying this project's `managed-by` label, are skipped rather than deleted.
pub async fn prune(
    old: &BTreeSet<ObjectId>,
    new: &BTreeSet<ObjectId>,
    client: &dyn ClusterClient,
    dry_run: bool,
) -> Result<Vec<ObjectId>> {
    let mut deleted = Vec::new();
    for id in old.difference(new) {
        let Some(live) = client.get(id).await? else {
            continue;
        };
        if live.labels().get(annotations::MANAGED_BY).map(String::as_str) != Some(annotations::MANAGED_BY_VALUE) {
            continue;
        }
        client.delete(id, dry_run).await?;
        deleted.push(id.clone());
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCluster;
    use mlp_types::Object;
    use serde_json::json;

    fn managed(name: &str) -> Object {
        Object::new(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": name,
                "namespace": "ns",
                "labels": {"app.kubernetes.io/managed-by": "mlp"},
            },
        }))
    }

    fn unmanaged(name: &str) -> Object {
        Object::new(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "ns"},
        }))
    }

    #[tokio::test]
    async fn deletes_dropped_objects_this_project_owns() {
        let cluster = MockCluster::new();
        cluster.seed(managed("gone"));
        let old = BTreeSet::from([ObjectId::new("", "ConfigMap", "ns", "gone")]);
        let new = BTreeSet::new();

        let deleted = prune(&old, &new, &cluster, false).await.unwrap();
        assert_eq!(deleted, vec![ObjectId::new("", "ConfigMap", "ns", "gone")]);
        assert!(!cluster.contains(&ObjectId::new("", "ConfigMap", "ns", "gone")));
    }

    #[tokio::test]
    async fn skips_objects_not_managed_by_this_project() {
        let cluster = MockCluster::new();
        cluster.seed(unmanaged("foreign"));
        let old = BTreeSet::from([ObjectId::new("", "ConfigMap", "ns", "foreign")]);
        let new = BTreeSet::new();

        let deleted = prune(&old, &new, &cluster, false).await.unwrap();
        assert!(deleted.is_empty());
        assert!(cluster.contains(&ObjectId::new("", "ConfigMap", "ns", "foreign")));
    }

    #[tokio::test]
    async fn skips_objects_already_missing() {
        let cluster = MockCluster::new();
        let old = BTreeSet::from([ObjectId::new("", "ConfigMap", "ns", "already-gone")]);
        let new = BTreeSet::new();

        let deleted = prune(&old, &new, &cluster, false).await.unwrap();
        assert!(deleted.is_empty());
    }

    #[tokio::test]
    async fn keeps_objects_still_declared() {
        let cluster = MockCluster::new();
        cluster.seed(managed("kept"));
        let id = ObjectId::new("", "ConfigMap", "ns", "kept");
        let old = BTreeSet::from([id.clone()]);
        let new = BTreeSet::from([id.clone()]);

        let deleted = prune(&old, &new, &cluster, false).await.unwrap();
        assert!(deleted.is_empty());
        assert!(cluster.contains(&id));
    }
}
