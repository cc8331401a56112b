//! The inventory store (§4.2): the persistent namespace-local record of what this project
//! deployed last, backing both pruning and the legacy-secret migration.

mod legacy;

use std::collections::{BTreeMap, BTreeSet};

use mlp_types::ObjectId;

use crate::client::InventoryBackend;
use crate::Result;

/// Tracks the previous and pending object sets for one namespace, plus whether `Load` fell back
/// to the legacy secret (in which case `Save` must clean it up).
pub struct InventoryStore<'a> {
    backend: &'a dyn InventoryBackend,
    namespace: String,
    legacy_mode: bool,
    pending: Option<BTreeSet<ObjectId>>,
}

impl<'a> InventoryStore<'a> {
    /// Builds a store bound to `namespace`, before any I/O has happened.
    pub fn new(backend: &'a dyn InventoryBackend, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            legacy_mode: false,
            pending: None,
        }
    }

    /// Whether `Load` fell back to the legacy secret encoding.
    pub fn is_legacy_mode(&self) -> bool {
        self.legacy_mode
    }

    /// Loads the previous deploy's object set (§4.2 Load).
    pub async fn load(&mut self) -> Result<BTreeSet<ObjectId>> {
        if let Some(data) = self.backend.get_inventory_configmap(&self.namespace).await? {
            if !data.is_empty() {
                self.legacy_mode = false;
                return Ok(data.keys().filter_map(|k| ObjectId::parse_inventory_key(k)).collect());
            }
        }

        let Some(payload) = self.backend.get_legacy_secret(&self.namespace).await? else {
            self.legacy_mode = false;
            return Ok(BTreeSet::new());
        };

        self.legacy_mode = true;
        let entries = legacy::decode(&payload)?;
        let mut set = BTreeSet::new();
        for entry in entries {
            let scope = self
                .backend
                .resolve_scope(&entry.group, &entry.version, &entry.kind)
                .await?;
            let Some(namespaced) = scope else {
                // Discovery couldn't resolve the kind; a later run can reconcile it.
                continue;
            };
            let namespace = if namespaced { self.namespace.clone() } else { String::new() };
            set.insert(ObjectId::new(entry.group, entry.kind, namespace, entry.name));
        }
        Ok(set)
    }

    /// Registers the set that will be persisted at `Save` time.
    pub fn set_objects(&mut self, objects: BTreeSet<ObjectId>) {
        self.pending = Some(objects);
    }

    /// Writes the registered set via server-side apply, then best-effort cleans up the legacy
    /// secret if `Load` had fallen back to it (§4.2 Save).
    pub async fn save(&mut self, dry_run: bool) -> Result<()> {
        let pending = self.pending.clone().unwrap_or_default();
        let data: BTreeMap<String, String> = pending
            .iter()
            .map(|id| (id.inventory_key(), String::new()))
            .collect();
        self.backend
            .apply_inventory_configmap(&self.namespace, data, dry_run)
            .await?;

        if self.legacy_mode && !dry_run {
            self.backend.delete_legacy_secret(&self.namespace).await?;
        }
        Ok(())
    }

    /// Removes the new-format store entirely (teardown flows).
    pub async fn delete(&mut self, dry_run: bool) -> Result<()> {
        self.backend.delete_inventory_configmap(&self.namespace, dry_run).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockInventoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn load_is_empty_when_nothing_exists() {
        let backend = MockInventoryBackend::new();
        let mut store = InventoryStore::new(&backend, "ns");
        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());
        assert!(!store.is_legacy_mode());
    }

    #[tokio::test]
    async fn load_prefers_new_format_configmap() {
        let backend = MockInventoryBackend::new();
        let id = ObjectId::new("apps", "Deployment", "ns", "app");
        backend
            .apply_inventory_configmap("ns", BTreeMap::from([(id.inventory_key(), String::new())]), false)
            .await
            .unwrap();

        let mut store = InventoryStore::new(&backend, "ns");
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, BTreeSet::from([id]));
        assert!(!store.is_legacy_mode());
    }

    #[tokio::test]
    async fn load_falls_back_to_legacy_secret_and_resolves_scope() {
        let backend = MockInventoryBackend::new();
        backend.register_scope("apps", "v1", "Deployment", true);
        backend.register_scope("", "v1", "Namespace", false);
        let payload = json!({
            "Deployment": {
                "kind": {"Group": "apps", "Version": "v1", "Kind": "Deployment"},
                "resources": ["app"],
            },
            "Namespace": {
                "kind": {"Group": "", "Version": "v1", "Kind": "Namespace"},
                "resources": ["team-a"],
            },
            "Widget": {
                "kind": {"Group": "unknown.io", "Version": "v1", "Kind": "Widget"},
                "resources": ["w"],
            },
        });
        backend.seed_legacy_secret("ns", serde_json::to_vec(&payload).unwrap());

        let mut store = InventoryStore::new(&backend, "ns");
        let loaded = store.load().await.unwrap();
        assert!(store.is_legacy_mode());
        assert!(loaded.contains(&ObjectId::new("apps", "Deployment", "ns", "app")));
        assert!(loaded.contains(&ObjectId::new("", "Namespace", "", "team-a")));
        assert_eq!(loaded.len(), 2, "unresolvable kind is silently skipped");
    }

    #[tokio::test]
    async fn save_cleans_up_legacy_secret_after_migration() {
        let backend = MockInventoryBackend::new();
        backend.seed_legacy_secret("ns", b"{}".to_vec());

        let mut store = InventoryStore::new(&backend, "ns");
        store.load().await.unwrap();
        assert!(store.is_legacy_mode());

        store.set_objects(BTreeSet::new());
        store.save(false).await.unwrap();
        assert!(backend.legacy_secret_is_gone("ns"));
    }

    #[tokio::test]
    async fn save_does_not_clean_up_legacy_secret_on_dry_run() {
        let backend = MockInventoryBackend::new();
        backend.seed_legacy_secret("ns", b"{}".to_vec());

        let mut store = InventoryStore::new(&backend, "ns");
        store.load().await.unwrap();
        store.set_objects(BTreeSet::new());
        store.save(true).await.unwrap();
        assert!(!backend.legacy_secret_is_gone("ns"));
    }
}
