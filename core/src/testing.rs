//! In-memory test doubles for [`crate::client::Getter`], [`crate::client::ClusterClient`], and
//! [`crate::client::InventoryBackend`] (§8 "Testable Properties").
//!
//! The teacher's own test harness (`controller/src/testing.rs`) stands up a mock apiserver behind
//! `tower_test` because its boundary is an HTTP client. Ours is a plain trait, so a `Mutex`-backed
//! map plays the same role without the HTTP plumbing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use mlp_types::{Object, ObjectId};

use crate::client::{BoxFuture, ClusterClient, Getter, InventoryBackend};
use crate::Result;

/// A [`Getter`] that never finds anything. Used by mutator tests that don't exercise the
/// remote-lookup fallback.
pub struct NullGetter;

impl Getter for NullGetter {
    fn get(&self, _id: &ObjectId) -> BoxFuture<'_, Result<Option<Object>>> {
        Box::pin(async { Ok(None) })
    }
}

/// An in-memory cluster: a set of live objects keyed by [`ObjectId`], plus the bookkeeping the
/// driver and pruner need (namespaces applied, deletions, discovery answers).
#[derive(Default)]
pub struct MockCluster {
    objects: Mutex<BTreeMap<ObjectId, Object>>,
    namespaces: Mutex<Vec<String>>,
    deleted: Mutex<Vec<ObjectId>>,
    scopes: Mutex<BTreeMap<String, bool>>,
}

impl MockCluster {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the cluster with a pre-existing live object.
    pub fn seed(&self, obj: Object) {
        let id = obj.id().expect("seeded object has a valid id");
        self.objects.lock().unwrap().insert(id, obj);
    }

    /// Registers `kind` at `group/version` as namespaced (`true`) or cluster-scoped (`false`), so
    /// [`ClusterClient::resolve_scope`]/[`InventoryBackend::resolve_scope`] can answer it.
    pub fn register_scope(&self, group: &str, version: &str, kind: &str, namespaced: bool) {
        self.scopes
            .lock()
            .unwrap()
            .insert(format!("{group}/{version}/{kind}"), namespaced);
    }

    /// Returns the namespaces this mock has seen an `apply_namespace` call for.
    pub fn applied_namespaces(&self) -> Vec<String> {
        self.namespaces.lock().unwrap().clone()
    }

    /// Returns every id this mock has seen a `delete` call for, in call order.
    pub fn deleted_ids(&self) -> Vec<ObjectId> {
        self.deleted.lock().unwrap().clone()
    }

    /// Returns whether `id` is still present in the cluster.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.lock().unwrap().contains_key(id)
    }
}

impl Getter for MockCluster {
    fn get(&self, id: &ObjectId) -> BoxFuture<'_, Result<Option<Object>>> {
        let found = self.objects.lock().unwrap().get(id).cloned();
        Box::pin(async move { Ok(found) })
    }
}

impl ClusterClient for MockCluster {
    fn delete(&self, id: &ObjectId, _dry_run: bool) -> BoxFuture<'_, Result<()>> {
        self.objects.lock().unwrap().remove(id);
        self.deleted.lock().unwrap().push(id.clone());
        Box::pin(async { Ok(()) })
    }

    fn apply_namespace(&self, name: &str, _dry_run: bool) -> BoxFuture<'_, Result<()>> {
        self.namespaces.lock().unwrap().push(name.to_string());
        Box::pin(async { Ok(()) })
    }

    fn resolve_scope(
        &self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> BoxFuture<'_, Result<Option<bool>>> {
        let answer = self
            .scopes
            .lock()
            .unwrap()
            .get(&format!("{group}/{version}/{kind}"))
            .copied();
        Box::pin(async move { Ok(answer) })
    }
}

/// An in-memory inventory backend: one ConfigMap-shaped data map and one legacy-secret payload
/// per namespace.
#[derive(Default)]
pub struct MockInventoryBackend {
    configmaps: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    legacy_secrets: Mutex<BTreeMap<String, Vec<u8>>>,
    scopes: Mutex<BTreeMap<String, bool>>,
}

impl MockInventoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the legacy inventory secret payload for `namespace`.
    pub fn seed_legacy_secret(&self, namespace: &str, payload: Vec<u8>) {
        self.legacy_secrets
            .lock()
            .unwrap()
            .insert(namespace.to_string(), payload);
    }

    /// Registers `kind` at `group/version` as namespaced or cluster-scoped.
    pub fn register_scope(&self, group: &str, version: &str, kind: &str, namespaced: bool) {
        self.scopes
            .lock()
            .unwrap()
            .insert(format!("{group}/{version}/{kind}"), namespaced);
    }

    /// Returns whether the legacy secret for `namespace` was deleted.
    pub fn legacy_secret_is_gone(&self, namespace: &str) -> bool {
        !self.legacy_secrets.lock().unwrap().contains_key(namespace)
    }
}

impl InventoryBackend for MockInventoryBackend {
    fn get_inventory_configmap(
        &self,
        namespace: &str,
    ) -> BoxFuture<'_, Result<Option<BTreeMap<String, String>>>> {
        let data = self.configmaps.lock().unwrap().get(namespace).cloned();
        Box::pin(async move { Ok(data) })
    }

    fn apply_inventory_configmap(
        &self,
        namespace: &str,
        data: BTreeMap<String, String>,
        _dry_run: bool,
    ) -> BoxFuture<'_, Result<()>> {
        self.configmaps
            .lock()
            .unwrap()
            .insert(namespace.to_string(), data);
        Box::pin(async { Ok(()) })
    }

    fn delete_inventory_configmap(&self, namespace: &str, _dry_run: bool) -> BoxFuture<'_, Result<()>> {
        self.configmaps.lock().unwrap().remove(namespace);
        Box::pin(async { Ok(()) })
    }

    fn get_legacy_secret(&self, namespace: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        let payload = self.legacy_secrets.lock().unwrap().get(namespace).cloned();
        Box::pin(async move { Ok(payload) })
    }

    fn delete_legacy_secret(&self, namespace: &str) -> BoxFuture<'_, Result<()>> {
        self.legacy_secrets.lock().unwrap().remove(namespace);
        Box::pin(async { Ok(()) })
    }

    fn resolve_scope(
        &self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> BoxFuture<'_, Result<Option<bool>>> {
        let answer = self
            .scopes
            .lock()
            .unwrap()
            .get(&format!("{group}/{version}/{kind}"))
            .copied();
        Box::pin(async move { Ok(answer) })
    }
}
