//! Cluster I/O is treated as a typed client interface, not reimplemented here. This module
//! defines the seams the core pipeline talks through — [`Getter`], [`ClusterClient`], and
//! [`InventoryBackend`] — plus a boxed-future helper so trait objects can be passed into
//! mutators and the driver without pulling in an extra async-trait macro dependency.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use mlp_types::{Object, ObjectId};

use crate::Result;

/// A boxed, `Send` future, the object-safe shape our traits return.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only lookup of an object by id. This is the "supplied getter" the Deploy mutator and the
/// deploy-once filter use (§4.4, §4.6).
pub trait Getter: Send + Sync {
    /// Fetches the live object, or `None` if it does not exist.
    fn get(&self, id: &ObjectId) -> BoxFuture<'_, Result<Option<Object>>>;
}

/// The cluster-facing operations the driver and pruner need beyond plain lookup.
pub trait ClusterClient: Getter {
    /// Deletes the object. A not-found response is success (§4.7 step 10).
    fn delete(&self, id: &ObjectId, dry_run: bool) -> BoxFuture<'_, Result<()>>;

    /// Applies a Namespace object for `name` with the project's field manager (§4.7 step 4).
    fn apply_namespace(&self, name: &str, dry_run: bool) -> BoxFuture<'_, Result<()>>;

    /// Resolves the API scope for discovery needed by legacy-inventory migration: `Some(true)`
    /// for namespaced, `Some(false)` for cluster-scoped, `None` if the kind can't be resolved.
    fn resolve_scope(
        &self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> BoxFuture<'_, Result<Option<bool>>>;
}

/// The narrow ConfigMap/Secret surface the inventory store needs (§4.2).
pub trait InventoryBackend: Send + Sync {
    /// Reads the new-format inventory ConfigMap's data map, if the ConfigMap exists.
    fn get_inventory_configmap(
        &self,
        namespace: &str,
    ) -> BoxFuture<'_, Result<Option<BTreeMap<String, String>>>>;

    /// Server-side-applies the new-format inventory ConfigMap with the given data.
    fn apply_inventory_configmap(
        &self,
        namespace: &str,
        data: BTreeMap<String, String>,
        dry_run: bool,
    ) -> BoxFuture<'_, Result<()>>;

    /// Deletes the new-format inventory ConfigMap. Not-found is success.
    fn delete_inventory_configmap(&self, namespace: &str, dry_run: bool) -> BoxFuture<'_, Result<()>>;

    /// Reads the legacy inventory Secret's `resources` key, if the Secret exists.
    fn get_legacy_secret(&self, namespace: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>>>;

    /// Deletes the legacy inventory Secret. Not-found is success.
    fn delete_legacy_secret(&self, namespace: &str) -> BoxFuture<'_, Result<()>>;

    /// Resolves whether `kind` is namespaced, for translating legacy entries to ObjectIds.
    fn resolve_scope(
        &self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> BoxFuture<'_, Result<Option<bool>>>;
}
