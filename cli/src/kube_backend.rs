//! The real cluster-facing implementation of `mlp_core`'s trait boundary: a `kube::Client` plus a
//! one-shot API discovery cache, so lookups only need group+kind (the core crate deliberately
//! drops version from [`mlp_types::ObjectId`]).

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::api::{Api, DeleteParams, DynamicObject, ObjectMeta, Patch, PatchParams};
use kube::core::ApiResource;
use kube::discovery::{Discovery, Scope};
use mlp_core::client::{BoxFuture, ClusterClient, Getter, InventoryBackend};
use mlp_core::{Error, Result};
use mlp_types::{annotations, Object, ObjectId};

fn not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

/// Resolves `(group, kind)` to an [`ApiResource`] plus its scope, via one discovery pass taken at
/// startup. `mlp_core` never needs to know this; it only deals in group/kind/namespace/name.
pub struct KubeBackend {
    client: kube::Client,
    namespace: String,
    discovery: Discovery,
}

impl KubeBackend {
    /// Runs discovery once and wraps the client for the given target namespace.
    pub async fn new(client: kube::Client, namespace: impl Into<String>) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await.map_err(Error::Kube)?;
        Ok(Self {
            client,
            namespace: namespace.into(),
            discovery,
        })
    }

    fn resource_for(&self, group: &str, kind: &str) -> Option<(ApiResource, Scope)> {
        for g in self.discovery.groups() {
            if g.name() != group {
                continue;
            }
            for (ar, caps) in g.resources_by_stability() {
                if ar.kind == kind {
                    return Some((ar, caps.scope.clone()));
                }
            }
        }
        None
    }

    fn dynamic_api(&self, ar: &ApiResource, scope: &Scope) -> Api<DynamicObject> {
        match scope {
            Scope::Namespaced => Api::namespaced_with(self.client.clone(), &self.namespace, ar),
            Scope::Cluster => Api::all_with(self.client.clone(), ar),
        }
    }
}

impl Getter for KubeBackend {
    fn get(&self, id: &ObjectId) -> BoxFuture<'_, Result<Option<Object>>> {
        let id = id.clone();
        Box::pin(async move {
            let Some((ar, scope)) = self.resource_for(&id.group, &id.kind) else {
                return Ok(None);
            };
            let api = self.dynamic_api(&ar, &scope);
            match api.get(&id.name).await {
                Ok(obj) => Ok(Some(Object::new(serde_json::to_value(obj)?))),
                Err(e) if not_found(&e) => Ok(None),
                Err(e) => Err(Error::Kube(e)),
            }
        })
    }
}

impl ClusterClient for KubeBackend {
    fn delete(&self, id: &ObjectId, dry_run: bool) -> BoxFuture<'_, Result<()>> {
        let id = id.clone();
        Box::pin(async move {
            let Some((ar, scope)) = self.resource_for(&id.group, &id.kind) else {
                return Ok(());
            };
            let api = self.dynamic_api(&ar, &scope);
            let params = DeleteParams { dry_run, ..Default::default() };
            match api.delete(&id.name, &params).await {
                Ok(_) => Ok(()),
                Err(e) if not_found(&e) => Ok(()),
                Err(e) => Err(Error::Kube(e)),
            }
        })
    }

    fn apply_namespace(&self, name: &str, dry_run: bool) -> BoxFuture<'_, Result<()>> {
        let name = name.to_string();
        Box::pin(async move {
            let api: Api<Namespace> = Api::all(self.client.clone());
            let ns = Namespace {
                metadata: ObjectMeta {
                    name: Some(name.clone()),
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut params = PatchParams::apply(annotations::FIELD_MANAGER).force();
            params.dry_run = dry_run;
            api.patch(&name, &params, &Patch::Apply(&ns)).await.map_err(Error::Kube)?;
            Ok(())
        })
    }

    fn resolve_scope(&self, group: &str, _version: &str, kind: &str) -> BoxFuture<'_, Result<Option<bool>>> {
        let answer = self
            .resource_for(group, kind)
            .map(|(_, scope)| matches!(scope, Scope::Namespaced));
        Box::pin(async move { Ok(answer) })
    }
}

fn data_to_strings(data: Option<BTreeMap<String, String>>) -> BTreeMap<String, String> {
    data.unwrap_or_default()
}

impl InventoryBackend for KubeBackend {
    fn get_inventory_configmap(&self, namespace: &str) -> BoxFuture<'_, Result<Option<BTreeMap<String, String>>>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
            match api.get(annotations::INVENTORY_CONFIGMAP_NAME).await {
                Ok(cm) => Ok(Some(data_to_strings(cm.data))),
                Err(e) if not_found(&e) => Ok(None),
                Err(e) => Err(Error::Kube(e)),
            }
        })
    }

    fn apply_inventory_configmap(
        &self,
        namespace: &str,
        data: BTreeMap<String, String>,
        dry_run: bool,
    ) -> BoxFuture<'_, Result<()>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
            let cm = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(annotations::INVENTORY_CONFIGMAP_NAME.to_string()),
                    namespace: Some(namespace.clone()),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            };
            let mut params = PatchParams::apply(annotations::FIELD_MANAGER).force();
            params.dry_run = dry_run;
            api.patch(annotations::INVENTORY_CONFIGMAP_NAME, &params, &Patch::Apply(&cm))
                .await
                .map_err(Error::Kube)?;
            Ok(())
        })
    }

    fn delete_inventory_configmap(&self, namespace: &str, dry_run: bool) -> BoxFuture<'_, Result<()>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &namespace);
            let params = DeleteParams { dry_run, ..Default::default() };
            match api.delete(annotations::INVENTORY_CONFIGMAP_NAME, &params).await {
                Ok(_) => Ok(()),
                Err(e) if not_found(&e) => Ok(()),
                Err(e) => Err(Error::Kube(e)),
            }
        })
    }

    fn get_legacy_secret(&self, namespace: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
            match api.get(annotations::LEGACY_INVENTORY_SECRET_NAME).await {
                Ok(secret) => Ok(secret
                    .data
                    .and_then(|mut d| d.remove(annotations::LEGACY_INVENTORY_SECRET_KEY))
                    .map(|b| b.0)),
                Err(e) if not_found(&e) => Ok(None),
                Err(e) => Err(Error::Kube(e)),
            }
        })
    }

    fn delete_legacy_secret(&self, namespace: &str) -> BoxFuture<'_, Result<()>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
            match api.delete(annotations::LEGACY_INVENTORY_SECRET_NAME, &DeleteParams::default()).await {
                Ok(_) => Ok(()),
                Err(e) if not_found(&e) => Ok(()),
                Err(e) => Err(Error::Kube(e)),
            }
        })
    }

    fn resolve_scope(&self, group: &str, version: &str, kind: &str) -> BoxFuture<'_, Result<Option<bool>>> {
        ClusterClient::resolve_scope(self, group, version, kind)
    }
}

