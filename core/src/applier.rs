//! The applier (§4.7 step 6-8): runs the mutator chain and deploy-once filter over each object,
//! submits survivors to the cluster with server-side apply, and streams progress events. Buckets
//! of objects at the same sort priority are applied concurrently; buckets themselves run in
//! sequence, matching the sort order the driver already established.

use std::collections::BTreeSet;

use futures::future::join_all;
use mlp_types::{Object, ObjectId};
use tokio::sync::mpsc;

use crate::client::{BoxFuture, Getter};
use crate::filter::should_drop;
use crate::generator::generate_job;
use crate::mutators::{run_pipeline, Mutator};
use crate::sort::bucket_key;
use crate::{Error, Result};

/// A step in one object's progression through the applier's state machine (§4.7 "State machine
/// per object").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyPhase {
    /// Read from the sorted input, not yet mutated.
    Pending,
    /// The mutator chain has run.
    Mutated,
    /// Dropped by the deploy-once filter.
    Filtered,
    /// Submitted to the cluster successfully.
    Applied,
    /// A fatal error occurred at this object's step.
    Failed,
}

/// One progress notification the applier emits per object per phase transition.
#[derive(Clone, Debug)]
pub struct ApplyEvent {
    /// The object this event describes.
    pub object_id: ObjectId,
    /// The phase the object just entered.
    pub phase: ApplyPhase,
    /// A human-readable detail, set on `Failed` and `Filtered`.
    pub message: Option<String>,
}

/// The cluster-submission seam: everything below the mutator/filter/generator pipeline. The
/// default implementation talks to a real cluster via server-side apply; tests substitute an
/// in-memory recorder.
pub trait Applier: Send + Sync {
    /// Submits `obj` to the cluster with the project's field-manager identity.
    fn apply(&self, obj: &Object, dry_run: bool) -> BoxFuture<'_, Result<()>>;
}

/// Runs the full per-object pipeline (mutate → filter → generate companion Job → apply) over
/// `sorted`, honoring bucket concurrency, and reports progress on `events`.
///
/// Returns the set of ObjectIDs that were actually submitted (for inventory `SetObjects`).
pub async fn run(
    sorted: Vec<Object>,
    mutators: &[Box<dyn Mutator>],
    getter: &dyn Getter,
    applier: &dyn Applier,
    dry_run: bool,
    events: mpsc::Sender<ApplyEvent>,
) -> Result<BTreeSet<ObjectId>> {
    let mut submitted = BTreeSet::new();

    for bucket in chunk_by_bucket(sorted) {
        let results = join_all(bucket.into_iter().map(|obj| {
            let events = events.clone();
            async move {
                apply_one(obj, mutators, getter, applier, dry_run, &events).await
            }
        }))
        .await;

        for result in results {
            let (id, job) = result?;
            submitted.insert(id);
            if let Some(job) = job {
                apply_job(&job, applier, dry_run, &events).await?;
                submitted.insert(job.id()?);
            }
        }
    }

    Ok(submitted)
}

async fn apply_one(
    mut obj: Object,
    mutators: &[Box<dyn Mutator>],
    getter: &dyn Getter,
    applier: &dyn Applier,
    dry_run: bool,
    events: &mpsc::Sender<ApplyEvent>,
) -> Result<(ObjectId, Option<Object>)> {
    let id = obj.id()?;
    send(events, &id, ApplyPhase::Pending, None).await;

    if let Err(e) = run_pipeline(mutators, &mut obj, getter).await {
        send(events, &id, ApplyPhase::Failed, Some(e.to_string())).await;
        return Err(e);
    }
    send(events, &id, ApplyPhase::Mutated, None).await;

    match should_drop(&obj, getter).await {
        Ok(true) => {
            send(events, &id, ApplyPhase::Filtered, None).await;
            return Ok((id, None));
        }
        Ok(false) => {}
        Err(e) => {
            send(events, &id, ApplyPhase::Failed, Some(e.to_string())).await;
            return Err(e);
        }
    }

    let job = if obj.kind()? == "CronJob" {
        let previous = getter.get(&id).await?;
        generate_job(&obj, previous.as_ref())?
    } else {
        None
    };

    if let Err(e) = applier.apply(&obj, dry_run).await {
        send(events, &id, ApplyPhase::Failed, Some(e.to_string())).await;
        return Err(e);
    }
    send(events, &id, ApplyPhase::Applied, None).await;

    Ok((id, job))
}

async fn apply_job(
    job: &Object,
    applier: &dyn Applier,
    dry_run: bool,
    events: &mpsc::Sender<ApplyEvent>,
) -> Result<()> {
    let id = job.id().unwrap_or_else(|_| ObjectId::new("", "Job", job.namespace(), ""));
    send(events, &id, ApplyPhase::Pending, None).await;
    if let Err(e) = applier.apply(job, dry_run).await {
        send(events, &id, ApplyPhase::Failed, Some(e.to_string())).await;
        return Err(e);
    }
    send(events, &id, ApplyPhase::Applied, None).await;
    Ok(())
}

async fn send(events: &mpsc::Sender<ApplyEvent>, id: &ObjectId, phase: ApplyPhase, message: Option<String>) {
    let _ = events
        .send(ApplyEvent {
            object_id: id.clone(),
            phase,
            message,
        })
        .await;
}

fn chunk_by_bucket(sorted: Vec<Object>) -> Vec<Vec<Object>> {
    let mut buckets: Vec<Vec<Object>> = Vec::new();
    let mut current_key: Option<String> = None;
    for obj in sorted {
        let key = bucket_key(&obj);
        if current_key.as_deref() != Some(key.as_str()) {
            buckets.push(Vec::new());
            current_key = Some(key);
        }
        buckets.last_mut().expect("just pushed").push(obj);
    }
    buckets
}

/// A `kube`-backed [`Applier`]: server-side apply with this project's field-manager identity.
pub struct KubeApplier {
    client: kube::Client,
}

impl KubeApplier {
    /// Wraps a live `kube::Client`.
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

impl Applier for KubeApplier {
    fn apply(&self, obj: &Object, dry_run: bool) -> BoxFuture<'_, Result<()>> {
        use kube::api::{DynamicObject, Patch, PatchParams};
        use kube::core::{ApiResource, GroupVersionKind};

        let value = obj.as_value().clone();
        let wrapped = Object::new(value.clone());
        Box::pin(async move {
            let dynamic: DynamicObject = serde_json::from_value(value).map_err(Error::Json)?;
            let (group, version) = wrapped.group_version()?;
            let kind = wrapped.kind()?.to_string();
            let ar = ApiResource::from_gvk(&GroupVersionKind::gvk(&group, &version, &kind));

            let name = dynamic
                .metadata
                .name
                .clone()
                .ok_or_else(|| Error::InvalidInput("missing metadata.name".into()))?;

            let api: kube::Api<DynamicObject> = match dynamic.metadata.namespace.as_deref() {
                Some(ns) => kube::Api::namespaced_with(self.client.clone(), ns, &ar),
                None => kube::Api::all_with(self.client.clone(), &ar),
            };

            let mut params = PatchParams::apply(mlp_types::annotations::FIELD_MANAGER).force();
            params.dry_run = dry_run;
            api.patch(&name, &params, &Patch::Apply(&dynamic)).await?;
            Ok(())
        })
    }
}
