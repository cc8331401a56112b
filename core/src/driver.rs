//! The driver (§4.7): wires every other module into the ten-step pipeline a single `deploy`
//! invocation runs — load inventory, read manifests, sort, mutate, filter, apply, save, prune.

use std::io::{Read, Write};
use std::path::PathBuf;

use mlp_types::{Object, ObjectId};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::applier::{self, ApplyEvent, Applier};
use crate::checksum::DependencyChecksums;
use crate::client::{ClusterClient, InventoryBackend};
use crate::inventory::InventoryStore;
use crate::mutators::deploy::DeployMode;
use crate::mutators::{DependenciesMutator, DeployMutator, ExternalSecretsMutator, Mutator};
use crate::prune;
use crate::sort::sort_objects;
use crate::{Error, Result};

/// Kinds the driver never stamps with the target namespace when a manifest omits one; mirrors
/// [`crate::sort::PRIORITY_ORDER`]'s cluster-scoped entries plus `ClusterSecretStore`, which the
/// ExternalSecrets mutator also treats as cluster-scoped.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "Namespace",
    "ClusterRole",
    "ClusterRoleBinding",
    "StorageClass",
    "PersistentVolume",
    "PodSecurityPolicy",
    "CustomResourceDefinition",
    "ClusterSecretStore",
];

/// One `-f/--filename` argument, already classified (§6 CLI surface).
#[derive(Clone, Debug)]
pub enum InputPath {
    /// `-`: read manifests from stdin.
    Stdin,
    /// A file or directory path.
    Path(PathBuf),
}

impl InputPath {
    /// Classifies a raw CLI argument.
    pub fn parse(raw: &str) -> Self {
        if raw == "-" {
            Self::Stdin
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }
}

/// Supplies the current time for the per-run fingerprint (§4.7 step 5), swappable in tests.
pub trait Clock: Send + Sync {
    /// Returns the current time as an RFC3339 string.
    fn now_rfc3339(&self) -> String;
}

/// The real wall-clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

fn fingerprint(clock: &dyn Clock) -> String {
    let mut hasher = Sha256::new();
    hasher.update(clock.now_rfc3339().as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// The driver's parsed configuration (§4.7 Contract, §6 CLI surface).
#[derive(Clone, Debug)]
pub struct Options {
    /// The target namespace, already resolved from the client config or an explicit flag.
    pub namespace: String,
    /// `deploy_all` vs `smart_deploy` (§4.4).
    pub deploy_mode: DeployMode,
    /// `--force-deploy-when-no-semver`.
    pub force_deploy_when_no_semver: bool,
    /// `--ensure-namespace`.
    pub ensure_namespace: bool,
    /// `--dry-run`.
    pub dry_run: bool,
}

/// What one run actually did, for callers that want a summary beyond the streamed events.
#[derive(Clone, Debug, Default)]
pub struct Report {
    /// Every ObjectID submitted this run (what gets written back to the inventory).
    pub applied: std::collections::BTreeSet<ObjectId>,
    /// Every ObjectID the pruner deleted.
    pub pruned: Vec<ObjectId>,
}

/// Runs the full pipeline to completion or first fatal error (§4.7 Algorithm steps 2, 4-10).
///
/// Step 3 (reading manifests from `-f/--filename` paths) happens before this is called — see
/// [`read_inputs`] — so `batch` is already the accumulated, parsed object list and `run` itself
/// stays free of filesystem/stdin access, which keeps it testable without a temp directory.
///
/// `writer` receives one line per [`ApplyEvent`]; `cancel` is checked for the duration of the
/// apply phase, per §5's cancellation semantics — a cancelled context aborts without touching the
/// inventory or the legacy secret, so the next run observes the last successful state.
pub async fn run(
    options: &Options,
    batch: Vec<Object>,
    clock: &dyn Clock,
    cluster: &dyn ClusterClient,
    inventory_backend: &dyn InventoryBackend,
    applier: &dyn Applier,
    writer: &mut dyn Write,
    cancel: &CancellationToken,
) -> Result<Report> {
    if options.namespace.is_empty() {
        return Err(Error::MissingNamespace("target namespace".into()));
    }

    let mut inventory = InventoryStore::new(inventory_backend, &options.namespace);
    let previous = inventory.load().await?;

    let batch = stamp_namespaces(batch, &options.namespace);
    check_no_duplicates(&batch)?;

    if options.ensure_namespace {
        cluster.apply_namespace(&options.namespace, options.dry_run).await?;
    }

    let run_identifier = fingerprint(clock);
    tracing::info!(fingerprint = %run_identifier, objects = batch.len(), "starting deploy run");

    let sorted = sort_objects(batch.clone());

    let mutators: Vec<Box<dyn Mutator>> = vec![
        Box::new(DependenciesMutator::new(DependencyChecksums::build(&batch))),
        Box::new(DeployMutator::new(
            options.deploy_mode,
            options.force_deploy_when_no_semver,
            run_identifier,
        )),
        Box::new(ExternalSecretsMutator::new(&batch)),
    ];

    let (tx, mut rx) = mpsc::channel::<ApplyEvent>(32);
    let apply_fut = applier::run(sorted, &mutators, cluster, applier, options.dry_run, tx);
    tokio::pin!(apply_fut);

    let submitted = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("deploy run cancelled; inventory left untouched");
                return Err(Error::Cancelled);
            }
            result = &mut apply_fut => {
                break result?;
            }
            Some(event) = rx.recv() => {
                write_event(writer, &event)?;
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        write_event(writer, &event)?;
    }

    inventory.set_objects(submitted.clone());
    inventory.save(options.dry_run).await?;

    let pruned = prune::prune(&previous, &submitted, cluster, options.dry_run).await?;

    Ok(Report { applied: submitted, pruned })
}

fn write_event(writer: &mut dyn Write, event: &ApplyEvent) -> Result<()> {
    tracing::debug!(object = %event.object_id, phase = ?event.phase, "apply event");
    match &event.message {
        Some(msg) => writeln!(writer, "{} {:?}: {msg}", event.object_id, event.phase),
        None => writeln!(writer, "{} {:?}", event.object_id, event.phase),
    }
    .map_err(Error::Io)
}

fn stamp_namespaces(batch: Vec<Object>, namespace: &str) -> Vec<Object> {
    batch
        .into_iter()
        .map(|mut obj| {
            let kind = obj.kind().ok().unwrap_or_default().to_string();
            if obj.namespace().is_empty() && !CLUSTER_SCOPED_KINDS.contains(&kind.as_str()) {
                obj.set_map_entry(&["metadata"], "namespace", serde_json::Value::String(namespace.to_string()));
            }
            obj
        })
        .collect()
}

fn check_no_duplicates(batch: &[Object]) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for obj in batch {
        let id = obj.id()?;
        if !seen.insert(id.clone()) {
            return Err(Error::DuplicateObject(id.to_string()));
        }
    }
    Ok(())
}

/// Reads and parses every manifest from `paths` (§4.7 step 3, §6 `-f/--filename` validation).
pub fn read_inputs(paths: &[InputPath]) -> Result<Vec<Object>> {
    if paths.is_empty() {
        return Err(Error::InvalidInput("at least one --filename is required".into()));
    }
    let stdin_count = paths.iter().filter(|p| matches!(p, InputPath::Stdin)).count();
    if stdin_count > 0 && paths.len() > 1 {
        return Err(Error::InvalidInput("stdin (`-`) cannot be mixed with other paths".into()));
    }

    let mut objects = Vec::new();
    for path in paths {
        match path {
            InputPath::Stdin => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                objects.extend(parse_documents(&buf)?);
            }
            InputPath::Path(p) if p.is_dir() => {
                let mut entries: Vec<PathBuf> = std::fs::read_dir(p)?
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| {
                        p.is_file()
                            && matches!(p.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
                    })
                    .collect();
                entries.sort();
                for entry in entries {
                    objects.extend(parse_documents(&std::fs::read_to_string(&entry)?)?);
                }
            }
            InputPath::Path(p) => {
                objects.extend(parse_documents(&std::fs::read_to_string(p)?)?);
            }
        }
    }
    Ok(objects)
}

fn parse_documents(contents: &str) -> Result<Vec<Object>> {
    let mut out = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(contents) {
        let value = serde_json::Value::deserialize(doc)?;
        if value.is_null() {
            continue;
        }
        out.push(Object::new(value));
    }
    Ok(out)
}
