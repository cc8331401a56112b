//! The Deploy mutator (§4.4): smart-redeploy discipline. A rollout is only forced when the
//! mutator can prove it must be — mounted configuration changed, or at least one image tag isn't
//! comparable as semver.

use mlp_types::{annotations, Object, PodCarrierKind};

use crate::client::{BoxFuture, Getter};
use crate::image::{is_semver_like, parse_image_reference};
use crate::podwalk::collect_images;
use crate::{Error, Result};

use super::Mutator;

/// Whether the Deploy mutator should always force a fresh rollout, or only do so when it detects
/// a reason to (§4.4 "deploy_all vs smart_deploy").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeployMode {
    /// Every PodCarrier gets a fresh deploy-checksum every run.
    DeployAll,
    /// Only PodCarriers with a provable reason to roll get a fresh deploy-checksum.
    SmartDeploy,
}

/// Writes [`annotations::DEPLOY_CHECKSUM`] onto PodCarriers, following the mode's discipline.
pub struct DeployMutator {
    mode: DeployMode,
    force_no_semver: bool,
    /// The per-run identifier (§4.4 "Configuration"): the value a forced rollout's
    /// `deploy-checksum` annotation is set to, so every PodCarrier forced in the same run ends up
    /// with the same, fresh annotation value.
    identifier: String,
}

impl DeployMutator {
    /// Builds the mutator for the given mode. `force_no_semver` mirrors the
    /// `--force-deploy-when-no-semver` flag: when false, a non-semver tag never forces a rollout
    /// on its own, only a live-image diff does (§6 CLI surface). `identifier` is this run's
    /// fingerprint, stamped verbatim onto any PodCarrier a forced rollout touches.
    pub fn new(mode: DeployMode, force_no_semver: bool, identifier: impl Into<String>) -> Self {
        Self { mode, force_no_semver, identifier: identifier.into() }
    }

    /// Reports whether any image on the object has a tag that isn't semver-comparable, forcing a
    /// rollout under smart-deploy regardless of whether the live object's tags match (§4.4
    /// "force-no-semver").
    fn has_non_semver_tag(pod_spec: &serde_json::Value) -> Result<bool> {
        for image in collect_images(pod_spec)? {
            let parsed = parse_image_reference(&image)?;
            match parsed.tag {
                Some(tag) if !is_semver_like(&tag) => return Ok(true),
                None => return Ok(true), // digest pins can't be compared as versions either.
                _ => {}
            }
        }
        Ok(false)
    }
}

impl Mutator for DeployMutator {
    fn can_handle(&self, kind: &str) -> bool {
        PodCarrierKind::from_kind(kind).is_some()
    }

    fn mutate<'a>(&'a self, obj: &'a mut Object, getter: &'a dyn Getter) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let carrier = PodCarrierKind::require(obj.kind()?)
                .map_err(|_| Error::UnsupportedKind(obj.kind().unwrap_or("").to_string()))?;

            let pod_spec = obj
                .map_at(carrier.pod_spec_path())
                .cloned()
                .unwrap_or_default();

            let force = match self.mode {
                DeployMode::DeployAll => true,
                DeployMode::SmartDeploy => {
                    (self.force_no_semver && Self::has_non_semver_tag(&pod_spec)?)
                        || Self::live_images_changed(obj, getter).await?
                }
            };

            if force {
                obj.set_map_entry(
                    carrier.pod_annotations_path(),
                    annotations::DEPLOY_CHECKSUM,
                    serde_json::Value::String(self.identifier.clone()),
                );
            } else if let Some(checksum) = Self::live_deploy_checksum(obj, getter).await? {
                obj.set_map_entry(
                    carrier.pod_annotations_path(),
                    annotations::DEPLOY_CHECKSUM,
                    serde_json::Value::String(checksum),
                );
            }

            Ok(())
        })
    }
}

impl DeployMutator {
    /// Fetches the live object and compares image references container-by-container. A tag
    /// change that cannot be explained by a "newer" semver tag forces a rollout too (§4.4
    /// "image changed").
    async fn live_images_changed(obj: &Object, getter: &dyn Getter) -> Result<bool> {
        let id = obj.id()?;
        let Some(live) = getter.get(&id).await? else {
            // No live object: this is a first deploy, so the workload is already "fresh".
            return Ok(false);
        };
        let carrier = PodCarrierKind::require(obj.kind()?)
            .map_err(|_| Error::UnsupportedKind(obj.kind().unwrap_or("").to_string()))?;

        let desired_spec = obj.map_at(carrier.pod_spec_path()).cloned().unwrap_or_default();
        let live_spec = live.map_at(carrier.pod_spec_path()).cloned().unwrap_or_default();

        let desired_images = collect_images(&desired_spec)?;
        let live_images = collect_images(&live_spec)?;

        Ok(desired_images != live_images)
    }

    /// Reads the live object's `deploy-checksum` annotation, so a non-forced rollout can carry it
    /// through untouched (§4.4 "smart_deploy, force-no-semver=false": "copy the existing
    /// `deploy-checksum` annotation value through to the new object"). `None` when the remote is
    /// absent or carries no such annotation — server-side apply would otherwise strip it.
    async fn live_deploy_checksum(obj: &Object, getter: &dyn Getter) -> Result<Option<String>> {
        let id = obj.id()?;
        let Some(live) = getter.get(&id).await? else {
            return Ok(None);
        };
        let carrier = PodCarrierKind::require(obj.kind()?)
            .map_err(|_| Error::UnsupportedKind(obj.kind().unwrap_or("").to_string()))?;
        Ok(live
            .map_at(carrier.pod_annotations_path())
            .and_then(|v| v.get(annotations::DEPLOY_CHECKSUM))
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCluster, NullGetter};
    use serde_json::json;

    fn deployment(image: &str) -> Object {
        Object::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "app", "namespace": "ns"},
            "spec": {"template": {"spec": {
                "containers": [{"name": "c", "image": image}],
            }}},
        }))
    }

    fn deployment_with_checksum(image: &str, checksum: &str) -> Object {
        Object::new(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "app", "namespace": "ns"},
            "spec": {"template": {
                "metadata": {"annotations": {"mia-platform.eu/deploy-checksum": checksum}},
                "spec": {"containers": [{"name": "c", "image": image}]},
            }},
        }))
    }

    fn checksum_of(obj: &Object) -> Option<String> {
        obj.map_at(&["spec", "template", "metadata", "annotations"])
            .and_then(|v| v.get("mia-platform.eu/deploy-checksum"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn deploy_all_stamps_the_run_identifier() {
        let mutator = DeployMutator::new(DeployMode::DeployAll, false, "run-42");
        let mut dep = deployment("app:1.2.3");
        mutator.mutate(&mut dep, &NullGetter).await.unwrap();
        assert_eq!(checksum_of(&dep).as_deref(), Some("run-42"));
    }

    #[tokio::test]
    async fn smart_deploy_forces_on_non_semver_tag_when_flag_enabled() {
        let mutator = DeployMutator::new(DeployMode::SmartDeploy, true, "run-42");
        let mut dep = deployment("app:latest");
        mutator.mutate(&mut dep, &NullGetter).await.unwrap();
        assert_eq!(checksum_of(&dep).as_deref(), Some("run-42"));
    }

    #[tokio::test]
    async fn smart_deploy_ignores_non_semver_tag_when_flag_disabled() {
        let mutator = DeployMutator::new(DeployMode::SmartDeploy, false, "run-42");
        let mut dep = deployment("app:latest");
        mutator.mutate(&mut dep, &NullGetter).await.unwrap();
        assert!(checksum_of(&dep).is_none());
    }

    #[tokio::test]
    async fn smart_deploy_skips_first_deploy_with_semver_tag() {
        let mutator = DeployMutator::new(DeployMode::SmartDeploy, true, "run-42");
        let mut dep = deployment("app:1.2.3");
        mutator.mutate(&mut dep, &NullGetter).await.unwrap();
        assert!(checksum_of(&dep).is_none());
    }

    #[tokio::test]
    async fn smart_deploy_forces_when_live_image_differs() {
        let cluster = MockCluster::new();
        cluster.seed(deployment_with_checksum("app:1.2.3", "old-run"));
        let mutator = DeployMutator::new(DeployMode::SmartDeploy, true, "run-42");
        let mut dep = deployment("app:1.3.0");
        mutator.mutate(&mut dep, &cluster).await.unwrap();
        assert_eq!(checksum_of(&dep).as_deref(), Some("run-42"));
    }

    #[tokio::test]
    async fn smart_deploy_stable_when_live_image_matches() {
        let cluster = MockCluster::new();
        cluster.seed(deployment("app:1.2.3"));
        let mutator = DeployMutator::new(DeployMode::SmartDeploy, true, "run-42");
        let mut dep = deployment("app:1.2.3");
        mutator.mutate(&mut dep, &cluster).await.unwrap();
        assert!(checksum_of(&dep).is_none());
    }

    #[tokio::test]
    async fn smart_deploy_copies_through_existing_checksum_when_stable() {
        let cluster = MockCluster::new();
        cluster.seed(deployment_with_checksum("app:1.2.3", "old-run"));
        let mutator = DeployMutator::new(DeployMode::SmartDeploy, true, "run-42");
        let mut dep = deployment("app:1.2.3");
        mutator.mutate(&mut dep, &cluster).await.unwrap();
        assert_eq!(checksum_of(&dep).as_deref(), Some("old-run"));
    }
}
