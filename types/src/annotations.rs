//! Well-known annotation/label names and values consumed or produced by the pipeline (§6).

/// Sort override: comma-separated list of kinds this object must apply before (§4.1).
pub const APPLY_BEFORE_KINDS: &str = "mia-platform.eu/apply-before-kinds";

/// Marks a CronJob as wanting an immediate Job created alongside it (§4.8).
pub const AUTOCREATE: &str = "mia-platform.eu/autocreate";

/// Deploy-once marker key; see [`DEPLOY_TYPE_ONCE`] for the value the filter acts on (§4.6).
pub const DEPLOY_TYPE: &str = "mia-platform.eu/deploy-type";

/// The value of [`DEPLOY_TYPE`] that makes the deploy-once filter eligible to drop an object.
pub const DEPLOY_TYPE_ONCE: &str = "once";

/// Dependencies mutator output: digest of the configmaps/secrets a workload mounts (§4.3).
pub const DEPENDENCIES_CHECKSUM: &str = "mia-platform.eu/dependencies-checksum";

/// Deploy mutator output: forces a rollout when set to a fresh value (§4.4).
pub const DEPLOY_CHECKSUM: &str = "mia-platform.eu/deploy-checksum";

/// ExternalSecrets mutator output: comma-separated ObjectID edges the applier treats as an
/// explicit apply-ordering dependency (§4.5).
pub const DEPENDS_ON: &str = "mia-platform.eu/depends-on";

/// Standard label the pruner requires before it will delete an object (§4.7 step 10).
pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// The value this project writes into [`MANAGED_BY`] and checks for on prune.
pub const MANAGED_BY_VALUE: &str = "mlp";

/// Server-side-apply field manager identity used throughout the pipeline.
pub const FIELD_MANAGER: &str = "mlp";

/// Annotation the generated Job carries so the cluster treats it as a manual CronJob run.
pub const CRONJOB_INSTANTIATE: &str = "cronjob.kubernetes.io/instantiate";

/// The value written into [`CRONJOB_INSTANTIATE`].
pub const CRONJOB_INSTANTIATE_MANUAL: &str = "manual";

/// Deprecated await-completion annotation (§9); recognized only so callers can warn about it.
pub const AWAIT_COMPLETION_DEPRECATED: &str = "mia-platform.eu/await-completion";

/// Name of the new-format inventory ConfigMap.
pub const INVENTORY_CONFIGMAP_NAME: &str = "eu.mia-platform.mlp";

/// Name of the legacy inventory Secret.
pub const LEGACY_INVENTORY_SECRET_NAME: &str = "resources-deployed";

/// Key inside the legacy inventory Secret holding the JSON payload.
pub const LEGACY_INVENTORY_SECRET_KEY: &str = "resources";
