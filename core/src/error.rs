//! Error is the core crate's error type, covering every fatal condition named in the error
//! handling design (input, discovery, mutator, filter, apply, and inventory errors).

/// Error is the error type returned by the deploy pipeline.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Kube is a generic error from the `kube` crate.
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
    /// Io indicates some OS-level I/O error (reading a manifest file or stdin).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Json indicates a JSON serialization/deserialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Yaml indicates a YAML serialization/deserialization failure.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Manifest indicates a typed-accessor read/write against a manifest document failed.
    #[error("manifest error: {0}")]
    Manifest(#[from] mlp_types::ManifestError),
    /// UnsupportedKind indicates a mutator was asked to handle a kind it declined.
    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),
    /// MalformedPodSpec indicates the pod-spec path did not hold a shape the mutator could walk.
    #[error("malformed pod spec: {0}")]
    MalformedPodSpec(String),
    /// MalformedImageReference indicates a container's `image` field failed to parse.
    #[error("malformed image reference: {0}")]
    MalformedImageReference(String),
    /// DuplicateObject indicates the same ObjectID appeared twice in one input batch.
    #[error("duplicate object in input batch: {0}")]
    DuplicateObject(String),
    /// MissingNamespace indicates a namespaced object arrived without namespace metadata and no
    /// target namespace could be inferred.
    #[error("missing namespace for {0}")]
    MissingNamespace(String),
    /// LegacyInventory indicates the legacy inventory secret's payload could not be decoded in
    /// either the v1 or v0 shape.
    #[error("legacy inventory decode error: {0}")]
    LegacyInventory(String),
    /// InvalidManifestPath indicates an input path could not be read (missing file, bad stdin
    /// mix, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Cancelled indicates the run's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// Other is a catch-all for errors that don't warrant a dedicated variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result typedef for the deploy pipeline.
pub type Result<T, E = Error> = std::result::Result<T, E>;
