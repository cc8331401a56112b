//! The PodCarrier nested-path table (§3): the subset of kinds that embed a pod template, and the
//! fixed paths at which their pod spec and pod-template annotations live.

use crate::object::ManifestError;

/// A kind that embeds a pod template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PodCarrierKind {
    /// A Deployment.
    Deployment,
    /// A DaemonSet.
    DaemonSet,
    /// A StatefulSet.
    StatefulSet,
    /// A bare Pod.
    Pod,
}

/// Returned by mutators asked to operate on a kind outside the PodCarrier set.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("unsupported kind: {0}")]
pub struct UnsupportedKind(pub String);

impl PodCarrierKind {
    /// Recognizes a PodCarrier by its `kind` string. Returns `None` for any other kind.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(Self::Deployment),
            "DaemonSet" => Some(Self::DaemonSet),
            "StatefulSet" => Some(Self::StatefulSet),
            "Pod" => Some(Self::Pod),
            _ => None,
        }
    }

    /// Parses a kind string, returning [`UnsupportedKind`] if it isn't a PodCarrier.
    pub fn require(kind: &str) -> Result<Self, UnsupportedKind> {
        Self::from_kind(kind).ok_or_else(|| UnsupportedKind(kind.to_string()))
    }

    /// The path, as document-key segments, to this kind's pod spec.
    pub fn pod_spec_path(&self) -> &'static [&'static str] {
        match self {
            Self::Deployment | Self::DaemonSet | Self::StatefulSet => {
                &["spec", "template", "spec"]
            }
            Self::Pod => &["spec"],
        }
    }

    /// The path, as document-key segments, to this kind's pod-template annotations map.
    pub fn pod_annotations_path(&self) -> &'static [&'static str] {
        match self {
            Self::Deployment | Self::DaemonSet | Self::StatefulSet => {
                &["spec", "template", "metadata", "annotations"]
            }
            Self::Pod => &["metadata", "annotations"],
        }
    }
}

impl From<UnsupportedKind> for ManifestError {
    fn from(_: UnsupportedKind) -> Self {
        ManifestError::WrongType {
            path: "kind".into(),
            expected: "a PodCarrier kind",
        }
    }
}
