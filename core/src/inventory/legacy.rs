//! Decoding of the legacy inventory secret payload (§4.2 Load, §6 "Legacy inventory secret
//! layout"): the v1 encoding keys each kind's entry with a `kind: {Group, Version, Kind}` object;
//! the older v0 encoding instead carries a bare `kind` string plus a separate `Mapping:
//! {Group, Version, Resource}` object. Both list affected object names under `resources`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{Error, Result};

/// One decoded legacy entry: a GVK plus a name, not yet resolved to an [`mlp_types::ObjectId`]
/// (that requires a discovery round-trip the caller performs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEntry {
    /// API group, empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Kind.
    pub kind: String,
    /// Object name.
    pub name: String,
}

#[derive(Deserialize)]
struct V1Gvk {
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Kind")]
    kind: String,
}

#[derive(Deserialize)]
struct V1Entry {
    kind: V1Gvk,
    resources: Vec<String>,
}

#[derive(Deserialize)]
struct V0Gvr {
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Resource")]
    #[allow(dead_code)]
    resource: String,
}

#[derive(Deserialize)]
struct V0Entry {
    kind: String,
    #[serde(rename = "Mapping")]
    mapping: V0Gvr,
    resources: Vec<String>,
}

/// Decodes a legacy inventory secret payload, trying the v1 shape first and falling back to v0.
pub fn decode(payload: &[u8]) -> Result<Vec<LegacyEntry>> {
    if let Ok(v1) = serde_json::from_slice::<BTreeMap<String, V1Entry>>(payload) {
        return Ok(v1
            .into_values()
            .flat_map(|entry| {
                let gvk = entry.kind;
                entry.resources.into_iter().map(move |name| LegacyEntry {
                    group: gvk.group.clone(),
                    version: gvk.version.clone(),
                    kind: gvk.kind.clone(),
                    name,
                })
            })
            .collect());
    }

    let v0 = serde_json::from_slice::<BTreeMap<String, V0Entry>>(payload).map_err(|e| {
        Error::LegacyInventory(format!("payload matched neither v1 nor v0 shape: {e}"))
    })?;

    Ok(v0
        .into_values()
        .flat_map(|entry| {
            let group = entry.mapping.group;
            let version = entry.mapping.version;
            let kind = entry.kind;
            entry.resources.into_iter().map(move |name| LegacyEntry {
                group: group.clone(),
                version: version.clone(),
                kind: kind.clone(),
                name,
            })
        })
        .collect())
}
