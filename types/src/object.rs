//! Object is the typed-accessor layer over a schema-free manifest document.
//!
//! Manifests arrive as structured-but-schema-free documents (see the design note on dynamic
//! typing). Rather than decoding every manifest into a kind-specific struct up front, the core
//! reads documents through a small set of path-based accessors that fail with [`ManifestError`]
//! when the shape at a path doesn't match what was asked for. Mutators that need a richer view
//! (a Pod spec, a ConfigMap) convert locally, only where they need it.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ObjectId;

/// A manifest document accessed through nested-path helpers instead of a fixed schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Object(Value);

/// Errors raised while reading or writing a path inside a manifest document.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ManifestError {
    /// A required top-level field (apiVersion, kind, metadata.name, ...) was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// A field existed but held a JSON type the caller didn't expect.
    #[error("field {path} was not a {expected}")]
    WrongType {
        /// Dotted path into the document.
        path: String,
        /// Expected JSON shape, for the error message.
        expected: &'static str,
    },
}

impl Object {
    /// Wraps a decoded JSON document as an Object.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Returns the underlying JSON value, consuming self.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Splits `apiVersion` into (group, version). The core group yields an empty group string.
    pub fn group_version(&self) -> Result<(String, String), ManifestError> {
        let api_version = self
            .0
            .get("apiVersion")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("apiVersion"))?;
        Ok(match api_version.split_once('/') {
            Some((group, version)) => (group.to_string(), version.to_string()),
            None => (String::new(), api_version.to_string()),
        })
    }

    /// Returns the object's kind.
    pub fn kind(&self) -> Result<&str, ManifestError> {
        self.0
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("kind"))
    }

    /// Returns the object's name.
    pub fn name(&self) -> Result<&str, ManifestError> {
        self.0
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("metadata.name"))
    }

    /// Returns the object's namespace, or an empty string if cluster-scoped.
    pub fn namespace(&self) -> &str {
        self.0
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Computes this object's ObjectId.
    pub fn id(&self) -> Result<ObjectId, ManifestError> {
        let (group, _version) = self.group_version()?;
        let kind = self.kind()?.to_string();
        let name = self.name()?.to_string();
        Ok(ObjectId::new(group, kind, self.namespace(), name))
    }

    /// Returns the value of a single annotation, if set.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.0
            .pointer("/metadata/annotations")
            .and_then(Value::as_object)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    /// Returns the object's labels as a string map.
    pub fn labels(&self) -> BTreeMap<String, String> {
        string_map(self.0.pointer("/metadata/labels"))
    }

    /// Reads the map at `path` as a string-to-string map. An absent map is treated as empty;
    /// a present-but-wrong-shaped value is an error.
    pub fn string_map_at(&self, path: &[&str]) -> Result<BTreeMap<String, String>, ManifestError> {
        match self.value_at(path) {
            None => Ok(BTreeMap::new()),
            Some(v) if v.is_object() => Ok(string_map(Some(v))),
            Some(_) => Err(ManifestError::WrongType {
                path: path.join("/"),
                expected: "object",
            }),
        }
    }

    /// Reads the raw JSON value at `path`, if present.
    pub fn map_at(&self, path: &[&str]) -> Option<&Value> {
        self.value_at(path)
    }

    /// Sets `key` to `value` inside the object at `path`, creating intermediate mapping levels
    /// as needed. This never fails: a non-object node in the path is replaced with an object.
    pub fn set_map_entry(&mut self, path: &[&str], key: &str, value: Value) {
        let mut cur = &mut self.0;
        for seg in path {
            if !cur.is_object() {
                *cur = Value::Object(Map::new());
            }
            cur = cur
                .as_object_mut()
                .expect("just ensured object")
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
        cur.as_object_mut()
            .expect("just ensured object")
            .insert(key.to_string(), value);
    }

    fn value_at(&self, path: &[&str]) -> Option<&Value> {
        let mut cur = &self.0;
        for seg in path {
            cur = cur.as_object()?.get(*seg)?;
        }
        Some(cur)
    }
}

fn string_map(v: Option<&Value>) -> BTreeMap<String, String> {
    v.and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
