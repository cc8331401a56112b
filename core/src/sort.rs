//! Sort (§4.1): reorders a batch of objects by kind, using a fixed priority list with a
//! per-object override annotation.

use mlp_types::{annotations::APPLY_BEFORE_KINDS, Object};

/// The fixed kind-priority list. Position determines apply order; objects whose kind isn't
/// listed sort after every listed kind.
pub const PRIORITY_ORDER: &[&str] = &[
    "Namespace",
    "NetworkPolicy",
    "ResourceQuota",
    "LimitRange",
    "PodSecurityPolicy",
    "PodDisruptionBudget",
    "ServiceAccount",
    "ClusterRole",
    "ClusterRoleBinding",
    "Role",
    "RoleBinding",
    "StorageClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "SecretStore",
    "ExternalSecret",
    "Secret",
    "ConfigMap",
    "CustomResourceDefinition",
    "Service",
    "DaemonSet",
    "Pod",
    "Deployment",
    "StatefulSet",
    "Job",
    "CronJob",
    "Ingress",
];

fn priority_index(kind: &str) -> Option<usize> {
    PRIORITY_ORDER.iter().position(|k| *k == kind)
}

#[derive(Clone, Debug, PartialEq)]
enum SortKey {
    /// Known kind (or override), ordered by the float priority value.
    Known(f64),
    /// Unknown kind with no usable override; ordered alphabetically by kind name.
    Unknown(String),
}

fn effective_key(obj: &Object) -> SortKey {
    let kind = obj.kind().unwrap_or("").to_string();

    if let Some(list) = obj.annotation(APPLY_BEFORE_KINDS) {
        let min = list
            .split(',')
            .map(str::trim)
            .filter_map(priority_index)
            .min();
        if let Some(min) = min {
            return SortKey::Known(min as f64 - 0.5);
        }
    }

    match priority_index(&kind) {
        Some(i) => SortKey::Known(i as f64),
        None => SortKey::Unknown(kind),
    }
}

fn cmp_key(a: &SortKey, b: &SortKey) -> std::cmp::Ordering {
    use std::cmp::Ordering::*;
    use SortKey::*;
    match (a, b) {
        (Known(x), Known(y)) => x.partial_cmp(y).unwrap_or(Equal),
        (Known(_), Unknown(_)) => Less,
        (Unknown(_), Known(_)) => Greater,
        (Unknown(x), Unknown(y)) => x.cmp(y),
    }
}

/// A string bucket key shared by every object at the same effective priority, so sorted output
/// can be chunked into apply-concurrently groups (§4.7 step 7 / §5 "concurrent within a bucket").
/// Consecutive objects sharing a bucket key are exactly the objects [`sort_objects`] left
/// adjacent and unordered relative to each other.
pub fn bucket_key(obj: &Object) -> String {
    match effective_key(obj) {
        SortKey::Known(v) => format!("k:{v}"),
        SortKey::Unknown(k) => format!("u:{k}"),
    }
}

/// Stably reorders `objects` by kind priority, honoring the `apply-before-kinds` override.
///
/// Ties (equal effective priority) preserve input order, since [`slice::sort_by`] is stable.
pub fn sort_objects(mut objects: Vec<Object>) -> Vec<Object> {
    let keys: Vec<SortKey> = objects.iter().map(effective_key).collect();
    let mut indexed: Vec<usize> = (0..objects.len()).collect();
    indexed.sort_by(|&a, &b| cmp_key(&keys[a], &keys[b]));

    // Stable-permute `objects` according to `indexed`, preserving the elements while reordering.
    let mut out = Vec::with_capacity(objects.len());
    let mut taken = vec![false; objects.len()];
    for &i in &indexed {
        taken[i] = true;
    }
    debug_assert!(taken.iter().all(|&t| t));
    let mut slots: Vec<Option<Object>> = objects.drain(..).map(Some).collect();
    for i in indexed {
        out.push(slots[i].take().expect("each index taken exactly once"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(kind: &str, name: &str) -> Object {
        Object::new(json!({
            "apiVersion": "v1",
            "kind": kind,
            "metadata": {"name": name},
        }))
    }

    fn obj_with_override(kind: &str, name: &str, before: &str) -> Object {
        Object::new(json!({
            "apiVersion": "v1",
            "kind": kind,
            "metadata": {
                "name": name,
                "annotations": { APPLY_BEFORE_KINDS: before },
            },
        }))
    }

    fn names(objs: &[Object]) -> Vec<&str> {
        objs.iter().map(|o| o.name().unwrap()).collect()
    }

    #[test]
    fn sorts_by_priority() {
        let input = vec![obj("Deployment", "d"), obj("Namespace", "n"), obj("Secret", "s")];
        let sorted = sort_objects(input);
        assert_eq!(names(&sorted), vec!["n", "s", "d"]);
    }

    #[test]
    fn ties_preserve_input_order() {
        let input = vec![obj("ConfigMap", "a"), obj("ConfigMap", "b"), obj("ConfigMap", "c")];
        let sorted = sort_objects(input);
        assert_eq!(names(&sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn override_sorts_before_earliest_listed_kind() {
        // Job normally sorts after ConfigMap; override makes it apply before ConfigMap.
        let input = vec![
            obj("ConfigMap", "cm"),
            obj_with_override("Job", "j", "ConfigMap"),
        ];
        let sorted = sort_objects(input);
        assert_eq!(names(&sorted), vec!["j", "cm"]);
    }

    #[test]
    fn override_ignores_unknown_kinds_in_list() {
        let input = vec![
            obj("ConfigMap", "cm"),
            obj_with_override("Job", "j", "Frobnicator,ConfigMap"),
        ];
        let sorted = sort_objects(input);
        assert_eq!(names(&sorted), vec!["j", "cm"]);
    }

    #[test]
    fn unknown_kinds_sort_after_known_and_alphabetically() {
        let input = vec![
            obj("Zork", "z"),
            obj("Namespace", "n"),
            obj("Anvil", "a"),
        ];
        let sorted = sort_objects(input);
        assert_eq!(names(&sorted), vec!["n", "a", "z"]);
    }
}
