//! CronJob → Job generation (§4.8): when a CronJob carries the autocreate annotation, the applier
//! submits a companion Job alongside it instead of in place of it.

use mlp_types::{annotations, Object};
use serde_json::{json, Value};

use crate::Result;

/// Materializes a Job from `cronjob`'s `jobTemplate`, or `None` if generation doesn't apply:
/// the CronJob lacks the autocreate annotation, or its last-applied configuration (`previous`)
/// already matches the current one.
pub fn generate_job(cronjob: &Object, previous: Option<&Object>) -> Result<Option<Object>> {
    if cronjob.annotation(annotations::AUTOCREATE) != Some("true") {
        return Ok(None);
    }

    if let Some(previous) = previous {
        if job_template(cronjob)? == job_template(previous)? {
            return Ok(None);
        }
    }

    let template = cronjob
        .map_at(&["spec", "jobTemplate"])
        .cloned()
        .unwrap_or_default();
    let job_spec = template.get("spec").cloned().unwrap_or(Value::Null);
    let labels = template
        .get("metadata")
        .and_then(|m| m.get("labels"))
        .cloned()
        .unwrap_or(Value::Null);

    let name = cronjob.name()?;
    Ok(Some(Object::new(json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "generateName": format!("{name}-"),
            "namespace": cronjob.namespace(),
            "labels": labels,
            "annotations": {
                annotations::CRONJOB_INSTANTIATE: annotations::CRONJOB_INSTANTIATE_MANUAL,
            },
        },
        "spec": job_spec,
    }))))
}

fn job_template(cronjob: &Object) -> Result<Value> {
    Ok(cronjob
        .map_at(&["spec", "jobTemplate"])
        .cloned()
        .unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cronjob(autocreate: bool, schedule: &str) -> Object {
        let mut annotations = json!({});
        if autocreate {
            annotations["mia-platform.eu/autocreate"] = json!("true");
        }
        Object::new(json!({
            "apiVersion": "batch/v1",
            "kind": "CronJob",
            "metadata": {"name": "nightly", "namespace": "ns", "annotations": annotations},
            "spec": {
                "schedule": schedule,
                "jobTemplate": {
                    "metadata": {"labels": {"app": "nightly"}},
                    "spec": {"template": {"spec": {"containers": [{"name": "c", "image": "app:1.0.0"}]}}},
                },
            },
        }))
    }

    #[test]
    fn generates_job_when_autocreate_is_set() {
        let job = generate_job(&cronjob(true, "* * * * *"), None).unwrap().unwrap();
        assert_eq!(job.kind().unwrap(), "Job");
        assert_eq!(
            job.map_at(&["metadata", "generateName"]).unwrap(),
            "nightly-"
        );
        assert_eq!(
            job.annotation("cronjob.kubernetes.io/instantiate"),
            Some("manual")
        );
    }

    #[test]
    fn skips_without_autocreate_annotation() {
        assert!(generate_job(&cronjob(false, "* * * * *"), None).unwrap().is_none());
    }

    #[test]
    fn skips_when_job_template_unchanged_since_previous() {
        let previous = cronjob(true, "* * * * *");
        let current = cronjob(true, "* * * * *");
        assert!(generate_job(&current, Some(&previous)).unwrap().is_none());
    }

    #[test]
    fn regenerates_when_job_template_changed() {
        let previous = cronjob(true, "* * * * *");
        let current = cronjob(true, "*/5 * * * *");
        // Schedule lives outside jobTemplate, so this alone should not trigger regeneration...
        assert!(generate_job(&current, Some(&previous)).unwrap().is_none());

        let mut changed = cronjob(true, "* * * * *");
        changed.set_map_entry(&["spec", "jobTemplate", "spec", "template", "spec"], "containers", json!([
            {"name": "c", "image": "app:2.0.0"}
        ]));
        assert!(generate_job(&changed, Some(&previous)).unwrap().is_some());
    }
}
