//! Docker image reference parsing and the semver-tolerant tag check used by the Deploy mutator
//! (§4.4).

use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// A parsed `image` field: `name[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Repository name, including any registry host.
    pub name: String,
    /// Tag, defaulted to `latest` when neither tag nor digest is present.
    pub tag: Option<String>,
    /// Content digest, e.g. `sha256:...`.
    pub digest: Option<String>,
}

/// Parses a container `image` string into name/tag/digest per Docker reference rules.
///
/// If neither a tag nor a digest is present, the tag defaults to `latest`. A failure to parse is
/// fatal for the object (§4.4 "Image parsing failure").
pub fn parse_image_reference(image: &str) -> Result<ImageReference> {
    if image.is_empty() {
        return Err(Error::MalformedImageReference("empty image reference".into()));
    }

    let (name_and_tag, digest) = match image.split_once('@') {
        Some((n, d)) => (n, Some(d.to_string())),
        None => (image, None),
    };

    let last_slash = name_and_tag.rfind('/');
    let last_colon = name_and_tag.rfind(':');
    let (name, tag) = match (last_colon, last_slash) {
        // A colon after the last slash delimits a tag, not a registry port.
        (Some(c), Some(s)) if c > s => (
            &name_and_tag[..c],
            Some(name_and_tag[c + 1..].to_string()),
        ),
        (Some(c), None) => (&name_and_tag[..c], Some(name_and_tag[c + 1..].to_string())),
        _ => (name_and_tag, None),
    };

    if name.is_empty() {
        return Err(Error::MalformedImageReference(format!(
            "missing repository name in {image:?}"
        )));
    }

    let tag = if tag.is_none() && digest.is_none() {
        Some("latest".to_string())
    } else {
        tag
    };

    Ok(ImageReference {
        name: name.to_string(),
        tag,
        digest,
    })
}

/// A tolerant semver grammar: `1`, `1.2`, `1.2.3`, with optional `-prerelease` and `+build`
/// metadata (§4.4 "tag-is-semver check").
static SEMVER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[vV]?\d+(\.\d+)?(\.\d+)?(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$")
        .expect("static regex is valid")
});

/// Reports whether `tag` looks like a semantic version, per the tolerant grammar above.
pub fn is_semver_like(tag: &str) -> bool {
    SEMVER_LIKE.is_match(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_tag_to_latest() {
        let r = parse_image_reference("busybox").unwrap();
        assert_eq!(r.tag.as_deref(), Some("latest"));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn parses_tag() {
        let r = parse_image_reference("busybox:1.36").unwrap();
        assert_eq!(r.name, "busybox");
        assert_eq!(r.tag.as_deref(), Some("1.36"));
    }

    #[test]
    fn parses_digest_without_defaulting_tag() {
        let r = parse_image_reference("busybox@sha256:deadbeef").unwrap();
        assert_eq!(r.name, "busybox");
        assert_eq!(r.tag, None);
        assert_eq!(r.digest.as_deref(), Some("sha256:deadbeef"));
    }

    #[test]
    fn registry_port_is_not_mistaken_for_a_tag() {
        let r = parse_image_reference("registry.local:5000/team/app").unwrap();
        assert_eq!(r.name, "registry.local:5000/team/app");
        assert_eq!(r.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn registry_port_with_explicit_tag() {
        let r = parse_image_reference("registry.local:5000/team/app:1.2.3").unwrap();
        assert_eq!(r.name, "registry.local:5000/team/app");
        assert_eq!(r.tag.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn empty_image_is_malformed() {
        assert!(parse_image_reference("").is_err());
    }

    #[test]
    fn semver_like_accepts_tolerant_forms() {
        for tag in ["1", "1.2", "1.2.3", "1.2.3-rc.1", "1.2.3+build.5", "v1.2.3"] {
            assert!(is_semver_like(tag), "{tag}");
        }
    }

    #[test]
    fn semver_like_rejects_non_semver_tags() {
        for tag in ["latest", "main", "stable-2024", ""] {
            assert!(!is_semver_like(tag), "{tag}");
        }
    }
}
