//! Parsed image reference value type and canonical serialisation.

use super::{InvalidReferenceReason, ReferenceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Registry assumed when a reference names no host.
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Namespace of official images on the default registry.
pub const DEFAULT_NAMESPACE: &str = "library";

/// Tag assumed when a reference carries none.
pub const DEFAULT_TAG: &str = "latest";

/// Namespace prefix under which computed target references are placed.
pub const TARGET_NAMESPACE_PREFIX: &str = "transform";

/// Characters that mark a leading path segment as a registry host.
const REGISTRY_MARKERS: &[char] = &['.', ':'];

/// A reference decomposed into registry, namespace, repository, and tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    registry: String,
    namespace: String,
    repository: String,
    tag: String,
}

impl ImageReference {
    /// Parses a human-supplied image reference.
    ///
    /// Parsing is deterministic: identical input always yields an identical
    /// value, which keeps computed target names stable across retries.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::InvalidReference`] when the input is empty,
    /// contains characters outside `[A-Za-z0-9._/:-]`, has an empty path
    /// segment or tag, or places a `:` anywhere other than the registry host
    /// or the tag separator.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let invalid = |reason| ReferenceError::invalid(reference, reason);

        if reference.is_empty() {
            return Err(invalid(InvalidReferenceReason::Empty));
        }
        if let Some(character) = reference.chars().find(|c| !is_allowed(*c)) {
            return Err(invalid(InvalidReferenceReason::ForbiddenCharacter(
                character,
            )));
        }

        let (path, tag) = split_tag(reference);
        let tag = match tag {
            Some("") => return Err(invalid(InvalidReferenceReason::EmptyTag)),
            Some(explicit) => explicit,
            None => DEFAULT_TAG,
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid(InvalidReferenceReason::EmptySegment));
        }
        let colon_outside_host = match segments.as_slice() {
            [only] => only.contains(':'),
            [_, rest @ ..] => rest.iter().any(|segment| segment.contains(':')),
            [] => false,
        };
        if colon_outside_host {
            return Err(invalid(InvalidReferenceReason::MisplacedColon));
        }

        let (registry, namespace, repository) = match segments.as_slice() {
            [repository] => (DEFAULT_REGISTRY.to_owned(), DEFAULT_NAMESPACE.to_owned(), *repository),
            [host, repository] if looks_like_registry(host) => {
                ((*host).to_owned(), DEFAULT_NAMESPACE.to_owned(), *repository)
            }
            [namespace, repository] => {
                (DEFAULT_REGISTRY.to_owned(), (*namespace).to_owned(), *repository)
            }
            [host, middle @ .., repository] => ((*host).to_owned(), middle.join("/"), *repository),
            [] => return Err(invalid(InvalidReferenceReason::EmptySegment)),
        };

        Ok(Self {
            registry,
            namespace,
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }

    /// Returns the registry host, including any port.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Returns the namespace, which may itself contain `/`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns `true` for official images (`docker.io/library/...`).
    #[must_use]
    pub fn is_official(&self) -> bool {
        self.registry == DEFAULT_REGISTRY && self.namespace == DEFAULT_NAMESPACE
    }

    /// Serialises the reference in canonical form.
    ///
    /// The default registry is omitted whenever the shortened form parses
    /// back to the same value, and the default namespace is additionally
    /// omitted for official images. A nested or dotted namespace on the
    /// default registry therefore keeps its `docker.io/` prefix, otherwise
    /// re-parsing would mistake the namespace for a host.
    #[must_use]
    pub fn normalized(&self) -> String {
        if self.is_official() {
            return format!("{}:{}", self.repository, self.tag);
        }
        if self.registry == DEFAULT_REGISTRY && !self.namespace_is_ambiguous() {
            return format!("{}/{}:{}", self.namespace, self.repository, self.tag);
        }
        format!(
            "{}/{}/{}:{}",
            self.registry, self.namespace, self.repository, self.tag
        )
    }

    fn namespace_is_ambiguous(&self) -> bool {
        self.namespace.contains('/') || self.namespace.contains(REGISTRY_MARKERS)
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// Parses and re-serialises a reference in canonical form.
///
/// # Errors
///
/// Returns [`ReferenceError::InvalidReference`] for malformed input.
pub fn normalize(reference: &str) -> Result<String, ReferenceError> {
    ImageReference::parse(reference).map(|parsed| parsed.normalized())
}

/// Computes the destination reference for a source image on `target_host`.
///
/// The source's origin is preserved under a `transform/` namespace:
///
/// - `nginx:1.25` becomes `{host}/transform/nginx:1.25`
/// - `user/app:v2` becomes `{host}/transform/user/app:v2`
/// - `gcr.io/google/pause:3.9` becomes `{host}/transform/gcr.io/google/pause:3.9`
///
/// # Errors
///
/// Returns [`ReferenceError::InvalidReference`] when the source is malformed.
pub fn build_target_reference(source: &str, target_host: &str) -> Result<String, ReferenceError> {
    let parsed = ImageReference::parse(source)?;
    let host = normalize_registry_host(target_host);
    let origin = if parsed.is_official() {
        parsed.repository.clone()
    } else if parsed.registry == DEFAULT_REGISTRY {
        format!("{}/{}", parsed.namespace, parsed.repository)
    } else {
        format!(
            "{}/{}/{}",
            parsed.registry, parsed.namespace, parsed.repository
        )
    };
    Ok(format!(
        "{host}/{TARGET_NAMESPACE_PREFIX}/{origin}:{}",
        parsed.tag
    ))
}

/// Extracts the registry host from a fully-qualified reference.
///
/// Uses the same dot-or-colon heuristic as [`ImageReference::parse`] on the
/// first path segment and falls back to [`DEFAULT_REGISTRY`].
#[must_use]
pub fn extract_host(reference: &str) -> &str {
    match reference.split_once('/') {
        Some((first, _)) if looks_like_registry(first) => first,
        _ => DEFAULT_REGISTRY,
    }
}

/// Strips a URL scheme and trailing slashes from a configured registry URL.
#[must_use]
pub fn normalize_registry_host(url: &str) -> &str {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/')
}

const fn is_allowed(character: char) -> bool {
    character.is_ascii_alphanumeric() || matches!(character, '.' | '-' | '_' | '/' | ':')
}

fn looks_like_registry(segment: &str) -> bool {
    segment.contains(REGISTRY_MARKERS)
}

/// Splits the tag at the last `:` unless that colon belongs to a port.
fn split_tag(reference: &str) -> (&str, Option<&str>) {
    match reference.rsplit_once(':') {
        Some((path, tag)) if !tag.contains('/') => (path, Some(tag)),
        _ => (reference, None),
    }
}
