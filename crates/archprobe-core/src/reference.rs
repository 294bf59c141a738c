//! Image reference normalization.
//!
//! Short image names are expanded with the same segment-count rule the Docker
//! tooling uses:
//! - `nginx` → `docker.io/library/nginx`
//! - `team/app` → `docker.io/team/app`
//! - `registry.example.com/team/app:1.2` → unchanged
//!
//! Names with three or more segments are always read as `host/path...`. A
//! two-segment name such as `registry.example.com/app` is therefore read as a
//! Docker Hub namespace, since telling the two apart needs knowledge of the
//! registry.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Registry host used when a name carries none.
pub const DEFAULT_REGISTRY_HOST: &str = "docker.io";

/// Namespace used for single-segment names on the default registry.
pub const DEFAULT_NAMESPACE: &str = "library";

/// Floating tag used when a name carries no tag or digest.
pub const LATEST_TAG: &str = "latest";

/// A fully-qualified image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry_host: String,
    repository_path: String,
    tag_or_digest: Option<Pin>,
}

/// Tag or digest suffix, remembering the separator it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Pin {
    Tag(String),
    Digest(String),
}

impl Pin {
    fn as_str(&self) -> &str {
        match self {
            Self::Tag(value) | Self::Digest(value) => value,
        }
    }
}

impl ImageReference {
    /// Creates a reference from its parts.
    ///
    /// A `tag_or_digest` containing `:` is taken as a digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_core::ImageReference;
    ///
    /// let reference = ImageReference::new("ghcr.io", "acme/api", Some("v2"));
    /// assert_eq!(reference.to_string(), "ghcr.io/acme/api:v2");
    /// ```
    #[must_use]
    pub fn new(
        registry_host: impl Into<String>,
        repository_path: impl Into<String>,
        tag_or_digest: Option<&str>,
    ) -> Self {
        Self {
            registry_host: registry_host.into(),
            repository_path: repository_path.into(),
            tag_or_digest: tag_or_digest.filter(|t| !t.is_empty()).map(|t| {
                if t.contains(':') {
                    Pin::Digest(t.to_string())
                } else {
                    Pin::Tag(t.to_string())
                }
            }),
        }
    }

    fn from_pin(
        registry_host: impl Into<String>,
        repository_path: impl Into<String>,
        tag_or_digest: Option<Pin>,
    ) -> Self {
        Self {
            registry_host: registry_host.into(),
            repository_path: repository_path.into(),
            tag_or_digest,
        }
    }

    /// Returns the registry host (e.g. `docker.io`, `localhost:5000`).
    #[must_use]
    pub fn registry_host(&self) -> &str {
        &self.registry_host
    }

    /// Returns the repository path (e.g. `library/nginx`).
    #[must_use]
    pub fn repository_path(&self) -> &str {
        &self.repository_path
    }

    /// Returns the tag or digest exactly as given, if any.
    #[must_use]
    pub fn tag_or_digest(&self) -> Option<&str> {
        self.tag_or_digest.as_ref().map(Pin::as_str)
    }

    /// Returns the tag or digest to request from the registry.
    ///
    /// Falls back to [`LATEST_TAG`] when the name carried neither.
    #[must_use]
    pub fn reference(&self) -> &str {
        self.tag_or_digest().unwrap_or(LATEST_TAG)
    }

    /// Returns `true` if the reference pins a digest (`@...`).
    #[must_use]
    pub fn is_digest(&self) -> bool {
        matches!(self.tag_or_digest, Some(Pin::Digest(_)))
    }

    /// Returns a copy pointing at the `latest` tag, dropping any tag or digest.
    #[must_use]
    pub fn to_latest(&self) -> Self {
        Self {
            registry_host: self.registry_host.clone(),
            repository_path: self.repository_path.clone(),
            tag_or_digest: Some(Pin::Tag(LATEST_TAG.to_string())),
        }
    }

    /// Checks that the reference names a repository that can be fetched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if the registry host or the
    /// repository path is empty, if the path contains an empty segment, or
    /// if a `:` or `@` separator is followed by nothing.
    pub fn validate(&self) -> Result<()> {
        if self.registry_host.is_empty() {
            return Err(Error::invalid_reference(
                self.to_string(),
                "missing registry host",
            ));
        }
        if self.repository_path.split('/').any(str::is_empty) {
            return Err(Error::invalid_reference(
                self.to_string(),
                "missing repository name",
            ));
        }
        if self.tag_or_digest().is_some_and(str::is_empty) {
            return Err(Error::invalid_reference(
                self.to_string(),
                "empty tag or digest",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry_host, self.repository_path)?;
        match &self.tag_or_digest {
            Some(Pin::Digest(digest)) => write!(f, "@{digest}"),
            Some(Pin::Tag(tag)) => write!(f, ":{tag}"),
            None => Ok(()),
        }
    }
}

impl Serialize for ImageReference {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Expands an image name into a fully-qualified reference.
///
/// Never fails: malformed names pass through as best-effort references, which
/// [`ImageReference::validate`] can reject before any network access.
///
/// # Examples
///
/// ```
/// use archprobe_core::normalize;
///
/// assert_eq!(normalize("nginx").to_string(), "docker.io/library/nginx");
/// assert_eq!(normalize("bitnami/redis:7").to_string(), "docker.io/bitnami/redis:7");
/// assert_eq!(
///     normalize("quay.io/prometheus/node-exporter@sha256:abc").to_string(),
///     "quay.io/prometheus/node-exporter@sha256:abc"
/// );
/// ```
#[must_use]
pub fn normalize(name: &str) -> ImageReference {
    let name = name.trim();

    match name.split('/').count() {
        1 => {
            let (path, pin) = split_pin(name);
            ImageReference::from_pin(
                DEFAULT_REGISTRY_HOST,
                format!("{DEFAULT_NAMESPACE}/{path}"),
                pin,
            )
        }
        2 => {
            let (path, pin) = split_pin(name);
            ImageReference::from_pin(DEFAULT_REGISTRY_HOST, path, pin)
        }
        _ => {
            let (host, rest) = name.split_once('/').unwrap_or((name, ""));
            let (path, pin) = split_pin(rest);
            ImageReference::from_pin(host, path, pin)
        }
    }
}

/// Normalizes `name` and points it at the `latest` tag.
///
/// Any tag or digest on the input is replaced.
///
/// # Errors
///
/// Returns [`Error::InvalidReference`] if no repository name can be separated
/// from the input (for example an empty string or `":1.0"`).
///
/// # Examples
///
/// ```
/// use archprobe_core::with_latest_tag;
///
/// let reference = with_latest_tag("nginx:1.25").unwrap();
/// assert_eq!(reference.to_string(), "docker.io/library/nginx:latest");
/// assert!(with_latest_tag("").is_err());
/// ```
pub fn with_latest_tag(name: &str) -> Result<ImageReference> {
    let reference = normalize(name).to_latest();
    reference
        .validate()
        .map_err(|_| Error::invalid_reference(name, "cannot separate name from tag"))?;
    Ok(reference)
}

/// Splits `name` into the repository part and its tag or digest.
///
/// A digest starts at the first `@`. Otherwise a tag is looked for only in
/// the final path segment so a registry port (`localhost:5000/app`) is not
/// mistaken for one. A separator followed by nothing is kept.
fn split_pin(name: &str) -> (&str, Option<Pin>) {
    if let Some((path, digest)) = name.split_once('@') {
        return (path, Some(Pin::Digest(digest.to_string())));
    }

    let last_segment_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[last_segment_start..].rfind(':') {
        Some(colon) => {
            let colon = last_segment_start + colon;
            (&name[..colon], Some(Pin::Tag(name[colon + 1..].to_string())))
        }
        None => (name, None),
    }
}
