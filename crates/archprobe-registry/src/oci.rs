//! OCI and Docker manifest types.
//!
//! This module defines the subset of the OCI Image / Docker Registry v2
//! formats needed to find out which platforms an image is published for.

use archprobe_core::PlatformSpec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RegistryError;

/// Manifest and config media types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaType(String);

impl MediaType {
    /// OCI image manifest media type.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index media type.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// OCI image configuration media type.
    pub const OCI_CONFIG: &'static str = "application/vnd.oci.image.config.v1+json";

    /// Docker image manifest (schema 2) media type.
    pub const DOCKER_MANIFEST: &'static str =
        "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker manifest list media type.
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// Docker image configuration media type.
    pub const DOCKER_CONFIG: &'static str = "application/vnd.docker.container.image.v1+json";

    /// Media types sent in the `Accept` header of a manifest request.
    pub const MANIFEST_ACCEPT: [&'static str; 4] = [
        Self::OCI_INDEX,
        Self::DOCKER_MANIFEST_LIST,
        Self::OCI_MANIFEST,
        Self::DOCKER_MANIFEST,
    ];

    /// Creates a new media type.
    #[must_use]
    pub fn new(media_type: impl Into<String>) -> Self {
        Self(media_type.into())
    }

    /// Returns the media type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the media type without parameters, lowercased.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::MediaType;
    ///
    /// let mt = MediaType::new("Application/JSON; charset=utf-8");
    /// assert_eq!(mt.essence(), "application/json");
    /// ```
    #[must_use]
    pub fn essence(&self) -> String {
        self.0
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// Returns the `Accept` header value for manifest requests.
    #[must_use]
    pub fn manifest_accept_header() -> String {
        Self::MANIFEST_ACCEPT.join(", ")
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Shape of a manifest document, decided from its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestKind {
    /// Multi-platform index / manifest list.
    Index,
    /// Single-platform image manifest.
    Image,
    /// Anything else.
    Unsupported(String),
}

impl ManifestKind {
    /// Classifies a manifest by its declared content type.
    ///
    /// Registries sometimes answer with a generic type such as
    /// `application/json`; the document is then sniffed for its `mediaType`
    /// field, falling back to the presence of `manifests` or `config`.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::{ManifestKind, MediaType};
    ///
    /// assert_eq!(ManifestKind::classify(MediaType::OCI_INDEX, b"{}"), ManifestKind::Index);
    /// assert_eq!(
    ///     ManifestKind::classify("application/json", br#"{"config":{}}"#),
    ///     ManifestKind::Image
    /// );
    /// ```
    #[must_use]
    pub fn classify(content_type: &str, bytes: &[u8]) -> Self {
        let essence = MediaType::new(content_type).essence();
        match Self::from_media_type(&essence) {
            Self::Unsupported(_) if is_generic(&essence) => Self::sniff(bytes, &essence),
            kind => kind,
        }
    }

    fn from_media_type(essence: &str) -> Self {
        match essence {
            MediaType::OCI_INDEX | MediaType::DOCKER_MANIFEST_LIST => Self::Index,
            MediaType::OCI_MANIFEST | MediaType::DOCKER_MANIFEST => Self::Image,
            other => Self::Unsupported(other.to_string()),
        }
    }

    fn sniff(bytes: &[u8], essence: &str) -> Self {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Probe {
            media_type: Option<String>,
            manifests: Option<serde_json::Value>,
            config: Option<serde_json::Value>,
        }

        let Ok(probe) = serde_json::from_slice::<Probe>(bytes) else {
            return Self::Unsupported(essence.to_string());
        };

        if let Some(media_type) = probe.media_type {
            return Self::from_media_type(&MediaType::new(media_type).essence());
        }
        if probe.manifests.is_some() {
            Self::Index
        } else if probe.config.is_some() {
            Self::Image
        } else {
            Self::Unsupported(essence.to_string())
        }
    }
}

fn is_generic(essence: &str) -> bool {
    matches!(
        essence,
        "" | "application/json" | "text/plain" | "application/octet-stream"
    )
}

/// Content descriptor.
///
/// A descriptor names targeted content by media type, digest and size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// Digest of the targeted content.
    pub digest: String,

    /// Size in bytes of the content.
    #[serde(default)]
    pub size: u64,
}

/// Entry of a manifest list / image index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    /// Media type of the referenced manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// Digest of the referenced manifest.
    pub digest: String,

    /// Size in bytes of the referenced manifest.
    #[serde(default)]
    pub size: u64,

    /// Platform the referenced manifest targets.
    ///
    /// Attestation manifests and other artifacts carry no platform, or the
    /// `unknown/unknown` placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformSpec>,
}

impl ManifestDescriptor {
    /// Returns `true` if this entry targets a real platform.
    #[must_use]
    pub fn has_platform(&self) -> bool {
        self.platform
            .as_ref()
            .is_some_and(|p| p.os != "unknown" && p.architecture != "unknown")
    }
}

/// OCI image index or Docker manifest list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIndex {
    /// Schema version (always 2).
    pub schema_version: u32,

    /// Media type of this document, when self-described.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// Per-platform manifests, in published order.
    pub manifests: Vec<ManifestDescriptor>,
}

impl ImageIndex {
    /// Parses an index document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidManifest`] if the bytes are not an index.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RegistryError> {
        serde_json::from_slice(bytes)
            .map_err(|e| RegistryError::invalid_manifest(format!("malformed manifest list: {e}")))
    }
}

/// OCI or Docker schema 2 image manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    /// Schema version (always 2).
    pub schema_version: u32,

    /// Media type of this document, when self-described.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// Configuration blob descriptor.
    pub config: Descriptor,

    /// Layers that make up the image.
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    /// Parses an image manifest document.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidManifest`] if the bytes are not an image
    /// manifest with a config descriptor.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RegistryError> {
        serde_json::from_slice(bytes)
            .map_err(|e| RegistryError::invalid_manifest(format!("malformed image manifest: {e}")))
    }
}

/// Parses the platform fields of an image configuration blob.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidConfig`] if `os` or `architecture` is
/// missing or the blob is not JSON.
pub fn config_platform(bytes: &[u8]) -> Result<PlatformSpec, RegistryError> {
    serde_json::from_slice(bytes).map_err(RegistryError::invalid_config)
}

/// Computes the `sha256:` digest of `data`.
#[must_use]
pub fn sha256_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Error response from registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// List of errors.
    pub errors: Vec<RegistryApiError>,
}

/// Individual error from registry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryApiError {
    /// Error code.
    pub code: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl ErrorResponse {
    /// Extracts a readable message from an error body, falling back to the
    /// raw text.
    #[must_use]
    pub fn message_from_body(body: &str) -> String {
        serde_json::from_str::<Self>(body).map_or_else(
            |_| body.trim().to_string(),
            |response| {
                response
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .collect::<Vec<_>>()
                    .join("; ")
            },
        )
    }
}
