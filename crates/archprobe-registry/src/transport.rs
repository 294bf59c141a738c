//! Transport abstraction over the registry HTTP API.

use archprobe_core::ImageReference;
use async_trait::async_trait;

use crate::config::RegistryAuth;
use crate::error::RegistryError;
use crate::oci::sha256_digest;

/// Manifest bytes as served by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawManifest {
    /// Declared `Content-Type`, passed through unmodified.
    pub content_type: String,

    /// Raw document bytes.
    pub bytes: Vec<u8>,

    /// Digest reported by the registry (`Docker-Content-Digest`), if any.
    pub digest: Option<String>,
}

impl RawManifest {
    /// Creates a manifest without a registry-reported digest.
    #[must_use]
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
            digest: None,
        }
    }

    /// Sets the registry-reported digest.
    #[must_use]
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Returns the manifest digest, computing it from the bytes when the
    /// registry did not report one.
    #[must_use]
    pub fn digest(&self) -> String {
        self.digest
            .clone()
            .unwrap_or_else(|| sha256_digest(&self.bytes))
    }
}

/// Fetches manifests and configuration blobs from a registry.
///
/// Implementations perform exactly one logical request per call and must not
/// retry on failure.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the manifest `reference` points at, accepting both image
    /// manifests and manifest lists.
    async fn get_manifest(
        &self,
        reference: &ImageReference,
        auth: &RegistryAuth,
    ) -> Result<RawManifest, RegistryError>;

    /// Fetches the blob `digest` from the repository of `reference`.
    async fn get_blob(
        &self,
        reference: &ImageReference,
        digest: &str,
        auth: &RegistryAuth,
    ) -> Result<Vec<u8>, RegistryError>;
}
