//! Platform resolution over fetched manifests.
//!
//! The resolver decides from the manifest media type which of two shapes it
//! holds:
//! - an index / manifest list, whose entries declare their platforms and are
//!   scanned in published order, first match wins
//! - a single image manifest, whose platform lives in the configuration blob
//!   and costs one more fetch
//!
//! Any other media type is a [`RegistryError::UnsupportedMediaType`].

use archprobe_core::{ImageReference, PlatformSpec};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::RegistryAuth;
use crate::error::RegistryError;
use crate::fetcher::ManifestFetcher;
use crate::oci::{config_platform, ImageIndex, ImageManifest, ManifestKind};
use crate::transport::{RawManifest, Transport};

/// Outcome of resolving one platform against one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    /// Whether the wanted platform is published.
    pub supported: bool,

    /// Digest of the manifest serving the wanted platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_digest: Option<String>,

    /// Every platform the manifest advertises, in published order.
    pub platforms: Vec<PlatformSpec>,
}

impl ResolutionResult {
    /// A positive result.
    #[must_use]
    pub fn supported(digest: impl Into<String>, platforms: Vec<PlatformSpec>) -> Self {
        Self {
            supported: true,
            matched_digest: Some(digest.into()),
            platforms,
        }
    }

    /// A negative result.
    #[must_use]
    pub const fn unsupported(platforms: Vec<PlatformSpec>) -> Self {
        Self {
            supported: false,
            matched_digest: None,
            platforms,
        }
    }
}

/// Scans an index document for the first entry matching `want`.
///
/// An index without entries resolves to unsupported, not an error.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidManifest`] if `bytes` is not an index.
pub fn resolve_index(bytes: &[u8], want: &PlatformSpec) -> Result<ResolutionResult, RegistryError> {
    let index = ImageIndex::from_slice(bytes)?;

    let platforms: Vec<PlatformSpec> = index
        .manifests
        .iter()
        .filter(|entry| entry.has_platform())
        .filter_map(|entry| entry.platform.clone())
        .collect();

    let matched = index.manifests.iter().find(|entry| {
        entry
            .platform
            .as_ref()
            .is_some_and(|platform| want.matches(platform))
    });

    Ok(match matched {
        Some(entry) => ResolutionResult::supported(&entry.digest, platforms),
        None => ResolutionResult::unsupported(platforms),
    })
}

/// Resolves platforms for fetched manifests.
#[derive(Debug)]
pub struct PlatformResolver<'a, T> {
    fetcher: &'a ManifestFetcher<T>,
}

impl<'a, T: Transport> PlatformResolver<'a, T> {
    /// Creates a resolver that fetches configuration blobs through `fetcher`.
    #[must_use]
    pub const fn new(fetcher: &'a ManifestFetcher<T>) -> Self {
        Self { fetcher }
    }

    /// Resolves `want` against `manifest`, fetched for `reference`.
    ///
    /// # Errors
    ///
    /// Returns a parse-kind error for unsupported media types or malformed
    /// documents, and a fetch-kind error if the configuration blob of a
    /// single-platform manifest cannot be fetched.
    pub async fn resolve(
        &self,
        reference: &ImageReference,
        manifest: RawManifest,
        want: &PlatformSpec,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, RegistryError> {
        match ManifestKind::classify(&manifest.content_type, &manifest.bytes) {
            ManifestKind::Index => resolve_index(&manifest.bytes, want),
            ManifestKind::Image => {
                let platform = self
                    .image_platform(reference, &manifest, auth, cancel)
                    .await?;
                Ok(if want.matches_os_arch(&platform) {
                    ResolutionResult::supported(manifest.digest(), vec![platform])
                } else {
                    ResolutionResult::unsupported(vec![platform])
                })
            }
            ManifestKind::Unsupported(media_type) => {
                Err(RegistryError::UnsupportedMediaType { media_type })
            }
        }
    }

    /// Reads the platform of a single image manifest from its config blob.
    async fn image_platform(
        &self,
        reference: &ImageReference,
        manifest: &RawManifest,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<PlatformSpec, RegistryError> {
        let image = ImageManifest::from_slice(&manifest.bytes)?;
        tracing::debug!(%reference, config = %image.config.digest, "Fetching image configuration");

        let blob = self
            .fetcher
            .fetch_config_blob(reference, &image.config.digest, auth, cancel)
            .await?;
        config_platform(&blob)
    }
}
