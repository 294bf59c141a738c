//! End-to-end platform probe: normalize, fetch, resolve.

use std::time::Duration;

use archprobe_core::{normalize, with_latest_tag, ImageReference, PlatformSpec};
use tokio_util::sync::CancellationToken;

use crate::client::RegistryClient;
use crate::config::{RegistryAuth, RegistryConfig};
use crate::error::RegistryError;
use crate::fetcher::ManifestFetcher;
use crate::resolver::{PlatformResolver, ResolutionResult};
use crate::transport::Transport;

/// Checks whether images are published for a platform.
///
/// Each call is independent; the probe holds no per-image state and can be
/// shared across concurrent checks.
///
/// # Examples
///
/// ```no_run
/// use archprobe_core::PlatformSpec;
/// use archprobe_registry::{PlatformProbe, RegistryAuth, RegistryConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), archprobe_registry::RegistryError> {
/// let probe = PlatformProbe::new(RegistryConfig::new())?;
/// let result = probe
///     .check(
///         "nginx:1.27",
///         &PlatformSpec::linux_arm64(),
///         &RegistryAuth::None,
///         &CancellationToken::new(),
///     )
///     .await?;
/// println!("arm64 supported: {}", result.supported);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PlatformProbe<T = RegistryClient> {
    fetcher: ManifestFetcher<T>,
}

impl PlatformProbe<RegistryClient> {
    /// Creates a probe backed by a [`RegistryClient`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        Ok(Self::with_transport(RegistryClient::new(config)?))
    }
}

impl<T: Transport> PlatformProbe<T> {
    /// Creates a probe over any transport.
    #[must_use]
    pub const fn with_transport(transport: T) -> Self {
        Self {
            fetcher: ManifestFetcher::new(transport),
        }
    }

    /// Bounds each fetch by `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.fetcher = self.fetcher.with_deadline(deadline);
        self
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    /// Checks whether the image `name` is published for `want`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-reference error if `name` has no repository, a
    /// fetch-kind error if the registry cannot be reached, and a parse-kind
    /// error if its answer cannot be understood.
    pub async fn check(
        &self,
        name: &str,
        want: &PlatformSpec,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, RegistryError> {
        let reference = normalize(name);
        reference.validate()?;
        self.check_reference(&reference, want, auth, cancel).await
    }

    /// Checks whether the `latest` tag of the image `name` is published for
    /// `want`, whatever tag or digest `name` carries.
    ///
    /// # Errors
    ///
    /// Same as [`PlatformProbe::check`].
    pub async fn check_latest(
        &self,
        name: &str,
        want: &PlatformSpec,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, RegistryError> {
        let reference = with_latest_tag(name)?;
        self.check_reference(&reference, want, auth, cancel).await
    }

    /// Checks an already-normalized reference.
    ///
    /// # Errors
    ///
    /// Same as [`PlatformProbe::check`].
    pub async fn check_reference(
        &self,
        reference: &ImageReference,
        want: &PlatformSpec,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, RegistryError> {
        let manifest = self.fetcher.fetch_manifest(reference, auth, cancel).await?;
        let result = PlatformResolver::new(&self.fetcher)
            .resolve(reference, manifest, want, auth, cancel)
            .await?;

        tracing::info!(
            %reference,
            platform = %want,
            supported = result.supported,
            digest = result.matched_digest.as_deref().unwrap_or("-"),
            "Resolved platform"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::oci::MediaType;
    use crate::testing::{config_json, image_manifest_json, index_json, FakeTransport};
    use crate::transport::RawManifest;

    fn multi_arch_transport() -> FakeTransport {
        FakeTransport::new()
            .with_manifest(
                "nginx:1.27",
                RawManifest::new(
                    MediaType::OCI_INDEX,
                    index_json(&[
                        ("sha256:amd", "linux", "amd64"),
                        ("sha256:arm", "linux", "arm64"),
                    ]),
                ),
            )
            .with_manifest(
                "nginx:latest",
                RawManifest::new(
                    MediaType::DOCKER_MANIFEST,
                    image_manifest_json("sha256:cfg"),
                ),
            )
            .with_blob("sha256:cfg", config_json("linux", "amd64"))
    }

    async fn check(
        probe: &PlatformProbe<FakeTransport>,
        name: &str,
        want: &str,
    ) -> Result<ResolutionResult, RegistryError> {
        probe
            .check(
                name,
                &want.parse().unwrap(),
                &RegistryAuth::None,
                &CancellationToken::new(),
            )
            .await
    }

    #[tokio::test]
    async fn test_check_multi_arch() {
        let probe = PlatformProbe::with_transport(multi_arch_transport());

        let arm = check(&probe, "nginx:1.27", "linux/arm64").await.unwrap();
        assert!(arm.supported);
        assert_eq!(arm.matched_digest.as_deref(), Some("sha256:arm"));

        let riscv = check(&probe, "docker.io/library/nginx:1.27", "linux/riscv64")
            .await
            .unwrap();
        assert!(!riscv.supported);
    }

    #[tokio::test]
    async fn test_check_untagged_name_fetches_latest() {
        let probe = PlatformProbe::with_transport(multi_arch_transport());
        let result = check(&probe, "nginx", "linux/arm64").await.unwrap();
        assert!(!result.supported);
        assert_eq!(result.platforms, vec![PlatformSpec::new("linux", "amd64")]);
        assert_eq!(probe.transport().calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_check_latest_ignores_pinned_tag() {
        let probe = PlatformProbe::with_transport(multi_arch_transport());
        let result = probe
            .check_latest(
                "nginx:1.27",
                &PlatformSpec::new("linux", "amd64"),
                &RegistryAuth::None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.supported);
        assert_eq!(probe.transport().calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_check_invalid_reference() {
        let probe = PlatformProbe::with_transport(multi_arch_transport());

        let err = check(&probe, "", "linux/arm64").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);

        let err = probe
            .check_latest(
                ":1.0",
                &PlatformSpec::linux_arm64(),
                &RegistryAuth::None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
        assert_eq!(probe.transport().calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_check_not_found_is_fetch_error() {
        let probe = PlatformProbe::with_transport(multi_arch_transport());
        let err = check(&probe, "ghcr.io/acme/missing:1", "linux/arm64")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn test_check_cancelled() {
        let probe = PlatformProbe::with_transport(FakeTransport::new().hanging());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = probe
            .check("nginx", &PlatformSpec::linux_arm64(), &RegistryAuth::None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_checks_share_probe() {
        let probe = PlatformProbe::with_transport(multi_arch_transport());
        let want = PlatformSpec::linux_arm64();
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            probe.check("nginx:1.27", &want, &RegistryAuth::None, &cancel),
            probe.check("nginx", &want, &RegistryAuth::None, &cancel),
        );
        assert!(a.unwrap().supported);
        assert!(!b.unwrap().supported);
    }
}
