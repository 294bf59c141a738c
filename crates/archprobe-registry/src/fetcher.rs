//! Cancellable manifest and configuration fetches.

use std::future::Future;
use std::time::Duration;

use archprobe_core::ImageReference;
use tokio_util::sync::CancellationToken;

use crate::config::RegistryAuth;
use crate::error::RegistryError;
use crate::transport::{RawManifest, Transport};

/// Runs transport calls under a cancellation token and optional deadline.
///
/// A cancelled or expired call is dropped mid-flight, which releases its
/// connection, and surfaces as [`RegistryError::Cancelled`] or
/// [`RegistryError::Timeout`]. Failures are never retried.
#[derive(Debug, Clone)]
pub struct ManifestFetcher<T> {
    transport: T,
    deadline: Option<Duration>,
}

impl<T: Transport> ManifestFetcher<T> {
    /// Creates a fetcher over `transport` with no deadline.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            deadline: None,
        }
    }

    /// Bounds every fetch by `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches the top-level manifest of `reference`.
    ///
    /// # Errors
    ///
    /// Returns a fetch-kind error on any transport failure, cancellation or
    /// deadline expiry.
    pub async fn fetch_manifest(
        &self,
        reference: &ImageReference,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<RawManifest, RegistryError> {
        self.guard(reference, cancel, self.transport.get_manifest(reference, auth))
            .await
    }

    /// Fetches the configuration blob `digest` of `reference`.
    ///
    /// # Errors
    ///
    /// Returns a fetch-kind error on any transport failure, cancellation or
    /// deadline expiry.
    pub async fn fetch_config_blob(
        &self,
        reference: &ImageReference,
        digest: &str,
        auth: &RegistryAuth,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, RegistryError> {
        self.guard(reference, cancel, self.transport.get_blob(reference, digest, auth))
            .await
    }

    async fn guard<F, O>(
        &self,
        reference: &ImageReference,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<O, RegistryError>
    where
        F: Future<Output = Result<O, RegistryError>>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout(deadline, call)
                    .await
                    .map_err(|_| RegistryError::Timeout {
                        reference: reference.to_string(),
                    })?,
                None => call.await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(%reference, "Fetch cancelled");
                Err(RegistryError::Cancelled {
                    reference: reference.to_string(),
                })
            }
            result = bounded => result,
        }
    }
}
