//! # archprobe Registry
//!
//! Platform-aware manifest resolution against OCI-compatible registries
//! (Docker Hub, GHCR, Quay, ECR, Harbor, etc.).
//!
//! Given an image name and a wanted platform such as `linux/arm64`, the
//! [`PlatformProbe`] answers whether the registry publishes that platform:
//!
//! 1. the name is normalized into a fully-qualified reference
//!    ([`archprobe_core::normalize`])
//! 2. the [`ManifestFetcher`] fetches the top-level manifest through a
//!    [`Transport`], under a cancellation token
//! 3. the [`PlatformResolver`] scans a manifest list for the platform, or
//!    reads the configuration blob of a single-platform manifest
//!
//! ## Features
//!
//! - **OCI and Docker formats**: image indexes, manifest lists, OCI and
//!   Docker schema 2 manifests
//! - **Explicit credentials**: Basic and Bearer auth, Docker `config.json`
//!   loading from a caller-chosen path, bearer token challenge handling
//! - **Cancellation**: every fetch races a `CancellationToken` and an
//!   optional deadline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archprobe_core::PlatformSpec;
//! use archprobe_registry::{PlatformProbe, RegistryAuth, RegistryConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let probe = PlatformProbe::new(RegistryConfig::new())?;
//!
//!     let result = probe
//!         .check(
//!             "redis:7",
//!             &PlatformSpec::linux_arm64(),
//!             &RegistryAuth::None,
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("supported: {}", result.supported);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     PlatformProbe                           │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌────────────────┐  │
//! │  │  normalize  │─▶│  ManifestFetcher │─▶│PlatformResolver│  │
//! │  │  (core)     │  │  (cancellable)   │  │ (index/image)  │  │
//! │  └─────────────┘  └──────────────────┘  └────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//!                          │ Transport
//!                          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              RegistryClient (reqwest, /v2 API)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod auth;
mod client;
mod config;
mod error;
mod fetcher;
mod oci;
mod probe;
mod resolver;
mod transport;

#[cfg(test)]
mod testing;

pub use auth::{canonical_host, DockerConfig};
pub use client::RegistryClient;
pub use config::{ClientIdentity, RegistryAuth, RegistryConfig, TlsConfig, DOCKER_HUB_ENDPOINT};
pub use error::{ErrorKind, RegistryError};
pub use fetcher::ManifestFetcher;
pub use oci::{
    config_platform, sha256_digest, Descriptor, ImageIndex, ImageManifest, ManifestDescriptor,
    ManifestKind, MediaType,
};
pub use probe::PlatformProbe;
pub use resolver::{resolve_index, PlatformResolver, ResolutionResult};
pub use transport::{RawManifest, Transport};
