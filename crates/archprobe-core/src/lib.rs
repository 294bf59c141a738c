//! # archprobe Core
//!
//! Core types for archprobe, the container image platform probe.
//!
//! This crate holds the pure, network-free half of a probe:
//!
//! - [`ImageReference`] - Fully-qualified image reference (registry host,
//!   repository path, tag or digest) and the [`normalize`] rules that build it
//!   from short names such as `nginx` or `team/app:1.2`
//! - [`PlatformSpec`] - Operating system, architecture and optional variant,
//!   used both for the platform a caller wants and the platform a manifest
//!   targets
//! - [`Error`] - Errors raised while decomposing image names
//!
//! ## Example
//!
//! ```rust
//! use archprobe_core::{normalize, PlatformSpec};
//!
//! let reference = normalize("nginx:1.27");
//! assert_eq!(reference.registry_host(), "docker.io");
//! assert_eq!(reference.repository_path(), "library/nginx");
//! assert_eq!(reference.tag_or_digest(), Some("1.27"));
//!
//! let want: PlatformSpec = "linux/arm64".parse().unwrap();
//! assert!(want.matches(&PlatformSpec::new("linux", "arm64").with_variant("v8")));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod platform;
pub mod reference;

#[cfg(test)]
mod proptest_tests;

pub use error::{Error, Result};
pub use platform::PlatformSpec;
pub use reference::{
    normalize, with_latest_tag, ImageReference, DEFAULT_NAMESPACE, DEFAULT_REGISTRY_HOST,
    LATEST_TAG,
};
