//! Platform specifications and matching.
//!
//! A [`PlatformSpec`] deserializes straight from the `platform` object of an
//! OCI image index entry and from the `os`/`architecture`/`variant` fields of
//! an image configuration blob.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Operating system, CPU architecture and optional variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformSpec {
    /// Operating system (e.g. `linux`, `windows`).
    pub os: String,

    /// CPU architecture in Go notation (e.g. `amd64`, `arm64`).
    pub architecture: String,

    /// Architecture variant (e.g. `v8` for arm64, `v7` for arm).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl PlatformSpec {
    /// Creates a platform without a variant.
    #[must_use]
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
        }
    }

    /// The `linux/arm64` platform.
    #[must_use]
    pub fn linux_arm64() -> Self {
        Self::new("linux", "arm64")
    }

    /// Sets the variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Returns `true` if `candidate` satisfies this wanted platform.
    ///
    /// OS and architecture compare exactly. The variant is only compared when
    /// this spec sets one.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_core::PlatformSpec;
    ///
    /// let want = PlatformSpec::new("linux", "arm");
    /// assert!(want.matches(&PlatformSpec::new("linux", "arm").with_variant("v7")));
    ///
    /// let want_v6 = PlatformSpec::new("linux", "arm").with_variant("v6");
    /// assert!(!want_v6.matches(&PlatformSpec::new("linux", "arm").with_variant("v7")));
    /// ```
    #[must_use]
    pub fn matches(&self, candidate: &Self) -> bool {
        self.matches_os_arch(candidate)
            && match &self.variant {
                Some(variant) => candidate.variant.as_ref() == Some(variant),
                None => true,
            }
    }

    /// Returns `true` if OS and architecture are equal, ignoring variants.
    #[must_use]
    pub fn matches_os_arch(&self, candidate: &Self) -> bool {
        self.os == candidate.os && self.architecture == candidate.architecture
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

impl FromStr for PlatformSpec {
    type Err = Error;

    /// Parses `os/arch[/variant]`, accepting common aliases.
    ///
    /// `aarch64` becomes `arm64`, `x86_64` becomes `amd64` and `macos`
    /// becomes `darwin`, so that user input lines up with the Go names
    /// registries publish.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let parts: Vec<&str> = normalized.split('/').collect();

        let invalid = || Error::InvalidPlatform {
            platform: s.to_string(),
        };

        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let mut spec = match parts.as_slice() {
            [os, arch] | [os, arch, _] => Self::new(canonical_os(os), canonical_arch(arch)),
            _ => return Err(invalid()),
        };
        if let [_, _, variant] = parts.as_slice() {
            spec.variant = Some((*variant).to_string());
        }
        Ok(spec)
    }
}

fn canonical_os(os: &str) -> &str {
    match os {
        "macos" | "osx" => "darwin",
        other => other,
    }
}

fn canonical_arch(arch: &str) -> &str {
    match arch {
        "aarch64" => "arm64",
        "x86_64" | "x86-64" => "amd64",
        "i386" | "i686" => "386",
        other => other,
    }
}
