//! Error types for archprobe core operations.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in archprobe core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The image name cannot be decomposed into repository and tag parts.
    #[error("Invalid image reference '{reference}': {reason}")]
    InvalidReference {
        /// The offending image name.
        reference: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// A platform string is not of the form `os/arch[/variant]`.
    #[error("Invalid platform '{platform}': expected os/arch[/variant]")]
    InvalidPlatform {
        /// The offending platform string.
        platform: String,
    },
}

impl Error {
    pub(crate) fn invalid_reference(
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}
