//! Error types for registry operations.

use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a [`RegistryError`].
///
/// Callers treat [`ErrorKind::Fetch`] and [`ErrorKind::Parse`] as operational
/// problems ("try again later") and keep them apart from a clean
/// `supported: false` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The image name could not be decomposed.
    InvalidReference,
    /// Transport, authentication, not-found or cancellation failure.
    Fetch,
    /// The manifest or configuration document could not be understood.
    Parse,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidReference => "invalid-reference",
            Self::Fetch => "fetch",
            Self::Parse => "parse",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid image reference.
    #[error(transparent)]
    InvalidReference(#[from] archprobe_core::Error),

    /// Failed to connect to registry.
    #[error("Failed to connect to registry at {url}: {source}")]
    ConnectionFailed {
        /// Registry URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Error message.
        message: String,
    },

    /// Manifest or blob not found in registry.
    #[error("Not found: {reference}")]
    NotFound {
        /// Image reference or blob digest.
        reference: String,
    },

    /// Registry is throttling requests.
    #[error("Rate limited by registry while fetching {reference}")]
    RateLimited {
        /// Image reference.
        reference: String,
    },

    /// HTTP error from registry.
    #[error("HTTP error from registry: {status} - {message}")]
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The fetch was cancelled by the caller.
    #[error("Fetch of {reference} was cancelled")]
    Cancelled {
        /// Image reference.
        reference: String,
    },

    /// The fetch did not complete before its deadline.
    #[error("Fetch of {reference} timed out")]
    Timeout {
        /// Image reference.
        reference: String,
    },

    /// Invalid URL.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// Credentials could not be turned into request headers.
    #[error("Invalid credentials for {registry}: {message}")]
    InvalidCredentials {
        /// Registry host.
        registry: String,
        /// Error message.
        message: String,
    },

    /// File I/O error.
    #[error("File I/O error at {path}: {source}")]
    IoError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest content type is not one the resolver understands.
    #[error("unsupported manifest media type: {media_type}")]
    UnsupportedMediaType {
        /// Declared or sniffed media type.
        media_type: String,
    },

    /// Manifest bytes do not match their media type.
    #[error("Invalid manifest: {message}")]
    InvalidManifest {
        /// Error message.
        message: String,
    },

    /// Image configuration blob is malformed.
    #[error("Invalid image configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl RegistryError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference(_) => ErrorKind::InvalidReference,
            Self::UnsupportedMediaType { .. }
            | Self::InvalidManifest { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Parse,
            Self::ConnectionFailed { .. }
            | Self::AuthenticationFailed { .. }
            | Self::NotFound { .. }
            | Self::RateLimited { .. }
            | Self::HttpError { .. }
            | Self::Cancelled { .. }
            | Self::Timeout { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidCredentials { .. }
            | Self::IoError { .. } => ErrorKind::Fetch,
        }
    }

    /// Returns `true` for transport-level failures.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self.kind(), ErrorKind::Fetch)
    }

    /// Returns `true` for manifest or configuration format failures.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self.kind(), ErrorKind::Parse)
    }

    pub(crate) fn invalid_manifest(message: impl std::fmt::Display) -> Self {
        Self::InvalidManifest {
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_config(message: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed {
                url: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                source: err,
            }
        } else if err.is_timeout() {
            Self::Timeout {
                reference: err
                    .url()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
            }
        } else if err.is_status() {
            let status = err.status().map_or(0, |s| s.as_u16());
            Self::HttpError {
                status,
                message: err.to_string(),
            }
        } else {
            Self::HttpError {
                status: 0,
                message: err.to_string(),
            }
        }
    }
}
