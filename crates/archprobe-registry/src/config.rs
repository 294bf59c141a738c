//! Configuration types for registry client.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// API endpoint serving the `docker.io` registry.
pub const DOCKER_HUB_ENDPOINT: &str = "https://registry-1.docker.io";

/// Configuration for the registry client.
///
/// A single client talks to any registry named by an image reference; the
/// endpoint for a host is derived by [`RegistryConfig::endpoint_for`].
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Request timeout.
    pub timeout: Duration,

    /// TLS configuration for custom CAs and mTLS.
    pub tls: Option<TlsConfig>,

    /// User agent string.
    pub user_agent: String,

    /// Explicit endpoint per registry host (e.g. a mirror or a test server).
    pub endpoints: HashMap<String, String>,

    /// Registry hosts reached over plain HTTP.
    pub plain_http_hosts: HashSet<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryConfig {
    /// Creates a new registry configuration with default settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::RegistryConfig;
    /// use std::time::Duration;
    ///
    /// let config = RegistryConfig::new();
    /// assert_eq!(config.timeout, Duration::from_secs(30));
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            tls: None,
            user_agent: format!("archprobe-registry/{}", env!("CARGO_PKG_VERSION")),
            endpoints: HashMap::new(),
            plain_http_hosts: HashSet::new(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Routes requests for `host` to `endpoint` (scheme included).
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new()
    ///     .with_endpoint("docker.io", "https://mirror.example.com/");
    /// assert_eq!(config.endpoint_for("docker.io"), "https://mirror.example.com");
    /// ```
    #[must_use]
    pub fn with_endpoint(mut self, host: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(host.into(), endpoint.into());
        self
    }

    /// Reaches `host` over plain HTTP instead of HTTPS.
    #[must_use]
    pub fn with_plain_http(mut self, host: impl Into<String>) -> Self {
        self.plain_http_hosts.insert(host.into());
        self
    }

    /// Returns the base URL (without trailing slash) serving `host`.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new().with_plain_http("localhost:5000");
    /// assert_eq!(config.endpoint_for("docker.io"), "https://registry-1.docker.io");
    /// assert_eq!(config.endpoint_for("ghcr.io"), "https://ghcr.io");
    /// assert_eq!(config.endpoint_for("localhost:5000"), "http://localhost:5000");
    /// ```
    #[must_use]
    pub fn endpoint_for(&self, host: &str) -> String {
        if let Some(endpoint) = self.endpoints.get(host) {
            return endpoint.trim_end_matches('/').to_string();
        }

        let host = match host {
            "docker.io" | "index.docker.io" => return DOCKER_HUB_ENDPOINT.to_string(),
            other => other,
        };

        if self.plain_http_hosts.contains(host) {
            format!("http://{host}")
        } else {
            format!("https://{host}")
        }
    }
}

/// Credentials presented to a registry.
///
/// Callers pick these explicitly, from flags or a [`crate::DockerConfig`];
/// the client never looks anything up on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegistryAuth {
    /// No `Authorization` header; anonymous pulls and token challenges only.
    #[default]
    None,

    /// `Authorization: Basic`, also forwarded to a bearer token realm.
    Basic {
        /// Account name.
        username: String,
        /// Password or personal access token.
        password: String,
    },

    /// `Authorization: Bearer` with a ready-made registry token.
    Bearer {
        /// Token value.
        token: String,
    },
}

impl RegistryAuth {
    /// Username/password credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("ci-bot", "hunter2");
    /// assert!(!auth.is_anonymous());
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// A registry token used as-is.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Returns `true` when no credentials are sent.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Certificates used when talking to registries over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Extra PEM root certificate, trusted alongside the built-in roots.
    pub ca_cert: Option<PathBuf>,

    /// Certificate and key presented for mutual TLS.
    pub client_identity: Option<ClientIdentity>,

    /// Accept any server certificate. Local test registries only.
    pub accept_invalid_certs: bool,
}

/// PEM client certificate and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Certificate chain file.
    pub cert: PathBuf,
    /// Private key file.
    pub key: PathBuf,
}

impl TlsConfig {
    /// Empty TLS settings: built-in roots, no client identity.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ca_cert: None,
            client_identity: None,
            accept_invalid_certs: false,
        }
    }

    /// Trusts the PEM root certificate at `path`.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Presents `cert` and `key` for mutual TLS.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_identity = Some(ClientIdentity {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    /// Turns off server certificate verification.
    #[must_use]
    pub const fn insecure(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }
}
