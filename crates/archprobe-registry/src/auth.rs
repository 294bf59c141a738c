//! Docker `config.json` credential store.
//!
//! Only the inline `auths` map is read; credential helpers are not executed.
//! The store is always loaded from an explicit path so that callers decide
//! where credentials come from.

use std::collections::HashMap;
use std::path::Path;

use base64::Engine;
use serde::Deserialize;

use crate::config::RegistryAuth;
use crate::error::RegistryError;

/// Credentials parsed from a Docker `config.json` file.
#[derive(Debug, Clone, Default)]
pub struct DockerConfig {
    auths: HashMap<String, RegistryAuth>,
}

#[derive(Debug, Default, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct DockerAuthEntry {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
    registrytoken: Option<String>,
}

impl DockerConfig {
    /// Loads credentials from the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| RegistryError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents).map_err(|e| RegistryError::InvalidCredentials {
            registry: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Parses credentials from a `config.json` document.
    ///
    /// Entries that cannot be decoded are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let file: DockerConfigFile = serde_json::from_str(contents)?;

        let auths = file
            .auths
            .into_iter()
            .filter_map(|(key, entry)| {
                let host = canonical_host(&key);
                match entry.into_auth() {
                    Ok(Some(auth)) => Some((host, auth)),
                    Ok(None) => None,
                    Err(reason) => {
                        tracing::warn!(
                            registry = %host,
                            %reason,
                            "Skipping unreadable credential entry"
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(Self { auths })
    }

    /// Returns the credentials for `host`, or anonymous access.
    ///
    /// # Examples
    ///
    /// ```
    /// use archprobe_registry::{DockerConfig, RegistryAuth};
    ///
    /// let config = DockerConfig::from_json(
    ///     r#"{"auths":{"https://index.docker.io/v1/":{"auth":"dXNlcjpwYXNz"}}}"#,
    /// ).unwrap();
    /// assert_eq!(config.auth_for("docker.io"), RegistryAuth::basic("user", "pass"));
    /// assert_eq!(config.auth_for("ghcr.io"), RegistryAuth::None);
    /// ```
    #[must_use]
    pub fn auth_for(&self, host: &str) -> RegistryAuth {
        self.auths
            .get(&canonical_host(host))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of registries with usable credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.auths.len()
    }

    /// Returns `true` if no credentials were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.auths.is_empty()
    }
}

impl DockerAuthEntry {
    fn into_auth(self) -> Result<Option<RegistryAuth>, String> {
        if let Some(token) = self.registrytoken.filter(|t| !t.is_empty()) {
            return Ok(Some(RegistryAuth::bearer(token)));
        }

        if let Some(encoded) = self.auth.filter(|a| !a.is_empty()) {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| format!("invalid base64 in auth field: {e}"))?;
            let decoded =
                String::from_utf8(decoded).map_err(|_| "auth field is not UTF-8".to_string())?;
            let (username, password) = decoded
                .split_once(':')
                .ok_or_else(|| "auth field is not user:password".to_string())?;
            return Ok(Some(RegistryAuth::basic(username, password)));
        }

        match (self.username, self.password) {
            (Some(username), Some(password)) => Ok(Some(RegistryAuth::basic(username, password))),
            _ => Ok(None),
        }
    }
}

/// Reduces a `config.json` key or registry host to a bare host name.
///
/// Keys may carry a scheme and path (`https://index.docker.io/v1/`), and
/// Docker Hub is known under several names.
///
/// ```
/// use archprobe_registry::canonical_host;
///
/// assert_eq!(canonical_host("https://index.docker.io/v1/"), "docker.io");
/// assert_eq!(canonical_host("GHCR.io"), "ghcr.io");
/// ```
#[must_use]
pub fn canonical_host(key: &str) -> String {
    let host = key
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host);

    match host {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            "docker.io".to_string()
        }
        other => other.to_lowercase(),
    }
}
