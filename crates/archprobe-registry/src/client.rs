//! OCI Distribution API client.
//!
//! [`RegistryClient`] is the reqwest-backed [`Transport`]: it builds the
//! `/v2/<name>/manifests/<reference>` and `/v2/<name>/blobs/<digest>` URLs,
//! attaches credentials, and answers a bearer-token challenge once per
//! request.

use std::path::Path;

use archprobe_core::ImageReference;
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE,
};
use reqwest::{Response, StatusCode};
use serde::Deserialize;

use crate::config::{RegistryAuth, RegistryConfig};
use crate::error::RegistryError;
use crate::oci::{ErrorResponse, MediaType};
use crate::transport::{RawManifest, Transport};

/// Header carrying the canonical manifest digest.
const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Client for interacting with OCI-compatible registries.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryConfig,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Creates a new registry client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS material cannot be read or the HTTP client
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use archprobe_registry::{RegistryClient, RegistryConfig};
    ///
    /// let client = RegistryClient::new(RegistryConfig::new())?;
    /// # Ok::<(), archprobe_registry::RegistryError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        let http = Self::build_http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Returns the manifest URL for `reference`.
    #[must_use]
    pub fn manifest_url(&self, reference: &ImageReference) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.config.endpoint_for(reference.registry_host()),
            reference.repository_path(),
            reference.reference()
        )
    }

    /// Returns the blob URL for `digest` in the repository of `reference`.
    #[must_use]
    pub fn blob_url(&self, reference: &ImageReference, digest: &str) -> String {
        format!(
            "{}/v2/{}/blobs/{digest}",
            self.config.endpoint_for(reference.registry_host()),
            reference.repository_path(),
        )
    }

    /// Sends a GET request, exchanging a bearer token if the registry asks
    /// for one, and maps error statuses.
    async fn get(
        &self,
        url: &str,
        accept: Option<&str>,
        reference: &ImageReference,
        auth: &RegistryAuth,
    ) -> Result<Response, RegistryError> {
        let send = |headers: HeaderMap| {
            let mut request = self.http.get(url).headers(headers);
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }
            request.send()
        };

        tracing::debug!(%url, "GET");
        let mut response = send(Self::auth_headers(auth, reference.registry_host())?).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && !matches!(auth, RegistryAuth::Bearer { .. })
        {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(BearerChallenge::parse);

            if let Some(challenge) = challenge {
                let token = self.fetch_token(&challenge, reference, auth).await?;
                let headers =
                    Self::auth_headers(&RegistryAuth::bearer(token), reference.registry_host())?;
                tracing::debug!(%url, "GET with exchanged token");
                response = send(headers).await?;
            }
        }

        Self::check_status(response, reference).await
    }

    /// Requests a bearer token from the challenge realm.
    async fn fetch_token(
        &self,
        challenge: &BearerChallenge,
        reference: &ImageReference,
        auth: &RegistryAuth,
    ) -> Result<String, RegistryError> {
        let mut token_url =
            url::Url::parse(&challenge.realm).map_err(|_| RegistryError::InvalidUrl {
                url: challenge.realm.clone(),
            })?;

        {
            let mut query = token_url.query_pairs_mut();
            if let Some(ref service) = challenge.service {
                query.append_pair("service", service);
            }
            let default_scope = format!("repository:{}:pull", reference.repository_path());
            query.append_pair("scope", challenge.scope.as_deref().unwrap_or(&default_scope));
        }

        tracing::debug!(realm = %challenge.realm, "Requesting registry token");

        let mut request = self.http.get(token_url);
        if let RegistryAuth::Basic { username, password } = auth {
            request = request.basic_auth(username, Some(password));
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::AuthenticationFailed {
                message: format!(
                    "token request to {} failed with {status}: {}",
                    challenge.realm,
                    ErrorResponse::message_from_body(&body)
                ),
            });
        }

        let token: TokenResponse = response.json().await?;
        token
            .token
            .or(token.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RegistryError::AuthenticationFailed {
                message: format!("token endpoint {} returned no token", challenge.realm),
            })
    }

    /// Maps non-success statuses to errors.
    async fn check_status(
        response: Response,
        reference: &ImageReference,
    ) -> Result<Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = ErrorResponse::message_from_body(&body);

        Err(match status {
            StatusCode::NOT_FOUND => RegistryError::NotFound {
                reference: reference.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                RegistryError::AuthenticationFailed {
                    message: format!("{status} for {reference}: {message}"),
                }
            }
            StatusCode::TOO_MANY_REQUESTS => RegistryError::RateLimited {
                reference: reference.to_string(),
            },
            _ => RegistryError::HttpError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Builds the reqwest client: timeout, user agent and TLS material.
    fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client, RegistryError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        if let Some(tls) = &config.tls {
            builder = builder.danger_accept_invalid_certs(tls.accept_invalid_certs);

            if let Some(path) = &tls.ca_cert {
                let cert = reqwest::Certificate::from_pem(&read_pem(path)?)
                    .map_err(|e| invalid_pem(path, "CA certificate", &e))?;
                builder = builder.add_root_certificate(cert);
            }

            if let Some(identity) = &tls.client_identity {
                // reqwest wants certificate and key in one PEM buffer
                let mut pem = read_pem(&identity.cert)?;
                pem.extend_from_slice(&read_pem(&identity.key)?);
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| invalid_pem(&identity.cert, "client certificate", &e))?;
                builder = builder.identity(identity);
            }
        }

        builder.build().map_err(|e| RegistryError::ConnectionFailed {
            url: "<client setup>".to_string(),
            source: e,
        })
    }

    /// Creates authentication headers for `auth`.
    fn auth_headers(auth: &RegistryAuth, registry: &str) -> Result<HeaderMap, RegistryError> {
        let mut headers = HeaderMap::new();

        let value = match auth {
            RegistryAuth::None => return Ok(headers),
            RegistryAuth::Basic { username, password } => {
                let credentials = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{username}:{password}"),
                );
                format!("Basic {credentials}")
            }
            RegistryAuth::Bearer { token } => format!("Bearer {token}"),
        };

        let mut value =
            HeaderValue::from_str(&value).map_err(|_| RegistryError::InvalidCredentials {
                registry: registry.to_string(),
                message: "credentials contain characters not allowed in a header".to_string(),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        Ok(headers)
    }
}

#[async_trait]
impl Transport for RegistryClient {
    async fn get_manifest(
        &self,
        reference: &ImageReference,
        auth: &RegistryAuth,
    ) -> Result<RawManifest, RegistryError> {
        let url = self.manifest_url(reference);
        let accept = MediaType::manifest_accept_header();
        let response = self.get(&url, Some(&accept), reference, auth).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await?.to_vec();
        tracing::debug!(%reference, %content_type, size = bytes.len(), "Fetched manifest");

        Ok(RawManifest {
            content_type,
            bytes,
            digest,
        })
    }

    async fn get_blob(
        &self,
        reference: &ImageReference,
        digest: &str,
        auth: &RegistryAuth,
    ) -> Result<Vec<u8>, RegistryError> {
        let url = self.blob_url(reference, digest);
        let response = self.get(&url, None, reference, auth).await?;
        let bytes = response.bytes().await?.to_vec();
        tracing::debug!(%reference, %digest, size = bytes.len(), "Fetched blob");
        Ok(bytes)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, RegistryError> {
    std::fs::read(path).map_err(|e| RegistryError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn invalid_pem(path: &Path, what: &str, err: &reqwest::Error) -> RegistryError {
    RegistryError::InvalidCredentials {
        registry: path.display().to_string(),
        message: format!("unusable {what}: {err}"),
    }
}

/// Response body of a token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl BearerChallenge {
    /// Parses a bearer challenge; returns `None` for other schemes or a
    /// missing realm.
    fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;

        for (key, value) in split_params(params) {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            service,
            scope,
        })
    }
}

/// Splits `key="value", key=value` pairs, keeping commas inside quotes.
fn split_params(params: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = params.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_string();
        rest = rest[eq + 1..].trim_start();

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            let value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or_default();
            value
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };

        pairs.push((key, value));
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }

    pairs
}
