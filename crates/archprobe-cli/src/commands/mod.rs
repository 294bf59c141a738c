//! CLI commands and argument parsing.

pub mod check;
pub mod platforms;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use archprobe_registry::{
    canonical_host, DockerConfig, PlatformProbe, RegistryAuth, RegistryConfig, TlsConfig,
};

/// Exit status when every image supports the platform.
pub const EXIT_SUPPORTED: u8 = 0;

/// Exit status when at least one image lacks the platform.
pub const EXIT_UNSUPPORTED: u8 = 1;

/// Exit status when a probe or the command itself failed.
pub const EXIT_ERROR: u8 = 2;

/// archprobe - Check container images for platform support
#[derive(Parser)]
#[command(name = "archprobe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Check whether images are published for a platform
    Check(check::CheckArgs),

    /// List the platforms an image is published for
    Platforms(platforms::PlatformsArgs),

    /// Print version information
    Version,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines
    Text,
    /// JSON document
    Json,
}

/// Registry connection and credential options shared by commands.
#[derive(Args, Debug, Clone, Default)]
pub struct RegistryArgs {
    /// Docker config file to read credentials from [default: ~/.docker/config.json]
    #[arg(long, env = "ARCHPROBE_DOCKER_CONFIG")]
    pub docker_config: Option<PathBuf>,

    /// Bearer token for authentication
    #[arg(long, env = "ARCHPROBE_REGISTRY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Username for basic authentication
    #[arg(short, long, env = "ARCHPROBE_REGISTRY_USERNAME")]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "ARCHPROBE_REGISTRY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Registry host the explicit credentials are sent to [default: the images' host]
    #[arg(long, value_name = "HOST")]
    pub registry: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Registry host to reach over plain HTTP (repeatable)
    #[arg(long = "plain-http", value_name = "HOST")]
    pub plain_http: Vec<String>,

    /// Endpoint override for a registry host, e.g. `docker.io=https://mirror.example.com`
    #[arg(long = "endpoint", value_name = "HOST=URL", value_parser = parse_endpoint)]
    pub endpoints: Vec<(String, String)>,

    /// CA certificate for registry TLS
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Client certificate for mTLS
    #[arg(long, requires = "client_key")]
    pub client_cert: Option<PathBuf>,

    /// Client private key for mTLS
    #[arg(long, requires = "client_cert")]
    pub client_key: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,
}

impl RegistryArgs {
    /// Builds the registry configuration from the flags.
    pub fn config(&self) -> RegistryConfig {
        let mut config = RegistryConfig::new().with_timeout(Duration::from_secs(self.timeout));

        for host in &self.plain_http {
            config = config.with_plain_http(host.as_str());
        }
        for (host, url) in &self.endpoints {
            config = config.with_endpoint(host.as_str(), url.as_str());
        }

        if self.ca_cert.is_some() || self.client_cert.is_some() || self.insecure {
            let mut tls = TlsConfig::new();
            if let Some(ref ca_cert) = self.ca_cert {
                tls = tls.with_ca_cert(ca_cert.clone());
            }
            if let (Some(ref cert), Some(ref key)) = (&self.client_cert, &self.client_key) {
                tls = tls.with_client_cert(cert.clone(), key.clone());
            }
            if self.insecure {
                tls = tls.insecure();
            }
            config = config.with_tls(tls);
        }

        config
    }

    /// Creates a probe backed by the registry client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created, for example
    /// when a certificate file is unreadable.
    pub fn probe(&self) -> Result<PlatformProbe> {
        PlatformProbe::new(self.config()).context("Failed to create registry client")
    }

    /// Resolves the credentials to use for each registry host.
    ///
    /// Explicit credential flags are bound to `--registry`, or to the single
    /// host every image in `hosts` lives on.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential flags are incomplete, if explicit
    /// credentials are given for images on several hosts without
    /// `--registry`, or if an explicitly named Docker config file cannot be
    /// loaded.
    pub fn credentials<'a>(
        &self,
        hosts: impl IntoIterator<Item = &'a str>,
    ) -> Result<Credentials> {
        let explicit = match determine_auth(self)? {
            Some(auth) => Some((self.credential_host(hosts)?, auth)),
            None => None,
        };

        let docker = match (&self.docker_config, default_docker_config()) {
            (Some(path), _) => DockerConfig::load(path)
                .with_context(|| format!("Failed to load Docker config {}", path.display()))?,
            (None, Some(path)) => load_default_docker_config(&path),
            (None, None) => DockerConfig::default(),
        };

        Ok(Credentials { explicit, docker })
    }

    fn credential_host<'a>(&self, hosts: impl IntoIterator<Item = &'a str>) -> Result<String> {
        if let Some(ref registry) = self.registry {
            return Ok(canonical_host(registry));
        }

        let hosts: BTreeSet<String> = hosts.into_iter().map(canonical_host).collect();
        if hosts.len() > 1 {
            let hosts: Vec<String> = hosts.into_iter().collect();
            anyhow::bail!(
                "Images span several registries ({}); pass --registry to choose where \
                 credentials are sent",
                hosts.join(", ")
            );
        }
        hosts
            .into_iter()
            .next()
            .context("No registry to send credentials to; pass --registry")
    }
}

/// Credentials for registry hosts.
///
/// Explicit flags win over the Docker config, but only for their own host.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    explicit: Option<(String, RegistryAuth)>,
    docker: DockerConfig,
}

impl Credentials {
    /// Returns the credentials to present to `host`.
    pub fn auth_for(&self, host: &str) -> RegistryAuth {
        match self.explicit {
            Some((ref scope, ref auth)) if *scope == canonical_host(host) => auth.clone(),
            _ => self.docker.auth_for(host),
        }
    }
}

/// Determines the authentication method from CLI arguments.
///
/// Returns `None` when no credential flags are given.
fn determine_auth(args: &RegistryArgs) -> Result<Option<RegistryAuth>> {
    if let Some(ref token) = args.token {
        return Ok(Some(RegistryAuth::bearer(token)));
    }

    if let (Some(ref username), Some(ref password)) = (&args.username, &args.password) {
        return Ok(Some(RegistryAuth::basic(username, password)));
    }

    if args.username.is_some() || args.password.is_some() {
        anyhow::bail!("Both --username and --password are required for basic authentication");
    }

    Ok(None)
}

/// Returns `~/.docker/config.json` when it exists.
fn default_docker_config() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".docker").join("config.json"))
        .filter(|path| path.is_file())
}

/// Loads the implicit Docker config, falling back to anonymous access.
fn load_default_docker_config(path: &Path) -> DockerConfig {
    DockerConfig::load(path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable Docker config");
        DockerConfig::default()
    })
}

fn parse_endpoint(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((host, url)) if !host.is_empty() && !url.is_empty() => {
            Ok((host.to_string(), url.to_string()))
        }
        _ => Err(format!("expected HOST=URL, got '{value}'")),
    }
}

/// Returns a token cancelled when the process receives Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling registry requests");
            trigger.cancel();
        }
    });
    cancel
}
