//! Check command implementation.
//!
//! Probes each image for a platform and reports whether it is published.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use archprobe_core::{normalize, with_latest_tag, ImageReference, PlatformSpec};
use archprobe_registry::{PlatformProbe, ResolutionResult};

use super::{
    Credentials, OutputFormat, RegistryArgs, EXIT_ERROR, EXIT_SUPPORTED, EXIT_UNSUPPORTED,
};

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Images to check (e.g. `nginx:1.27`, `ghcr.io/org/app:v2`)
    #[arg(required = true)]
    pub images: Vec<String>,

    /// Platform to look for (`os/arch[/variant]`)
    #[arg(short, long, default_value = "linux/arm64")]
    pub platform: PlatformSpec,

    /// Check the `latest` tag instead of the tag given
    #[arg(long)]
    pub latest: bool,

    /// Number of images probed at once
    #[arg(short = 'j', long, default_value = "8")]
    pub concurrency: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub registry: RegistryArgs,
}

/// Outcome of probing one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The platform is published.
    Supported,
    /// The platform is not published.
    Unsupported,
    /// The probe failed.
    Error,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Supported => "supported",
            Self::Unsupported => "unsupported",
            Self::Error => "error",
        }
    }
}

/// Report line for one image.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Image name as given on the command line.
    pub image: String,
    /// Fully-qualified reference that was probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Probe outcome.
    pub status: Status,
    /// Digest of the matching manifest.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Platforms the image advertises.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<String>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckReport {
    fn resolved(image: &str, reference: &ImageReference, result: ResolutionResult) -> Self {
        Self {
            image: image.to_string(),
            reference: Some(reference.to_string()),
            status: if result.supported {
                Status::Supported
            } else {
                Status::Unsupported
            },
            digest: result.matched_digest,
            platforms: result.platforms.iter().map(ToString::to_string).collect(),
            error: None,
        }
    }

    fn failed(
        image: &str,
        reference: Option<&ImageReference>,
        error: &dyn std::fmt::Display,
    ) -> Self {
        Self {
            image: image.to_string(),
            reference: reference.map(ToString::to_string),
            status: Status::Error,
            digest: None,
            platforms: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// Runs the check command.
///
/// # Errors
///
/// Returns an error if the registry client or credentials cannot be set up.
/// Per-image failures are reported in the output instead.
pub async fn run(args: &CheckArgs) -> Result<ExitCode> {
    let probe = args.registry.probe()?;
    let named: Vec<ImageReference> = args.images.iter().map(|image| normalize(image)).collect();
    let credentials = args
        .registry
        .credentials(named.iter().map(ImageReference::registry_host))?;
    let cancel = super::cancel_on_ctrl_c();

    info!(
        images = args.images.len(),
        platform = %args.platform,
        "Checking images"
    );

    let reports = check_all(&probe, &credentials, args, &cancel).await;

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&reports)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    Ok(ExitCode::from(exit_status(&reports)))
}

/// Probes every image, at most `concurrency` at a time, keeping input order.
async fn check_all<T: archprobe_registry::Transport>(
    probe: &PlatformProbe<T>,
    credentials: &Credentials,
    args: &CheckArgs,
    cancel: &CancellationToken,
) -> Vec<CheckReport> {
    stream::iter(&args.images)
        .map(|image| check_one(probe, credentials, args, image, cancel))
        .buffered(args.concurrency.max(1))
        .collect()
        .await
}

async fn check_one<T: archprobe_registry::Transport>(
    probe: &PlatformProbe<T>,
    credentials: &Credentials,
    args: &CheckArgs,
    image: &str,
    cancel: &CancellationToken,
) -> CheckReport {
    let reference = if args.latest {
        with_latest_tag(image)
    } else {
        let reference = normalize(image);
        reference.validate().map(|()| reference)
    };
    let reference = match reference {
        Ok(reference) => reference,
        Err(e) => return CheckReport::failed(image, None, &e),
    };

    let auth = credentials.auth_for(reference.registry_host());
    match probe
        .check_reference(&reference, &args.platform, &auth, cancel)
        .await
    {
        Ok(result) => CheckReport::resolved(image, &reference, result),
        Err(e) => {
            tracing::debug!(%reference, kind = %e.kind(), "Probe failed");
            CheckReport::failed(image, Some(&reference), &e)
        }
    }
}

/// Maps reports to the process exit status; errors outrank unsupported.
fn exit_status(reports: &[CheckReport]) -> u8 {
    if reports.iter().any(|r| r.status == Status::Error) {
        EXIT_ERROR
    } else if reports.iter().any(|r| r.status == Status::Unsupported) {
        EXIT_UNSUPPORTED
    } else {
        EXIT_SUPPORTED
    }
}

fn render_text(reports: &[CheckReport]) -> String {
    let width = reports.iter().map(|r| r.image.len()).max().unwrap_or(0);

    reports
        .iter()
        .map(|report| {
            let detail = match report.status {
                Status::Supported => report.digest.clone().unwrap_or_default(),
                Status::Unsupported if report.platforms.is_empty() => String::new(),
                Status::Unsupported => format!("available: {}", report.platforms.join(", ")),
                Status::Error => report.error.clone().unwrap_or_default(),
            };
            let line = format!(
                "{:<width$}  {:<11}  {detail}",
                report.image,
                report.status.as_str()
            );
            format!("{}\n", line.trim_end())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use archprobe_registry::{RawManifest, RegistryAuth, RegistryError, Transport};
    use async_trait::async_trait;

    /// In-memory transport serving one manifest list for `library/nginx`.
    struct StaticTransport;

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get_manifest(
            &self,
            reference: &ImageReference,
            _auth: &RegistryAuth,
        ) -> Result<RawManifest, RegistryError> {
            if reference.repository_path() != "library/nginx" {
                return Err(RegistryError::NotFound {
                    reference: reference.to_string(),
                });
            }
            let body = serde_json::json!({
                "schemaVersion": 2,
                "mediaType": "application/vnd.oci.image.index.v1+json",
                "manifests": [
                    {
                        "mediaType": "application/vnd.oci.image.manifest.v1+json",
                        "digest": "sha256:amd",
                        "size": 1,
                        "platform": {"os": "linux", "architecture": "amd64"}
                    },
                    {
                        "mediaType": "application/vnd.oci.image.manifest.v1+json",
                        "digest": "sha256:arm",
                        "size": 1,
                        "platform": {"os": "linux", "architecture": "arm64"}
                    }
                ]
            });
            Ok(RawManifest::new(
                "application/vnd.oci.image.index.v1+json",
                body.to_string(),
            ))
        }

        async fn get_blob(
            &self,
            reference: &ImageReference,
            _digest: &str,
            _auth: &RegistryAuth,
        ) -> Result<Vec<u8>, RegistryError> {
            Err(RegistryError::NotFound {
                reference: reference.to_string(),
            })
        }
    }

    fn args(images: &[&str], platform: &str) -> CheckArgs {
        CheckArgs {
            images: images.iter().map(ToString::to_string).collect(),
            platform: platform.parse().unwrap(),
            latest: false,
            concurrency: 2,
            format: OutputFormat::Text,
            registry: RegistryArgs::default(),
        }
    }

    async fn run_checks(args: &CheckArgs) -> Vec<CheckReport> {
        let probe = PlatformProbe::with_transport(StaticTransport);
        check_all(&probe, &Credentials::default(), args, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn test_reports_keep_input_order() {
        let args = args(&["nginx:1", "ghcr.io/acme/missing:1", "nginx"], "linux/arm64");
        let reports = run_checks(&args).await;

        let statuses: Vec<_> = reports.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Status::Supported, Status::Error, Status::Supported]);
        assert_eq!(reports[0].digest.as_deref(), Some("sha256:arm"));
        assert_eq!(reports[0].reference.as_deref(), Some("docker.io/library/nginx:1"));
        assert_eq!(exit_status(&reports), EXIT_ERROR);
    }

    #[tokio::test]
    async fn test_unsupported_lists_available_platforms() {
        let reports = run_checks(&args(&["nginx:1"], "linux/riscv64")).await;

        assert_eq!(reports[0].status, Status::Unsupported);
        assert_eq!(reports[0].platforms, vec!["linux/amd64", "linux/arm64"]);
        assert_eq!(exit_status(&reports), EXIT_UNSUPPORTED);
        assert_eq!(
            render_text(&reports),
            "nginx:1  unsupported  available: linux/amd64, linux/arm64\n"
        );
    }

    #[tokio::test]
    async fn test_invalid_reference_is_reported() {
        let mut args = args(&["nginx:1", ":1.0"], "linux/arm64");
        args.latest = true;
        let reports = run_checks(&args).await;

        assert_eq!(reports[0].status, Status::Supported);
        assert_eq!(reports[0].reference.as_deref(), Some("docker.io/library/nginx:latest"));
        assert_eq!(reports[1].status, Status::Error);
        assert!(reports[1].reference.is_none());
    }

    #[test]
    fn test_exit_status_all_supported() {
        assert_eq!(exit_status(&[]), EXIT_SUPPORTED);
    }

    #[test]
    fn test_json_report_shape() {
        let report = CheckReport {
            image: "nginx".to_string(),
            reference: Some("docker.io/library/nginx".to_string()),
            status: Status::Supported,
            digest: Some("sha256:arm".to_string()),
            platforms: vec!["linux/arm64".to_string()],
            error: None,
        };
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "supported");
        assert_eq!(json["digest"], "sha256:arm");
        assert!(json.get("error").is_none());
    }
}
