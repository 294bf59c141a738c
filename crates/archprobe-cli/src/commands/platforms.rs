//! Platforms command implementation.
//!
//! Lists the platforms an image is published for.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use archprobe_core::{normalize, with_latest_tag, PlatformSpec};

use super::{OutputFormat, RegistryArgs, EXIT_SUPPORTED, EXIT_UNSUPPORTED};

/// Arguments for the platforms command.
#[derive(Args)]
pub struct PlatformsArgs {
    /// Image to inspect (e.g. `redis:7`)
    pub image: String,

    /// Platform to mark in the listing
    #[arg(short, long, default_value = "linux/arm64")]
    pub platform: PlatformSpec,

    /// Inspect the `latest` tag instead of the tag given
    #[arg(long)]
    pub latest: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub registry: RegistryArgs,
}

#[derive(Debug, Serialize)]
struct PlatformListing {
    reference: String,
    platforms: Vec<PlatformSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_digest: Option<String>,
}

/// Runs the platforms command.
///
/// Exits with status 1 when the marked platform is not among those listed.
///
/// # Errors
///
/// Returns an error if the reference is invalid or the image cannot be
/// fetched or understood.
pub async fn run(args: &PlatformsArgs) -> Result<ExitCode> {
    let reference = if args.latest {
        with_latest_tag(&args.image)?
    } else {
        let reference = normalize(&args.image);
        reference.validate()?;
        reference
    };

    let probe = args.registry.probe()?;
    let auth = args
        .registry
        .credentials([reference.registry_host()])?
        .auth_for(reference.registry_host());
    let cancel = super::cancel_on_ctrl_c();

    let result = probe
        .check_reference(&reference, &args.platform, &auth, &cancel)
        .await
        .with_context(|| format!("Failed to inspect {reference}"))?;

    let listing = PlatformListing {
        reference: reference.to_string(),
        platforms: result.platforms,
        matched_digest: result.matched_digest,
    };

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&listing, &args.platform)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
    }

    Ok(ExitCode::from(if result.supported {
        EXIT_SUPPORTED
    } else {
        EXIT_UNSUPPORTED
    }))
}

/// Lists the platforms, starring those the probe accepted.
///
/// A single-platform image is accepted on os and architecture alone, so the
/// variant is only compared when some listed platform matches it exactly.
fn render_text(listing: &PlatformListing, want: &PlatformSpec) -> String {
    let mut out = format!("{}\n", listing.reference);
    if listing.platforms.is_empty() {
        out.push_str("  (no platforms advertised)\n");
    }

    let supported = listing.matched_digest.is_some();
    let exact = listing.platforms.iter().any(|p| want.matches(p));
    for platform in &listing.platforms {
        let accepted = supported
            && if exact {
                want.matches(platform)
            } else {
                want.matches_os_arch(platform)
            };
        let marker = if accepted { '*' } else { ' ' };
        out.push_str(&format!("{marker} {platform}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_marks_wanted_platform() {
        let listing = PlatformListing {
            reference: "docker.io/library/redis:7".to_string(),
            platforms: vec![
                PlatformSpec::new("linux", "amd64"),
                PlatformSpec::new("linux", "arm64").with_variant("v8"),
            ],
            matched_digest: Some("sha256:arm".to_string()),
        };

        assert_eq!(
            render_text(&listing, &PlatformSpec::linux_arm64()),
            "docker.io/library/redis:7\n  linux/amd64\n* linux/arm64/v8\n"
        );
    }

    #[test]
    fn test_render_text_marks_single_platform_ignoring_variant() {
        let listing = PlatformListing {
            reference: "ghcr.io/acme/tool:1".to_string(),
            platforms: vec![PlatformSpec::new("linux", "arm64")],
            matched_digest: Some("sha256:single".to_string()),
        };
        let want = PlatformSpec::new("linux", "arm64").with_variant("v8");

        assert_eq!(
            render_text(&listing, &want),
            "ghcr.io/acme/tool:1\n* linux/arm64\n"
        );
    }

    #[test]
    fn test_render_text_unsupported_marks_nothing() {
        let listing = PlatformListing {
            reference: "docker.io/library/redis:7".to_string(),
            platforms: vec![PlatformSpec::new("linux", "arm").with_variant("v6")],
            matched_digest: None,
        };
        let want = PlatformSpec::new("linux", "arm").with_variant("v7");

        assert_eq!(
            render_text(&listing, &want),
            "docker.io/library/redis:7\n  linux/arm/v6\n"
        );
    }

    #[test]
    fn test_render_text_empty() {
        let listing = PlatformListing {
            reference: "ghcr.io/acme/tool:1".to_string(),
            platforms: Vec::new(),
            matched_digest: None,
        };

        assert!(render_text(&listing, &PlatformSpec::linux_arm64()).contains("no platforms"));
    }

    #[test]
    fn test_json_listing() {
        let listing = PlatformListing {
            reference: "docker.io/library/redis:7".to_string(),
            platforms: vec![PlatformSpec::new("linux", "s390x")],
            matched_digest: None,
        };
        let json = serde_json::to_value(&listing).unwrap();

        assert_eq!(json["platforms"][0]["architecture"], "s390x");
        assert!(json.get("matched_digest").is_none());
    }
}
