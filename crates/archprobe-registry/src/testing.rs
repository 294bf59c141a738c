//! In-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use archprobe_core::{normalize, ImageReference};
use async_trait::async_trait;

use crate::config::RegistryAuth;
use crate::error::RegistryError;
use crate::transport::{RawManifest, Transport};

#[derive(Debug, Default)]
pub struct FakeTransport {
    manifests: HashMap<String, RawManifest>,
    blobs: HashMap<String, Vec<u8>>,
    hang: bool,
    pub manifest_calls: AtomicUsize,
    pub blob_calls: AtomicUsize,
}

fn key(reference: &ImageReference) -> String {
    format!(
        "{}/{}@{}",
        reference.registry_host(),
        reference.repository_path(),
        reference.reference()
    )
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(mut self, name: &str, manifest: RawManifest) -> Self {
        self.manifests.insert(key(&normalize(name)), manifest);
        self
    }

    pub fn with_blob(mut self, digest: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(digest.to_string(), bytes.into());
        self
    }

    /// Every call blocks forever.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.manifest_calls.load(Ordering::SeqCst),
            self.blob_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_manifest(
        &self,
        reference: &ImageReference,
        _auth: &RegistryAuth,
    ) -> Result<RawManifest, RegistryError> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.manifests
            .get(&key(reference))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                reference: reference.to_string(),
            })
    }

    async fn get_blob(
        &self,
        _reference: &ImageReference,
        digest: &str,
        _auth: &RegistryAuth,
    ) -> Result<Vec<u8>, RegistryError> {
        self.blob_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.blobs
            .get(digest)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                reference: digest.to_string(),
            })
    }
}

/// An index document with one entry per `(digest, os, arch)`.
pub fn index_json(entries: &[(&str, &str, &str)]) -> String {
    let manifests: Vec<serde_json::Value> = entries
        .iter()
        .map(|(digest, os, arch)| {
            serde_json::json!({
                "mediaType": crate::MediaType::OCI_MANIFEST,
                "digest": digest,
                "size": 1024,
                "platform": {"os": os, "architecture": arch}
            })
        })
        .collect();
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": crate::MediaType::OCI_INDEX,
        "manifests": manifests
    })
    .to_string()
}

/// An image manifest pointing at config blob `config_digest`.
pub fn image_manifest_json(config_digest: &str) -> String {
    serde_json::json!({
        "schemaVersion": 2,
        "mediaType": crate::MediaType::DOCKER_MANIFEST,
        "config": {
            "mediaType": crate::MediaType::DOCKER_CONFIG,
            "digest": config_digest,
            "size": 1469
        },
        "layers": [{
            "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
            "digest": "sha256:layer",
            "size": 3_000_000
        }]
    })
    .to_string()
}

/// A configuration blob for `os`/`arch`.
pub fn config_json(os: &str, arch: &str) -> String {
    serde_json::json!({
        "architecture": arch,
        "os": os,
        "config": {"Cmd": ["/bin/sh"]},
        "rootfs": {"type": "layers", "diff_ids": []}
    })
    .to_string()
}
