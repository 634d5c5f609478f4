// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Image model: build inputs and built-image metadata.
//!
//! An [`ImageSpec`] is what the builder consumes, deserialized from a
//! `wharf.toml` build file. An [`ImageMeta`] is what a finished image records
//! about itself, serialized as `image.json` inside the image directory.

use crate::contract::SupervisorContract;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a built image.
    ///
    /// Assigned at build commit time; a rebuild produces a new ID even when
    /// the content digest is unchanged.
    pub struct ImageId("img-");
}

/// Name of the metadata file written into every image directory.
pub const IMAGE_META_FILE: &str = "image.json";

/// Errors loading or validating image specs and metadata.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid build spec: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid image metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base runtime tag must not be empty")]
    EmptyBase,
}

/// Build inputs: what to assemble into an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Base runtime tag (e.g. "python:3.12-slim").
    pub base: String,
    /// OS-level packages, constrained to network probe tooling.
    #[serde(default)]
    pub os_packages: Vec<String>,
    /// Path to the dependency manifest (relative to the spec file).
    pub manifest: PathBuf,
    /// Application source tree, copied verbatim.
    pub source: PathBuf,
    /// Working directory inside the image.
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    /// The runtime contract recorded into the image.
    pub contract: SupervisorContract,
}

fn default_workdir() -> PathBuf {
    PathBuf::from("/app")
}

impl ImageSpec {
    /// Parse a `wharf.toml` build spec.
    pub fn from_toml(text: &str) -> Result<Self, ImageError> {
        let spec: Self = toml::from_str(text)?;
        spec.validate_base()?;
        Ok(spec)
    }

    /// Read a build spec file, resolving `manifest` and `source` relative to it.
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let text = std::fs::read_to_string(path).map_err(|e| ImageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut spec = Self::from_toml(&text)?;
        if let Some(dir) = path.parent() {
            if spec.manifest.is_relative() {
                spec.manifest = dir.join(&spec.manifest);
            }
            if spec.source.is_relative() {
                spec.source = dir.join(&spec.source);
            }
        }
        Ok(spec)
    }

    fn validate_base(&self) -> Result<(), ImageError> {
        if self.base.trim().is_empty() {
            return Err(ImageError::EmptyBase);
        }
        Ok(())
    }
}

/// Metadata recorded by a finished build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub id: ImageId,
    /// Content digest over the committed layer listing (hex sha256).
    pub digest: String,
    pub base: String,
    /// Installed dependency set, pinned.
    pub dependencies: Manifest,
    pub workdir: PathBuf,
    pub contract: SupervisorContract,
    pub created_at_ms: u64,
}

impl ImageMeta {
    /// Read `image.json` from an image directory.
    pub fn from_dir(image_dir: &Path) -> Result<Self, ImageError> {
        let path = image_dir.join(IMAGE_META_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| ImageError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write `image.json` into an image directory.
    pub fn write_to(&self, image_dir: &Path) -> Result<(), ImageError> {
        let path = image_dir.join(IMAGE_META_FILE);
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, text).map_err(|e| ImageError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
