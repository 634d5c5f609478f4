// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Dependency manifest parsing.
//!
//! A manifest lists third-party runtime dependencies, one per line, pinned to
//! an exact version (`name==version`). Blank lines and `#` comments are
//! ignored. Anything unpinned is rejected up front: builds are all-or-nothing,
//! so resolution ambiguity is a parse error, not an install-time surprise.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors produced while parsing a dependency manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Line is not of the form `name==version`.
    #[error("line {line}: '{text}' is not pinned (expected name==version)")]
    Unpinned {
        /// 1-based line number in the manifest.
        line: usize,
        /// The offending line text.
        text: String,
    },

    /// Dependency name contains characters outside `[A-Za-z0-9._-]`.
    #[error("line {line}: invalid dependency name '{name}'")]
    InvalidName {
        /// 1-based line number in the manifest.
        line: usize,
        /// The invalid name.
        name: String,
    },

    /// Version string is empty.
    #[error("line {line}: empty version for '{name}'")]
    EmptyVersion {
        /// 1-based line number in the manifest.
        line: usize,
        /// Dependency whose version is missing.
        name: String,
    },

    /// Same dependency listed twice.
    #[error("line {line}: duplicate dependency '{name}'")]
    Duplicate {
        /// 1-based line number of the second occurrence.
        line: usize,
        /// The duplicated name.
        name: String,
    },

    /// Manifest file could not be read.
    #[error("failed to read manifest {path}: {message}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying error text.
        message: String,
    },
}

/// A single pinned dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into() }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// An ordered set of pinned dependencies.
///
/// Order is preserved from the source file so the rendered manifest stays
/// byte-stable across round trips (layer caching depends on it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<Dependency>,
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let mut entries: Vec<Dependency> = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (name, version) = trimmed.split_once("==").ok_or_else(|| {
                ManifestError::Unpinned { line, text: trimmed.to_string() }
            })?;
            let name = name.trim();
            let version = version.trim();
            if name.is_empty() || !name.chars().all(valid_name_char) {
                return Err(ManifestError::InvalidName { line, name: name.to_string() });
            }
            if version.is_empty() {
                return Err(ManifestError::EmptyVersion { line, name: name.to_string() });
            }
            if entries.iter().any(|d| d.name.eq_ignore_ascii_case(name)) {
                return Err(ManifestError::Duplicate { line, name: name.to_string() });
            }
            entries.push(Dependency::new(name, version));
        }
        Ok(Self { entries })
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&text)
    }

    pub fn entries(&self) -> &[Dependency] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Display for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for dep in &self.entries {
            writeln!(f, "{dep}")?;
        }
        Ok(())
    }
}

fn valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
