// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Build plan: the ordered steps that assemble an image.
//!
//! Step order is fixed and load-bearing. OS packages (with cache purge in the
//! same step) come first, then runtime dependencies before the source copy so
//! dependency layers are invalidated only by manifest edits, then the source
//! tree, then the ownership transfer to the non-privileged identity.

use std::path::PathBuf;
use thiserror::Error;
use wharf_core::{ContractError, ImageSpec, Manifest, ManifestError};

/// OS packages an image is allowed to carry: network probe tooling only.
/// No compiler toolchains, no extraneous tooling.
pub const ALLOWED_OS_PACKAGES: &[&str] = &["curl", "wget", "ca-certificates"];

/// Errors from plan construction.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("OS package '{0}' is not probe tooling (allowed: curl, wget, ca-certificates)")]
    DisallowedPackage(String),

    #[error("source tree {0} does not exist")]
    MissingSource(PathBuf),
}

/// One step of the build, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStep {
    /// Install OS-level packages and purge the package-manager cache.
    OsPackages { packages: Vec<String> },
    /// Install pinned runtime dependencies from the manifest.
    RuntimeDeps { manifest: Manifest },
    /// Copy the application source tree verbatim.
    CopySource { from: PathBuf },
    /// Create the non-privileged identity and chown the working directory.
    CreateUser { user: String },
}

impl BuildStep {
    /// Step name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            BuildStep::OsPackages { .. } => "os-packages",
            BuildStep::RuntimeDeps { .. } => "runtime-deps",
            BuildStep::CopySource { .. } => "copy-source",
            BuildStep::CreateUser { .. } => "create-user",
        }
    }
}

/// A validated, ordered build plan derived from an [`ImageSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub base: String,
    steps: Vec<BuildStep>,
}

impl BuildPlan {
    /// Validate the spec and derive the step list.
    ///
    /// Reads and parses the manifest file; a manifest error here aborts the
    /// build before any step runs (all-or-nothing).
    pub fn from_spec(spec: &ImageSpec) -> Result<Self, PlanError> {
        spec.contract.validate()?;
        for pkg in &spec.os_packages {
            if !ALLOWED_OS_PACKAGES.contains(&pkg.as_str()) {
                return Err(PlanError::DisallowedPackage(pkg.clone()));
            }
        }
        if !spec.source.is_dir() {
            return Err(PlanError::MissingSource(spec.source.clone()));
        }
        let manifest = Manifest::from_path(&spec.manifest)?;

        let mut steps = Vec::with_capacity(4);
        if !spec.os_packages.is_empty() {
            steps.push(BuildStep::OsPackages { packages: spec.os_packages.clone() });
        }
        steps.push(BuildStep::RuntimeDeps { manifest });
        steps.push(BuildStep::CopySource { from: spec.source.clone() });
        steps.push(BuildStep::CreateUser { user: spec.contract.runtime_user.clone() });

        Ok(Self { base: spec.base.clone(), steps })
    }

    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// The parsed dependency set this plan will install.
    pub fn manifest(&self) -> &Manifest {
        // from_spec always pushes a RuntimeDeps step
        for step in &self.steps {
            if let BuildStep::RuntimeDeps { manifest } = step {
                return manifest;
            }
        }
        unreachable!("plan has no runtime-deps step")
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
