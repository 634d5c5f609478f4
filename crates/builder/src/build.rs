// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Staged, all-or-nothing image assembly.
//!
//! Everything happens inside a temporary staging directory created next to
//! the image store. A failure at any step drops the stage; only a fully
//! assembled, swept, chowned tree is renamed into the store, so there is
//! never a partial image to observe.

use crate::installer::{run_with_timeout, InstallerError, PackageInstaller, INSTALL_TIMEOUT};
use crate::plan::{BuildPlan, BuildStep, PlanError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use wharf_core::image::ImageError;
use wharf_core::{Clock, ImageId, ImageMeta, ImageSpec};

/// Manifest filename written into the stage before dependency install.
const STAGED_MANIFEST: &str = "requirements.txt";

/// Directory names swept from the stage before commit.
const CACHE_DIRS: &[&str] = &["__pycache__", ".cache", "pip-cache"];

/// Errors from build execution. None of these leave partial state behind.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Installer(#[from] InstallerError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runtime user '{user}' does not exist and cannot be created without privileges")]
    UnknownUser { user: String },

    #[error("failed to resolve runtime user '{user}': {message}")]
    UserLookup { user: String, message: String },
}

fn io_err(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> BuildError {
    let context = context.into();
    move |source| BuildError::Io { context, source }
}

/// Assembles images into a store directory.
pub struct ImageBuilder<I: PackageInstaller, C: Clock> {
    installer: I,
    clock: C,
    store_dir: PathBuf,
}

impl<I: PackageInstaller, C: Clock> ImageBuilder<I, C> {
    pub fn new(installer: I, clock: C, store_dir: impl Into<PathBuf>) -> Self {
        Self { installer, clock, store_dir: store_dir.into() }
    }

    /// Directory a finished image lands in.
    pub fn image_dir(&self, id: &ImageId) -> PathBuf {
        self.store_dir.join(id.as_str())
    }

    /// Run the full build. Returns the committed image's metadata.
    pub async fn build(&self, spec: &ImageSpec) -> Result<ImageMeta, BuildError> {
        let plan = BuildPlan::from_spec(spec)?;
        std::fs::create_dir_all(&self.store_dir)
            .map_err(io_err(format!("create image store {}", self.store_dir.display())))?;

        // Stage inside the store so the final rename stays on one filesystem.
        let stage = tempfile::Builder::new()
            .prefix(".stage-")
            .tempdir_in(&self.store_dir)
            .map_err(io_err("create staging directory"))?;

        for step in plan.steps() {
            tracing::info!(step = step.name(), "build step");
            self.run_step(step, stage.path()).await?;
        }

        sweep_artifacts(stage.path())?;
        let digest = digest_tree(stage.path())?;

        let id = ImageId::new();
        let meta = ImageMeta {
            id: id.clone(),
            digest,
            base: plan.base.clone(),
            dependencies: plan.manifest().clone(),
            workdir: spec.workdir.clone(),
            contract: spec.contract.clone(),
            created_at_ms: self.clock.epoch_ms(),
        };
        meta.write_to(stage.path())?;

        let image_dir = self.image_dir(&id);
        let stage_path = stage.keep();
        if let Err(e) = std::fs::rename(&stage_path, &image_dir) {
            let _ = std::fs::remove_dir_all(&stage_path);
            return Err(BuildError::Io {
                context: format!("commit image to {}", image_dir.display()),
                source: e,
            });
        }
        tracing::info!(image = %meta.id, digest = %meta.digest, "image committed");
        Ok(meta)
    }

    async fn run_step(&self, step: &BuildStep, stage: &Path) -> Result<(), BuildError> {
        match step {
            BuildStep::OsPackages { packages } => {
                self.installer.install_os_packages(stage, packages).await?;
            }
            BuildStep::RuntimeDeps { manifest } => {
                let manifest_path = stage.join(STAGED_MANIFEST);
                std::fs::write(&manifest_path, manifest.to_string())
                    .map_err(io_err("write staged manifest"))?;
                self.installer.install_deps(stage, &manifest_path).await?;
            }
            BuildStep::CopySource { from } => {
                copy_tree(from, &stage.join("app"))?;
            }
            BuildStep::CreateUser { user } => {
                let (uid, gid) = ensure_user(user).await?;
                // Ownership transfer must complete at build time, before any
                // instance accepts its first request.
                chown_tree(stage, uid, gid)?;
            }
        }
        Ok(())
    }
}

/// Resolve the runtime user, creating it when running privileged.
async fn ensure_user(name: &str) -> Result<(u32, u32), BuildError> {
    if let Some(user) = lookup_user(name)? {
        return Ok(user);
    }
    if !nix::unistd::geteuid().is_root() {
        return Err(BuildError::UnknownUser { user: name.to_string() });
    }
    let mut cmd = Command::new("useradd");
    cmd.args(["--system", "--no-create-home", "--shell", "/usr/sbin/nologin", name]);
    run_with_timeout(cmd, INSTALL_TIMEOUT, "create-user").await.map_err(|e| match e {
        InstallerError::Failed { stderr, .. } => {
            BuildError::UserLookup { user: name.to_string(), message: stderr }
        }
        other => BuildError::Installer(other),
    })?;
    lookup_user(name)?.ok_or_else(|| BuildError::UnknownUser { user: name.to_string() })
}

fn lookup_user(name: &str) -> Result<Option<(u32, u32)>, BuildError> {
    nix::unistd::User::from_name(name)
        .map(|opt| opt.map(|u| (u.uid.as_raw(), u.gid.as_raw())))
        .map_err(|e| BuildError::UserLookup { user: name.to_string(), message: e.to_string() })
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), BuildError> {
    std::fs::create_dir_all(to).map_err(io_err(format!("create {}", to.display())))?;
    let entries =
        std::fs::read_dir(from).map_err(io_err(format!("read source {}", from.display())))?;
    for entry in entries {
        let entry = entry.map_err(io_err("read source entry"))?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        let meta = entry.metadata().map_err(io_err(format!("stat {}", src.display())))?;
        if meta.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            std::fs::copy(&src, &dst)
                .map_err(io_err(format!("copy {} to {}", src.display(), dst.display())))?;
        }
    }
    Ok(())
}

fn chown_tree(root: &Path, uid: u32, gid: u32) -> Result<(), BuildError> {
    std::os::unix::fs::chown(root, Some(uid), Some(gid))
        .map_err(io_err(format!("chown {}", root.display())))?;
    let entries =
        std::fs::read_dir(root).map_err(io_err(format!("read {}", root.display())))?;
    for entry in entries {
        let entry = entry.map_err(io_err("read entry"))?;
        let path = entry.path();
        if entry.file_type().map_err(io_err(format!("stat {}", path.display())))?.is_dir() {
            chown_tree(&path, uid, gid)?;
        } else {
            std::os::unix::fs::chown(&path, Some(uid), Some(gid))
                .map_err(io_err(format!("chown {}", path.display())))?;
        }
    }
    Ok(())
}

/// Remove package-manager cache directories and compiled bytecode from the
/// stage. Stale bytecode must never ship in an image.
fn sweep_artifacts(root: &Path) -> Result<(), BuildError> {
    let entries = std::fs::read_dir(root).map_err(io_err(format!("read {}", root.display())))?;
    for entry in entries {
        let entry = entry.map_err(io_err("read entry"))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if entry.file_type().map_err(io_err(format!("stat {}", path.display())))?.is_dir() {
            if CACHE_DIRS.contains(&name.as_ref()) {
                std::fs::remove_dir_all(&path)
                    .map_err(io_err(format!("sweep {}", path.display())))?;
            } else {
                sweep_artifacts(&path)?;
            }
        } else if name.ends_with(".pyc") {
            std::fs::remove_file(&path).map_err(io_err(format!("sweep {}", path.display())))?;
        }
    }
    Ok(())
}

/// Content digest: sha256 over the sorted relative-path listing and file
/// contents of the staged tree. Computed before `image.json` is written, so
/// the metadata file is excluded and identical inputs digest identically.
fn digest_tree(root: &Path) -> Result<String, BuildError> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();
    let mut hasher = Sha256::new();
    for rel in &files {
        hasher.update(rel.as_bytes());
        hasher.update([0]);
        let bytes = std::fs::read(root.join(rel)).map_err(io_err(format!("read {rel}")))?;
        hasher.update(&bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), BuildError> {
    let entries = std::fs::read_dir(dir).map_err(io_err(format!("read {}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(io_err("read entry"))?;
        let path = entry.path();
        if entry.file_type().map_err(io_err(format!("stat {}", path.display())))?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
