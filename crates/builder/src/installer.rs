// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Package installer adapters.
//!
//! The build pipeline talks to package tooling through [`PackageInstaller`]
//! so builds can run against real tooling (`ExecInstaller`) or be scripted in
//! tests (`FakeInstaller`). A failed install aborts the whole build; the
//! staging directory is discarded and no image is produced.

use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use wharf_core::Manifest;

/// Upper bound on any single installer invocation.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors from installer invocations.
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("{step}: failed to spawn installer: {source}")]
    Spawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{step}: installer timed out after {timeout:?}")]
    Timeout { step: &'static str, timeout: Duration },

    /// Unresolvable package/version or any other nonzero exit.
    #[error("{step}: installer exited with {code}: {stderr}")]
    Failed { step: &'static str, code: i32, stderr: String },
}

/// Seam between the build pipeline and package tooling.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Install OS-level packages and purge the package-manager cache in the
    /// same step, so no transient cache state reaches the image.
    async fn install_os_packages(
        &self,
        stage: &Path,
        packages: &[String],
    ) -> Result<(), InstallerError>;

    /// Install pinned dependencies from `manifest_path` into `stage/deps`.
    async fn install_deps(&self, stage: &Path, manifest_path: &Path)
        -> Result<(), InstallerError>;
}

/// Run a command to completion, bounded by `timeout`.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    step: &'static str,
) -> Result<Output, InstallerError> {
    let fut = cmd.output();
    let output = tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| InstallerError::Timeout { step, timeout })?
        .map_err(|e| InstallerError::Spawn { step, source: e })?;
    if !output.status.success() {
        return Err(InstallerError::Failed {
            step,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

/// Installer that shells out to the host's package tooling.
#[derive(Debug, Clone)]
pub struct ExecInstaller {
    /// Language-level installer program (default `pip`).
    pub pip: String,
    /// OS-level installer program (default `apt-get`).
    pub apt_get: String,
}

impl Default for ExecInstaller {
    fn default() -> Self {
        Self { pip: "pip".into(), apt_get: "apt-get".into() }
    }
}

impl ExecInstaller {
    /// Argument vector for the OS package step. Install and cache purge are
    /// a single shell invocation so a cancelled build cannot leave cache
    /// state behind for the commit to pick up.
    pub fn os_install_line(&self, packages: &[String]) -> String {
        format!(
            "{apt} update && {apt} install -y --no-install-recommends {pkgs} && rm -rf /var/lib/apt/lists/*",
            apt = self.apt_get,
            pkgs = packages.join(" "),
        )
    }

    /// Argument vector for the dependency step. `--no-cache-dir` and
    /// `--no-compile` keep wheel caches and bytecode out of the image.
    pub fn deps_args(&self, stage: &Path, manifest_path: &Path) -> Vec<String> {
        vec![
            "install".to_string(),
            "--no-cache-dir".to_string(),
            "--no-compile".to_string(),
            "--target".to_string(),
            stage.join("deps").display().to_string(),
            "-r".to_string(),
            manifest_path.display().to_string(),
        ]
    }
}

#[async_trait]
impl PackageInstaller for ExecInstaller {
    async fn install_os_packages(
        &self,
        _stage: &Path,
        packages: &[String],
    ) -> Result<(), InstallerError> {
        if packages.is_empty() {
            return Ok(());
        }
        let line = self.os_install_line(packages);
        tracing::info!(step = "os-packages", %line, "installing OS packages");
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(line);
        run_with_timeout(cmd, INSTALL_TIMEOUT, "os-packages").await?;
        Ok(())
    }

    async fn install_deps(
        &self,
        stage: &Path,
        manifest_path: &Path,
    ) -> Result<(), InstallerError> {
        let args = self.deps_args(stage, manifest_path);
        tracing::info!(step = "runtime-deps", pip = %self.pip, "installing dependencies");
        let mut cmd = Command::new(&self.pip);
        cmd.args(&args);
        run_with_timeout(cmd, INSTALL_TIMEOUT, "runtime-deps").await?;
        Ok(())
    }
}

/// Scriptable installer for tests: records calls, optionally fails a step,
/// and writes marker files so tests can observe what reached the stage.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeInstaller {
    calls: std::sync::Arc<parking_lot::Mutex<Vec<String>>>,
    fail_step: Option<&'static str>,
    /// Extra paths to drop into the stage during `install_deps`, relative to
    /// the stage root. Lets tests plant cache/bytecode litter.
    litter: Vec<String>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the named step (`os-packages` or `runtime-deps`).
    pub fn failing(step: &'static str) -> Self {
        Self { fail_step: Some(step), ..Self::default() }
    }

    pub fn with_litter(mut self, paths: &[&str]) -> Self {
        self.litter = paths.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn check(&self, step: &'static str) -> Result<(), InstallerError> {
        self.calls.lock().push(step.to_string());
        if self.fail_step == Some(step) {
            return Err(InstallerError::Failed {
                step,
                code: 1,
                stderr: format!("{step} scripted to fail"),
            });
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl PackageInstaller for FakeInstaller {
    async fn install_os_packages(
        &self,
        stage: &Path,
        packages: &[String],
    ) -> Result<(), InstallerError> {
        self.check("os-packages")?;
        let listing = packages.join("\n");
        std::fs::write(stage.join("os-packages.txt"), listing)
            .map_err(|e| InstallerError::Spawn { step: "os-packages", source: e })?;
        Ok(())
    }

    async fn install_deps(
        &self,
        stage: &Path,
        manifest_path: &Path,
    ) -> Result<(), InstallerError> {
        self.check("runtime-deps")?;
        let manifest = Manifest::from_path(manifest_path).map_err(|e| InstallerError::Failed {
            step: "runtime-deps",
            code: 1,
            stderr: e.to_string(),
        })?;
        let deps = stage.join("deps");
        std::fs::create_dir_all(&deps)
            .map_err(|e| InstallerError::Spawn { step: "runtime-deps", source: e })?;
        for dep in manifest.iter() {
            std::fs::write(deps.join(&dep.name), &dep.version)
                .map_err(|e| InstallerError::Spawn { step: "runtime-deps", source: e })?;
        }
        for rel in &self.litter {
            let path = stage.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InstallerError::Spawn { step: "runtime-deps", source: e })?;
            }
            std::fs::write(&path, b"litter")
                .map_err(|e| InstallerError::Spawn { step: "runtime-deps", source: e })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "installer_tests.rs"]
mod tests;
