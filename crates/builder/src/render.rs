// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Containerfile rendering.
//!
//! Some deployments build the image with container tooling instead of the
//! local builder. This renders the same build plan as a Containerfile whose
//! layer order matches [`crate::plan::BuildPlan`] exactly, so the cache
//! behavior is identical: dependency layers invalidate on manifest edits,
//! not on every source change.

use crate::plan::PlanError;
use std::fmt::Write as _;
use wharf_core::ImageSpec;

/// Render a Containerfile for the given build spec.
///
/// Does not touch the filesystem; the manifest is referenced by file name,
/// not parsed. Spec validation still applies.
pub fn render_containerfile(spec: &ImageSpec) -> Result<String, PlanError> {
    spec.contract.validate()?;
    for pkg in &spec.os_packages {
        if !crate::plan::ALLOWED_OS_PACKAGES.contains(&pkg.as_str()) {
            return Err(PlanError::DisallowedPackage(pkg.clone()));
        }
    }

    let contract = &spec.contract;
    let manifest_name = spec
        .manifest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "requirements.txt".to_string());
    let workdir = spec.workdir.display();
    let user = &contract.runtime_user;
    let port = contract.exposed_port();
    let health = &contract.health;

    let mut out = String::new();
    let _ = writeln!(out, "FROM {}", spec.base);
    out.push('\n');

    if !spec.os_packages.is_empty() {
        let _ = writeln!(out, "RUN apt-get update \\");
        let _ = writeln!(
            out,
            "    && apt-get install -y --no-install-recommends {} \\",
            spec.os_packages.join(" ")
        );
        let _ = writeln!(out, "    && rm -rf /var/lib/apt/lists/*");
        out.push('\n');
    }

    let _ = writeln!(out, "WORKDIR {workdir}");
    out.push('\n');

    // Manifest before source: dependency layer caching survives source edits.
    let _ = writeln!(out, "COPY {manifest_name} .");
    let _ = writeln!(out, "RUN pip install --no-cache-dir --no-compile -r {manifest_name}");
    out.push('\n');

    let _ = writeln!(out, "COPY . .");
    out.push('\n');

    let _ = writeln!(out, "RUN useradd --system --no-create-home {user} \\");
    let _ = writeln!(out, "    && chown -R {user}:{user} {workdir}");
    let _ = writeln!(out, "USER {user}");
    out.push('\n');

    let _ = writeln!(out, "EXPOSE {port}");
    out.push('\n');

    let _ = writeln!(
        out,
        "HEALTHCHECK --start-period={}s --interval={}s --timeout={}s --retries={} \\",
        health.grace_secs, health.interval_secs, health.timeout_secs, health.retries
    );
    let _ = writeln!(
        out,
        "    CMD curl -fsS http://localhost:{port}{} || exit 1",
        contract.health_path
    );
    out.push('\n');

    let mut cmd = vec![contract.entry.program.clone()];
    cmd.extend(contract.entry.argv());
    let quoted: Vec<String> = cmd.iter().map(|a| format!("\"{a}\"")).collect();
    let _ = writeln!(out, "CMD [{}]", quoted.join(", "));

    Ok(out)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
