// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Containerfile rendering specs
//!
//! The rendered artifact must mirror the builder's layer order: OS packages
//! with cache purge first, the manifest before the source copy, then the
//! ownership handoff, with the fixed entry command and probe parameters.

use crate::prelude::*;
use assert_cmd::Command;

fn line_index(rendered: &str, needle: &str) -> usize {
    rendered
        .lines()
        .position(|l| l.contains(needle))
        .unwrap_or_else(|| panic!("no line containing {needle:?} in:\n{rendered}"))
}

#[test]
fn layers_follow_the_build_order() {
    let project = Project::new();
    let rendered = render_containerfile(&project.spec()).expect("render succeeds");

    let from = line_index(&rendered, "FROM python:3.12-slim");
    let os = line_index(&rendered, "apt-get install");
    let purge = line_index(&rendered, "rm -rf /var/lib/apt/lists/*");
    let manifest = line_index(&rendered, "COPY requirements.txt .");
    let deps = line_index(&rendered, "pip install --no-cache-dir --no-compile");
    let source = line_index(&rendered, "COPY . .");
    let user = line_index(&rendered, &format!("USER {}", runtime_user()));
    let cmd = line_index(&rendered, "CMD [");

    assert!(from < os);
    assert!(os < purge, "cache purge shares the OS package step");
    assert!(purge < manifest);
    assert!(manifest < deps, "manifest copied before dependency install");
    assert!(deps < source, "dependency layer precedes the source copy");
    assert!(source < user);
    assert!(user < cmd, "process runs as the non-privileged identity");
}

#[test]
fn contract_surface_is_rendered() {
    let project = Project::new();
    let rendered = render_containerfile(&project.spec()).expect("render succeeds");

    assert!(rendered.contains("EXPOSE 8000"));
    assert!(rendered.contains(
        "HEALTHCHECK --start-period=30s --interval=60s --timeout=10s --retries=2"
    ));
    assert!(rendered.contains("curl -fsS http://localhost:8000/health || exit 1"));
    assert!(rendered.contains(
        "CMD [\"uvicorn\", \"main:app\", \"--host\", \"0.0.0.0\", \"--port\", \"8000\", \"--workers\", \"1\"]"
    ));
}

#[test]
fn render_rejects_a_root_runtime_user() {
    let project = Project::new();
    let mut spec = project.spec();
    spec.contract.runtime_user = "root".to_string();

    render_containerfile(&spec).expect_err("root runtime user rejected");
}

#[test]
fn build_command_renders_the_same_artifact() {
    let project = Project::new();
    let spec_path = project.spec_file();

    let spec = ImageSpec::from_path(&spec_path).expect("parse spec file");
    let expected = render_containerfile(&spec).expect("render succeeds");

    Command::cargo_bin("wharfd")
        .expect("wharfd binary")
        .args(["--state-dir"])
        .arg(project.path().join("state"))
        .args(["build", "--render", "--spec"])
        .arg(&spec_path)
        .assert()
        .success()
        .stdout(expected);
}
