// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Image build specs
//!
//! The build is all-or-nothing: a committed image carries the application
//! tree, the installed dependency set, and recorded metadata; a failed build
//! leaves the store untouched.

use crate::prelude::*;

fn store_entries(store: &Path) -> Vec<String> {
    if !store.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = std::fs::read_dir(store)
        .expect("read store")
        .map(|e| e.expect("store entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn committed_image_contains_app_deps_and_metadata() {
    let project = Project::new();
    let builder = project.builder();

    let meta = builder.build(&project.spec()).await.expect("build succeeds");
    let image_dir = builder.image_dir(&meta.id);

    assert!(image_dir.join("app/main.py").is_file());
    assert!(image_dir.join("app/settings.py").is_file());
    assert!(image_dir.join("deps/fastapi").is_file());
    assert!(image_dir.join("deps/uvicorn").is_file());
    assert!(image_dir.join("requirements.txt").is_file());

    let recorded = ImageMeta::from_dir(&image_dir).expect("read metadata");
    assert_eq!(recorded, meta);
    assert_eq!(recorded.base, "python:3.12-slim");
    assert_eq!(recorded.dependencies.len(), 2);
    assert_eq!(recorded.contract.entry.to_line(), "uvicorn main:app --host 0.0.0.0 --port 8000 --workers 1");
}

#[tokio::test]
async fn steps_run_in_declared_order() {
    let project = Project::new();
    let installer = FakeInstaller::new();
    let builder = ImageBuilder::new(installer.clone(), SystemClock, project.store());

    builder.build(&project.spec()).await.expect("build succeeds");

    // OS packages and cache purge land before dependency install.
    assert_eq!(installer.calls(), vec!["os-packages", "runtime-deps"]);
}

#[tokio::test]
async fn failed_dependency_install_commits_nothing() {
    let project = Project::new();
    let installer = FakeInstaller::failing("runtime-deps");
    let builder = ImageBuilder::new(installer, SystemClock, project.store());

    builder.build(&project.spec()).await.expect_err("install failure aborts");

    assert!(store_entries(&project.store()).is_empty(), "no partial image in store");
}

#[tokio::test]
async fn unpinned_manifest_aborts_before_any_step() {
    let project = Project::new();
    project.write_manifest("fastapi==0.110.0\nrequests\n");
    let installer = FakeInstaller::new();
    let builder = ImageBuilder::new(installer.clone(), SystemClock, project.store());

    builder.build(&project.spec()).await.expect_err("unpinned entry rejected");

    assert!(installer.calls().is_empty(), "no step ran");
    assert!(store_entries(&project.store()).is_empty());
}

#[tokio::test]
async fn os_package_outside_probe_tooling_is_rejected() {
    let project = Project::new();
    let mut spec = project.spec();
    spec.os_packages = vec!["gcc".to_string()];

    let err = project.builder().build(&spec).await.expect_err("gcc is not probe tooling");
    assert!(err.to_string().contains("gcc"));
}

#[tokio::test]
async fn cache_and_bytecode_are_swept_before_commit() {
    let project = Project::new();
    let installer = FakeInstaller::new()
        .with_litter(&["__pycache__/mod.cpython-312.pyc", "app-litter/stale.pyc", ".cache/http"]);
    let builder = ImageBuilder::new(installer, SystemClock, project.store());

    let meta = builder.build(&project.spec()).await.expect("build succeeds");
    let image_dir = builder.image_dir(&meta.id);

    assert!(!image_dir.join("__pycache__").exists());
    assert!(!image_dir.join(".cache").exists());
    assert!(!image_dir.join("app-litter/stale.pyc").exists());
}

#[tokio::test]
async fn identical_inputs_produce_identical_digests() {
    let project = Project::new();
    let builder = project.builder();

    let first = builder.build(&project.spec()).await.expect("first build");
    let second = builder.build(&project.spec()).await.expect("second build");
    assert_eq!(first.digest, second.digest);
    assert_ne!(first.id, second.id);

    std::fs::write(project.spec().source.join("main.py"), "app = None\n")
        .expect("edit source");
    let third = builder.build(&project.spec()).await.expect("third build");
    assert_ne!(first.digest, third.digest);
}
