// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wharf-builder: image assembly.
//!
//! Turns an [`wharf_core::ImageSpec`] into an immutable image directory:
//! a validated build plan, pluggable package-installer adapters, staged
//! all-or-nothing execution, and Containerfile rendering for orchestrators
//! that build images themselves.

pub mod build;
pub mod installer;
pub mod plan;
pub mod render;

pub use build::{BuildError, ImageBuilder};
#[cfg(any(test, feature = "test-support"))]
pub use installer::FakeInstaller;
pub use installer::{ExecInstaller, InstallerError, PackageInstaller};
pub use plan::{BuildPlan, BuildStep, PlanError};
pub use render::render_containerfile;
