// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wharf-core: domain types for container bootstrap and liveness supervision.
//!
//! Pure types only — the build pipeline lives in `wharf-builder` and the
//! supervising daemon in `wharf-daemon`. Nothing in this crate performs I/O
//! beyond reading manifest and build-spec files on request.

pub mod macros;

pub mod clock;
pub mod contract;
pub mod health;
pub mod image;
pub mod instance;
pub mod manifest;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use contract::{ContractError, EntryCommand, HealthPolicy, SupervisorContract};
pub use health::{HealthError, HealthEvent, HealthState, HealthTracker, ProbeFailure, ProbeOutcome};
pub use image::{ImageId, ImageMeta, ImageSpec};
pub use instance::{Instance, InstanceId};
pub use manifest::{Dependency, Manifest, ManifestError};
