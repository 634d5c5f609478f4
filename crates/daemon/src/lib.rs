// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wharf-daemon: instance supervision.
//!
//! `wharfd` starts a container instance from a built image under its
//! non-privileged identity and runs the external health probe loop. It only
//! reports: an unhealthy instance is never restarted or killed from here —
//! remediation belongs to the orchestrator.

pub mod config;
pub mod lifecycle;
pub mod monitor;
pub mod probe;

pub use config::Config;
pub use lifecycle::{InstanceEvent, RunningInstance, Supervisor, SupervisorError};
pub use monitor::ProbeLoop;
pub use probe::{HealthProbe, HttpProbe};
