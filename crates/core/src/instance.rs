// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Instance model: a running process tree started from an image.
//!
//! Instances are owned exclusively by the supervising daemon. The core has no
//! authority to restart or migrate one; it only observes.

use crate::image::ImageId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a container instance.
    pub struct InstanceId("inst-");
}

/// A running instance: process identity, bound port, start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub image: ImageId,
    /// OS process id of the serving process.
    pub pid: u32,
    /// Non-privileged user the process runs as.
    pub runtime_user: String,
    pub port: u16,
    pub started_at_ms: u64,
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
