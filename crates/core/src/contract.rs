// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Supervisor contract: how an instance is started, exposed, and probed.
//!
//! The contract is declared at build time, recorded in the image metadata,
//! and honored by the daemon at run time. The served application itself is an
//! opaque collaborator — the only surfaces the contract knows about are a TCP
//! listener and an HTTP health endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default listening port for served instances.
pub const DEFAULT_PORT: u16 = 8000;

/// Health endpoint path probed by the daemon.
pub const HEALTH_PATH: &str = "/health";

/// Errors from contract validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("entry command program must not be empty")]
    EmptyProgram,

    #[error("port must be nonzero")]
    ZeroPort,

    /// The process model is a single fixed worker; fan-out belongs to the
    /// orchestrator's scaling mechanism, not this layer.
    #[error("worker count must be exactly 1 (got {0})")]
    WorkerCount(u32),

    #[error("health policy {field} must be nonzero")]
    ZeroDuration { field: &'static str },

    #[error("health policy retries must be at least 1")]
    ZeroRetries,

    #[error("health path must start with '/' (got '{0}')")]
    BadHealthPath(String),

    #[error("runtime user must not be a privileged identity (got '{0}')")]
    PrivilegedUser(String),
}

/// The fixed process entry invocation.
///
/// Rendered as `program [args..] --host 0.0.0.0 --port <port> --workers 1`.
/// No environment-variable configuration exists at this layer; anything of
/// that kind belongs to the served application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCommand {
    /// Program to invoke (e.g. "uvicorn").
    pub program: String,
    /// Leading arguments before the fixed flags (e.g. "main:app").
    #[serde(default)]
    pub args: Vec<String>,
    /// Bind address; all interfaces.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Worker count; fixed at 1.
    #[serde(default = "default_workers")]
    pub workers: u32,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_workers() -> u32 {
    1
}

impl EntryCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            bind: default_bind(),
            port: DEFAULT_PORT,
            workers: 1,
        }
    }

    /// Render the full argument vector, program excluded.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend([
            "--host".to_string(),
            self.bind.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--workers".to_string(),
            self.workers.to_string(),
        ]);
        argv
    }

    /// Render the invocation as a single shell-style line (for Containerfile CMD).
    pub fn to_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.argv());
        parts.join(" ")
    }
}

/// Timing and failure parameters for the external health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// Seconds after instance start during which no probe is evaluated.
    pub grace_secs: u64,
    /// Seconds between scheduled probe cycles.
    pub interval_secs: u64,
    /// Per-probe timeout in seconds; exceeding it is a failure.
    pub timeout_secs: u64,
    /// Consecutive failures required to mark the instance unhealthy.
    pub retries: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self { grace_secs: 30, interval_secs: 60, timeout_secs: 10, retries: 2 }
    }
}

impl HealthPolicy {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.grace_secs == 0 {
            return Err(ContractError::ZeroDuration { field: "grace" });
        }
        if self.interval_secs == 0 {
            return Err(ContractError::ZeroDuration { field: "interval" });
        }
        if self.timeout_secs == 0 {
            return Err(ContractError::ZeroDuration { field: "timeout" });
        }
        if self.retries == 0 {
            return Err(ContractError::ZeroRetries);
        }
        Ok(())
    }
}

/// What the daemon promises the orchestrator: entry command, exposed port,
/// probe parameters, and the non-privileged identity the process runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorContract {
    pub entry: EntryCommand,
    /// Path probed for liveness.
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default)]
    pub health: HealthPolicy,
    /// Named OS user the process runs as. Never root.
    pub runtime_user: String,
}

fn default_health_path() -> String {
    HEALTH_PATH.to_string()
}

impl SupervisorContract {
    pub fn new(entry: EntryCommand, runtime_user: impl Into<String>) -> Self {
        Self {
            entry,
            health_path: default_health_path(),
            health: HealthPolicy::default(),
            runtime_user: runtime_user.into(),
        }
    }

    /// The port the orchestrator should publish.
    pub fn exposed_port(&self) -> u16 {
        self.entry.port
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        if self.entry.program.is_empty() {
            return Err(ContractError::EmptyProgram);
        }
        if self.entry.port == 0 {
            return Err(ContractError::ZeroPort);
        }
        if self.entry.workers != 1 {
            return Err(ContractError::WorkerCount(self.entry.workers));
        }
        if !self.health_path.starts_with('/') {
            return Err(ContractError::BadHealthPath(self.health_path.clone()));
        }
        if self.runtime_user.is_empty() || self.runtime_user == "root" {
            return Err(ContractError::PrivilegedUser(self.runtime_user.clone()));
        }
        self.health.validate()
    }
}

#[cfg(test)]
#[path = "contract_tests.rs"]
mod tests;
