// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Instance lifecycle: start a process from a built image and supervise it.
//!
//! Startup re-checks the build-time invariant (application tree owned by the
//! non-privileged identity) before the entry command runs, then spawns the
//! fixed invocation and attaches a probe loop. The daemon observes process
//! exit and health transitions; it never restarts, migrates, or kills the
//! instance on its own.

use crate::config::Config;
use crate::monitor::ProbeLoop;
use crate::probe::HttpProbe;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wharf_core::image::ImageError;
use wharf_core::{
    Clock, ContractError, HealthEvent, HealthState, HealthTracker, Instance, InstanceId,
};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("runtime user '{user}' does not exist on this host")]
    UnknownUser { user: String },

    #[error("failed to resolve runtime user '{user}': {message}")]
    UserLookup { user: String, message: String },

    #[error("{path} is owned by uid {found}, expected '{user}' (uid {expected})")]
    BadOwnership { path: String, user: String, expected: u32, found: u32 },

    #[error("running as uid {current}, cannot de-escalate to '{user}' (uid {expected}) without privileges")]
    CannotDeescalate { current: u32, user: String, expected: u32 },

    #[error("failed to spawn entry command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("another wharfd already holds {0}")]
    Locked(String),
}

/// What the daemon observed about an instance.
#[derive(Debug)]
pub enum InstanceEvent {
    Health(HealthEvent),
    /// The serving process exited; the code is propagated unchanged.
    Exited { code: i32 },
}

/// Handle to a supervised instance.
#[derive(Debug)]
pub struct RunningInstance {
    pub instance: Instance,
    child: Child,
    tracker: Arc<Mutex<HealthTracker<wharf_core::SystemClock>>>,
    events: mpsc::Receiver<HealthEvent>,
    shutdown: CancellationToken,
}

impl RunningInstance {
    pub fn health(&self) -> HealthState {
        self.tracker.lock().state()
    }

    /// Wait for the next observation: a health transition or process exit.
    pub async fn next_event(&mut self) -> InstanceEvent {
        tokio::select! {
            status = self.child.wait() => {
                self.shutdown.cancel();
                let code = status.ok().and_then(|s| s.code()).unwrap_or(-1);
                InstanceEvent::Exited { code }
            }
            event = self.events.recv() => {
                match event {
                    Some(event) => InstanceEvent::Health(event),
                    // probe loop gone; only process exit is left to observe
                    None => {
                        let code =
                            self.child.wait().await.ok().and_then(|s| s.code()).unwrap_or(-1);
                        InstanceEvent::Exited { code }
                    }
                }
            }
        }
    }

    /// Stop probing. The serving process itself is left alone.
    pub fn stop_probing(&self) {
        self.shutdown.cancel();
    }
}

/// Starts and observes instances for one image store.
#[derive(Debug)]
pub struct Supervisor<C: Clock> {
    clock: C,
    config: Config,
    // Held to maintain exclusive daemon lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl<C: Clock> Supervisor<C> {
    /// Acquire the daemon lock and build a supervisor.
    pub fn new(clock: C, config: Config) -> Result<Self, SupervisorError> {
        config.ensure_dirs().map_err(|e| SupervisorError::Io {
            context: format!("create state dirs under {}", config.state_dir.display()),
            source: e,
        })?;
        let lock_file = File::create(&config.lock_path).map_err(|e| SupervisorError::Io {
            context: format!("open lock file {}", config.lock_path.display()),
            source: e,
        })?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| SupervisorError::Locked(config.lock_path.display().to_string()))?;
        Ok(Self { clock, config, lock_file })
    }

    /// Start an instance from an image directory.
    pub async fn start(&self, image_dir: &Path) -> Result<RunningInstance, SupervisorError> {
        let meta = wharf_core::ImageMeta::from_dir(image_dir)?;
        let contract = &meta.contract;
        contract.validate()?;

        let app_dir = image_dir.join("app");
        let (uid, gid) = verify_ownership(&app_dir, &contract.runtime_user)?;

        let log_path = self.config.logs_dir.join(format!("{}.log", meta.id));
        let log = File::create(&log_path).map_err(|e| SupervisorError::Io {
            context: format!("create instance log {}", log_path.display()),
            source: e,
        })?;
        let log_err = log.try_clone().map_err(|e| SupervisorError::Io {
            context: "clone instance log handle".to_string(),
            source: e,
        })?;

        let mut cmd = Command::new(&contract.entry.program);
        cmd.args(contract.entry.argv())
            .current_dir(&app_dir)
            .stdin(std::process::Stdio::null())
            .stdout(log)
            .stderr(log_err);

        let current = nix::unistd::geteuid().as_raw();
        if current == 0 {
            // De-escalate before exec; the serving process never runs
            // privileged.
            cmd.uid(uid).gid(gid);
        } else if current != uid {
            return Err(SupervisorError::CannotDeescalate {
                current,
                user: contract.runtime_user.clone(),
                expected: uid,
            });
        }

        let child = cmd.spawn().map_err(SupervisorError::Spawn)?;
        let pid = child.id().unwrap_or_default();

        let instance = Instance {
            id: InstanceId::new(),
            image: meta.id.clone(),
            pid,
            runtime_user: contract.runtime_user.clone(),
            port: contract.exposed_port(),
            started_at_ms: self.clock.epoch_ms(),
        };
        tracing::info!(
            instance = %instance.id,
            image = %meta.id,
            pid,
            user = %contract.runtime_user,
            port = instance.port,
            "instance started"
        );

        // Health tracking runs on the system clock: the grace period is
        // wall-clock time since container start.
        let tracker = Arc::new(Mutex::new(HealthTracker::new(
            wharf_core::SystemClock,
            contract.health,
        )));
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let probe_loop = ProbeLoop::new(
            instance.id.clone(),
            HttpProbe::from_contract(contract),
            tracker.clone(),
            tx,
            shutdown.clone(),
        );
        tokio::spawn(probe_loop.run());

        Ok(RunningInstance { instance, child, tracker, events: rx, shutdown })
    }
}

/// Check the build-step invariant: `path` (and thus the application tree) is
/// owned by the named non-privileged user.
pub fn verify_ownership(path: &Path, user: &str) -> Result<(u32, u32), SupervisorError> {
    use std::os::unix::fs::MetadataExt;

    let resolved = nix::unistd::User::from_name(user)
        .map_err(|e| SupervisorError::UserLookup { user: user.to_string(), message: e.to_string() })?
        .ok_or_else(|| SupervisorError::UnknownUser { user: user.to_string() })?;
    let expected = resolved.uid.as_raw();

    let meta = std::fs::metadata(path).map_err(|e| SupervisorError::Io {
        context: format!("stat {}", path.display()),
        source: e,
    })?;
    if meta.uid() != expected {
        return Err(SupervisorError::BadOwnership {
            path: path.display().to_string(),
            user: user.to_string(),
            expected,
            found: meta.uid(),
        });
    }
    Ok((expected, resolved.gid.as_raw()))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
