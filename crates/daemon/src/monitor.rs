// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! The probe loop: periodic external liveness checks for one instance.
//!
//! Timing comes from the instance's [`wharf_core::HealthPolicy`]: wait out
//! the grace period, then probe once per interval, feeding each outcome to
//! the shared [`HealthTracker`]. Transitions are logged and forwarded as
//! [`HealthEvent`]s; nothing here ever touches the served process.

use crate::probe::HealthProbe;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wharf_core::{Clock, HealthEvent, HealthTracker, InstanceId};

pub struct ProbeLoop<P: HealthProbe, C: Clock> {
    instance: InstanceId,
    probe: P,
    tracker: Arc<Mutex<HealthTracker<C>>>,
    events: mpsc::Sender<HealthEvent>,
    shutdown: CancellationToken,
}

impl<P: HealthProbe, C: Clock> ProbeLoop<P, C> {
    pub fn new(
        instance: InstanceId,
        probe: P,
        tracker: Arc<Mutex<HealthTracker<C>>>,
        events: mpsc::Sender<HealthEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self { instance, probe, tracker, events, shutdown }
    }

    /// Run until shutdown. Spawned as a task per instance.
    pub async fn run(self) {
        let (grace, interval) = {
            let tracker = self.tracker.lock();
            (tracker.policy().grace(), tracker.policy().interval())
        };

        // Grace period: no probe is attempted, let alone evaluated.
        tokio::select! {
            _ = self.shutdown.cancelled() => return,
            _ = tokio::time::sleep(grace) => {}
        }

        loop {
            let mut events = Vec::new();
            if let Some(event) = self.tracker.lock().tick() {
                events.push(event);
            }

            let outcome = self.probe.probe().await;
            match self.tracker.lock().record(outcome) {
                Ok(recorded) => events.extend(recorded),
                // Scheduling jitter landed a cycle inside the grace period;
                // the outcome is discarded, not evaluated.
                Err(e) => tracing::debug!(instance = %self.instance, error = %e, "probe discarded"),
            }

            for event in events {
                self.log(&event);
                if self.events.send(event).await.is_err() {
                    return;
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    fn log(&self, event: &HealthEvent) {
        match event {
            HealthEvent::ProbingStarted => {
                tracing::info!(instance = %self.instance, "grace period over, probing")
            }
            HealthEvent::BecameHealthy => {
                tracing::info!(instance = %self.instance, "instance healthy")
            }
            HealthEvent::ProbeFailed { consecutive, failure } => {
                tracing::warn!(
                    instance = %self.instance,
                    consecutive,
                    %failure,
                    "probe failed"
                )
            }
            HealthEvent::BecameUnhealthy { failures } => {
                tracing::warn!(
                    instance = %self.instance,
                    failures,
                    "instance unhealthy, reporting only"
                )
            }
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
