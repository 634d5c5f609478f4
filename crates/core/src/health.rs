// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Health probe state machine.
//!
//! States move `Starting → Probing → Healthy | Unhealthy`. The tracker is
//! externally driven: the daemon's probe loop feeds it clock ticks and probe
//! outcomes, and it reports transitions as [`HealthEvent`] values. It never
//! touches the served process — `Unhealthy` is a report, and remediation
//! belongs to the orchestrator.

use crate::clock::Clock;
use crate::contract::HealthPolicy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Externally observable health of a running instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Inside the startup grace period; failures are not evaluated.
    Starting,
    /// Grace elapsed, no probe cycle has succeeded yet.
    Probing,
    /// Last probe cycle succeeded within its timeout.
    Healthy,
    /// Consecutive probe cycles failed; sticky until the orchestrator acts.
    Unhealthy,
}

crate::simple_display! {
    HealthState {
        Starting => "starting",
        Probing => "probing",
        Healthy => "healthy",
        Unhealthy => "unhealthy",
    }
}

/// Why a single probe cycle failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    /// No response within the policy timeout.
    Timeout,
    /// Connection refused or other transport error.
    Connection(String),
    /// Response arrived but with a non-success status code.
    Status(u16),
}

crate::simple_display! {
    ProbeFailure {
        Timeout => "timeout",
        Connection(..) => "connection error",
        Status(..) => "error status",
    }
}

/// Result of one probe cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Success,
    Failed(ProbeFailure),
}

/// State transitions and per-cycle observations reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Grace period elapsed; probing begins.
    ProbingStarted,
    /// A probe cycle succeeded.
    BecameHealthy,
    /// A probe cycle failed but the failure threshold is not yet reached.
    ProbeFailed { consecutive: u32, failure: ProbeFailure },
    /// The consecutive-failure threshold was reached.
    BecameUnhealthy { failures: u32 },
}

/// Errors from out-of-contract tracker use.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    /// An outcome was recorded before the grace period elapsed. The probe
    /// schedule must not evaluate results during startup.
    #[error("probe outcome recorded {elapsed:?} after start, inside {grace:?} grace period")]
    BeforeGrace { elapsed: Duration, grace: Duration },
}

/// Clock-driven tracker for a single instance's health.
#[derive(Debug, Clone)]
pub struct HealthTracker<C: Clock> {
    clock: C,
    policy: HealthPolicy,
    started_at: Instant,
    state: HealthState,
    consecutive_failures: u32,
}

impl<C: Clock> HealthTracker<C> {
    /// Start tracking from "now" on the given clock.
    pub fn new(clock: C, policy: HealthPolicy) -> Self {
        let started_at = clock.now();
        Self {
            clock,
            policy,
            started_at,
            state: HealthState::Starting,
            consecutive_failures: 0,
        }
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Wall-clock time since instance start.
    pub fn elapsed(&self) -> Duration {
        self.clock.now().duration_since(self.started_at)
    }

    /// Time left in the grace period, if any.
    pub fn grace_remaining(&self) -> Option<Duration> {
        self.policy.grace().checked_sub(self.elapsed()).filter(|d| !d.is_zero())
    }

    /// Move `Starting → Probing` once the grace period has elapsed.
    ///
    /// Idempotent; the transition happens on elapsed wall-clock time alone,
    /// regardless of process readiness.
    pub fn tick(&mut self) -> Option<HealthEvent> {
        if self.state == HealthState::Starting && self.grace_remaining().is_none() {
            self.state = HealthState::Probing;
            return Some(HealthEvent::ProbingStarted);
        }
        None
    }

    /// Record the outcome of one probe cycle.
    ///
    /// Rejected inside the grace period: the schedule owns the delay, and an
    /// early result would turn startup slowness into a failure signal.
    pub fn record(&mut self, outcome: ProbeOutcome) -> Result<Vec<HealthEvent>, HealthError> {
        if self.grace_remaining().is_some() {
            return Err(HealthError::BeforeGrace {
                elapsed: self.elapsed(),
                grace: self.policy.grace(),
            });
        }

        let mut events = Vec::new();
        if let Some(event) = self.tick() {
            events.push(event);
        }

        match outcome {
            ProbeOutcome::Success => {
                self.consecutive_failures = 0;
                // Unhealthy is not self-healing from inside the core; the
                // orchestrator decides remediation.
                if self.state == HealthState::Probing {
                    self.state = HealthState::Healthy;
                    events.push(HealthEvent::BecameHealthy);
                }
            }
            ProbeOutcome::Failed(failure) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                events.push(HealthEvent::ProbeFailed {
                    consecutive: self.consecutive_failures,
                    failure,
                });
                if self.state != HealthState::Unhealthy
                    && self.consecutive_failures >= self.policy.retries
                {
                    self.state = HealthState::Unhealthy;
                    events.push(HealthEvent::BecameUnhealthy {
                        failures: self.consecutive_failures,
                    });
                }
            }
        }
        Ok(events)
    }

    /// Consecutive failed cycles since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
