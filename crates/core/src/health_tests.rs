// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

use super::*;
use crate::clock::FakeClock;

fn tracker() -> (FakeClock, HealthTracker<FakeClock>) {
    let clock = FakeClock::new();
    let t = HealthTracker::new(clock.clone(), HealthPolicy::default());
    (clock, t)
}

#[test]
fn starts_in_starting_state() {
    let (_, t) = tracker();
    assert_eq!(t.state(), HealthState::Starting);
    assert_eq!(t.grace_remaining(), Some(Duration::from_secs(30)));
}

#[test]
fn tick_inside_grace_does_not_transition() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(29));
    assert_eq!(t.tick(), None);
    assert_eq!(t.state(), HealthState::Starting);
}

#[test]
fn tick_after_grace_starts_probing() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    assert_eq!(t.tick(), Some(HealthEvent::ProbingStarted));
    assert_eq!(t.state(), HealthState::Probing);
    // idempotent
    assert_eq!(t.tick(), None);
}

#[test]
fn record_inside_grace_is_rejected() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(25));
    let err = t.record(ProbeOutcome::Success).unwrap_err();
    assert_eq!(
        err,
        HealthError::BeforeGrace {
            elapsed: Duration::from_secs(25),
            grace: Duration::from_secs(30),
        }
    );
    assert_eq!(t.state(), HealthState::Starting);
}

#[test]
fn success_after_grace_is_healthy_immediately() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    let events = t.record(ProbeOutcome::Success).unwrap();
    assert_eq!(
        events,
        vec![HealthEvent::ProbingStarted, HealthEvent::BecameHealthy]
    );
    assert_eq!(t.state(), HealthState::Healthy);
}

#[test]
fn single_failure_does_not_flip_state() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    let events = t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    assert_eq!(t.state(), HealthState::Probing);
    assert!(events.contains(&HealthEvent::ProbeFailed {
        consecutive: 1,
        failure: ProbeFailure::Timeout,
    }));
    assert!(!events.iter().any(|e| matches!(e, HealthEvent::BecameUnhealthy { .. })));
}

#[test]
fn two_consecutive_failures_become_unhealthy() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    t.record(ProbeOutcome::Failed(ProbeFailure::Status(500))).unwrap();
    clock.advance(Duration::from_secs(60));
    let events = t.record(ProbeOutcome::Failed(ProbeFailure::Status(500))).unwrap();
    assert_eq!(t.state(), HealthState::Unhealthy);
    assert!(events.contains(&HealthEvent::BecameUnhealthy { failures: 2 }));
}

#[test]
fn success_between_failures_resets_the_count() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Success).unwrap();
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    // one isolated failure on each side of a success: never unhealthy
    assert_eq!(t.state(), HealthState::Healthy);
    assert_eq!(t.consecutive_failures(), 1);
}

#[test]
fn healthy_instance_can_degrade_to_unhealthy() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    t.record(ProbeOutcome::Success).unwrap();
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Failed(ProbeFailure::Connection("refused".into()))).unwrap();
    clock.advance(Duration::from_secs(60));
    let events = t
        .record(ProbeOutcome::Failed(ProbeFailure::Connection("refused".into())))
        .unwrap();
    assert_eq!(t.state(), HealthState::Unhealthy);
    assert!(events.contains(&HealthEvent::BecameUnhealthy { failures: 2 }));
}

#[test]
fn unhealthy_is_sticky_even_after_success() {
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    assert_eq!(t.state(), HealthState::Unhealthy);
    clock.advance(Duration::from_secs(60));
    let events = t.record(ProbeOutcome::Success).unwrap();
    assert_eq!(t.state(), HealthState::Unhealthy);
    assert!(events.is_empty());
}

#[test]
fn unreachable_during_grace_then_healthy_at_first_probe() {
    // End-to-end scenario: endpoint dead for the first 25s (inside grace),
    // then responding. Observed sequence: starting (0-30s), then
    // probing -> healthy at the first post-grace probe.
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(25));
    assert_eq!(t.state(), HealthState::Starting);
    assert!(t.record(ProbeOutcome::Success).is_err());
    clock.advance(Duration::from_secs(5));
    let events = t.record(ProbeOutcome::Success).unwrap();
    assert_eq!(
        events,
        vec![HealthEvent::ProbingStarted, HealthEvent::BecameHealthy]
    );
    assert_eq!(t.state(), HealthState::Healthy);
}

#[test]
fn persistent_500_becomes_unhealthy_on_second_cycle_only() {
    // End-to-end scenario: /health returns 500 on every probe. Unhealthy
    // exactly after the second 60s-spaced cycle, never earlier.
    let (clock, mut t) = tracker();
    clock.advance(Duration::from_secs(30));
    t.record(ProbeOutcome::Failed(ProbeFailure::Status(500))).unwrap();
    assert_eq!(t.state(), HealthState::Probing);
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Failed(ProbeFailure::Status(500))).unwrap();
    assert_eq!(t.state(), HealthState::Unhealthy);
}

#[yare::parameterized(
    starting  = { HealthState::Starting, "starting" },
    probing   = { HealthState::Probing, "probing" },
    healthy   = { HealthState::Healthy, "healthy" },
    unhealthy = { HealthState::Unhealthy, "unhealthy" },
)]
fn state_display(state: HealthState, expected: &str) {
    assert_eq!(state.to_string(), expected);
}

#[test]
fn custom_retry_threshold_is_honored() {
    let clock = FakeClock::new();
    let policy = HealthPolicy { retries: 3, ..HealthPolicy::default() };
    let mut t = HealthTracker::new(clock.clone(), policy);
    clock.advance(Duration::from_secs(30));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    assert_eq!(t.state(), HealthState::Probing);
    clock.advance(Duration::from_secs(60));
    t.record(ProbeOutcome::Failed(ProbeFailure::Timeout)).unwrap();
    assert_eq!(t.state(), HealthState::Unhealthy);
}
