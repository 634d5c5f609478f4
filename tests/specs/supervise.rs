// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Wharf Contributors

//! Supervision specs
//!
//! Health reporting state machine (grace, consecutive-failure threshold,
//! sticky unhealthy) driven on a fake clock, plus process supervision of a
//! real child from a committed image.

use crate::prelude::*;
use wharf_daemon::{Config, InstanceEvent, Supervisor};

fn tracker() -> (FakeClock, HealthTracker<FakeClock>) {
    let clock = FakeClock::new();
    let tracker = HealthTracker::new(clock.clone(), HealthPolicy::default());
    (clock, tracker)
}

#[test]
fn probe_inside_grace_period_is_discarded() {
    let (clock, mut tracker) = tracker();

    clock.advance(Duration::from_secs(25));
    tracker.record(ProbeOutcome::Success).expect_err("inside 30s grace");
    assert_eq!(tracker.state(), HealthState::Starting);
}

#[test]
fn healthy_after_first_success_past_grace() {
    let (clock, mut tracker) = tracker();

    clock.advance(Duration::from_secs(31));
    let events = tracker.record(ProbeOutcome::Success).expect("past grace");
    assert_eq!(events, vec![HealthEvent::ProbingStarted, HealthEvent::BecameHealthy]);
    assert_eq!(tracker.state(), HealthState::Healthy);
}

#[test]
fn single_failure_does_not_change_reported_health() {
    let (clock, mut tracker) = tracker();

    clock.advance(Duration::from_secs(31));
    tracker.record(ProbeOutcome::Success).expect("past grace");
    clock.advance(Duration::from_secs(60));
    tracker
        .record(ProbeOutcome::Failed(ProbeFailure::Timeout))
        .expect("recorded");
    assert_eq!(tracker.state(), HealthState::Healthy);

    clock.advance(Duration::from_secs(60));
    tracker.record(ProbeOutcome::Success).expect("recorded");
    assert_eq!(tracker.state(), HealthState::Healthy);
    assert_eq!(tracker.consecutive_failures(), 0);
}

#[test]
fn two_consecutive_failures_mark_unhealthy() {
    let (clock, mut tracker) = tracker();

    clock.advance(Duration::from_secs(31));
    tracker.record(ProbeOutcome::Success).expect("past grace");
    for _ in 0..2 {
        clock.advance(Duration::from_secs(60));
        tracker
            .record(ProbeOutcome::Failed(ProbeFailure::Status(500)))
            .expect("recorded");
    }
    assert_eq!(tracker.state(), HealthState::Unhealthy);
}

#[test]
fn unhealthy_is_sticky_across_later_successes() {
    let (clock, mut tracker) = tracker();

    clock.advance(Duration::from_secs(31));
    for _ in 0..2 {
        tracker
            .record(ProbeOutcome::Failed(ProbeFailure::Connection("refused".into())))
            .expect("recorded");
        clock.advance(Duration::from_secs(60));
    }
    assert_eq!(tracker.state(), HealthState::Unhealthy);

    let events = tracker.record(ProbeOutcome::Success).expect("recorded");
    assert!(events.is_empty(), "no transition out of unhealthy");
    assert_eq!(tracker.state(), HealthState::Unhealthy);
}

/// Build an image whose entry program is a shell one-liner, start it, and
/// observe its exit through the supervisor.
#[tokio::test]
async fn supervisor_reports_process_exit_code() {
    let project = Project::new();
    let builder = project.builder();

    let mut spec = project.spec();
    spec.contract.entry =
        EntryCommand::new("sh", vec!["-c".to_string(), "exit 9".to_string()]);
    let meta = builder.build(&spec).await.expect("build succeeds");

    let supervisor =
        Supervisor::new(SystemClock, Config::at(project.path().join("state"))).expect("lock");
    let mut running =
        supervisor.start(&builder.image_dir(&meta.id)).await.expect("start instance");
    assert_eq!(running.instance.port, 8000);
    assert_eq!(running.health(), HealthState::Starting);

    match running.next_event().await {
        InstanceEvent::Exited { code } => assert_eq!(code, 9),
        other => panic!("expected exit, got {other:?}"),
    }
}
