use std::thread;
use std::time::Duration;

use conductor::model::CircuitBreakerPolicy;
use conductor::resilience::{BreakerState, CircuitBreaker};

fn breaker(threshold: u32, recovery_secs: f64) -> CircuitBreaker {
    CircuitBreaker::new(&CircuitBreakerPolicy {
        failure_threshold: threshold,
        recovery_timeout: recovery_secs,
    })
}

#[test]
fn closed_breaker_admits_calls() {
    let b = breaker(2, 60.0);
    assert_eq!(b.state(), BreakerState::Closed);
    assert!(b.can_execute());
}

#[test]
fn opens_when_consecutive_failures_reach_threshold() {
    let b = breaker(2, 60.0);
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Closed);
    assert!(b.can_execute());
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Open);
    assert!(!b.can_execute());
}

#[test]
fn blocks_until_recovery_timeout_then_admits_trial() {
    let b = breaker(1, 0.05);
    b.record_failure();
    assert!(!b.can_execute());
    assert_eq!(b.state(), BreakerState::Open);

    thread::sleep(Duration::from_millis(80));
    assert!(b.can_execute());
    assert_eq!(b.state(), BreakerState::HalfOpen);
    // The trial window stays open for further callers.
    assert!(b.can_execute());
}

#[test]
fn trial_success_closes_and_clears_state() {
    let b = breaker(1, 0.05);
    b.record_failure();
    thread::sleep(Duration::from_millis(80));
    assert!(b.can_execute());
    b.record_success();
    assert_eq!(b.state(), BreakerState::Closed);
    // Failure history is gone: one new failure is needed to reopen.
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Open);
}

#[test]
fn trial_failure_reopens_and_restarts_recovery() {
    let b = breaker(1, 0.05);
    b.record_failure();
    thread::sleep(Duration::from_millis(80));
    assert!(b.can_execute());
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Open);
    assert!(!b.can_execute());

    thread::sleep(Duration::from_millis(80));
    assert!(b.can_execute());
    assert_eq!(b.state(), BreakerState::HalfOpen);
}

#[test]
fn success_in_closed_state_resets_failure_count() {
    let b = breaker(3, 60.0);
    b.record_failure();
    b.record_failure();
    b.record_success();
    b.record_failure();
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Closed);
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Open);
}

#[test]
fn gate_check_does_not_mutate_counters() {
    let b = breaker(2, 60.0);
    b.record_failure();
    for _ in 0..10 {
        assert!(b.can_execute());
    }
    // Still one failure short of the threshold.
    assert_eq!(b.state(), BreakerState::Closed);
    b.record_failure();
    assert_eq!(b.state(), BreakerState::Open);
}
