use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conductor::error::EffectorError;
use conductor::model::RetryPolicy;
use conductor::resilience::RetryExecutor;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: 0.1,
        max_delay: 60.0,
        exponential_base: 2.0,
        jitter: false,
    }
}

#[tokio::test(start_paused = true)]
async fn first_attempt_success_skips_backoff() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(&policy(3));

    let counter = Arc::clone(&calls);
    let start = tokio::time::Instant::now();
    let result = executor
        .run(move |_attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, EffectorError>(7)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn two_failures_then_success_observes_exponential_delays() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(&policy(3));

    let counter = Arc::clone(&calls);
    let start = tokio::time::Instant::now();
    let result = executor
        .run(move |_attempt| {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(EffectorError::Call("connection reset".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Backoff of 0.1s then 0.2s in virtual time, nothing more.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(330), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn exhaustion_carries_last_underlying_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(&policy(3));

    let counter = Arc::clone(&calls);
    let result: Result<(), _> = executor
        .run(move |attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EffectorError::Call(format!("boom {attempt}")))
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    match result.unwrap_err() {
        EffectorError::RetryExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert_eq!(last, "boom 2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn circuit_open_is_never_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(&policy(5));

    let counter = Arc::clone(&calls);
    let result: Result<(), _> = executor
        .run(move |_attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EffectorError::CircuitOpen)
            }
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result.unwrap_err(), EffectorError::CircuitOpen));
}

#[tokio::test(start_paused = true)]
async fn delays_are_capped_at_max_delay() {
    let calls = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(&RetryPolicy {
        max_attempts: 4,
        initial_delay: 0.1,
        max_delay: 0.15,
        exponential_base: 2.0,
        jitter: false,
    });

    let counter = Arc::clone(&calls);
    let start = tokio::time::Instant::now();
    let result: Result<(), _> = executor
        .run(move |_attempt| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(EffectorError::Call("down".to_string()))
            }
        })
        .await;

    assert!(result.is_err());
    // 0.1 + 0.15 + 0.15 rather than 0.1 + 0.2 + 0.4.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(430), "elapsed {elapsed:?}");
}
