//! Token bucket behavior: burst consumption, denial with advice, refill.

use std::time::Duration;

use watchscrape::metadata::{RateDecision, TokenBucket};

#[tokio::test]
async fn burst_then_deny() {
    let bucket = TokenBucket::new(2.0);

    // Burst capacity equals one second of tokens
    assert_eq!(bucket.try_acquire().await, RateDecision::Allow);
    assert_eq!(bucket.try_acquire().await, RateDecision::Allow);

    match bucket.try_acquire().await {
        RateDecision::Deny { retry_after } => {
            assert!(retry_after > Duration::ZERO);
            assert!(retry_after <= Duration::from_secs(1));
        }
        RateDecision::Allow => panic!("bucket should be exhausted"),
    }
}

#[tokio::test]
async fn tokens_refill_over_time() {
    let bucket = TokenBucket::new(20.0);

    // Drain the burst
    for _ in 0..20 {
        assert_eq!(bucket.try_acquire().await, RateDecision::Allow);
    }
    assert!(matches!(
        bucket.try_acquire().await,
        RateDecision::Deny { .. }
    ));

    // 200ms at 20 rps yields ~4 tokens
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bucket.try_acquire().await, RateDecision::Allow);
    assert_eq!(bucket.try_acquire().await, RateDecision::Allow);
}

#[tokio::test]
async fn acquire_waits_instead_of_failing() {
    let bucket = TokenBucket::new(50.0);
    for _ in 0..50 {
        bucket.acquire().await;
    }

    // Bucket is empty; the 51st acquire must block briefly, not error
    let start = std::time::Instant::now();
    bucket.acquire().await;
    assert!(start.elapsed() >= Duration::from_millis(5));
    assert!(start.elapsed() < Duration::from_secs(2));
}
