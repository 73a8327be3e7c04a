mod common;

use bucketgate::telemetry::{AdmissionEvent, MemorySink};
use bucketgate::{
    CheckOutcome, CheckRequest, CheckResponse, InMemoryBucketStore, RateLimiterService,
    RefillOutcome, RefillRequest, RefillResponse, ServiceError, TokenBucketEngine,
};
use common::test_stores::FlakyStore;
use tower::ServiceExt;

fn check(key: &str, token_cost: i32) -> CheckRequest {
    CheckRequest { key: key.into(), token_cost }
}

fn refill(key: &str, leak_rate: i32, bucket_size: i32) -> RefillRequest {
    RefillRequest { key: key.into(), leak_rate, bucket_size }
}

#[tokio::test]
async fn check_limit_allows_initially() {
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
    let response = service.clone().oneshot(check("user_1", 1)).await.unwrap();
    assert_eq!(response, CheckResponse { allowed: true, remaining: 9 });
}

#[tokio::test]
async fn check_limit_denies_after_bucket_is_drained() {
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
    for _ in 0..10 {
        service.check_limit(check("user_2", 1)).await.unwrap();
    }
    let response = service.check_limit(check("user_2", 1)).await.unwrap();
    assert_eq!(response, CheckResponse { allowed: false, remaining: 0 });
}

#[tokio::test]
async fn refill_bucket_increases_tokens() {
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
    let response = service.clone().oneshot(refill("user_3", 2, 10)).await.unwrap();
    assert_eq!(response, RefillResponse { current_tokens: 2 });
}

#[tokio::test]
async fn check_allowed_again_after_refill() {
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
    for _ in 0..10 {
        service.check_limit(check("user_4", 1)).await.unwrap();
    }
    let refilled = service.refill_bucket(refill("user_4", 5, 10)).await.unwrap();
    assert_eq!(refilled.current_tokens, 5);

    let response = service.check_limit(check("user_4", 1)).await.unwrap();
    assert_eq!(response, CheckResponse { allowed: true, remaining: 4 });
}

#[tokio::test]
async fn empty_keys_are_rejected() {
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
    assert_eq!(service.check_limit(check("", 1)).await.unwrap_err(), ServiceError::EmptyKey);
    assert_eq!(service.refill_bucket(refill("", 1, 10)).await.unwrap_err(), ServiceError::EmptyKey);
    assert!(service.engine().store().is_empty());
}

#[tokio::test]
async fn outage_looks_like_denial_on_the_wire() {
    let store = FlakyStore::new();
    store.fail_reads(true);
    let sink = MemorySink::new();
    let service =
        RateLimiterService::new(TokenBucketEngine::new(store)).with_sink(sink.clone());

    let response = service.check_limit(check("user_5", 1)).await.unwrap();
    assert_eq!(response, CheckResponse { allowed: false, remaining: 0 });

    let refilled = service.refill_bucket(refill("user_5", 1, 10)).await.unwrap();
    assert_eq!(refilled.current_tokens, 0);

    // In-process observers can still tell the difference.
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.is_backend_error()));
}

#[tokio::test]
async fn telemetry_records_each_call() {
    let sink = MemorySink::new();
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()))
        .with_sink(sink.clone());

    service.check_limit(check("k", 4)).await.unwrap();
    service.refill_bucket(refill("k", 3, 10)).await.unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 2);
    match &events[0] {
        AdmissionEvent::Checked { key, cost, outcome, .. } => {
            assert_eq!(key, "k");
            assert_eq!(*cost, 4);
            assert_eq!(*outcome, CheckOutcome::Allowed { remaining: 6 });
        }
        other => panic!("expected check event, got {:?}", other),
    }
    match &events[1] {
        AdmissionEvent::Refilled { leak_rate, capacity, outcome, .. } => {
            assert_eq!((*leak_rate, *capacity), (3, 10));
            assert_eq!(*outcome, RefillOutcome::Refilled { tokens: 9 });
        }
        other => panic!("expected refill event, got {:?}", other),
    }
}

#[tokio::test]
async fn negative_cost_is_a_probe() {
    let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
    let response = service.check_limit(check("probe", -3)).await.unwrap();
    assert_eq!(response, CheckResponse { allowed: true, remaining: 10 });
    let response = service.check_limit(check("probe", 0)).await.unwrap();
    assert_eq!(response, CheckResponse { allowed: true, remaining: 10 });
}
