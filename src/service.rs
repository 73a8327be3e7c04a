//! RPC boundary: `CheckLimit` and `RefillBucket`.
//!
//! Transports (gRPC, HTTP, in-process channels) decode into [`CheckRequest`] /
//! [`RefillRequest`], drive [`RateLimiterService`] as a `tower::Service`, and encode the
//! response. The service owns what the engine does not: key validation, the `i32` wire
//! width, request timing, and telemetry.
//!
//! A denied request and a store outage produce the same response: `allowed = false`.
//!
//! ```rust
//! use bucketgate::{CheckRequest, InMemoryBucketStore, RateLimiterService, TokenBucketEngine};
//! use tower::ServiceExt;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let service = RateLimiterService::new(TokenBucketEngine::new(InMemoryBucketStore::new()));
//! let response = service
//!     .oneshot(CheckRequest { key: "user:7".into(), token_cost: 1 })
//!     .await
//!     .unwrap();
//! assert!(response.allowed);
//! assert_eq!(response.remaining, 9);
//! # });
//! ```

use crate::engine::TokenBucketEngine;
use crate::error::ServiceError;
use crate::store::BucketStore;
use crate::telemetry::{emit_best_effort, AdmissionEvent, NullSink, TelemetrySink};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::Instant;
use tower_service::Service;
use tracing::debug;

/// `CheckLimit` request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CheckRequest {
    pub key: String,
    pub token_cost: i32,
}

/// `CheckLimit` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: i32,
}

/// `RefillBucket` request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RefillRequest {
    pub key: String,
    pub leak_rate: i32,
    pub bucket_size: i32,
}

/// `RefillBucket` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RefillResponse {
    pub current_tokens: i32,
}

/// Engine counts are `i64`; the wire carries `i32`.
fn to_wire(tokens: i64) -> i32 {
    i32::try_from(tokens).unwrap_or(if tokens < 0 { i32::MIN } else { i32::MAX })
}

/// The admission-control service exposed to transports.
pub struct RateLimiterService<S, T = NullSink> {
    engine: TokenBucketEngine<S>,
    sink: T,
}

impl<S, T: Clone> Clone for RateLimiterService<S, T> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone(), sink: self.sink.clone() }
    }
}

impl<S, T: std::fmt::Debug> std::fmt::Debug for RateLimiterService<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterService")
            .field("engine", &self.engine)
            .field("sink", &self.sink)
            .finish()
    }
}

impl<S> RateLimiterService<S, NullSink> {
    pub fn new(engine: TokenBucketEngine<S>) -> Self {
        Self { engine, sink: NullSink }
    }
}

impl<S, T> RateLimiterService<S, T> {
    /// Replace the telemetry sink.
    pub fn with_sink<U>(self, sink: U) -> RateLimiterService<S, U> {
        RateLimiterService { engine: self.engine, sink }
    }

    pub fn engine(&self) -> &TokenBucketEngine<S> {
        &self.engine
    }
}

impl<S, T> RateLimiterService<S, T>
where
    S: BucketStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    /// Answer a `CheckLimit` call.
    pub async fn check_limit(&self, request: CheckRequest) -> Result<CheckResponse, ServiceError> {
        answer_check(self.engine.clone(), self.sink.clone(), request).await
    }

    /// Answer a `RefillBucket` call.
    pub async fn refill_bucket(
        &self,
        request: RefillRequest,
    ) -> Result<RefillResponse, ServiceError> {
        answer_refill(self.engine.clone(), self.sink.clone(), request).await
    }
}

async fn answer_check<S, T>(
    engine: TokenBucketEngine<S>,
    sink: T,
    request: CheckRequest,
) -> Result<CheckResponse, ServiceError>
where
    S: BucketStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    if request.key.is_empty() {
        return Err(ServiceError::EmptyKey);
    }

    let start = Instant::now();
    let cost = i64::from(request.token_cost);
    let outcome = engine.check_and_consume(&request.key, cost).await;
    let duration = start.elapsed();
    debug!(key = %request.key, duration_secs = duration.as_secs_f64(), "check_limit answered");

    let (allowed, remaining) = outcome.into_wire();
    emit_best_effort(sink, AdmissionEvent::Checked { key: request.key, cost, outcome, duration })
        .await;

    Ok(CheckResponse { allowed, remaining: to_wire(remaining) })
}

async fn answer_refill<S, T>(
    engine: TokenBucketEngine<S>,
    sink: T,
    request: RefillRequest,
) -> Result<RefillResponse, ServiceError>
where
    S: BucketStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    if request.key.is_empty() {
        return Err(ServiceError::EmptyKey);
    }

    let start = Instant::now();
    let leak_rate = i64::from(request.leak_rate);
    let capacity = i64::from(request.bucket_size);
    let outcome = engine.refill(&request.key, leak_rate, capacity).await;
    let duration = start.elapsed();
    debug!(key = %request.key, duration_secs = duration.as_secs_f64(), "refill_bucket answered");

    let current_tokens = to_wire(outcome.tokens());
    emit_best_effort(
        sink,
        AdmissionEvent::Refilled { key: request.key, leak_rate, capacity, outcome, duration },
    )
    .await;

    Ok(RefillResponse { current_tokens })
}

impl<S, T> Service<CheckRequest> for RateLimiterService<S, T>
where
    S: BucketStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    type Response = CheckResponse;
    type Error = ServiceError;
    type Future = BoxFuture<'static, Result<CheckResponse, ServiceError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: CheckRequest) -> Self::Future {
        Box::pin(answer_check(self.engine.clone(), self.sink.clone(), request))
    }
}

impl<S, T> Service<RefillRequest> for RateLimiterService<S, T>
where
    S: BucketStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    type Response = RefillResponse;
    type Error = ServiceError;
    type Future = BoxFuture<'static, Result<RefillResponse, ServiceError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RefillRequest) -> Self::Future {
        Box::pin(answer_refill(self.engine.clone(), self.sink.clone(), request))
    }
}
