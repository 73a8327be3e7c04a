#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # bucketgate
//!
//! Shared-state admission control: a token-bucket engine whose buckets live in a
//! key-value store shared by a whole fleet of callers.
//!
//! ## Features
//!
//! - **Check-and-consume** with lazy bucket creation and fail-closed error handling
//! - **Refill** capped at a per-call capacity
//! - **Per-key linearizability** through optimistic compare-and-set against the store
//! - **Bounded contention retries** with backoff and jitter
//! - **tower integration**: an RPC-shaped service and an admission middleware layer
//! - **Telemetry events** delivered to pluggable sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use bucketgate::{InMemoryBucketStore, TokenBucketEngine};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = TokenBucketEngine::new(InMemoryBucketStore::new());
//!
//! // A never-seen key starts with 10 tokens.
//! let outcome = engine.check_and_consume("user:42", 4).await;
//! assert!(outcome.is_allowed());
//! assert_eq!(outcome.remaining(), 6);
//!
//! let refilled = engine.refill("user:42", 2, 10).await;
//! assert_eq!(refilled.tokens(), 8);
//! # });
//! ```

pub mod backoff;
pub mod config;
pub mod contention;
pub mod engine;
pub mod error;
pub mod jitter;
pub mod middleware;
pub mod outcome;
pub mod prelude;
pub mod service;
pub mod store;
pub mod telemetry;

// Re-exports
pub use backoff::Backoff;
pub use config::{BucketDefaults, EngineConfig, EngineConfigBuilder, RefillSeed};
pub use contention::{ContentionPolicy, InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use engine::TokenBucketEngine;
pub use error::{AdmissionError, ConfigError, ServiceError, StoreFailure};
pub use jitter::Jitter;
pub use middleware::{AdmissionLayer, AdmissionService, AdmissionTicket};
pub use outcome::{CheckOutcome, RefillOutcome};
pub use service::{CheckRequest, CheckResponse, RateLimiterService, RefillRequest, RefillResponse};
pub use store::{BucketStore, InMemoryBucketStore};
