//! Common imports for bucketgate users.
//!
//! `use bucketgate::prelude::*;` brings the engine, the store trait, outcomes, and the
//! tower integration into scope.

pub use crate::{
    AdmissionError, AdmissionLayer, AdmissionTicket, BucketStore, CheckOutcome, CheckRequest,
    CheckResponse, EngineConfig, InMemoryBucketStore, RateLimiterService, RefillOutcome,
    RefillRequest, RefillResponse, TokenBucketEngine,
};
