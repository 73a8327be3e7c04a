//! Admission middleware for arbitrary `tower` services.
//!
//! [`AdmissionLayer`] asks the engine before every request. The bucket key and cost come from
//! the request itself via an extractor closure. Denied requests fail immediately with
//! [`AdmissionError::Denied`]; they are never queued or delayed.

use crate::engine::TokenBucketEngine;
use crate::error::AdmissionError;
use crate::outcome::CheckOutcome;
use crate::store::BucketStore;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Bucket key and token cost charged for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionTicket {
    pub key: String,
    pub cost: i64,
}

impl AdmissionTicket {
    pub fn new(key: impl Into<String>, cost: i64) -> Self {
        Self { key: key.into(), cost }
    }
}

/// A layer that charges each request against a token bucket.
pub struct AdmissionLayer<S, F> {
    engine: TokenBucketEngine<S>,
    extract: Arc<F>,
}

impl<S, F> Clone for AdmissionLayer<S, F> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone(), extract: self.extract.clone() }
    }
}

impl<S, F> AdmissionLayer<S, F> {
    /// Create a layer; `extract` maps each request to the bucket it is charged against.
    pub fn new(engine: TokenBucketEngine<S>, extract: F) -> Self {
        Self { engine, extract: Arc::new(extract) }
    }
}

impl<Svc, S, F> Layer<Svc> for AdmissionLayer<S, F> {
    type Service = AdmissionService<Svc, S, F>;

    fn layer(&self, inner: Svc) -> Self::Service {
        AdmissionService { inner, engine: self.engine.clone(), extract: self.extract.clone() }
    }
}

/// Middleware service produced by [`AdmissionLayer`].
pub struct AdmissionService<Svc, S, F> {
    inner: Svc,
    engine: TokenBucketEngine<S>,
    extract: Arc<F>,
}

impl<Svc: Clone, S, F> Clone for AdmissionService<Svc, S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            engine: self.engine.clone(),
            extract: self.extract.clone(),
        }
    }
}

impl<Svc, S, F, Req> Service<Req> for AdmissionService<Svc, S, F>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    S: BucketStore + 'static,
    F: Fn(&Req) -> AdmissionTicket + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = Svc::Response;
    type Error = AdmissionError<Svc::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AdmissionError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let ticket = (self.extract)(&req);
        let engine = self.engine.clone();
        // Keep the instance that was driven to readiness.
        let fresh = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, fresh);

        Box::pin(async move {
            match engine.check_and_consume(&ticket.key, ticket.cost).await {
                CheckOutcome::Allowed { .. } => inner.call(req).await.map_err(AdmissionError::Inner),
                CheckOutcome::Denied { remaining } => {
                    Err(AdmissionError::Denied { key: ticket.key, remaining })
                }
                CheckOutcome::BackendError { .. } => {
                    Err(AdmissionError::Unavailable { key: ticket.key })
                }
            }
        })
    }
}
