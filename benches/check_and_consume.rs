use bucketgate::{
    AdmissionLayer, AdmissionTicket, BucketStore, InMemoryBucketStore, TokenBucketEngine,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::future::Ready;
use tower::{Service, ServiceBuilder, ServiceExt};

// A simple service that just returns its input.
#[derive(Clone)]
struct EchoService;

impl Service<&'static str> for EchoService {
    type Response = &'static str;
    type Error = std::io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: &'static str) -> Self::Future {
        futures::future::ready(Ok(req))
    }
}

fn check_allowed(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryBucketStore::new();
    let engine = TokenBucketEngine::new(store.clone());

    c.bench_function("check_and_consume_allowed", |b| {
        b.to_async(&rt).iter(|| async {
            // Keep the bucket topped up so every iteration takes the write path.
            store.set("bucket:bench", i64::MAX / 2).await.unwrap();
            black_box(engine.check_and_consume("bench", 1).await)
        });
    });
}

fn check_denied(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryBucketStore::new();
    rt.block_on(store.set("bucket:empty", 0)).unwrap();
    let engine = TokenBucketEngine::new(store);

    c.bench_function("check_and_consume_denied", |b| {
        b.to_async(&rt).iter(|| async { black_box(engine.check_and_consume("empty", 1).await) });
    });
}

fn refill(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let engine = TokenBucketEngine::new(InMemoryBucketStore::new());

    c.bench_function("refill_at_capacity", |b| {
        b.to_async(&rt).iter(|| async { black_box(engine.refill("full", 5, 10).await) });
    });
}

fn admission_layer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryBucketStore::new();
    let engine = TokenBucketEngine::new(store.clone());
    let layer = AdmissionLayer::new(engine, |_req: &&'static str| AdmissionTicket::new("layer", 1));
    let svc = ServiceBuilder::new().layer(layer).service(EchoService);

    c.bench_function("admission_layer_allowed", |b| {
        b.to_async(&rt).iter(|| async {
            store.set("bucket:layer", i64::MAX / 2).await.unwrap();
            black_box(svc.clone().oneshot("ping").await.unwrap())
        });
    });
}

criterion_group!(benches, check_allowed, check_denied, refill, admission_layer);
criterion_main!(benches);
