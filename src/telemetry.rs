//! Telemetry for admission decisions.
//!
//! The engine itself only logs. The service boundary turns every answered call into an
//! [`AdmissionEvent`] and hands it to a [`TelemetrySink`]: a `tower::Service` that can log,
//! aggregate, or forward the event. Delivery is best-effort and never delays or changes an
//! admission decision.
//!
//! ```rust
//! use bucketgate::telemetry::{AdmissionEvent, MemorySink};
//! use bucketgate::CheckOutcome;
//! use std::time::Duration;
//! use tower::Service;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut sink = MemorySink::new();
//! let event = AdmissionEvent::Checked {
//!     key: "user:1".into(),
//!     cost: 1,
//!     outcome: CheckOutcome::Allowed { remaining: 9 },
//!     duration: Duration::from_micros(120),
//! };
//! sink.call(event.clone()).await.unwrap();
//! assert_eq!(sink.events(), vec![event]);
//! # });
//! ```

pub mod events;
pub mod sinks;

pub use events::AdmissionEvent;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
