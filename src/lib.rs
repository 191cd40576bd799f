//! # EsoxSolutions.Multiplier
//!
//! Self-scaling worker pool for Rust: keeps a target number of workers
//! running the same work function, replaces workers that return or panic,
//! and drains on shutdown.
//!
//! ## Features
//!
//! - Target worker count maintained by a background maintenance loop
//! - Panic isolation per worker
//! - Blocking and async shutdown that waits for every running worker
//! - Configuration through a fluent builder or environment variables
//! - Health monitoring and metrics
//! - Prometheus metrics export
//! - Typed environment value conversion
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_multiplier::MultiplierConfig;
//! use std::time::Duration;
//!
//! let (tx, rx) = crossbeam::channel::unbounded::<String>();
//!
//! let multiplier = MultiplierConfig::new(move || {
//!     // Each worker drains the queue until it is closed
//!     while let Ok(job) = rx.recv() {
//!         println!("processing {}", job);
//!     }
//! })
//! .with_worker_count(4)
//! .with_multiply_interval(Duration::from_millis(100))
//! .run();
//!
//! tx.send("hello".to_string()).unwrap();
//! drop(tx);
//!
//! // Blocks until every worker has returned
//! multiplier.stop();
//! ```

mod multiplier;
mod config;
mod metrics;
mod health;
mod errors;
pub mod env;

pub use multiplier::Multiplier;
pub use config::MultiplierConfig;
pub use metrics::{WorkerMetrics, MetricsExporter};
pub use health::HealthStatus;
pub use errors::{ConvertError, ConvertResult, PoolError, PoolResult};
