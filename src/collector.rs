//! Collector Layer
//!
//! Pollable data sources and the scheduler that drives them. Collectors never
//! touch the registry: each poll hands its [`Observations`] to the
//! [`Scheduler`], which replaces the affected families atomically.
//!
//! # Architecture
//!
//! - [`Collector`]: Core trait for implementing data collectors
//! - [`Scheduler`]: Per-collector cadence, timeout and failure isolation
//! - [`register_collectors`]: Builds the configured collector set
//!
//! # Example
//!
//! ```rust,no_run
//! use modemwatch::collector::Scheduler;
//! use modemwatch::collector::ping::{LatencyCollector, LatencyConfig};
//! use modemwatch::MetricsRegistry;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = MetricsRegistry::new();
//! let mut scheduler = Scheduler::new(registry.clone());
//! let config = LatencyConfig::new("1.1.1.1");
//! let collector = LatencyCollector::new("latency", &config, Duration::from_secs(60));
//! scheduler.register(Arc::new(collector)).await?;
//! scheduler
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod ping;
pub mod public_ip;
mod scheduler;
mod setup;
pub mod speedtest;
mod traits;

pub use scheduler::{CollectorState, PollPhase, Scheduler, SchedulerStatus};
pub use setup::register_collectors;
pub use traits::{
    Collector, CollectorError, ErrorKind, MIN_PERIOD, Observations, PollResult, clamp_period,
};
