//! modemwatch - Home Router and Internet Link Telemetry
//!
//! This crate polls a home router and a few internet-side probes on
//! independent schedules and keeps the latest value of every labeled series
//! in an in-memory registry. It can be embedded as a library (bring your own
//! [`DeviceClient`](collector::device::DeviceClient) for the router protocol)
//! or run as the standalone `modemwatch` binary.
//!
//! # Architecture
//!
//! - **Metrics**: Declared families with atomic whole-family replacement
//! - **Collectors**: Router identity/hosts, port mappings, Wi-Fi radios,
//!   public IP, bandwidth benchmark and latency probe
//! - **Scheduler**: One task per due collector, per-poll timeout, failure isolation
//! - **Config**: YAML file with environment and command-line overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use modemwatch::{AppConfig, MetricsRegistry, Scheduler, register_collectors};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load("configs/config.yaml")?;
//! let registry = MetricsRegistry::new();
//! let mut scheduler = Scheduler::new(registry.clone());
//! // Router collectors are skipped: no protocol client in this example.
//! register_collectors(&mut scheduler, &config, |_| None).await?;
//!
//! let status = scheduler.status();
//! tokio::spawn(scheduler.run(std::future::pending::<()>()));
//!
//! let snapshot = registry.snapshot().await;
//! println!("{} series, {} collectors", snapshot.series_count(), status.collectors().await.len());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod metrics;

pub use collector::{
    Collector, CollectorError, CollectorState, ErrorKind, Observations, PollResult, Scheduler,
    SchedulerStatus, register_collectors,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides};
pub use metrics::{FamilyDesc, LabelSet, MetricsRegistry, Sample, Snapshot};
