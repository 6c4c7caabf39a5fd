//! Latency collector probing a reference host via ICMP.
//!
//! - [`LatencyCollector`]: reports round-trip time, NaN when unreachable

mod collector;

pub use collector::{IcmpProber, LATENCY_FAMILY, LatencyCollector, LatencyConfig, Prober};
