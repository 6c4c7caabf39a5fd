//! Internet bandwidth benchmark.
//!
//! - [`SpeedtestCollector`]: download/upload throughput and latency

mod collector;

pub use collector::{
    Benchmark, DOWNLOAD_FAMILY, HttpBenchmark, PING_FAMILY, SpeedtestCollector, SpeedtestConfig,
    SpeedtestResult, SpeedtestServer, UPLOAD_FAMILY,
};
