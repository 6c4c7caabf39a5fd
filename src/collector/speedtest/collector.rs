//! Bandwidth benchmark collector.
//!
//! Picks the lowest-latency configured server, then measures download and
//! upload throughput against it. A run can take tens of seconds, so this
//! collector is scheduled on its own, much longer period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::collector::{Collector, CollectorError, Observations, PollResult, clamp_period};
use crate::metrics::FamilyDesc;

/// Default benchmark timeout (2 minutes).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default upload payload (10 MB).
const DEFAULT_UPLOAD_BYTES: usize = 10_000_000;

pub const DOWNLOAD_FAMILY: &str = "internet_speedtest_download_mbps";
pub const UPLOAD_FAMILY: &str = "internet_speedtest_upload_mbps";
pub const PING_FAMILY: &str = "internet_speedtest_ping_ms";

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_upload_bytes() -> usize {
    DEFAULT_UPLOAD_BYTES
}

fn default_servers() -> Vec<SpeedtestServer> {
    vec![SpeedtestServer {
        name: "cloudflare".to_string(),
        latency_url: "https://speed.cloudflare.com/__down?bytes=0".to_string(),
        download_url: "https://speed.cloudflare.com/__down?bytes=25000000".to_string(),
        upload_url: "https://speed.cloudflare.com/__up".to_string(),
    }]
}

/// One benchmark endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedtestServer {
    /// Display name.
    pub name: String,
    /// Small request used to measure latency.
    pub latency_url: String,
    /// Large payload downloaded to measure throughput.
    pub download_url: String,
    /// Endpoint accepting an upload payload.
    pub upload_url: String,
}

/// Configuration for the bandwidth benchmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedtestConfig {
    /// Enable this collector (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Timeout for a whole run (default: 120s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Bytes sent in the upload phase (default: 10 MB).
    #[serde(default = "default_upload_bytes")]
    pub upload_bytes: usize,
    /// Candidate servers; the lowest-latency one is used.
    #[serde(default = "default_servers")]
    pub servers: Vec<SpeedtestServer>,
}

impl Default for SpeedtestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: DEFAULT_TIMEOUT,
            upload_bytes: DEFAULT_UPLOAD_BYTES,
            servers: default_servers(),
        }
    }
}

/// Result of one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedtestResult {
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ms: f64,
}

/// Runs a full bandwidth benchmark.
#[async_trait::async_trait]
pub trait Benchmark: Send + Sync + 'static {
    /// Select a server and measure latency, download and upload.
    async fn run(&self) -> Result<SpeedtestResult, CollectorError>;
}

/// Throughput in megabits per second.
fn mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// HTTP benchmark against the configured servers.
#[derive(Debug, Clone)]
pub struct HttpBenchmark {
    client: Client,
    servers: Vec<SpeedtestServer>,
    upload_bytes: usize,
}

impl HttpBenchmark {
    /// Build a benchmark client bounded by `config.timeout`.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(config: &SpeedtestConfig) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            servers: config.servers.clone(),
            upload_bytes: config.upload_bytes,
        })
    }

    async fn latency(&self, server: &SpeedtestServer) -> Result<Duration, CollectorError> {
        let start = Instant::now();
        self.client
            .get(&server.latency_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(start.elapsed())
    }

    /// Lowest-latency reachable server.
    async fn best_server(&self) -> Result<(&SpeedtestServer, Duration), CollectorError> {
        let mut best: Option<(&SpeedtestServer, Duration)> = None;
        for server in &self.servers {
            match self.latency(server).await {
                Ok(rtt) => {
                    tracing::debug!(server = %server.name, latency_ms = rtt.as_millis(), "Speedtest server latency");
                    if best.is_none_or(|(_, b)| rtt < b) {
                        best = Some((server, rtt));
                    }
                }
                Err(e) => {
                    tracing::warn!(server = %server.name, error = %e, "Speedtest server unreachable");
                }
            }
        }
        best.ok_or_else(|| CollectorError::Network("no reachable speedtest server".into()))
    }

    async fn download(&self, server: &SpeedtestServer) -> Result<f64, CollectorError> {
        let start = Instant::now();
        let mut response = self
            .client
            .get(&server.download_url)
            .send()
            .await?
            .error_for_status()?;
        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await? {
            bytes += chunk.len() as u64;
        }
        Ok(mbps(bytes, start.elapsed()))
    }

    async fn upload(&self, server: &SpeedtestServer) -> Result<f64, CollectorError> {
        let payload = vec![0u8; self.upload_bytes];
        let start = Instant::now();
        self.client
            .post(&server.upload_url)
            .body(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(mbps(self.upload_bytes as u64, start.elapsed()))
    }
}

#[async_trait::async_trait]
impl Benchmark for HttpBenchmark {
    async fn run(&self) -> Result<SpeedtestResult, CollectorError> {
        let (server, rtt) = self.best_server().await?;
        tracing::debug!(server = %server.name, "Speedtest server selected");
        let download_mbps = self.download(server).await?;
        let upload_mbps = self.upload(server).await?;
        Ok(SpeedtestResult {
            download_mbps,
            upload_mbps,
            ping_ms: rtt.as_secs_f64() * 1000.0,
        })
    }
}

/// Bandwidth benchmark collector.
pub struct SpeedtestCollector {
    name: String,
    period: Duration,
    timeout: Duration,
    benchmark: Arc<dyn Benchmark>,
}

impl SpeedtestCollector {
    /// Create a collector using the HTTP benchmark.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        config: &SpeedtestConfig,
        period: Duration,
    ) -> Result<Self, CollectorError> {
        let benchmark = HttpBenchmark::new(config)?;
        Ok(Self::with_benchmark(name, config, period, Arc::new(benchmark)))
    }

    /// Create a collector with a custom benchmark.
    pub fn with_benchmark(
        name: impl Into<String>,
        config: &SpeedtestConfig,
        period: Duration,
        benchmark: Arc<dyn Benchmark>,
    ) -> Self {
        Self {
            name: name.into(),
            period: clamp_period(period),
            timeout: config.timeout,
            benchmark,
        }
    }
}

impl std::fmt::Debug for SpeedtestCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeedtestCollector")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for SpeedtestCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn families(&self) -> Vec<FamilyDesc> {
        vec![
            FamilyDesc::gauge(DOWNLOAD_FAMILY, "Download speed in Mbps", &[]),
            FamilyDesc::gauge(UPLOAD_FAMILY, "Upload speed in Mbps", &[]),
            FamilyDesc::gauge(PING_FAMILY, "Ping in milliseconds", &[]),
        ]
    }

    async fn poll(&self) -> PollResult {
        let result = self.benchmark.run().await?;
        tracing::info!(
            collector = %self.name,
            download_mbps = result.download_mbps,
            upload_mbps = result.upload_mbps,
            ping_ms = result.ping_ms,
            "Speed test completed"
        );

        let mut obs = Observations::new();
        obs.scalar(DOWNLOAD_FAMILY, result.download_mbps)
            .scalar(UPLOAD_FAMILY, result.upload_mbps)
            .scalar(PING_FAMILY, result.ping_ms);
        Ok(obs)
    }
}
