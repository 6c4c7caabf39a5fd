//! ICMP latency probe collector.
//!
//! Measures round-trip time to a fixed reference host.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;

use crate::collector::{Collector, CollectorError, Observations, PollResult, clamp_period};
use crate::metrics::{FamilyDesc, label_set};

/// Default reference host.
const DEFAULT_HOST: &str = "google.com";

/// Default probe timeout (1 second).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Extra time granted to the whole poll on top of the probe timeout.
const POLL_GRACE: Duration = Duration::from_secs(2);

pub const LATENCY_FAMILY: &str = "ping_latency_ms";

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Configuration for the latency probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Enable this collector (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Target host (hostname or IP address, default: google.com).
    #[serde(default = "default_host")]
    pub host: String,
    /// Probe timeout (default: 1s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Probe interval (default: the global collection interval).
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            timeout: DEFAULT_TIMEOUT,
            interval: None,
        }
    }
}

impl LatencyConfig {
    /// Create a latency probe configuration for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Set the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the probe interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

/// Measures the round-trip time to a host.
#[async_trait::async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Probe `host` once, giving up after `limit`.
    async fn probe(&self, host: &str, limit: Duration) -> Result<Duration, CollectorError>;
}

/// ICMP echo prober.
#[derive(Debug, Default, Clone, Copy)]
pub struct IcmpProber;

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, host: &str, limit: Duration) -> Result<Duration, CollectorError> {
        let ip_addr = resolve_host(host).await?;

        let client = match ip_addr {
            IpAddr::V4(_) => Client::new(&Config::default()),
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
        }?;

        let mut pinger = client.pinger(ip_addr, PingIdentifier(rand::random())).await;
        pinger.timeout(limit);

        let (_, rtt) = pinger
            .ping(PingSequence(0), &[])
            .await
            .map_err(|e| CollectorError::Network(e.to_string()))?;
        Ok(rtt)
    }
}

/// Latency probe collector.
///
/// An unreachable or silent target is exported as NaN: the poll itself still
/// succeeds, and the next answered probe overwrites the value.
pub struct LatencyCollector {
    name: String,
    host: String,
    probe_timeout: Duration,
    period: Duration,
    prober: Arc<dyn Prober>,
}

impl LatencyCollector {
    /// Create a collector using the ICMP prober.
    pub fn new(name: impl Into<String>, config: &LatencyConfig, period: Duration) -> Self {
        Self::with_prober(name, config, period, Arc::new(IcmpProber))
    }

    /// Create a collector with a custom prober.
    pub fn with_prober(
        name: impl Into<String>,
        config: &LatencyConfig,
        period: Duration,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            name: name.into(),
            host: config.host.clone(),
            probe_timeout: config.timeout,
            period: clamp_period(config.interval.unwrap_or(period)),
            prober,
        }
    }
}

impl std::fmt::Debug for LatencyCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyCollector")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("probe_timeout", &self.probe_timeout)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for LatencyCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn timeout(&self) -> Duration {
        self.probe_timeout + POLL_GRACE
    }

    fn families(&self) -> Vec<FamilyDesc> {
        vec![FamilyDesc::gauge(
            LATENCY_FAMILY,
            "Round-trip time to the reference host in milliseconds",
            &["target"],
        )]
    }

    async fn poll(&self) -> PollResult {
        let limit = self.probe_timeout;
        let latency_ms = match timeout(limit, self.prober.probe(&self.host, limit)).await {
            Ok(Ok(rtt)) => {
                let ms = rtt.as_secs_f64() * 1000.0;
                tracing::debug!(host = %self.host, latency_ms = ms, "Ping probe successful");
                ms
            }
            Ok(Err(e)) => {
                tracing::warn!(host = %self.host, error = %e, "Ping probe failed");
                f64::NAN
            }
            Err(_) => {
                tracing::warn!(
                    host = %self.host,
                    timeout_ms = limit.as_millis(),
                    "Ping probe timed out"
                );
                f64::NAN
            }
        };

        let mut obs = Observations::new();
        obs.gauge(
            LATENCY_FAMILY,
            label_set([("target", self.host.as_str())]),
            latency_ms,
        );
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Prober replaying scripted answers.
    struct ScriptedProber {
        answers: Mutex<Vec<Option<Duration>>>,
    }

    #[async_trait::async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, _host: &str, limit: Duration) -> Result<Duration, CollectorError> {
            let answer = self.answers.lock().unwrap().remove(0);
            match answer {
                Some(rtt) => Ok(rtt),
                None => {
                    tokio::time::sleep(limit * 10).await;
                    Err(CollectorError::Timeout(limit))
                }
            }
        }
    }

    fn collector(answers: Vec<Option<Duration>>) -> LatencyCollector {
        LatencyCollector::with_prober(
            "latency",
            &LatencyConfig::default(),
            Duration::from_secs(300),
            Arc::new(ScriptedProber {
                answers: Mutex::new(answers),
            }),
        )
    }

    fn value(obs: &Observations) -> f64 {
        obs.samples(LATENCY_FAMILY).unwrap()[0].value
    }

    #[test]
    fn test_latency_config_defaults() {
        let config = LatencyConfig::default();
        assert_eq!(config.host, "google.com");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.interval.is_none());
        assert!(config.enabled);
    }

    #[test]
    fn test_latency_config_builder() {
        let config = LatencyConfig::new("1.1.1.1")
            .with_interval(Duration::from_secs(60))
            .with_timeout(Duration::from_secs(2));
        assert_eq!(config.interval, Some(Duration::from_secs(60)));

        let collector = LatencyCollector::new("latency", &config, Duration::from_secs(300));
        assert_eq!(collector.period(), Duration::from_secs(60));
        assert_eq!(collector.timeout(), Duration::from_secs(2) + POLL_GRACE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_nan_then_recovers() {
        let collector = collector(vec![None, Some(Duration::from_millis(12))]);

        let first = collector.poll().await.unwrap();
        assert!(value(&first).is_nan());

        let second = collector.poll().await.unwrap();
        assert!((value(&second) - 12.0).abs() < 1e-9);
        assert_eq!(
            first.samples(LATENCY_FAMILY).unwrap()[0].labels["target"],
            "google.com"
        );
    }

    #[tokio::test]
    async fn test_resolve_host_ipv4() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn test_resolve_host_ipv6() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }
}
