//! Public IP lookup collector.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::collector::{Collector, CollectorError, Observations, PollResult, clamp_period};
use crate::metrics::{FamilyDesc, label_set};

/// Default lookup service.
const DEFAULT_URL: &str = "https://api.ipify.org?format=json";

/// Default lookup timeout (5 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const PUBLIC_IP_INFO: &str = "public_ip_info";

fn default_enabled() -> bool {
    true
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// Configuration for the public IP lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpConfig {
    /// Enable this collector (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lookup URL answering `{"ip": "..."}` (default: ipify).
    #[serde(default = "default_url")]
    pub url: String,
    /// Request timeout (default: 5s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_url(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Finds the address the internet sees for this network.
#[async_trait::async_trait]
pub trait IpLookup: Send + Sync + 'static {
    /// Look up the current public address.
    async fn lookup(&self) -> Result<IpAddr, CollectorError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    ip: String,
}

/// HTTP lookup against an ipify-compatible JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpIpLookup {
    client: Client,
    url: String,
}

impl HttpIpLookup {
    /// Build a lookup client bounded by `config.timeout`.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(config: &PublicIpConfig) -> Result<Self, CollectorError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollectorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl IpLookup for HttpIpLookup {
    async fn lookup(&self) -> Result<IpAddr, CollectorError> {
        let response: LookupResponse = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .ip
            .trim()
            .parse()
            .map_err(|_| CollectorError::Protocol(format!("invalid address '{}'", response.ip)))
    }
}

/// Public IP collector.
///
/// A failed lookup returns an error, so the previously exported record stays
/// in place until a later lookup succeeds.
pub struct PublicIpCollector {
    name: String,
    period: Duration,
    timeout: Duration,
    lookup: Arc<dyn IpLookup>,
}

impl PublicIpCollector {
    /// Create a collector using the HTTP lookup.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if the HTTP client cannot be built.
    pub fn new(
        name: impl Into<String>,
        config: &PublicIpConfig,
        period: Duration,
    ) -> Result<Self, CollectorError> {
        let lookup = HttpIpLookup::new(config)?;
        Ok(Self::with_lookup(name, config, period, Arc::new(lookup)))
    }

    /// Create a collector with a custom lookup.
    pub fn with_lookup(
        name: impl Into<String>,
        config: &PublicIpConfig,
        period: Duration,
        lookup: Arc<dyn IpLookup>,
    ) -> Self {
        Self {
            name: name.into(),
            period: clamp_period(period),
            timeout: config.timeout,
            lookup,
        }
    }
}

impl std::fmt::Debug for PublicIpCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicIpCollector")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for PublicIpCollector {
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
        vec![FamilyDesc::info(PUBLIC_IP_INFO, "Public IP information")]
    }

    async fn poll(&self) -> PollResult {
        let ip = self.lookup.lookup().await?;
        tracing::debug!(collector = %self.name, %ip, "Public IP resolved");

        let mut obs = Observations::new();
        obs.info(PUBLIC_IP_INFO, label_set([("public_ip", ip.to_string())]));
        Ok(obs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticLookup(Option<&'static str>);

    #[async_trait::async_trait]
    impl IpLookup for StaticLookup {
        async fn lookup(&self) -> Result<IpAddr, CollectorError> {
            match self.0 {
                Some(ip) => Ok(ip.parse().unwrap()),
                None => Err(CollectorError::Network("connection refused".into())),
            }
        }
    }

    #[test]
    fn test_public_ip_config_defaults() {
        let config: PublicIpConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_poll_produces_info_record() {
        let collector = PublicIpCollector::with_lookup(
            "public-ip",
            &PublicIpConfig::default(),
            Duration::from_secs(300),
            Arc::new(StaticLookup(Some("203.0.113.7"))),
        );
        let obs = collector.poll().await.unwrap();
        assert_eq!(
            obs.info_record(PUBLIC_IP_INFO).unwrap()["public_ip"],
            "203.0.113.7"
        );
    }

    #[tokio::test]
    async fn test_poll_failure_is_error() {
        let collector = PublicIpCollector::with_lookup(
            "public-ip",
            &PublicIpConfig::default(),
            Duration::from_secs(300),
            Arc::new(StaticLookup(None)),
        );
        assert!(collector.poll().await.is_err());
    }

    #[test]
    fn test_http_lookup_builds() {
        let lookup = HttpIpLookup::new(&PublicIpConfig::default()).unwrap();
        assert_eq!(lookup.url, DEFAULT_URL);
    }
}
