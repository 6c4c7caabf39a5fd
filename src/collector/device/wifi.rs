//! Wi-Fi radio statistics collector.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::collector::{Collector, CollectorError, Observations, PollResult, clamp_period};
use crate::metrics::{FamilyDesc, label_set};

use super::client::{DeviceClient, DeviceError};
use super::collector::{DEFAULT_PERIOD, DEFAULT_TIMEOUT};
use super::fields;
use super::session::SessionCache;

/// Device data-model path of the Wi-Fi radio list.
pub const WIFI_RADIOS_PATH: &str = "Device/WiFi/Radios";

pub const WIFI_SIGNAL_FAMILY: &str = "sagemcom_wifi_radio_signal_dbm";
pub const WIFI_CHANNEL_FAMILY: &str = "sagemcom_wifi_radio_channel";

/// Collects per-radio signal strength and channel.
///
/// Routers without Wi-Fi, or firmwares that do not expose the radio list,
/// produce an empty successful poll rather than an error.
pub struct WifiCollector {
    name: String,
    period: Duration,
    timeout: Duration,
    session: SessionCache,
}

impl WifiCollector {
    /// Create a collector polling `client` with default period and timeout.
    pub fn new(name: impl Into<String>, client: Arc<dyn DeviceClient>) -> Self {
        Self {
            name: name.into(),
            period: DEFAULT_PERIOD,
            timeout: DEFAULT_TIMEOUT,
            session: SessionCache::new(client),
        }
    }

    /// Set the collection period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = clamp_period(period);
        self
    }

    /// Set the poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for WifiCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiCollector")
            .field("name", &self.name)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for WifiCollector {
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
            FamilyDesc::gauge(
                WIFI_SIGNAL_FAMILY,
                "Signal strength (dBm) for each Wi-Fi radio",
                &["radio_index"],
            ),
            FamilyDesc::gauge(
                WIFI_CHANNEL_FAMILY,
                "Current channel for each Wi-Fi radio",
                &["radio_index"],
            ),
        ]
    }

    async fn poll(&self) -> PollResult {
        let result = self
            .session
            .run(|client, session| async move {
                client.value_by_path(&session, WIFI_RADIOS_PATH).await
            })
            .await;

        match result {
            Ok(value) => wifi_observations(&value),
            Err(DeviceError::UnsupportedPath(path)) => {
                tracing::debug!(collector = %self.name, %path, "No Wi-Fi radios exposed by device");
                wifi_observations(&Value::Null)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Convert the raw radio list into observations keyed by radio position.
///
/// A radio missing a reading contributes no sample for that reading.
pub(crate) fn wifi_observations(value: &Value) -> PollResult {
    let radios = fields::entries(value).ok_or_else(|| {
        CollectorError::Protocol(format!("{WIFI_RADIOS_PATH}: expected a list"))
    })?;

    let mut obs = Observations::new();
    obs.declare(WIFI_SIGNAL_FAMILY).declare(WIFI_CHANNEL_FAMILY);
    for (index, radio) in radios.into_iter().enumerate() {
        let labels = label_set([("radio_index", index.to_string())]);
        if let Some(signal) = fields::number(radio, &["signal_strength", "SignalStrength"]) {
            obs.gauge(WIFI_SIGNAL_FAMILY, labels.clone(), signal);
        }
        if let Some(channel) = fields::number(radio, &["channel", "Channel"]) {
            obs.gauge(WIFI_CHANNEL_FAMILY, labels, channel);
        }
    }
    Ok(obs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::device::testing::FakeClient;
    use serde_json::json;

    #[test]
    fn test_wifi_radios_parsed() {
        let value = json!([
            {"channel": 6, "signal_strength": -41},
            {"Channel": "36", "SignalStrength": "-55"},
            {"channel": 100},
        ]);
        let obs = wifi_observations(&value).unwrap();
        assert_eq!(obs.samples(WIFI_CHANNEL_FAMILY).unwrap().len(), 3);
        let signal = obs.samples(WIFI_SIGNAL_FAMILY).unwrap();
        assert_eq!(signal.len(), 2);
        assert_eq!(signal[1].labels["radio_index"], "1");
        assert_eq!(signal[1].value, -55.0);
    }

    #[tokio::test]
    async fn test_unsupported_path_is_empty_success() {
        let client = Arc::new(FakeClient::new());
        let collector = WifiCollector::new("wifi", client);
        let obs = collector.poll().await.unwrap();
        assert_eq!(obs.samples(WIFI_SIGNAL_FAMILY), Some(&[][..]));
        assert_eq!(obs.samples(WIFI_CHANNEL_FAMILY), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_transport_error_is_failure() {
        let client = Arc::new(FakeClient::new());
        client.fail_with(Some(DeviceError::Transport("connection reset".into())));
        let collector = WifiCollector::new("wifi", client);
        let err = collector.poll().await.unwrap_err();
        assert!(matches!(err, CollectorError::Network(_)));
    }
}
