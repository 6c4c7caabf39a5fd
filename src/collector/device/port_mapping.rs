//! NAT port-mapping table collector.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::collector::{Collector, CollectorError, Observations, PollResult, clamp_period};
use crate::metrics::{FamilyDesc, label_set};

use super::client::DeviceClient;
use super::collector::{DEFAULT_PERIOD, DEFAULT_TIMEOUT};
use super::fields;
use super::session::SessionCache;

/// Device data-model path of the NAT port-mapping table.
pub const PORT_MAPPINGS_PATH: &str = "Device/NAT/PortMappings";

pub const PORT_MAPPINGS_FAMILY: &str = "sagemcom_port_mappings";

/// Collects the router's NAT port mappings.
///
/// The family is keyed by (external port, internal port, protocol) and is
/// replaced wholesale, so deleted mappings disappear from the export.
pub struct PortMappingCollector {
    name: String,
    period: Duration,
    timeout: Duration,
    session: SessionCache,
}

impl PortMappingCollector {
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

impl std::fmt::Debug for PortMappingCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortMappingCollector")
            .field("name", &self.name)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for PortMappingCollector {
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
        vec![FamilyDesc::gauge(
            PORT_MAPPINGS_FAMILY,
            "Details of NAT port mappings",
            &["external_port", "internal_port", "protocol", "status"],
        )]
    }

    async fn poll(&self) -> PollResult {
        let value = self
            .session
            .run(|client, session| async move {
                client.value_by_path(&session, PORT_MAPPINGS_PATH).await
            })
            .await?;
        port_mapping_observations(&value)
    }
}

/// Convert the raw port-mapping table into observations.
///
/// Entries missing any of the identifying fields are skipped rather than
/// defaulted, since a placeholder would merge unrelated mappings.
pub(crate) fn port_mapping_observations(value: &Value) -> PollResult {
    let entries = fields::entries(value).ok_or_else(|| {
        CollectorError::Protocol(format!("{PORT_MAPPINGS_PATH}: expected a list"))
    })?;

    let mut obs = Observations::new();
    obs.declare(PORT_MAPPINGS_FAMILY);
    for entry in entries {
        let external = fields::text(entry, &["external_port", "ExternalPort"]);
        let internal = fields::text(entry, &["internal_port", "InternalPort"]);
        let protocol = fields::text(entry, &["protocol", "Protocol"]);
        let (Some(external), Some(internal), Some(protocol)) = (external, internal, protocol)
        else {
            tracing::warn!(entry = ?entry, "Incomplete port mapping skipped");
            continue;
        };
        let enabled = fields::flag(entry, &["enabled", "enable", "Enable"]).unwrap_or(false);

        obs.gauge(
            PORT_MAPPINGS_FAMILY,
            label_set([
                ("external_port", external),
                ("internal_port", internal),
                ("protocol", protocol),
                ("status", (if enabled { "active" } else { "inactive" }).to_string()),
            ]),
            1.0,
        );
    }
    Ok(obs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::device::testing::FakeClient;
    use serde_json::json;

    #[test]
    fn test_port_mappings_parsed() {
        let value = json!([
            {"external_port": 8443, "internal_port": 443, "protocol": "TCP", "enabled": true},
            {"ExternalPort": "51820", "InternalPort": "51820", "Protocol": "UDP", "Enable": false},
        ]);
        let obs = port_mapping_observations(&value).unwrap();
        let samples = obs.samples(PORT_MAPPINGS_FAMILY).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].labels["external_port"], "8443");
        assert_eq!(samples[0].labels["status"], "active");
        assert_eq!(samples[1].labels["protocol"], "UDP");
        assert_eq!(samples[1].labels["status"], "inactive");
    }

    #[test]
    fn test_incomplete_mapping_skipped() {
        let value = json!([
            {"internal_port": 22, "protocol": "TCP"},
            {"external_port": 2222, "internal_port": 22, "protocol": "TCP"},
        ]);
        let obs = port_mapping_observations(&value).unwrap();
        assert_eq!(obs.samples(PORT_MAPPINGS_FAMILY).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_table_clears_family() {
        let obs = port_mapping_observations(&Value::Null).unwrap();
        assert_eq!(obs.samples(PORT_MAPPINGS_FAMILY), Some(&[][..]));
    }

    #[test]
    fn test_non_list_is_protocol_error() {
        let err = port_mapping_observations(&json!({"oops": 1})).unwrap_err();
        assert!(matches!(err, CollectorError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_poll_reads_device_path() {
        let client = Arc::new(FakeClient::new());
        client.set_value(
            PORT_MAPPINGS_PATH,
            json!([{"external_port": 80, "internal_port": 8080, "protocol": "TCP"}]),
        );
        let collector = PortMappingCollector::new("port-mappings", client);
        let obs = collector.poll().await.unwrap();
        assert_eq!(obs.samples(PORT_MAPPINGS_FAMILY).unwrap().len(), 1);
    }
}
