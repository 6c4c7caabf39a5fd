//! Builds the configured collector set.

use std::sync::Arc;

use crate::config::AppConfig;

use super::device::{
    DeviceClient, DeviceCollector, DeviceConfig, PortMappingCollector, WifiCollector,
};
use super::ping::LatencyCollector;
use super::public_ip::PublicIpCollector;
use super::speedtest::SpeedtestCollector;
use super::{CollectorError, Scheduler};

/// Register every collector enabled in `config` with `scheduler`.
///
/// Router collectors need a `device` section and a client speaking the
/// router's protocol. `connect` receives the device section (host,
/// credentials, TLS verification) and returns that client, or `None` when
/// no protocol implementation is available; the router collectors are then
/// skipped. It is not called without a device section. Returns the number of
/// registered collectors.
///
/// # Errors
/// Returns `CollectorError::Config` if a network provider cannot be built or
/// a collector name collides.
pub async fn register_collectors<F>(
    scheduler: &mut Scheduler,
    config: &AppConfig,
    connect: F,
) -> Result<usize, CollectorError>
where
    F: FnOnce(&DeviceConfig) -> Option<Arc<dyn DeviceClient>>,
{
    let before = scheduler.len();

    let client = config.device.as_ref().and_then(connect);
    match (&config.device, client) {
        (Some(device), Some(client)) => {
            let collector = DeviceCollector::new("device", Arc::clone(&client))
                .with_period(config.collection_interval)
                .with_timeout(config.poll_timeout);
            scheduler.register(Arc::new(collector)).await?;

            if device.port_mappings_enabled {
                let collector = PortMappingCollector::new("port_mappings", Arc::clone(&client))
                    .with_period(config.collection_interval)
                    .with_timeout(config.poll_timeout);
                scheduler.register(Arc::new(collector)).await?;
            }

            if device.wifi_enabled {
                let collector = WifiCollector::new("wifi", client)
                    .with_period(config.collection_interval)
                    .with_timeout(config.poll_timeout);
                scheduler.register(Arc::new(collector)).await?;
            }
        }
        (Some(device), None) => {
            tracing::warn!(
                host = %device.host,
                "No router client available, router collectors disabled"
            );
        }
        (None, _) => {
            tracing::info!("No router configured, router collectors disabled");
        }
    }

    if config.public_ip.enabled {
        let collector =
            PublicIpCollector::new("public_ip", &config.public_ip, config.collection_interval)?;
        scheduler.register(Arc::new(collector)).await?;
    }

    if config.latency.enabled {
        let collector =
            LatencyCollector::new("latency", &config.latency, config.collection_interval);
        scheduler.register(Arc::new(collector)).await?;
    }

    if config.speedtest.enabled {
        let collector =
            SpeedtestCollector::new("speedtest", &config.speedtest, config.speedtest_interval)?;
        scheduler.register(Arc::new(collector)).await?;
    }

    Ok(scheduler.len() - before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::device::testing::FakeClient;
    use crate::metrics::MetricsRegistry;

    fn internet_probes_disabled() -> AppConfig {
        let mut config = AppConfig::default();
        config.public_ip.enabled = false;
        config.latency.enabled = false;
        config.speedtest.enabled = false;
        config
    }

    #[tokio::test]
    async fn test_router_collectors_need_client() {
        let mut config = internet_probes_disabled();
        config.device = Some(DeviceConfig::new("192.168.1.1"));

        let mut scheduler = Scheduler::new(MetricsRegistry::new());
        let count = register_collectors(&mut scheduler, &config, |_| None)
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_router_collectors_follow_feature_flags() {
        let mut config = internet_probes_disabled();
        let mut device = DeviceConfig::new("192.168.1.1")
            .with_credentials("root", "s3cret")
            .with_verify_ssl(true);
        device.wifi_enabled = false;
        config.device = Some(device);

        let registry = MetricsRegistry::new();
        let mut scheduler = Scheduler::new(registry.clone());
        let mut seen = None;
        let count = register_collectors(&mut scheduler, &config, |device| {
            seen = Some(device.clone());
            let client: Arc<dyn DeviceClient> = Arc::new(FakeClient::new());
            Some(client)
        })
        .await
        .unwrap();
        assert_eq!(count, 2);

        let seen = seen.unwrap();
        assert_eq!(seen.host, "192.168.1.1");
        assert_eq!(seen.username, "root");
        assert_eq!(seen.password, "s3cret");
        assert!(seen.verify_ssl);

        let names: Vec<_> = scheduler
            .status()
            .collectors()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["device", "port_mappings"]);

        let snap = registry.snapshot().await;
        assert!(snap.family("sagemcom_port_mappings").is_some());
        assert!(snap.family("sagemcom_wifi_radio_channel").is_none());
    }

    #[tokio::test]
    async fn test_internet_probes_use_own_intervals() {
        let mut config = AppConfig::default();
        config.public_ip.enabled = false;

        let mut scheduler = Scheduler::new(MetricsRegistry::new());
        let count = register_collectors(&mut scheduler, &config, |_| {
            panic!("no device section, no client requested")
        })
        .await
        .unwrap();
        assert_eq!(count, 2);

        let status = scheduler.status();
        let latency = status.get("latency").await.unwrap();
        let speedtest = status.get("speedtest").await.unwrap();
        assert_eq!(latency.period, config.collection_interval);
        assert_eq!(speedtest.period, config.speedtest_interval);
    }
}
