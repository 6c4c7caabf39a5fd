//! Router identity, counters and host table collector.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::{Collector, Observations, PollResult, clamp_period};
use crate::metrics::{FamilyDesc, label_set};

use super::client::{DeviceClient, DeviceInfo, Host};
use super::session::SessionCache;

/// Default collection period (5 minutes).
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(300);

/// Default poll timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const UPTIME_FAMILY: &str = "sagemcom_device_uptime_seconds";
pub const REBOOT_COUNT_FAMILY: &str = "sagemcom_device_reboot_count";
pub const CONNECTED_DEVICES_FAMILY: &str = "sagemcom_connected_devices";
pub const MODEM_INFO: &str = "sagemcom_modem_info";
pub const DEVICE_STATUS_FAMILY: &str = "sagemcom_device_status";
pub const DEVICE_LEASE_FAMILY: &str = "sagemcom_device_lease";
pub const DEVICE_INFO_FAMILY: &str = "sagemcom_connected_device_info";

/// Label value used for descriptive host fields the router left empty.
const UNKNOWN: &str = "unknown";

/// Collects router identity, uptime, reboot count and the host table.
///
/// Host families are replaced as a whole on each successful poll, so hosts
/// that left the table disappear from the export. A failed login or fetch
/// leaves every family of this collector at its previous contents.
pub struct DeviceCollector {
    name: String,
    period: Duration,
    timeout: Duration,
    session: SessionCache,
}

impl DeviceCollector {
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

impl std::fmt::Debug for DeviceCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCollector")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Collector for DeviceCollector {
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
            FamilyDesc::gauge(UPTIME_FAMILY, "Uptime of the router in seconds", &[]),
            FamilyDesc::gauge(
                REBOOT_COUNT_FAMILY,
                "Number of times the router has rebooted",
                &[],
            ),
            FamilyDesc::gauge(
                CONNECTED_DEVICES_FAMILY,
                "Number of active devices on the network",
                &[],
            ),
            FamilyDesc::info(MODEM_INFO, "Static information about the modem"),
            FamilyDesc::gauge(
                DEVICE_STATUS_FAMILY,
                "Device active status",
                &["mac_address", "name", "hostname", "interface"],
            ),
            FamilyDesc::gauge(
                DEVICE_LEASE_FAMILY,
                "Device DHCP lease details",
                &["mac_address", "metric"],
            ),
            FamilyDesc::gauge(
                DEVICE_INFO_FAMILY,
                "Detailed information about each connected device",
                &[
                    "device_id",
                    "device_name",
                    "ip",
                    "hostname",
                    "status",
                    "interface_type",
                    "lease_time_remaining",
                    "layer1_interface",
                    "layer3_interface",
                    "blacklist_status",
                    "blacklisted_schedule",
                ],
            ),
        ]
    }

    async fn poll(&self) -> PollResult {
        let (info, hosts) = self
            .session
            .run(|client, session| async move {
                let info = client.device_info(&session).await?;
                let hosts = client.hosts(&session).await?;
                Ok((info, hosts))
            })
            .await?;

        tracing::debug!(
            collector = %self.name,
            model = %info.model_name,
            uptime_secs = info.up_time,
            hosts = hosts.len(),
            "Device data retrieved"
        );
        Ok(device_observations(&info, &hosts))
    }
}

fn or_unknown(value: Option<&String>) -> &str {
    value.map(String::as_str).filter(|v| !v.is_empty()).unwrap_or(UNKNOWN)
}

/// Host entries keyed by identifier, in first-seen order.
///
/// A repeated identifier keeps the entry listed last. Entries without an
/// identifier are dropped.
fn unique_hosts(hosts: &[Host]) -> Vec<&Host> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<&Host> = Vec::with_capacity(hosts.len());
    for host in hosts {
        let id = host.id.trim();
        if id.is_empty() {
            tracing::warn!(ip = ?host.ip_address, "Host without identifier skipped");
            continue;
        }
        match position.get(id) {
            Some(&idx) => {
                tracing::debug!(host = id, "Duplicate host entry, keeping the latest");
                unique[idx] = host;
            }
            None => {
                position.insert(id, unique.len());
                unique.push(host);
            }
        }
    }
    unique
}

/// Convert router identity and host table into observations.
pub(crate) fn device_observations(info: &DeviceInfo, hosts: &[Host]) -> Observations {
    let mut obs = Observations::new();
    obs.scalar(UPTIME_FAMILY, info.up_time as f64)
        .scalar(REBOOT_COUNT_FAMILY, info.reboot_count as f64)
        .info(
            MODEM_INFO,
            label_set([
                ("device_id", info.mac_address.as_str()),
                ("build_date", info.build_date.as_str()),
                ("model_name", info.model_name.as_str()),
                ("serial_number", info.serial_number.as_str()),
                ("software_version", info.software_version.as_str()),
            ]),
        )
        .declare(DEVICE_STATUS_FAMILY)
        .declare(DEVICE_LEASE_FAMILY)
        .declare(DEVICE_INFO_FAMILY);

    let mut active = 0usize;
    for host in unique_hosts(hosts) {
        if host.active {
            active += 1;
        }
        let state = if host.active { 1.0 } else { 0.0 };
        let name = host.name.as_ref().or(host.alias.as_ref());

        obs.gauge(
            DEVICE_STATUS_FAMILY,
            label_set([
                ("mac_address", host.id.as_str()),
                ("name", or_unknown(name)),
                ("hostname", or_unknown(host.host_name.as_ref())),
                ("interface", or_unknown(host.interface_type.as_ref())),
            ]),
            state,
        );

        for (metric, value) in [
            ("lease_start", host.lease_start),
            ("lease_duration", host.lease_duration),
            ("lease_remaining", host.lease_time_remaining),
        ] {
            obs.gauge(
                DEVICE_LEASE_FAMILY,
                label_set([("mac_address", host.id.as_str()), ("metric", metric)]),
                value as f64,
            );
        }

        let remaining = host.lease_time_remaining.to_string();
        let schedule = format!("[{}]", host.blacklisted_schedule.join(", "));
        obs.gauge(
            DEVICE_INFO_FAMILY,
            label_set([
                ("device_id", or_unknown(host.phys_address.as_ref())),
                ("device_name", or_unknown(host.alias.as_ref())),
                ("ip", or_unknown(host.ip_address.as_ref())),
                ("hostname", or_unknown(host.host_name.as_ref())),
                ("status", if host.active { "Active" } else { "Inactive" }),
                ("interface_type", or_unknown(host.interface_type.as_ref())),
                ("lease_time_remaining", remaining.as_str()),
                ("layer1_interface", or_unknown(host.layer1_interface.as_ref())),
                ("layer3_interface", or_unknown(host.layer3_interface.as_ref())),
                ("blacklist_status", if host.blacklisted { "True" } else { "False" }),
                ("blacklisted_schedule", schedule.as_str()),
            ]),
            state,
        );
    }
    obs.scalar(CONNECTED_DEVICES_FAMILY, active as f64);
    obs
}
