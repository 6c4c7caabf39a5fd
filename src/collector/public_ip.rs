//! Public IP collector.
//!
//! - [`PublicIpCollector`]: exports the network's public address as an info record

mod collector;

pub use collector::{HttpIpLookup, IpLookup, PUBLIC_IP_INFO, PublicIpCollector, PublicIpConfig};
