//! Core data types for the metrics registry.
//!
//! - [`LabelSet`]: Order-insensitive label key/value mapping identifying a series
//! - [`Sample`]: One labeled numeric value destined for a family
//! - [`FamilyDesc`]: Declared name, help text, kind and label schema of a family
//! - [`InfoRecord`]: Static key/value record without labels

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Label key/value pairs identifying a series within a family.
///
/// Backed by a sorted map, so two label sets compare equal whenever their
/// pairs match, regardless of insertion order.
pub type LabelSet = BTreeMap<String, String>;

/// Static information record (`key -> value`), single instance per name.
pub type InfoRecord = BTreeMap<String, String>;

/// Build a [`LabelSet`] from key/value pairs.
///
/// # Example
///
/// ```
/// use modemwatch::metrics::label_set;
///
/// let a = label_set([("radio_index", "0"), ("band", "5g")]);
/// let b = label_set([("band", "5g"), ("radio_index", "0")]);
/// assert_eq!(a, b);
/// ```
pub fn label_set<I, K, V>(pairs: I) -> LabelSet
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Kind of a declared metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Labeled numeric series, fully replaced on every successful poll.
    Gauge,
    /// Unlabeled static key/value record.
    Info,
}

/// Declaration of a metric family: its name, help text and fixed label schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyDesc {
    /// Family name (e.g. `sagemcom_device_status`).
    pub name: String,
    /// Human-readable description.
    pub help: String,
    /// Gauge or info record.
    pub kind: MetricKind,
    /// Label keys every series of this family carries, sorted.
    pub label_keys: Vec<String>,
}

impl FamilyDesc {
    /// Declare a gauge family with the given label keys.
    pub fn gauge(name: impl Into<String>, help: impl Into<String>, label_keys: &[&str]) -> Self {
        let mut label_keys: Vec<String> = label_keys.iter().map(|k| k.to_string()).collect();
        label_keys.sort();
        label_keys.dedup();
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Gauge,
            label_keys,
        }
    }

    /// Declare an info record.
    pub fn info(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: MetricKind::Info,
            label_keys: Vec::new(),
        }
    }

    /// Whether `labels` carries exactly the declared label keys.
    pub fn accepts(&self, labels: &LabelSet) -> bool {
        labels.len() == self.label_keys.len()
            && labels.keys().zip(&self.label_keys).all(|(a, b)| a == b)
    }
}

/// One labeled value produced by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Labels identifying the series.
    pub labels: LabelSet,
    /// Latest value (may be NaN for "no data" sentinels).
    pub value: f64,
}

impl Sample {
    /// Create a labeled sample.
    pub fn new(labels: LabelSet, value: f64) -> Self {
        Self { labels, value }
    }

    /// Create a sample for an unlabeled family.
    pub fn scalar(value: f64) -> Self {
        Self {
            labels: LabelSet::new(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_order_insensitive() {
        let a = label_set([("mac_address", "aa"), ("name", "laptop")]);
        let b = label_set([("name", "laptop"), ("mac_address", "aa")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_family_desc_sorts_label_keys() {
        let desc = FamilyDesc::gauge("f", "help", &["protocol", "external_port", "status"]);
        assert_eq!(desc.label_keys, vec!["external_port", "protocol", "status"]);
        assert_eq!(desc.kind, MetricKind::Gauge);
    }

    #[test]
    fn test_family_desc_accepts() {
        let desc = FamilyDesc::gauge("wifi", "help", &["radio_index"]);
        assert!(desc.accepts(&label_set([("radio_index", "0")])));
        assert!(!desc.accepts(&label_set([("radio", "0")])));
        assert!(!desc.accepts(&label_set([("radio_index", "0"), ("band", "5g")])));
        assert!(!desc.accepts(&LabelSet::new()));

        let scalar = FamilyDesc::gauge("uptime", "help", &[]);
        assert!(scalar.accepts(&LabelSet::new()));
    }

    #[test]
    fn test_metric_kind_strum() {
        assert_eq!(MetricKind::Gauge.to_string(), "gauge");
        let kind: MetricKind = serde_yaml::from_str("info").unwrap();
        assert_eq!(kind, MetricKind::Info);
        assert_eq!(MetricKind::Info.as_ref(), "info");
    }
}
