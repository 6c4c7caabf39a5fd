//! In-memory registry of labeled metric families and static info records.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::types::{FamilyDesc, InfoRecord, LabelSet, MetricKind, Sample};

/// Current contents of one gauge family.
#[derive(Debug, Clone)]
pub struct Family {
    desc: Arc<FamilyDesc>,
    series: BTreeMap<LabelSet, f64>,
}

impl Family {
    fn empty(desc: Arc<FamilyDesc>) -> Self {
        Self {
            desc,
            series: BTreeMap::new(),
        }
    }

    /// Family declaration.
    pub fn desc(&self) -> &FamilyDesc {
        &self.desc
    }

    /// Value of the series identified by `labels`, if present.
    pub fn get(&self, labels: &LabelSet) -> Option<f64> {
        self.series.get(labels).copied()
    }

    /// Iterate over `(labels, value)` pairs in label order.
    pub fn series(&self) -> impl Iterator<Item = (&LabelSet, f64)> {
        self.series.iter().map(|(labels, value)| (labels, *value))
    }

    /// Number of series currently held.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the family currently holds no series.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Declared info record and its latest value (absent until first set).
#[derive(Debug, Clone)]
pub struct Info {
    desc: Arc<FamilyDesc>,
    record: Option<Arc<InfoRecord>>,
}

impl Info {
    /// Record declaration.
    pub fn desc(&self) -> &FamilyDesc {
        &self.desc
    }

    /// Latest record, if one was ever set.
    pub fn record(&self) -> Option<&InfoRecord> {
        self.record.as_deref()
    }
}

/// Point-in-time, read-only view of the registry.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    families: BTreeMap<String, Arc<Family>>,
    infos: BTreeMap<String, Info>,
}

impl Snapshot {
    /// Gauge family by name.
    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.get(name).map(Arc::as_ref)
    }

    /// Latest info record by name.
    pub fn info(&self, name: &str) -> Option<&InfoRecord> {
        self.infos.get(name).and_then(Info::record)
    }

    /// All gauge families in name order.
    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.families.values().map(Arc::as_ref)
    }

    /// All declared info records in name order.
    pub fn infos(&self) -> impl Iterator<Item = &Info> {
        self.infos.values()
    }

    /// Total number of series across all gauge families.
    pub fn series_count(&self) -> usize {
        self.families.values().map(|f| f.len()).sum()
    }
}

#[derive(Default)]
struct Inner {
    families: BTreeMap<String, Arc<Family>>,
    infos: BTreeMap<String, Info>,
}

/// Shared metrics registry.
///
/// Families are declared once at startup with a fixed label schema. Each
/// family is replaced wholesale: new contents are built outside the lock and
/// swapped in under a short write section, so readers see either the old or
/// the new family, never a partially cleared one.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (families, infos) = self
            .inner
            .try_read()
            .map(|i| (i.families.len(), i.infos.len()))
            .unwrap_or((0, 0));
        f.debug_struct("MetricsRegistry")
            .field("families", &families)
            .field("infos", &infos)
            .finish_non_exhaustive()
    }
}

impl MetricsRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a family or info record.
    ///
    /// Re-declaring an identical family is a no-op. A conflicting declaration
    /// keeps the first one and returns `false`.
    pub async fn register(&self, desc: FamilyDesc) -> bool {
        let mut inner = self.inner.write().await;
        let existing = match desc.kind {
            MetricKind::Gauge => inner.families.get(&desc.name).map(|f| f.desc.clone()),
            MetricKind::Info => inner.infos.get(&desc.name).map(|i| i.desc.clone()),
        };
        if let Some(existing) = existing {
            if *existing != desc {
                tracing::warn!(
                    family = %desc.name,
                    "Conflicting family declaration ignored"
                );
                return false;
            }
            return true;
        }

        let name = desc.name.clone();
        let desc = Arc::new(desc);
        match desc.kind {
            MetricKind::Gauge => {
                inner
                    .families
                    .insert(name, Arc::new(Family::empty(desc)));
            }
            MetricKind::Info => {
                inner.infos.insert(name, Info { desc, record: None });
            }
        }
        true
    }

    /// Discard every series of `family` and install `samples` in their place.
    ///
    /// An empty input leaves the family empty. Duplicate label sets are
    /// resolved last-write-wins. Samples whose label keys do not match the
    /// declared schema are dropped. Returns the number of installed series.
    pub async fn replace_family<I>(&self, family: &str, samples: I) -> usize
    where
        I: IntoIterator<Item = Sample>,
    {
        let desc = {
            let inner = self.inner.read().await;
            match inner.families.get(family) {
                Some(f) => Arc::clone(&f.desc),
                None => {
                    tracing::warn!(family, "Replace on undeclared family ignored");
                    return 0;
                }
            }
        };

        let mut series = BTreeMap::new();
        for sample in samples {
            if !desc.accepts(&sample.labels) {
                tracing::warn!(
                    family,
                    labels = ?sample.labels,
                    expected = ?desc.label_keys,
                    "Sample does not match family label schema, dropped"
                );
                continue;
            }
            series.insert(sample.labels, sample.value);
        }
        let installed = series.len();
        let next = Arc::new(Family { desc, series });

        self.inner
            .write()
            .await
            .families
            .insert(family.to_owned(), next);
        installed
    }

    /// Replace the single static info record `name`.
    pub async fn set_info(&self, name: &str, record: InfoRecord) {
        let mut inner = self.inner.write().await;
        match inner.infos.get_mut(name) {
            Some(info) => info.record = Some(Arc::new(record)),
            None => tracing::warn!(info = name, "Set on undeclared info record ignored"),
        }
    }

    /// Point-in-time copy of all families and info records.
    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().await;
        Snapshot {
            families: inner.families.clone(),
            infos: inner.infos.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::label_set;

    fn status_desc() -> FamilyDesc {
        FamilyDesc::gauge("device_status", "Device active status", &["mac_address"])
    }

    fn host(mac: &str, value: f64) -> Sample {
        Sample::new(label_set([("mac_address", mac)]), value)
    }

    #[tokio::test]
    async fn test_replace_removes_vanished_series() {
        let registry = MetricsRegistry::new();
        registry.register(status_desc()).await;

        registry
            .replace_family("device_status", vec![host("A", 1.0), host("B", 0.0)])
            .await;
        let snap = registry.snapshot().await;
        let family = snap.family("device_status").unwrap();
        assert_eq!(family.len(), 2);
        assert_eq!(family.get(&label_set([("mac_address", "B")])), Some(0.0));

        registry
            .replace_family("device_status", vec![host("A", 1.0)])
            .await;
        let snap = registry.snapshot().await;
        let family = snap.family("device_status").unwrap();
        assert_eq!(family.len(), 1);
        assert_eq!(family.get(&label_set([("mac_address", "B")])), None);
    }

    #[tokio::test]
    async fn test_replace_with_empty_clears_family() {
        let registry = MetricsRegistry::new();
        registry.register(status_desc()).await;
        registry
            .replace_family("device_status", vec![host("A", 1.0)])
            .await;
        registry.replace_family("device_status", Vec::new()).await;

        let snap = registry.snapshot().await;
        assert!(snap.family("device_status").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_labels_last_write_wins() {
        let registry = MetricsRegistry::new();
        registry.register(status_desc()).await;
        let installed = registry
            .replace_family("device_status", vec![host("A", 1.0), host("A", 0.0)])
            .await;
        assert_eq!(installed, 1);

        let snap = registry.snapshot().await;
        let family = snap.family("device_status").unwrap();
        assert_eq!(family.get(&label_set([("mac_address", "A")])), Some(0.0));
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let registry = MetricsRegistry::new();
        registry.register(status_desc()).await;
        let samples = vec![host("A", 1.0), host("B", 0.0)];

        registry
            .replace_family("device_status", samples.clone())
            .await;
        let first: Vec<_> = registry
            .snapshot()
            .await
            .family("device_status")
            .unwrap()
            .series()
            .map(|(l, v)| (l.clone(), v))
            .collect();

        registry.replace_family("device_status", samples).await;
        let second: Vec<_> = registry
            .snapshot()
            .await
            .family("device_status")
            .unwrap()
            .series()
            .map(|(l, v)| (l.clone(), v))
            .collect();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_schema_mismatch_dropped() {
        let registry = MetricsRegistry::new();
        registry.register(status_desc()).await;
        let installed = registry
            .replace_family(
                "device_status",
                vec![
                    host("A", 1.0),
                    Sample::new(label_set([("mac", "B")]), 1.0),
                ],
            )
            .await;
        assert_eq!(installed, 1);
    }

    #[tokio::test]
    async fn test_undeclared_family_ignored() {
        let registry = MetricsRegistry::new();
        let installed = registry
            .replace_family("nope", vec![Sample::scalar(1.0)])
            .await;
        assert_eq!(installed, 0);
        assert!(registry.snapshot().await.family("nope").is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_point_in_time() {
        let registry = MetricsRegistry::new();
        registry.register(status_desc()).await;
        registry
            .replace_family("device_status", vec![host("A", 1.0)])
            .await;

        let before = registry.snapshot().await;
        registry.replace_family("device_status", Vec::new()).await;

        assert_eq!(before.family("device_status").unwrap().len(), 1);
        assert_eq!(before.series_count(), 1);
    }

    #[tokio::test]
    async fn test_info_records() {
        let registry = MetricsRegistry::new();
        registry
            .register(FamilyDesc::info("public_ip_info", "Public IP"))
            .await;

        let snap = registry.snapshot().await;
        assert!(snap.info("public_ip_info").is_none());
        assert_eq!(snap.infos().count(), 1);

        registry
            .set_info("public_ip_info", label_set([("public_ip", "203.0.113.7")]))
            .await;
        registry
            .set_info("public_ip_info", label_set([("public_ip", "203.0.113.8")]))
            .await;

        let snap = registry.snapshot().await;
        let record = snap.info("public_ip_info").unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record["public_ip"], "203.0.113.8");
    }

    #[tokio::test]
    async fn test_conflicting_declaration_keeps_first() {
        let registry = MetricsRegistry::new();
        assert!(registry.register(status_desc()).await);
        assert!(registry.register(status_desc()).await);
        assert!(
            !registry
                .register(FamilyDesc::gauge("device_status", "other", &["id"]))
                .await
        );

        let snap = registry.snapshot().await;
        assert_eq!(
            snap.family("device_status").unwrap().desc().label_keys,
            vec!["mac_address"]
        );
    }
}
