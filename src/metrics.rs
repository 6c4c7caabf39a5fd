//! Metrics Layer
//!
//! In-memory registry holding the latest observation per labeled series:
//!
//! - [`MetricsRegistry`]: Declared families with atomic whole-family replacement
//! - [`Snapshot`]: Read-only point-in-time view for exporters
//! - [`FamilyDesc`] / [`Sample`] / [`LabelSet`]: Data model shared with collectors

mod registry;
mod types;

pub use registry::{Family, Info, MetricsRegistry, Snapshot};
pub use types::{FamilyDesc, InfoRecord, LabelSet, MetricKind, Sample, label_set};
