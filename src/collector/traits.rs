//! Core collector traits and types.

use std::collections::BTreeMap;
use std::time::Duration;

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::metrics::{FamilyDesc, InfoRecord, LabelSet, Sample};

/// Minimum allowed polling period (1 second).
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Network I/O or transport error.
    #[error("network error: {0}")]
    Network(String),

    /// Timeout elapsed.
    #[error("timeout elapsed after {0:?}")]
    Timeout(Duration),

    /// Upstream rejected the credentials or the session expired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Upstream does not support the requested data.
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// Upstream answered with data that could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Internal error (e.g., poll task join failure).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure classes driving how the scheduler treats a failed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, refused connection, malformed answer. Retried on the next tick.
    TransientNetwork,
    /// Session rejected. Discarded and re-established on the next tick.
    Authentication,
    /// Feature absent upstream. Not a failure.
    UnsupportedFeature,
    /// Invalid configuration. Logged and retried on schedule.
    PermanentConfiguration,
}

impl CollectorError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::Protocol(_) | Self::Internal(_) => {
                ErrorKind::TransientNetwork
            }
            Self::Auth(_) => ErrorKind::Authentication,
            Self::Unsupported(_) => ErrorKind::UnsupportedFeature,
            Self::Config(_) => ErrorKind::PermanentConfiguration,
        }
    }
}

impl From<std::io::Error> for CollectorError {
    fn from(e: std::io::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl From<reqwest::Error> for CollectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::Config(e.to_string())
        } else if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Clamp a polling period to [`MIN_PERIOD`].
pub fn clamp_period(period: Duration) -> Duration {
    if period < MIN_PERIOD {
        tracing::warn!(min_period = ?MIN_PERIOD,
            "Period is less than minimum allowed. Using minimum period."
        );
        MIN_PERIOD
    } else {
        period
    }
}

/// Everything one successful poll produced.
///
/// Every family listed here is replaced wholesale in the registry, including
/// families that were declared but received no samples (they become empty).
/// Info records listed here replace the previous record of the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observations {
    families: BTreeMap<String, Vec<Sample>>,
    infos: BTreeMap<String, InfoRecord>,
}

impl Observations {
    /// Create an empty set that touches no family.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `family` as produced by this poll, even if no sample follows.
    pub fn declare(&mut self, family: &str) -> &mut Self {
        self.families.entry(family.to_owned()).or_default();
        self
    }

    /// Add a labeled sample to `family`.
    pub fn gauge(&mut self, family: &str, labels: LabelSet, value: f64) -> &mut Self {
        self.families
            .entry(family.to_owned())
            .or_default()
            .push(Sample::new(labels, value));
        self
    }

    /// Set the single value of an unlabeled `family`.
    pub fn scalar(&mut self, family: &str, value: f64) -> &mut Self {
        self.gauge(family, LabelSet::new(), value)
    }

    /// Replace the info record `name`.
    pub fn info(&mut self, name: &str, record: InfoRecord) -> &mut Self {
        self.infos.insert(name.to_owned(), record);
        self
    }

    /// Samples recorded for `family`, if it is part of this set.
    pub fn samples(&self, family: &str) -> Option<&[Sample]> {
        self.families.get(family).map(Vec::as_slice)
    }

    /// Info record recorded under `name`.
    pub fn info_record(&self, name: &str) -> Option<&InfoRecord> {
        self.infos.get(name)
    }

    /// Names of the families this set replaces.
    pub fn family_names(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }

    /// Whether this set touches neither families nor info records.
    pub fn is_empty(&self) -> bool {
        self.families.is_empty() && self.infos.is_empty()
    }

    /// Split into per-family samples and info records.
    pub fn into_parts(self) -> (BTreeMap<String, Vec<Sample>>, BTreeMap<String, InfoRecord>) {
        (self.families, self.infos)
    }
}

/// Outcome of one poll, consumed exactly once by the scheduler.
pub type PollResult = Result<Observations, CollectorError>;

/// Core collector trait for implementing data collectors.
///
/// Collectors are polled by the [`Scheduler`](crate::collector::Scheduler) on
/// their own period. They own no state beyond what is needed to reuse a
/// session with their upstream, and never touch the registry directly.
///
/// # Error Handling Philosophy
///
/// - **Observation failures** that are themselves meaningful data (a latency
///   probe that times out) are reported as successful polls carrying a
///   sentinel value.
/// - **Collector errors** (login rejected, lookup failed, malformed answer)
///   are returned as `Err`. The scheduler records them and leaves the
///   previously exported families untouched.
#[async_trait::async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Unique identifier for this collector instance.
    fn name(&self) -> &str;

    /// Interval between the end of one poll and the start of the next.
    fn period(&self) -> Duration;

    /// Upper bound for a single poll. The poll is aborted when exceeded.
    fn timeout(&self) -> Duration;

    /// Families and info records this collector produces.
    fn families(&self) -> Vec<FamilyDesc>;

    /// Perform one collection cycle.
    async fn poll(&self) -> PollResult;
}
