//! Scheduler driving every registered collector on its own period.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display};
use tokio::sync::RwLock;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, sleep_until, timeout};

use crate::collector::{Collector, CollectorError, ErrorKind, Observations, PollResult};
use crate::metrics::MetricsRegistry;

/// Wake-up horizon used while every collector is mid-poll.
const IDLE_WAKE: Duration = Duration::from_secs(3600);

/// Poll lifecycle of a single collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PollPhase {
    /// Waiting for `next_due`.
    Idle,
    /// Due and about to be dispatched.
    Due,
    /// Poll in flight.
    Running,
}

/// Scheduling and outcome bookkeeping for one collector.
#[derive(Debug, Clone)]
pub struct CollectorState {
    /// Collector name.
    pub name: String,
    /// Delay between poll completion and the next poll.
    pub period: Duration,
    /// Per-poll timeout.
    pub timeout: Duration,
    /// Current lifecycle phase.
    pub phase: PollPhase,
    /// When the next poll becomes due.
    pub next_due: Instant,
    /// Wall-clock time of the last successful poll.
    pub last_success: Option<DateTime<Utc>>,
    /// Message of the most recent failure, cleared on success.
    pub last_error: Option<String>,
    /// Duration of the most recent poll.
    pub last_duration: Option<Duration>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Completed polls, successful or not.
    pub polls: u64,
}

impl CollectorState {
    fn new(collector: &dyn Collector, now: Instant) -> Self {
        Self {
            name: collector.name().to_owned(),
            period: collector.period(),
            timeout: collector.timeout(),
            phase: PollPhase::Due,
            next_due: now,
            last_success: None,
            last_error: None,
            last_duration: None,
            consecutive_failures: 0,
            polls: 0,
        }
    }
}

/// Read-only access to collector states while the scheduler runs.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    states: Arc<RwLock<Vec<CollectorState>>>,
}

impl SchedulerStatus {
    /// Copy of every collector's state.
    pub async fn collectors(&self) -> Vec<CollectorState> {
        self.states.read().await.clone()
    }

    /// Copy of a single collector's state.
    pub async fn get(&self, name: &str) -> Option<CollectorState> {
        self.states
            .read()
            .await
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }
}

/// Dispatches each due collector as its own task and applies the results.
///
/// Every collector is due immediately at startup. After a poll completes,
/// successfully or not, the next poll is due one period after completion,
/// so an overrunning poll spaces out the following ones instead of queuing
/// a burst. A collector is never polled concurrently with itself; different
/// collectors never wait on each other.
pub struct Scheduler {
    registry: MetricsRegistry,
    collectors: Vec<Arc<dyn Collector>>,
    states: Arc<RwLock<Vec<CollectorState>>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("collector_count", &self.collectors.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler feeding `registry`.
    pub fn new(registry: MetricsRegistry) -> Self {
        Self {
            registry,
            collectors: Vec::new(),
            states: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a collector and declare its families in the registry.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` if a collector with the same name is
    /// already registered.
    pub async fn register(&mut self, collector: Arc<dyn Collector>) -> Result<(), CollectorError> {
        let name = collector.name().to_owned();
        let mut states = self.states.write().await;
        if states.iter().any(|s| s.name == name) {
            return Err(CollectorError::Config(format!(
                "duplicate collector name: '{}'",
                name
            )));
        }

        for desc in collector.families() {
            if !self.registry.register(desc).await {
                tracing::warn!(collector = %name, "Collector shares a conflicting family declaration");
            }
        }

        states.push(CollectorState::new(collector.as_ref(), Instant::now()));
        tracing::info!(
            collector = %name,
            period_secs = collector.period().as_secs(),
            timeout_secs = collector.timeout().as_secs(),
            "Collector registered"
        );
        self.collectors.push(collector);
        Ok(())
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    /// Whether no collector is registered.
    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Handle for inspecting collector states.
    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            states: Arc::clone(&self.states),
        }
    }

    /// Run until `shutdown` resolves. In-flight polls are aborted on exit.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Self {
            registry,
            collectors,
            states,
        } = self;
        tokio::pin!(shutdown);

        if collectors.is_empty() {
            tracing::warn!("No collectors registered, scheduler idle");
            shutdown.await;
            return;
        }

        // Due collectors start from the moment the loop starts, not registration.
        let start = Instant::now();
        for state in states.write().await.iter_mut() {
            state.next_due = start;
        }

        tracing::info!(collectors = collectors.len(), "Collector scheduler started");
        let mut in_flight: JoinSet<(usize, PollResult, Duration)> = JoinSet::new();

        loop {
            let wake = dispatch_due(&collectors, &states, &mut in_flight).await;

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(in_flight = in_flight.len(), "Collector scheduler stopping");
                    in_flight.abort_all();
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    match joined {
                        Ok((idx, result, elapsed)) => {
                            complete_poll(&registry, &states, idx, result, elapsed).await;
                        }
                        Err(e) => tracing::error!(error = %e, "Poll dispatch task failed"),
                    }
                }
                _ = sleep_until(wake) => {}
            }
        }

        tracing::info!("Collector scheduler shutdown complete");
    }
}

/// Spawn every due collector and return when the loop should wake next.
async fn dispatch_due(
    collectors: &[Arc<dyn Collector>],
    states: &RwLock<Vec<CollectorState>>,
    in_flight: &mut JoinSet<(usize, PollResult, Duration)>,
) -> Instant {
    let now = Instant::now();
    let mut states = states.write().await;

    for (idx, state) in states.iter_mut().enumerate() {
        if state.phase == PollPhase::Idle && state.next_due <= now {
            state.phase = PollPhase::Due;
        }
        if state.phase != PollPhase::Due {
            continue;
        }

        state.phase = PollPhase::Running;
        tracing::debug!(collector = %state.name, "Running collection");
        let collector = Arc::clone(&collectors[idx]);
        in_flight.spawn(async move {
            let started = Instant::now();
            let result = run_poll(collector).await;
            (idx, result, started.elapsed())
        });
    }

    states
        .iter()
        .filter(|s| s.phase == PollPhase::Idle)
        .map(|s| s.next_due)
        .min()
        .unwrap_or(now + IDLE_WAKE)
}

/// Aborts the wrapped poll task when dropped, so cancelling the dispatch
/// task (timeout or scheduler shutdown) also stops the poll itself.
struct AbortOnDrop(JoinHandle<PollResult>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Execute one poll in its own task, bounded by the collector's timeout.
///
/// The inner task turns a panicking collector into an `Internal` error
/// instead of losing track of which collector was running.
async fn run_poll(collector: Arc<dyn Collector>) -> PollResult {
    let limit = collector.timeout();
    let mut handle = AbortOnDrop(tokio::spawn(async move { collector.poll().await }));

    match timeout(limit, &mut handle.0).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(CollectorError::Internal(format!("poll task failed: {e}"))),
        Err(_) => Err(CollectorError::Timeout(limit)),
    }
}

/// Apply a finished poll to the registry and update the collector's state.
async fn complete_poll(
    registry: &MetricsRegistry,
    states: &RwLock<Vec<CollectorState>>,
    idx: usize,
    result: PollResult,
    elapsed: Duration,
) {
    let duration_ms = elapsed.as_millis();
    let name = match states.read().await.get(idx) {
        Some(state) => state.name.clone(),
        None => return,
    };

    let outcome = match result {
        Ok(observations) => {
            let series = apply_observations(registry, observations).await;
            tracing::debug!(collector = %name, duration_ms, series, "Collection succeeded");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::UnsupportedFeature => {
            tracing::debug!(collector = %name, reason = %e, "Feature not supported upstream, nothing to export");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(
                collector = %name,
                duration_ms,
                kind = %e.kind(),
                error = %e,
                "Collection failed, keeping previous values"
            );
            Err(e.to_string())
        }
    };

    let mut states = states.write().await;
    let Some(state) = states.get_mut(idx) else {
        return;
    };
    let completed = Instant::now();
    state.phase = PollPhase::Idle;
    state.next_due = completed + state.period;
    state.last_duration = Some(elapsed);
    state.polls += 1;
    match outcome {
        Ok(()) => {
            state.last_success = Some(Utc::now());
            state.last_error = None;
            state.consecutive_failures = 0;
        }
        Err(message) => {
            state.last_error = Some(message);
            state.consecutive_failures += 1;
            if state.consecutive_failures > 1 {
                tracing::error!(
                    collector = %name,
                    failures = state.consecutive_failures,
                    "Collector failing repeatedly"
                );
            }
        }
    }
    tracing::debug!(
        collector = %name,
        next_in_secs = state.period.as_secs(),
        "Next collection scheduled"
    );
}

/// Replace every family and info record carried by `observations`.
async fn apply_observations(registry: &MetricsRegistry, observations: Observations) -> usize {
    let (families, infos) = observations.into_parts();
    let mut series = 0;
    for (family, samples) in families {
        series += registry.replace_family(&family, samples).await;
    }
    for (name, record) in infos {
        registry.set_info(&name, record).await;
    }
    series
}
