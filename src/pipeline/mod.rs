//! Race Stream Pipeline: narrative event stream derived from pattern
//! telemetry.
//!
//! The pipeline subscribes to a [`PatternMonitor`], translates every
//! observation into a racing-themed [`RaceEvent`] (boosts, obstacles,
//! position changes), keeps a bounded FIFO history, and rebroadcasts to
//! its own subscribers. Downstream consumers can either poll
//! [`RacePipeline::current_stats`] or pull a push-fed
//! [`RaceEventStream`](stream::RaceEventStream).

pub mod stream;

use crate::core::config::PipelineConfig;
use crate::core::types::{
    HealthStatus, PatternEvent, Payload, RaceEvent, RaceEventKind, RacePosition, Trend,
};
use crate::monitor::{HeartbeatSummary, MonitorEvent, PatternMonitor};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Subscriber callback. Invoked synchronously; panics are isolated per
/// subscriber, matching the monitor's policy.
pub type RaceCallback = Arc<dyn Fn(&RaceEvent) + Send + Sync>;

/// Pull-based snapshot of the race state.
#[derive(Debug, Clone, Serialize)]
pub struct RaceStats {
    /// Current standing.
    pub position: RacePosition,
    /// Speed of the most recent race event (0.0 with an empty history).
    pub speed: f64,
    /// Distinct pattern names currently tracked.
    pub active_patterns: usize,
    /// Health ratio 0-1.
    pub momentum: f64,
    /// Most recent race events, oldest first.
    pub recent_events: Vec<RaceEvent>,
}

pub(crate) struct PipelineInner {
    config: PipelineConfig,
    monitor: PatternMonitor,
    history: RwLock<VecDeque<RaceEvent>>,
    subscribers: RwLock<HashMap<String, RaceCallback>>,
    /// Id of our subscription on the monitor while running.
    feed_id: Mutex<Option<String>>,
    id_seq: AtomicU64,
}

/// Handle to the race pipeline. Cloning is cheap and all clones share the
/// same state.
#[derive(Clone)]
pub struct RacePipeline {
    inner: Arc<PipelineInner>,
}

impl RacePipeline {
    /// Creates a pipeline over the given monitor. Call
    /// [`start`](Self::start) to begin translating events.
    pub fn new(config: PipelineConfig, monitor: PatternMonitor) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                config,
                monitor,
                history: RwLock::new(VecDeque::new()),
                subscribers: RwLock::new(HashMap::new()),
                feed_id: Mutex::new(None),
                id_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes to the monitor and begins translating events. No-op if
    /// already running.
    pub fn start(&self) {
        let mut feed = self.inner.feed_id.lock();
        if feed.is_some() {
            return;
        }
        let id = format!("race-pipeline-feed-{}", self.inner.next_id());
        let weak = Arc::downgrade(&self.inner);
        self.inner.monitor.subscribe(
            id.clone(),
            Arc::new(move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.ingest(event);
                }
            }),
        );
        *feed = Some(id);
        tracing::debug!("race pipeline started");
    }

    /// Unsubscribes from the monitor and clears all pipeline subscribers.
    /// Safe to call repeatedly. Tracked patterns on the monitor are left
    /// alone; each component manages its own teardown.
    pub fn stop(&self) {
        if let Some(id) = self.inner.feed_id.lock().take() {
            self.inner.monitor.unsubscribe(&id);
        }
        self.inner.subscribers.write().clear();
        tracing::debug!("race pipeline stopped");
    }

    /// Registers a callback under the given id. Re-subscribing with the
    /// same id replaces the prior callback.
    pub fn subscribe<S: Into<String>>(&self, id: S, callback: RaceCallback) {
        self.inner.subscribers.write().insert(id.into(), callback);
    }

    /// Removes a subscriber. No-op if the id is unknown.
    pub fn unsubscribe(&self, id: &str) {
        self.inner.subscribers.write().remove(id);
    }

    /// Number of registered pipeline subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Pull-based snapshot: position, latest speed, pattern count,
    /// momentum, and the most recent events.
    pub fn current_stats(&self) -> RaceStats {
        let metrics = self.inner.monitor.current_metrics();
        let history = self.inner.history.read();
        let speed = history.back().map(|event| event.speed).unwrap_or(0.0);
        let recent = self.inner.config.recent_stats;
        let skip = history.len().saturating_sub(recent);
        RaceStats {
            position: metrics.race_position,
            speed,
            active_patterns: metrics.active_patterns,
            momentum: metrics.momentum,
            recent_events: history.iter().skip(skip).cloned().collect(),
        }
    }

    /// Full history buffer snapshot, oldest first.
    pub fn race_history(&self) -> Vec<RaceEvent> {
        self.inner.history.read().iter().cloned().collect()
    }

    /// Creates a pull-of-a-push event stream. The stream subscribes under
    /// a fresh id and unsubscribes itself when dropped.
    pub fn event_stream(&self) -> stream::RaceEventStream {
        stream::RaceEventStream::attach(self)
    }

    /// Convenience pass-through to the monitor, for tests and manual
    /// operator input.
    pub fn inject_pattern(&self, pattern: &str, data: Payload) {
        self.inner.monitor.track_pattern(pattern, data);
    }

    /// Injects a quality observation under a `quality-` prefixed name.
    pub fn track_quality_race(&self, name: &str, data: Payload) {
        self.inject_pattern(&format!("quality-{}", name), data);
    }

    /// Injects a build observation under a `build-` prefixed name.
    pub fn track_build_race(&self, name: &str, data: Payload) {
        self.inject_pattern(&format!("build-{}", name), data);
    }

    /// Injects a component observation under a `component-` prefixed name.
    pub fn track_component_race(&self, name: &str, data: Payload) {
        self.inject_pattern(&format!("component-{}", name), data);
    }

    /// Single-line human-readable summary for logging or CLI display.
    pub fn streamlined_status(&self) -> String {
        let stats = self.current_stats();
        format!(
            "{} | speed {:.2} | {} patterns | momentum {:.0}%",
            stats.position,
            stats.speed,
            stats.active_patterns,
            stats.momentum * 100.0
        )
    }

    /// Alias of [`streamlined_status`](Self::streamlined_status).
    pub fn race_status(&self) -> String {
        self.streamlined_status()
    }

    pub(crate) fn inner(&self) -> &Arc<PipelineInner> {
        &self.inner
    }
}

impl PipelineInner {
    pub(crate) fn next_id(&self) -> u64 {
        self.id_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn add_subscriber(&self, id: String, callback: RaceCallback) {
        self.subscribers.write().insert(id, callback);
    }

    pub(crate) fn remove_subscriber(&self, id: &str) {
        self.subscribers.write().remove(id);
    }

    fn ingest(&self, event: &MonitorEvent) {
        let race = match event {
            MonitorEvent::Pattern(pattern) => self.translate(pattern),
            MonitorEvent::Heartbeat(summary) => self.heartbeat_event(summary),
        };
        self.record(race);
    }

    /// Translates a pattern event into its racing-themed counterpart.
    fn translate(&self, event: &PatternEvent) -> RaceEvent {
        let kind = match (event.status, event.metrics.trend) {
            (HealthStatus::Improving, _) => RaceEventKind::PatternBoost,
            (HealthStatus::Error, _) => RaceEventKind::ObstacleHit,
            (_, Trend::Up) => RaceEventKind::PositionChange,
            _ => RaceEventKind::SpeedUpdate,
        };
        let message = match kind {
            RaceEventKind::PatternBoost => format!("{} is improving, boost engaged", event.pattern),
            RaceEventKind::ObstacleHit => format!("{} hit an obstacle", event.pattern),
            RaceEventKind::PositionChange => {
                format!("{} trending up, gaining ground", event.pattern)
            },
            RaceEventKind::SpeedUpdate => format!("{} holding pace", event.pattern),
        };
        let metrics = self.monitor.current_metrics();
        RaceEvent {
            timestamp: Utc::now(),
            kind,
            position: metrics.race_position,
            speed: race_speed(self.config.base_speed, event.metrics.score, event.metrics.trend),
            patterns: metrics.active_patterns,
            momentum: metrics.momentum,
            message,
            data: Some(event.data.clone()),
        }
    }

    /// Heartbeats become routine pace reports carrying the window summary.
    fn heartbeat_event(&self, summary: &HeartbeatSummary) -> RaceEvent {
        RaceEvent {
            timestamp: summary.timestamp,
            kind: RaceEventKind::SpeedUpdate,
            position: summary.race_position,
            speed: race_speed(self.config.base_speed, summary.average_recent_score, Trend::Stable),
            patterns: summary.active_patterns,
            momentum: summary.momentum,
            message: format!(
                "field check: {} patterns active, {} seen in the last window",
                summary.active_patterns, summary.recent_events
            ),
            data: None,
        }
    }

    /// Appends to the bounded history (FIFO eviction, never an error) and
    /// fans out to subscribers over a snapshot copy.
    fn record(&self, event: RaceEvent) {
        {
            let mut history = self.history.write();
            history.push_back(event.clone());
            while history.len() > self.config.history_capacity {
                history.pop_front();
            }
        }

        let snapshot: Vec<(String, RaceCallback)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, cb)| (id.clone(), Arc::clone(cb)))
            .collect();

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                tracing::warn!(subscriber = %id, "subscriber callback panicked");
            }
        }
    }
}

/// Speed formula: base + score bonus + trend bonus, floored at 0.1 so a
/// rough stretch never reads as standing still.
fn race_speed(base: f64, score: f64, trend: Trend) -> f64 {
    let trend_bonus = match trend {
        Trend::Up => 0.3,
        Trend::Down => -0.2,
        Trend::Stable => 0.0,
    };
    (base + (score - 50.0) / 100.0 + trend_bonus).max(0.1)
}
