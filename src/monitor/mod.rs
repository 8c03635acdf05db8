//! Pattern Monitor: the process-wide hub for pattern telemetry.
//!
//! Accepts arbitrary named observations via [`PatternMonitor::track_pattern`],
//! normalizes them into scored [`PatternEvent`]s, keeps the latest event per
//! pattern name, and maintains rolling aggregate [`StreamMetrics`]. Every
//! observation fans out synchronously to registered subscribers; an owned
//! heartbeat task additionally emits a recent-window summary on a fixed
//! interval so subscribers stay alive even when nothing is being tracked.
//!
//! There is no module-level singleton. Construct one instance at the
//! composition root and hand out clones (the handle is a cheap `Arc` clone).

use crate::core::config::MonitorConfig;
use crate::core::types::{PatternEvent, Payload, RacePosition, StreamMetrics};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Subscriber callback. Invoked synchronously within the emitting call
/// stack; panics are isolated per subscriber.
pub type MonitorCallback = Arc<dyn Fn(&MonitorEvent) + Send + Sync>;

/// Notification delivered to monitor subscribers.
#[derive(Debug, Clone, Serialize)]
pub enum MonitorEvent {
    /// A new observation was tracked.
    Pattern(PatternEvent),
    /// Periodic heartbeat, emitted even with no new observations.
    Heartbeat(HeartbeatSummary),
}

/// Summary over events observed within the recent window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSummary {
    /// When the summary was computed.
    pub timestamp: DateTime<Utc>,
    /// Events whose observation time falls inside the window.
    pub recent_events: usize,
    /// Distinct pattern names tracked overall.
    pub active_patterns: usize,
    /// Mean score of the in-window events (50 when the window is empty).
    pub average_recent_score: f64,
    /// Current momentum, 0-1.
    pub momentum: f64,
    /// Current standing.
    pub race_position: RacePosition,
}

struct MonitorInner {
    config: MonitorConfig,
    /// Latest event per pattern name. History is intentionally not kept.
    patterns: RwLock<HashMap<String, PatternEvent>>,
    metrics: RwLock<StreamMetrics>,
    subscribers: RwLock<HashMap<String, MonitorCallback>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the pattern monitor. Cloning is cheap and all clones share
/// the same state.
#[derive(Clone)]
pub struct PatternMonitor {
    inner: Arc<MonitorInner>,
}

impl PatternMonitor {
    /// Creates a monitor with the given configuration. The heartbeat task
    /// is not started until [`start`](Self::start) is called.
    pub fn new(config: MonitorConfig) -> Self {
        let metrics = StreamMetrics {
            total_components: config.total_components,
            average_score: config.average_score,
            active_patterns: 0,
            race_position: RacePosition::Trailing,
            momentum: 0.0,
        };
        Self {
            inner: Arc::new(MonitorInner {
                config,
                patterns: RwLock::new(HashMap::new()),
                metrics: RwLock::new(metrics),
                subscribers: RwLock::new(HashMap::new()),
                tick_task: Mutex::new(None),
            }),
        }
    }

    /// Starts the heartbeat task. Requires a tokio runtime. Calling
    /// `start` on an already running monitor is a no-op.
    pub fn start(&self) {
        let mut guard = self.inner.tick_task.lock();
        if guard.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        let tick_interval = self.inner.config.tick_interval;
        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            // First tick of tokio's interval fires immediately; skip it so
            // heartbeats arrive on the configured cadence.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let summary = inner.heartbeat_summary();
                tracing::debug!(
                    recent = summary.recent_events,
                    active = summary.active_patterns,
                    "heartbeat"
                );
                inner.dispatch(&MonitorEvent::Heartbeat(summary));
            }
        }));
    }

    /// Tracks one observation. Never fails: every derivation has a
    /// default for missing payload fields. Tracking the same name twice
    /// overwrites the stored event and computes the trend against the
    /// prior call.
    pub fn track_pattern(&self, pattern: &str, data: Payload) {
        let previous = self.inner.patterns.read().get(pattern).cloned();
        let event = PatternEvent::observe(pattern, data, previous.as_ref());
        tracing::debug!(
            pattern = %event.pattern,
            kind = %event.kind,
            score = event.metrics.score,
            "tracked pattern"
        );
        self.inner
            .patterns
            .write()
            .insert(pattern.to_string(), event.clone());
        self.inner.recompute_metrics();
        self.inner.dispatch(&MonitorEvent::Pattern(event));
    }

    /// Returns a defensive copy of the current aggregate metrics.
    pub fn current_metrics(&self) -> StreamMetrics {
        self.inner.metrics.read().clone()
    }

    /// Returns a snapshot of all currently tracked events.
    pub fn active_patterns(&self) -> Vec<PatternEvent> {
        self.inner.patterns.read().values().cloned().collect()
    }

    /// Returns the single most recent event for a pattern name.
    pub fn pattern_history(&self, pattern: &str) -> Option<PatternEvent> {
        self.inner.patterns.read().get(pattern).cloned()
    }

    /// Registers a callback under the given id. Re-subscribing with the
    /// same id replaces the prior callback; it does not stack.
    pub fn subscribe<S: Into<String>>(&self, id: S, callback: MonitorCallback) {
        self.inner.subscribers.write().insert(id.into(), callback);
    }

    /// Removes a subscriber. No-op if the id is unknown.
    pub fn unsubscribe(&self, id: &str) {
        self.inner.subscribers.write().remove(id);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Stops the heartbeat task, clears all subscribers, and clears all
    /// tracked patterns. Safe to call repeatedly; the monitor remains
    /// usable afterwards.
    pub fn destroy(&self) {
        if let Some(handle) = self.inner.tick_task.lock().take() {
            handle.abort();
        }
        self.inner.subscribers.write().clear();
        self.inner.patterns.write().clear();
        self.inner.recompute_metrics();
        tracing::debug!("pattern monitor destroyed");
    }

    /// Tracks a quality observation under a `quality-` prefixed name.
    pub fn track_quality(&self, name: &str, data: Payload) {
        self.track_pattern(&format!("quality-{}", name), data);
    }

    /// Tracks a build observation under a `build-` prefixed name.
    pub fn track_build(&self, name: &str, data: Payload) {
        self.track_pattern(&format!("build-{}", name), data);
    }

    /// Tracks a component observation under a `component-` prefixed name.
    pub fn track_component(&self, name: &str, data: Payload) {
        self.track_pattern(&format!("component-{}", name), data);
    }

    /// Tracks a git observation under a `git-` prefixed name.
    pub fn track_git(&self, name: &str, data: Payload) {
        self.track_pattern(&format!("git-{}", name), data);
    }

    /// Tracks a performance observation under a `perf-` prefixed name.
    pub fn track_performance(&self, name: &str, data: Payload) {
        self.track_pattern(&format!("perf-{}", name), data);
    }
}

impl MonitorInner {
    /// Recomputes `active_patterns`, `momentum`, and `race_position` from
    /// the tracked events. `total_components` and `average_score` are
    /// static seeds and deliberately left alone.
    fn recompute_metrics(&self) {
        let (total, positive) = {
            let patterns = self.patterns.read();
            let positive = patterns
                .values()
                .filter(|event| event.status.is_positive())
                .count();
            (patterns.len(), positive)
        };
        let momentum = if total == 0 {
            0.0
        } else {
            positive as f64 / total as f64
        };

        let mut metrics = self.metrics.write();
        metrics.active_patterns = total;
        metrics.momentum = momentum;
        metrics.race_position = RacePosition::from_ratio(momentum);
    }

    fn heartbeat_summary(&self) -> HeartbeatSummary {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.config.recent_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let cutoff = now - window;

        let (recent_events, average_recent_score) = {
            let patterns = self.patterns.read();
            let recent: Vec<f64> = patterns
                .values()
                .filter(|event| event.timestamp >= cutoff)
                .map(|event| event.metrics.score)
                .collect();
            let average = if recent.is_empty() {
                50.0
            } else {
                recent.iter().sum::<f64>() / recent.len() as f64
            };
            (recent.len(), average)
        };

        let metrics = self.metrics.read();
        HeartbeatSummary {
            timestamp: now,
            recent_events,
            active_patterns: metrics.active_patterns,
            average_recent_score,
            momentum: metrics.momentum,
            race_position: metrics.race_position,
        }
    }

    /// Fans an event out to all subscribers. Iterates a snapshot of the
    /// subscriber map so callbacks may freely re-enter `subscribe`,
    /// `unsubscribe`, or `track_pattern`. A panicking subscriber is
    /// logged and never blocks delivery to the rest.
    fn dispatch(&self, event: &MonitorEvent) {
        let snapshot: Vec<(String, MonitorCallback)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, cb)| (id.clone(), Arc::clone(cb)))
            .collect();

        for (id, callback) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!(subscriber = %id, "subscriber callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn payload(value: serde_json::Value) -> Payload {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn monitor() -> PatternMonitor {
        PatternMonitor::new(MonitorConfig::default())
    }

    #[test]
    fn test_track_updates_active_count() {
        let monitor = monitor();
        monitor.track_pattern("build-a", payload(json!({})));
        monitor.track_pattern("build-b", payload(json!({})));
        // Same name again overwrites, it does not add.
        monitor.track_pattern("build-a", payload(json!({"score": 70})));

        assert_eq!(monitor.current_metrics().active_patterns, 2);
        assert_eq!(monitor.active_patterns().len(), 2);
    }

    #[test]
    fn test_metrics_copy_is_defensive() {
        let monitor = monitor();
        monitor.track_pattern("x", payload(json!({})));
        let mut copy = monitor.current_metrics();
        copy.active_patterns = 999;
        assert_eq!(monitor.current_metrics().active_patterns, 1);
    }

    #[test]
    fn test_static_seeds_never_recomputed() {
        let config = MonitorConfig {
            total_components: 42,
            average_score: 61.5,
            ..MonitorConfig::default()
        };
        let monitor = PatternMonitor::new(config);
        for i in 0..20 {
            monitor.track_pattern(&format!("p{}", i), payload(json!({"score": 10})));
        }
        let metrics = monitor.current_metrics();
        assert_eq!(metrics.total_components, 42);
        assert_eq!(metrics.average_score, 61.5);
    }

    #[test]
    fn test_pattern_history_single_latest() {
        let monitor = monitor();
        monitor.track_pattern("git-push", payload(json!({"score": 40})));
        monitor.track_pattern("git-push", payload(json!({"score": 80})));

        let latest = monitor.pattern_history("git-push").unwrap();
        assert_eq!(latest.metrics.score, 80.0);
        assert!(monitor.pattern_history("missing").is_none());
    }

    #[test]
    fn test_subscriber_replacement_not_stacking() {
        let monitor = monitor();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&first);
        monitor.subscribe("x", Arc::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = Arc::clone(&second);
        monitor.subscribe("x", Arc::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        monitor.track_pattern("p", payload(json!({})));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let monitor = monitor();
        monitor.subscribe("bad", Arc::new(|_| panic!("subscriber bug")));
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        monitor.subscribe("good", Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        monitor.track_pattern("a", payload(json!({})));
        monitor.track_pattern("b", payload(json!({})));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reentrant_callback_does_not_deadlock() {
        let monitor = monitor();
        let handle = monitor.clone();
        monitor.subscribe("reentrant", Arc::new(move |event| {
            if let MonitorEvent::Pattern(p) = event {
                if p.pattern == "outer" {
                    handle.track_pattern("inner", Payload::new());
                }
            }
        }));

        monitor.track_pattern("outer", Payload::new());
        assert_eq!(monitor.current_metrics().active_patterns, 2);
    }

    #[test]
    fn test_destroy_clears_state_but_stays_usable() {
        let monitor = monitor();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        monitor.subscribe("s", Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        monitor.track_pattern("p", payload(json!({})));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        monitor.destroy();
        monitor.destroy(); // double teardown is a no-op

        monitor.track_pattern("x", payload(json!({})));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.active_patterns().len(), 1);
        assert_eq!(monitor.active_patterns()[0].pattern, "x");
    }

    #[tokio::test]
    async fn test_heartbeat_emitted_without_observations() {
        let config = MonitorConfig {
            tick_interval: Duration::from_millis(10),
            ..MonitorConfig::default()
        };
        let monitor = PatternMonitor::new(config);
        let beats = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&beats);
        monitor.subscribe("hb", Arc::new(move |event| {
            if matches!(event, MonitorEvent::Heartbeat(_)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        monitor.start();
        monitor.start(); // idempotent
        tokio::time::sleep(Duration::from_millis(80)).await;
        monitor.destroy();

        assert!(beats.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_heartbeat_summary_defaults_when_idle() {
        let monitor = monitor();
        let summary = monitor.inner.heartbeat_summary();
        assert_eq!(summary.recent_events, 0);
        assert_eq!(summary.average_recent_score, 50.0);
        assert_eq!(summary.race_position, RacePosition::Trailing);
    }

    #[test]
    fn test_heartbeat_window_excludes_old_events() {
        let config = MonitorConfig {
            recent_window: Duration::from_millis(50),
            ..MonitorConfig::default()
        };
        let monitor = PatternMonitor::new(config);
        monitor.track_pattern("perf-probe", payload(json!({"score": 90})));

        let fresh = monitor.inner.heartbeat_summary();
        assert_eq!(fresh.recent_events, 1);
        assert_eq!(fresh.average_recent_score, 90.0);

        std::thread::sleep(Duration::from_millis(120));

        let stale = monitor.inner.heartbeat_summary();
        assert_eq!(stale.recent_events, 0);
        assert_eq!(stale.average_recent_score, 50.0);
        // The pattern stays tracked; only the window summary moves on.
        assert_eq!(stale.active_patterns, 1);
    }

    #[test]
    fn test_callback_unsubscribing_itself_mid_dispatch() {
        let monitor = monitor();
        let handle = monitor.clone();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        monitor.subscribe("one-shot", Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            handle.unsubscribe("one-shot");
        }));

        monitor.track_pattern("a", payload(json!({})));
        monitor.track_pattern("b", payload(json!({})));

        // Fired once, removed itself, and saw nothing further.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[test]
    fn test_named_wrappers_steer_classification() {
        let monitor = monitor();
        monitor.track_build("nightly", payload(json!({})));
        monitor.track_git("hook", payload(json!({})));
        monitor.track_performance("probe", payload(json!({})));

        use crate::core::types::PatternKind;
        assert_eq!(monitor.pattern_history("build-nightly").unwrap().kind, PatternKind::Build);
        assert_eq!(monitor.pattern_history("git-hook").unwrap().kind, PatternKind::Git);
        assert_eq!(
            monitor.pattern_history("perf-probe").unwrap().kind,
            PatternKind::Performance
        );
    }
}
