//! Domain types for pattern observations and derived race events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque observation payload. Recognized fields: `error`, `failed`,
/// `warnings`, `improved`, `score`, `quality`, `critical`, `blocking`,
/// `important`. Everything else is carried through untouched.
pub type Payload = Map<String, Value>;

/// Category of a tracked pattern, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Code or component quality signals.
    Quality,
    /// Build and lint signals.
    Build,
    /// Git and commit signals.
    Git,
    /// Generic component signals (the fallback).
    Component,
    /// Performance and speed signals.
    Performance,
}

impl PatternKind {
    /// Classifies a pattern name by substring match, first match wins.
    /// Callers control naming to steer classification.
    pub fn classify(pattern: &str) -> Self {
        let name = pattern.to_ascii_lowercase();
        if name.contains("component") || name.contains("quality") {
            PatternKind::Quality
        } else if name.contains("build") || name.contains("lint") {
            PatternKind::Build
        } else if name.contains("git") || name.contains("commit") {
            PatternKind::Git
        } else if name.contains("perf") || name.contains("speed") {
            PatternKind::Performance
        } else {
            PatternKind::Component
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatternKind::Quality => "quality",
            PatternKind::Build => "build",
            PatternKind::Git => "git",
            PatternKind::Component => "component",
            PatternKind::Performance => "performance",
        };
        write!(f, "{}", name)
    }
}

/// Health classification of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Nothing in the payload flagged a problem.
    Healthy,
    /// Payload carried warnings.
    Warning,
    /// Payload flagged an error or failure.
    Error,
    /// Payload flagged an improvement.
    Improving,
}

impl HealthStatus {
    /// Derives status from payload flags. Error outranks Improving
    /// outranks Warning.
    pub fn derive(data: &Payload) -> Self {
        if truthy(data.get("error")) || truthy(data.get("failed")) {
            HealthStatus::Error
        } else if truthy(data.get("improved")) {
            HealthStatus::Improving
        } else if truthy(data.get("warnings")) {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }

    /// True for statuses that count toward momentum.
    pub fn is_positive(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Improving)
    }
}

/// Score movement relative to the previous observation of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Score rose by more than the deadband.
    Up,
    /// Score fell by more than the deadband.
    Down,
    /// Within the deadband, or no prior observation.
    Stable,
}

/// Deadband in score points before a change registers as a trend.
const TREND_DEADBAND: f64 = 2.0;

impl Trend {
    /// Computes the trend from the score delta against the prior event.
    pub fn from_delta(delta: f64) -> Self {
        if delta > TREND_DEADBAND {
            Trend::Up
        } else if delta < -TREND_DEADBAND {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

/// Blast radius of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Routine signal.
    Low,
    /// Worth a look.
    Medium,
    /// Needs attention now.
    High,
}

impl Impact {
    /// Derives impact from payload flags and the computed score.
    pub fn derive(data: &Payload, score: f64) -> Self {
        if truthy(data.get("critical")) || truthy(data.get("blocking")) || score < 20.0 {
            Impact::High
        } else if truthy(data.get("important")) || score < 40.0 {
            Impact::Medium
        } else {
            Impact::Low
        }
    }
}

/// Derived metrics attached to every pattern event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMetrics {
    /// Score 0-100, from the payload `score`/`quality` field (default 50).
    pub score: f64,
    /// Movement relative to the previous event for the same name.
    pub trend: Trend,
    /// Blast radius.
    pub impact: Impact,
}

/// An immutable record of one pattern observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEvent {
    /// Unique id derived from the pattern name and creation time.
    pub id: String,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Category inferred from the pattern name.
    pub kind: PatternKind,
    /// Caller-supplied pattern name.
    pub pattern: String,
    /// Health classification.
    pub status: HealthStatus,
    /// Opaque caller payload.
    pub data: Payload,
    /// Derived score/trend/impact.
    pub metrics: PatternMetrics,
}

impl PatternEvent {
    /// Builds an event from a raw observation. All derivations default
    /// rather than fail on missing payload fields.
    pub fn observe(pattern: &str, data: Payload, previous: Option<&PatternEvent>) -> Self {
        let timestamp = Utc::now();
        let score = score_from(&data);
        let trend = match previous {
            Some(prior) => Trend::from_delta(score - prior.metrics.score),
            None => Trend::Stable,
        };
        let impact = Impact::derive(&data, score);
        let status = HealthStatus::derive(&data);

        PatternEvent {
            id: format!("{}-{}", pattern, timestamp.timestamp_millis()),
            timestamp,
            kind: PatternKind::classify(pattern),
            pattern: pattern.to_string(),
            status,
            data,
            metrics: PatternMetrics { score, trend, impact },
        }
    }
}

/// Aggregate process-wide metrics, recomputed after every observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetrics {
    /// Static seed from configuration, never recomputed.
    pub total_components: usize,
    /// Static seed from configuration, never recomputed.
    pub average_score: f64,
    /// Count of distinct pattern names currently tracked.
    pub active_patterns: usize,
    /// Standing derived from the health ratio.
    pub race_position: RacePosition,
    /// Health ratio 0-1 (healthy or improving over total tracked).
    pub momentum: f64,
}

/// Standing in the metaphorical race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RacePosition {
    /// Health ratio above 0.8.
    Leading,
    /// Health ratio above 0.6.
    Close,
    /// Everything else.
    Trailing,
}

impl RacePosition {
    /// Maps a health ratio onto a position.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.8 {
            RacePosition::Leading
        } else if ratio > 0.6 {
            RacePosition::Close
        } else {
            RacePosition::Trailing
        }
    }
}

impl fmt::Display for RacePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RacePosition::Leading => "leading",
            RacePosition::Close => "close",
            RacePosition::Trailing => "trailing",
        };
        write!(f, "{}", name)
    }
}

/// Kind of derived race event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceEventKind {
    /// A pattern trending up gained ground.
    PositionChange,
    /// Routine pace report (also used for heartbeats).
    SpeedUpdate,
    /// An improving pattern engaged a boost.
    PatternBoost,
    /// An erroring pattern hit an obstacle.
    ObstacleHit,
}

/// A display-oriented record derived from a pattern event or heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEvent {
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Narrative event kind.
    pub kind: RaceEventKind,
    /// Standing at the time of the event.
    pub position: RacePosition,
    /// Computed speed, floored at 0.1.
    pub speed: f64,
    /// Active pattern count at the time of the event.
    pub patterns: usize,
    /// Momentum at the time of the event.
    pub momentum: f64,
    /// Human-readable one-liner.
    pub message: String,
    /// Original observation payload, when derived from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
}

/// Extracts the score from a payload: `score`, then `quality`, default 50,
/// clamped to 0-100.
fn score_from(data: &Payload) -> f64 {
    data.get("score")
        .or_else(|| data.get("quality"))
        .and_then(Value::as_f64)
        .unwrap_or(50.0)
        .clamp(0.0, 100.0)
}

/// Loose truthiness over JSON values: `true`, non-zero numbers, and
/// non-empty strings all count. Warning counts arrive as numbers.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(PatternKind::classify("component-render"), PatternKind::Quality);
        assert_eq!(PatternKind::classify("code-quality-check"), PatternKind::Quality);
        assert_eq!(PatternKind::classify("nightly-build"), PatternKind::Build);
        assert_eq!(PatternKind::classify("lint-pass"), PatternKind::Build);
        assert_eq!(PatternKind::classify("git-push"), PatternKind::Git);
        assert_eq!(PatternKind::classify("commit-hook"), PatternKind::Git);
        assert_eq!(PatternKind::classify("perf-probe"), PatternKind::Performance);
        assert_eq!(PatternKind::classify("page-speed"), PatternKind::Performance);
        assert_eq!(PatternKind::classify("mystery"), PatternKind::Component);
        // "quality" outranks "build" when both appear.
        assert_eq!(PatternKind::classify("build-quality"), PatternKind::Quality);
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(HealthStatus::derive(&payload(json!({}))), HealthStatus::Healthy);
        assert_eq!(
            HealthStatus::derive(&payload(json!({"error": true}))),
            HealthStatus::Error
        );
        assert_eq!(
            HealthStatus::derive(&payload(json!({"failed": true}))),
            HealthStatus::Error
        );
        assert_eq!(
            HealthStatus::derive(&payload(json!({"improved": true}))),
            HealthStatus::Improving
        );
        assert_eq!(
            HealthStatus::derive(&payload(json!({"warnings": 3}))),
            HealthStatus::Warning
        );
        // Error outranks improvement.
        assert_eq!(
            HealthStatus::derive(&payload(json!({"error": true, "improved": true}))),
            HealthStatus::Error
        );
        // Zero warnings is not a warning.
        assert_eq!(
            HealthStatus::derive(&payload(json!({"warnings": 0}))),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn test_trend_deadband() {
        assert_eq!(Trend::from_delta(10.0), Trend::Up);
        assert_eq!(Trend::from_delta(2.1), Trend::Up);
        assert_eq!(Trend::from_delta(2.0), Trend::Stable);
        assert_eq!(Trend::from_delta(1.0), Trend::Stable);
        assert_eq!(Trend::from_delta(-1.0), Trend::Stable);
        assert_eq!(Trend::from_delta(-2.1), Trend::Down);
    }

    #[test]
    fn test_score_extraction() {
        assert_eq!(score_from(&payload(json!({"score": 72}))), 72.0);
        assert_eq!(score_from(&payload(json!({"quality": 30}))), 30.0);
        assert_eq!(score_from(&payload(json!({"score": 72, "quality": 30}))), 72.0);
        assert_eq!(score_from(&payload(json!({}))), 50.0);
        assert_eq!(score_from(&payload(json!({"score": 900}))), 100.0);
        assert_eq!(score_from(&payload(json!({"score": -5}))), 0.0);
    }

    #[test]
    fn test_impact_derivation() {
        assert_eq!(Impact::derive(&payload(json!({"critical": true})), 90.0), Impact::High);
        assert_eq!(Impact::derive(&payload(json!({"blocking": true})), 90.0), Impact::High);
        assert_eq!(Impact::derive(&payload(json!({})), 10.0), Impact::High);
        assert_eq!(Impact::derive(&payload(json!({"important": true})), 90.0), Impact::Medium);
        assert_eq!(Impact::derive(&payload(json!({})), 35.0), Impact::Medium);
        assert_eq!(Impact::derive(&payload(json!({})), 80.0), Impact::Low);
    }

    #[test]
    fn test_observe_with_prior_event() {
        let first = PatternEvent::observe("build-check", payload(json!({"score": 50})), None);
        assert_eq!(first.kind, PatternKind::Build);
        assert_eq!(first.metrics.trend, Trend::Stable);
        assert!(first.id.starts_with("build-check-"));

        let second =
            PatternEvent::observe("build-check", payload(json!({"score": 60})), Some(&first));
        assert_eq!(second.metrics.trend, Trend::Up);

        let third =
            PatternEvent::observe("build-check", payload(json!({"score": 50})), Some(&second));
        assert_eq!(third.metrics.trend, Trend::Down);
    }

    #[test]
    fn test_race_position_thresholds() {
        assert_eq!(RacePosition::from_ratio(1.0), RacePosition::Leading);
        assert_eq!(RacePosition::from_ratio(0.81), RacePosition::Leading);
        assert_eq!(RacePosition::from_ratio(0.8), RacePosition::Close);
        assert_eq!(RacePosition::from_ratio(0.61), RacePosition::Close);
        assert_eq!(RacePosition::from_ratio(0.6), RacePosition::Trailing);
        assert_eq!(RacePosition::from_ratio(0.0), RacePosition::Trailing);
    }
}
