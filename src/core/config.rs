//! Configuration management for Paceline.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Validation and defaults
//!
//! The static `total_components` / `average_score` seeds live here on
//! purpose: they are display placeholders that are never recomputed from
//! tracked events (see DESIGN.md), so they are configuration rather than
//! derived state.

use crate::core::{PacelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for Paceline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pattern monitor configuration.
    pub monitor: MonitorConfig,
    /// Race pipeline configuration.
    pub pipeline: PipelineConfig,
}

/// Pattern monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between heartbeat ticks.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Lookback window for the heartbeat summary.
    #[serde(with = "humantime_serde")]
    pub recent_window: Duration,
    /// Static seed for the total component count shown in metrics.
    pub total_components: usize,
    /// Static seed for the average score shown in metrics.
    pub average_score: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            recent_window: Duration::from_secs(30),
            total_components: 128,
            average_score: 87.5,
        }
    }
}

/// Race pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum race events retained in the history buffer.
    pub history_capacity: usize,
    /// Base speed before score/trend adjustments.
    pub base_speed: f64,
    /// Number of recent events returned by the stats snapshot.
    pub recent_stats: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            base_speed: 0.5,
            recent_stats: 10,
        }
    }
}

impl Config {
    /// Loads and validates configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.tick_interval.is_zero() {
            return Err(PacelineError::config("tick_interval must be non-zero"));
        }
        if self.monitor.recent_window.is_zero() {
            return Err(PacelineError::config("recent_window must be non-zero"));
        }
        if !(0.0..=100.0).contains(&self.monitor.average_score) {
            return Err(PacelineError::config(format!(
                "average_score must be between 0 and 100, got {}",
                self.monitor.average_score
            )));
        }
        if self.pipeline.history_capacity == 0 {
            return Err(PacelineError::config("history_capacity must be at least 1"));
        }
        if !(0.0..=10.0).contains(&self.pipeline.base_speed) || self.pipeline.base_speed == 0.0 {
            return Err(PacelineError::config(format!(
                "base_speed must be in (0, 10], got {}",
                self.pipeline.base_speed
            )));
        }
        if self.pipeline.recent_stats == 0 {
            return Err(PacelineError::config("recent_stats must be at least 1"));
        }
        Ok(())
    }
}
