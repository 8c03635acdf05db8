//! Core domain models and configuration for Paceline.
//!
//! This module contains the fundamental types shared by the pattern
//! monitor and the race stream pipeline.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, MonitorConfig, PipelineConfig};
pub use error::{PacelineError, Result};
pub use types::{
    HealthStatus, Impact, PatternEvent, PatternKind, PatternMetrics, RaceEvent, RaceEventKind,
    RacePosition, StreamMetrics, Trend,
};
