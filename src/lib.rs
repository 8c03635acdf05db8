//! Paceline - in-process pattern telemetry with a race-themed event stream.
//!
//! Paceline ingests ad-hoc "pattern" observations (quality, build, git,
//! component, performance signals), scores them, and maintains rolling
//! health metrics. A downstream pipeline turns every observation into a
//! narrative race event (boosts, obstacles, position changes) suitable
//! for live dashboards.
//!
//! # Features
//!
//! - **Fire-and-forget ingestion**: `track_pattern` never fails; missing
//!   payload fields fall back to defaults
//! - **Synchronous fan-out**: subscribers are invoked in the emitting
//!   call stack, each isolated from the others' panics
//! - **Heartbeats**: a periodic tick keeps subscribers alive even when
//!   nothing is being tracked
//! - **Bounded history**: race events live in a FIFO buffer with strict
//!   capacity-based eviction
//!
//! # Architecture
//!
//! - `monitor`: observation ingestion, classification, aggregate metrics
//! - `pipeline`: race-event translation, history, subscriptions, streams
//! - `core`: domain models, configuration, error taxonomy
//! - `cli`: demo driver
//!
//! # Example
//!
//! ```no_run
//! use paceline::core::Config;
//! use paceline::{PatternMonitor, RacePipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let monitor = PatternMonitor::new(config.monitor);
//!     let pipeline = RacePipeline::new(config.pipeline, monitor.clone());
//!     monitor.start();
//!     pipeline.start();
//!
//!     monitor.track_build("nightly", serde_json::Map::new());
//!     println!("{}", pipeline.streamlined_status());
//!
//!     pipeline.stop();
//!     monitor.destroy();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod monitor;
pub mod pipeline;

// Re-export core types for convenience
pub use crate::core::{Config, PacelineError, Result};
pub use crate::monitor::PatternMonitor;
pub use crate::pipeline::RacePipeline;
