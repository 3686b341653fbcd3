//! # retail-analytics-rs
//!
//! Real-time retail analytics core: sliding-window stream ingestion,
//! rolling multi-dimensional aggregation and hybrid anomaly detection.
//!
//! This crate maintains a bounded window of the most recent transactions,
//! recomputes grouped metrics over that window each cycle, and scores every
//! transaction with two cooperating detectors: a k-sigma statistical
//! threshold recomputed per window, and an unsupervised density model
//! re-fitted on a configurable cadence.

pub mod analytics;
pub mod config;
pub mod detect;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod stream;

pub use config::{AnalyticsConfig, CombinePolicy};
pub use detect::{AnomalyVerdict, DetectionCoordinator, DetectionOutcome, ModelState};
pub use error::{Error, Result};
pub use pipeline::{PipelineSnapshot, StreamPipeline};
pub use stream::{RecordSource, SlidingWindow, SyntheticRecordSource, TransactionRecord};
