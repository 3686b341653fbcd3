//! Rolling Analytics
//!
//! ウィンドウ内容に対する集計と特徴量抽出。

pub mod aggregate;
pub mod features;

pub use aggregate::{AggregateSnapshot, AggregationEngine, GroupMetrics, SummaryStats};
pub use features::{FeatureBuilder, FeatureVector, FEATURE_NAMES};
