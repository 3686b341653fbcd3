//! Error types for the retail analytics core.

use thiserror::Error;

/// Result type alias for analytics operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the streaming analytics pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction parameters (fatal, surfaced before startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single record's raw fields are unusable for feature extraction
    #[error("Feature error: {0}")]
    Feature(String),

    /// Model fitting failed; the detector keeps its previous state
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// Window snapshot violated the capacity invariant (locking bug)
    #[error("Buffer invariant violated: {0}")]
    BufferInvariant(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// 設定エラーを作成するヘルパー
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// 特徴量エラーを作成するヘルパー
    pub fn feature(msg: impl Into<String>) -> Self {
        Self::Feature(msg.into())
    }

    /// モデル学習エラーを作成するヘルパー
    pub fn model_fit(msg: impl Into<String>) -> Self {
        Self::ModelFit(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("window_capacity must be positive");
        assert!(err.to_string().contains("Configuration error"));

        let err = Error::feature("unit_price is not finite");
        assert!(err.to_string().contains("unit_price"));
    }
}
