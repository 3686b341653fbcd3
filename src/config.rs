//! Analytics Pipeline Configuration
//!
//! ストリーミング分析パイプラインの設定。
//! すべてのパラメータは構築時に検証され、不正な値は
//! [`Error::Config`](crate::error::Error::Config) として即座に拒否されます。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// 2つの検知器の判定を統合するポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinePolicy {
    /// いずれかの検知器がフラグを立てたら異常（デフォルト、再現率優先）
    Or,
    /// 両方の検知器がフラグを立てた場合のみ異常（精度優先）
    And,
}

/// 分析パイプライン設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// スライディングウィンドウの容量（保持する直近レコード数）
    pub window_capacity: usize,
    /// 統計検知のしきい値（標準偏差の倍数）
    pub k_sigma: f64,
    /// モデル再学習の間隔（前回学習からの追加レコード数）
    pub refit_interval: u64,
    /// 汚染率（ウィンドウ中で異常と見なす割合、(0,1)）
    pub contamination: f64,
    /// 初回学習に必要な最小レコード数
    pub min_fit_samples: usize,
    /// 検知結果の統合ポリシー
    pub combine_policy: CombinePolicy,
    /// ストリーム取り込み間隔（ミリ秒）
    pub tick_interval_ms: u64,
    /// 合成データソースのシード値
    pub seed: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_capacity: 1000,
            k_sigma: 3.0,
            refit_interval: 50,
            contamination: 0.05,
            min_fit_samples: 30,
            combine_policy: CombinePolicy::Or,
            tick_interval_ms: 2000,
            seed: 42,
        }
    }
}

impl AnalyticsConfig {
    /// 設定値を検証
    ///
    /// パイプラインのどのコンポーネントも、検証に通らない設定では
    /// 構築されません（部分的な構築は行わない）。
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(Error::config("window_capacity must be positive"));
        }
        if self.k_sigma <= 0.0 || !self.k_sigma.is_finite() {
            return Err(Error::config(format!(
                "k_sigma must be a positive finite number, got {}",
                self.k_sigma
            )));
        }
        if self.refit_interval == 0 {
            return Err(Error::config("refit_interval must be positive"));
        }
        if !(self.contamination > 0.0 && self.contamination < 1.0) {
            return Err(Error::config(format!(
                "contamination must be in (0, 1), got {}",
                self.contamination
            )));
        }
        if self.min_fit_samples < 2 {
            return Err(Error::config(
                "min_fit_samples must be at least 2 to fit meaningfully",
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::config("tick_interval_ms must be positive"));
        }
        Ok(())
    }
}
