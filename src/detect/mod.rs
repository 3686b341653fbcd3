//! Anomaly Detection
//!
//! 統計検知器とモデル検知器、およびその協調を担うコーディネータ。
//!
//! ## 主要機能
//!
//! - **統計検知**: ウィンドウごとに再計算される kσ しきい値判定
//! - **モデル検知**: 周期的に再学習される教師なし密度モデル
//! - **判定統合**: 設定可能なポリシー（OR / AND）による最終判定

pub mod coordinator;
pub mod model;
pub mod statistical;

use crate::config::CombinePolicy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use coordinator::{CycleOutput, DetectionCoordinator};
pub use model::{
    DensityEstimator, FittedEstimator, IsolationForestEstimator, ModelDetector, ModelScore,
    ModelState, ModelStats,
};
pub use statistical::StatisticalDetector;

/// 2つの検知器の判定内訳
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionOutcome {
    /// どちらの検知器もフラグなし
    Normal,
    /// 統計検知器のみフラグ
    StatisticalOnly,
    /// モデル検知器のみフラグ
    ModelOnly,
    /// 両方の検知器がフラグ
    Both,
}

impl DetectionOutcome {
    /// 個別フラグから内訳を導出
    pub fn from_flags(statistical: bool, model: bool) -> Self {
        match (statistical, model) {
            (false, false) => Self::Normal,
            (true, false) => Self::StatisticalOnly,
            (false, true) => Self::ModelOnly,
            (true, true) => Self::Both,
        }
    }

    /// ポリシーに従って最終フラグへ畳み込む
    pub fn combined(&self, policy: CombinePolicy) -> bool {
        match policy {
            CombinePolicy::Or => !matches!(self, Self::Normal),
            CombinePolicy::And => matches!(self, Self::Both),
        }
    }
}

/// レコード1件分の異常判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyVerdict {
    /// 対象レコードのトランザクションID
    pub transaction_id: Uuid,
    /// 統計検知器のフラグ
    pub statistical_flag: bool,
    /// モデル検知器の連続スコア
    pub model_score: f64,
    /// モデル検知器のフラグ
    pub model_flag: bool,
    /// 判定内訳
    pub outcome: DetectionOutcome,
    /// 統合フラグ
    pub combined_flag: bool,
    /// 特徴量抽出に失敗し、判定が縮退しているか
    pub degraded: bool,
}

impl AnomalyVerdict {
    /// 特徴量抽出に失敗したレコードの縮退判定
    pub fn degraded(transaction_id: Uuid) -> Self {
        Self {
            transaction_id,
            statistical_flag: false,
            model_score: 0.0,
            model_flag: false,
            outcome: DetectionOutcome::Normal,
            combined_flag: false,
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_flags() {
        assert_eq!(
            DetectionOutcome::from_flags(true, false),
            DetectionOutcome::StatisticalOnly
        );
        assert_eq!(
            DetectionOutcome::from_flags(true, true),
            DetectionOutcome::Both
        );
    }

    #[test]
    fn test_combined_policies() {
        assert!(DetectionOutcome::StatisticalOnly.combined(CombinePolicy::Or));
        assert!(!DetectionOutcome::StatisticalOnly.combined(CombinePolicy::And));
        assert!(DetectionOutcome::Both.combined(CombinePolicy::And));
        assert!(!DetectionOutcome::Normal.combined(CombinePolicy::Or));
    }
}
