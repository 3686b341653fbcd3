//! Detection Coordinator
//!
//! 1回のウィンドウ前進ごとに、集計 → 特徴量抽出 → 統計検知 →
//! モデル再学習/スコアリング → 判定統合、を1つの論理単位として
//! 実行します。個々のレコードの特徴量エラーでサイクル全体は
//! 失敗させず、そのレコードの判定のみ縮退させます。

use super::model::{ModelDetector, ModelScore, ModelStats};
use super::statistical::StatisticalDetector;
use super::{AnomalyVerdict, DetectionOutcome};
use crate::analytics::{AggregateSnapshot, AggregationEngine, FeatureBuilder, FeatureVector};
use crate::config::{AnalyticsConfig, CombinePolicy};
use crate::error::Result;
use crate::stream::window::WindowSnapshot;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// 直近エラー面の保持件数
const ERROR_SURFACE_CAPACITY: usize = 32;

/// 1サイクルの出力
#[derive(Debug, Clone)]
pub struct CycleOutput {
    /// 集計スナップショット
    pub aggregates: AggregateSnapshot,
    /// スナップショット順の異常判定（レコード1件につき1つ）
    pub verdicts: Vec<AnomalyVerdict>,
    /// モデル検知器の統計
    pub model: ModelStats,
}

/// 検知コーディネータ
pub struct DetectionCoordinator {
    aggregation: AggregationEngine,
    features: FeatureBuilder,
    statistical: StatisticalDetector,
    model: ModelDetector,
    combine_policy: CombinePolicy,
    recent_errors: VecDeque<String>,
}

impl DetectionCoordinator {
    /// 検証済み設定からコーディネータを構築
    ///
    /// 設定が不正な場合はどのコンポーネントも構築されません。
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aggregation: AggregationEngine::new(),
            features: FeatureBuilder::new(),
            statistical: StatisticalDetector::new(config.k_sigma),
            model: ModelDetector::new(
                config.contamination,
                config.min_fit_samples,
                config.refit_interval,
            ),
            combine_policy: config.combine_policy,
            recent_errors: VecDeque::with_capacity(ERROR_SURFACE_CAPACITY),
        })
    }

    /// 1検知サイクルを実行
    ///
    /// 返される判定列はスナップショットと同数・同順です。
    pub fn cycle(&mut self, snapshot: &WindowSnapshot) -> CycleOutput {
        let aggregates = self.aggregation.aggregate(&snapshot.records);

        // レコード順を保ったまま特徴量を抽出。失敗したレコードは
        // None として残し、判定段階で縮退扱いにする。
        let mut extracted: Vec<Option<FeatureVector>> =
            Vec::with_capacity(snapshot.records.len());
        for record in &snapshot.records {
            match self.features.build(record, &aggregates) {
                Ok(fv) => extracted.push(Some(fv)),
                Err(e) => {
                    warn!("Feature extraction failed: {}", e);
                    self.push_error(e.to_string());
                    extracted.push(None);
                }
            }
        }

        let valid: Vec<FeatureVector> = extracted.iter().flatten().cloned().collect();

        let stat_flags = self.statistical.score(&valid);

        if let Err(e) = self.model.maybe_refit(&valid, snapshot.version) {
            // 学習失敗はこのサイクルのモデルフラグなしに縮退するだけで、
            // 取り込みは止めない。次の周期で自動的に再試行される。
            warn!("Model refit failed, keeping previous model: {}", e);
            self.push_error(e.to_string());
        }
        let model_scores = self.model.score(&valid);

        debug!(
            "Detection cycle: records={}, valid={}, version={}",
            snapshot.records.len(),
            valid.len(),
            snapshot.version
        );

        let mut verdicts = Vec::with_capacity(snapshot.records.len());
        let mut valid_idx = 0;
        for (record, features) in snapshot.records.iter().zip(&extracted) {
            match features {
                None => verdicts.push(AnomalyVerdict::degraded(record.transaction_id)),
                Some(_) => {
                    let statistical_flag = stat_flags[valid_idx];
                    let ModelScore { score, flag } = model_scores[valid_idx];
                    valid_idx += 1;

                    let outcome = DetectionOutcome::from_flags(statistical_flag, flag);
                    verdicts.push(AnomalyVerdict {
                        transaction_id: record.transaction_id,
                        statistical_flag,
                        model_score: score,
                        model_flag: flag,
                        outcome,
                        combined_flag: outcome.combined(self.combine_policy),
                        degraded: false,
                    });
                }
            }
        }

        CycleOutput {
            aggregates,
            verdicts,
            model: self.model.stats(snapshot.version),
        }
    }

    /// 直近のエラー（新しい順ではなく発生順）
    pub fn recent_errors(&self) -> Vec<String> {
        self.recent_errors.iter().cloned().collect()
    }

    /// サイクル外で検出されたエラーも直近エラー面に残す
    pub(crate) fn record_error(&mut self, message: String) {
        self.push_error(message);
    }

    fn push_error(&mut self, message: String) {
        if self.recent_errors.len() >= ERROR_SURFACE_CAPACITY {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message);
    }
}
