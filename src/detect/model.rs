//! Model Detector
//!
//! 教師なし分離モデルによる異常検知。モデルは設定された周期
//! （前回学習からの追加レコード数）でウィンドウ全体に対して再学習され、
//! 学習済みハンドルは常に丸ごと置き換えられます（部分更新はしません）。
//!
//! 状態機械:
//! - `Unfitted` → `Fitted`: ウィンドウが最小レコード数に達した最初の学習で遷移。
//!   それ未満での学習要求は no-op。
//! - `Fitted` → `Stale`: 学習後の追加レコード数が再学習間隔に達したら遷移。
//! - `Stale` → `Fitted`: 次のサイクルの再学習で遷移。
//!
//! 学習失敗時（縮退入力）は直前の状態を保持し、次の周期で自動的に
//! 再試行されます。

use crate::analytics::FeatureVector;
use crate::error::{Error, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// オイラー・マスケローニ定数（平均パス長の調和数近似に使用）
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// モデル検知器の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    /// 未学習（スコアは常に中立）
    Unfitted,
    /// 学習済み
    Fitted,
    /// 再学習待ち（次のサイクルで学習し直す）
    Stale,
}

/// レコード1件分のモデル判定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    /// 連続値の異常スコア（大きいほど異常）
    pub score: f64,
    /// 異常フラグ
    pub flag: bool,
}

impl ModelScore {
    /// 未学習時の中立スコア
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            flag: false,
        }
    }
}

/// 表示用のモデル統計情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    /// 現在の状態
    pub state: ModelState,
    /// 最後に学習したウィンドウバージョン
    pub fitted_at_version: Option<u64>,
    /// モデル世代（再学習のたびに加算）
    pub model_generation: u32,
    /// 直近の学習サンプル数
    pub training_samples: usize,
}

/// 密度モデルの学習能力
///
/// 統計検知器と独立にテストできるよう、フィット/スコアは
/// この能力インターフェースの背後に隠蔽されています。
pub trait DensityEstimator: Send + Sync {
    /// 特徴量行列からモデルを学習し、スコアリング用ハンドルを返す
    fn fit(&self, rows: &[Vec<f64>]) -> Result<Box<dyn FittedEstimator>>;
}

/// 学習済みモデルのハンドル
pub trait FittedEstimator: Send + Sync {
    /// 1レコード分の特徴量に異常スコアを付ける（大きいほど異常）
    fn score(&self, features: &[f64]) -> f64;
}

/// Isolation Forest 推定器（デフォルト実装）
///
/// ランダムな軸平行分割の木を複数構築し、平均パス長から
/// 異常スコア `2^(-E[h(x)] / c(ψ))` を計算します。外れ値ほど少ない
/// 分割で孤立するため、スコアが 1 に近づきます。
///
/// 乱数は固定シードの `StdRng` から引くため、同じ入力からは常に
/// 同じモデルが得られます（決定的）。
#[derive(Debug, Clone)]
pub struct IsolationForestEstimator {
    /// 木の本数
    pub n_trees: usize,
    /// 1本あたりのサブサンプルサイズ
    pub sample_size: usize,
    /// 乱数シード
    pub seed: u64,
}

impl Default for IsolationForestEstimator {
    fn default() -> Self {
        Self {
            n_trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

impl DensityEstimator for IsolationForestEstimator {
    fn fit(&self, rows: &[Vec<f64>]) -> Result<Box<dyn FittedEstimator>> {
        let distinct = distinct_row_count(rows);
        if distinct < 2 {
            return Err(Error::model_fit(format!(
                "degenerate input: {} distinct feature rows, need at least 2",
                distinct
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let psi = self.sample_size.min(rows.len());
        let max_depth = (psi as f64).log2().ceil() as usize;

        let trees: Vec<Tree> = (0..self.n_trees)
            .map(|_| {
                let sample = sample_without_replacement(&mut rng, rows.len(), psi);
                build_tree(rows, sample, &mut rng, 0, max_depth)
            })
            .collect();

        debug!(
            "Isolation forest fitted: samples={}, trees={}, subsample={}",
            rows.len(),
            self.n_trees,
            psi
        );

        Ok(Box::new(IsolationForestModel {
            trees,
            normalizer: average_path_length(psi),
        }))
    }
}

/// 学習済み Isolation Forest
struct IsolationForestModel {
    trees: Vec<Tree>,
    /// サブサンプルサイズに対する期待パス長 c(ψ)
    normalizer: f64,
}

impl FittedEstimator for IsolationForestModel {
    fn score(&self, features: &[f64]) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, features, 0.0))
            .sum();
        let mean_path = total / self.trees.len() as f64;
        2.0_f64.powf(-mean_path / self.normalizer)
    }
}

enum Tree {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Tree>,
        right: Box<Tree>,
    },
}

fn build_tree(
    rows: &[Vec<f64>],
    indices: Vec<usize>,
    rng: &mut StdRng,
    depth: usize,
    max_depth: usize,
) -> Tree {
    if indices.len() <= 1 || depth >= max_depth {
        return Tree::Leaf {
            size: indices.len(),
        };
    }

    // ランダムに選んだ特徴量から順に、分割可能なものを探す
    let dim = rows[indices[0]].len();
    let start = rng.gen_range(0..dim);
    for offset in 0..dim {
        let feature = (start + offset) % dim;

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &i in &indices {
            let v = rows[i][feature];
            min = min.min(v);
            max = max.max(v);
        }
        if max <= min {
            continue;
        }

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| rows[i][feature] < threshold);

        return Tree::Split {
            feature,
            threshold,
            left: Box::new(build_tree(rows, left, rng, depth + 1, max_depth)),
            right: Box::new(build_tree(rows, right, rng, depth + 1, max_depth)),
        };
    }

    // このノードでは全特徴量が定数
    Tree::Leaf {
        size: indices.len(),
    }
}

fn path_length(tree: &Tree, features: &[f64], depth: f64) -> f64 {
    match tree {
        Tree::Leaf { size } => depth + average_path_length(*size),
        Tree::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if features[*feature] < *threshold {
                path_length(left, features, depth + 1.0)
            } else {
                path_length(right, features, depth + 1.0)
            }
        }
    }
}

/// n 点の二分探索木における期待パス長 c(n)
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// 非復元抽出で k 個のインデックスを選ぶ（部分 Fisher-Yates）
fn sample_without_replacement(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// 相異なる特徴量行の数
fn distinct_row_count(rows: &[Vec<f64>]) -> usize {
    let mut seen: HashSet<Vec<u64>> = HashSet::new();
    for row in rows {
        seen.insert(row.iter().map(|x| x.to_bits()).collect());
    }
    seen.len()
}

struct FittedHandle {
    estimator: Box<dyn FittedEstimator>,
    /// 汚染率分位点から導出したフラグしきい値
    threshold: f64,
    fitted_at_version: u64,
    training_samples: usize,
}

/// モデル検知器
pub struct ModelDetector {
    estimator: Box<dyn DensityEstimator>,
    contamination: f64,
    min_fit_samples: usize,
    refit_interval: u64,
    handle: Option<FittedHandle>,
    model_generation: u32,
}

impl ModelDetector {
    /// デフォルトの Isolation Forest 推定器で作成
    pub fn new(contamination: f64, min_fit_samples: usize, refit_interval: u64) -> Self {
        Self::with_estimator(
            Box::new(IsolationForestEstimator::default()),
            contamination,
            min_fit_samples,
            refit_interval,
        )
    }

    /// 任意の密度推定器で作成（テストではスタブを差し込める）
    pub fn with_estimator(
        estimator: Box<dyn DensityEstimator>,
        contamination: f64,
        min_fit_samples: usize,
        refit_interval: u64,
    ) -> Self {
        Self {
            estimator,
            contamination,
            min_fit_samples,
            refit_interval,
            handle: None,
            model_generation: 0,
        }
    }

    /// 指定バージョン時点の状態
    pub fn state(&self, current_version: u64) -> ModelState {
        match &self.handle {
            None => ModelState::Unfitted,
            Some(handle) => {
                if current_version.saturating_sub(handle.fitted_at_version) >= self.refit_interval {
                    ModelState::Stale
                } else {
                    ModelState::Fitted
                }
            }
        }
    }

    /// 最後に学習したウィンドウバージョン
    pub fn fitted_at(&self) -> Option<u64> {
        self.handle.as_ref().map(|h| h.fitted_at_version)
    }

    /// 表示用統計
    pub fn stats(&self, current_version: u64) -> ModelStats {
        ModelStats {
            state: self.state(current_version),
            fitted_at_version: self.fitted_at(),
            model_generation: self.model_generation,
            training_samples: self.handle.as_ref().map(|h| h.training_samples).unwrap_or(0),
        }
    }

    /// 状態機械に従い、必要なら再学習
    ///
    /// 学習した場合は `Ok(true)`。最小サンプル数未満の初回学習要求は
    /// no-op で `Ok(false)`（`Unfitted` のまま）。縮退入力で学習に
    /// 失敗した場合はエラーを返し、既存のモデルは置き換えません。
    pub fn maybe_refit(&mut self, vectors: &[FeatureVector], version: u64) -> Result<bool> {
        match self.state(version) {
            ModelState::Fitted => Ok(false),
            ModelState::Unfitted if vectors.len() < self.min_fit_samples => {
                debug!(
                    "Skipping first fit: {} records in window, need {}",
                    vectors.len(),
                    self.min_fit_samples
                );
                Ok(false)
            }
            ModelState::Unfitted | ModelState::Stale => {
                self.refit(vectors, version)?;
                Ok(true)
            }
        }
    }

    /// ウィンドウの特徴量で学習し、ハンドルを丸ごと置き換える
    fn refit(&mut self, vectors: &[FeatureVector], version: u64) -> Result<()> {
        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| v.features.clone()).collect();
        let estimator = self.estimator.fit(&rows)?;

        // 学習データのスコア分布からフラグしきい値を決める
        // （上位 contamination 割合が異常側に落ちる分位点）
        let mut scores: Vec<f64> = rows.iter().map(|row| estimator.score(row)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = (((1.0 - self.contamination) * scores.len() as f64).ceil() as usize)
            .saturating_sub(1)
            .min(scores.len() - 1);
        let threshold = scores[idx];

        self.handle = Some(FittedHandle {
            estimator,
            threshold,
            fitted_at_version: version,
            training_samples: vectors.len(),
        });
        self.model_generation += 1;

        info!(
            "Model refitted: generation={}, samples={}, version={}, threshold={:.4}",
            self.model_generation,
            vectors.len(),
            version,
            threshold
        );
        Ok(())
    }

    /// バッチをスコアリング
    ///
    /// 未学習の間は全レコードに中立スコアを返します（失敗させず、
    /// 下流は常に整形式の判定を受け取れます）。
    pub fn score(&self, vectors: &[FeatureVector]) -> Vec<ModelScore> {
        match &self.handle {
            None => vectors.iter().map(|_| ModelScore::neutral()).collect(),
            Some(handle) => vectors
                .iter()
                .map(|v| {
                    let score = handle.estimator.score(&v.features);
                    let flag = score > handle.threshold;
                    if flag {
                        warn!(
                            "Model flag: record={}, score={:.4}, threshold={:.4}",
                            v.transaction_id, score, handle.threshold
                        );
                    }
                    ModelScore { score, flag }
                })
                .collect(),
        }
    }
}
