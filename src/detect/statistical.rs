//! Statistical Detector
//!
//! kσ法による異常検知。バッチ（通常はウィンドウ全体）の特徴量ごとの
//! 平均と標準偏差を毎サイクル再計算するため、フラグは常に現在の
//! ウィンドウを反映し、古いベースラインに引きずられることはありません。

use crate::analytics::FeatureVector;
use tracing::debug;

/// 統計ベースの異常検知器
///
/// サイクルをまたぐ状態を一切持ちません。
#[derive(Debug, Clone)]
pub struct StatisticalDetector {
    k_sigma: f64,
}

impl StatisticalDetector {
    /// しきい値（標準偏差の倍数）を指定して作成
    ///
    /// 値の検証は [`AnalyticsConfig::validate`](crate::config::AnalyticsConfig::validate)
    /// で構築前に行われます。
    pub fn new(k_sigma: f64) -> Self {
        Self { k_sigma }
    }

    /// バッチ内の各レコードにフラグを付与
    ///
    /// いずれかの特徴量について平均からの絶対偏差が kσ 以上の
    /// レコードにフラグを立てます。標準偏差がほぼゼロの特徴量
    /// （定数列）はフラグに寄与しません。
    pub fn score(&self, vectors: &[FeatureVector]) -> Vec<bool> {
        if vectors.len() < 2 {
            // 1件以下では偏差が定義できない
            return vec![false; vectors.len()];
        }

        let feature_count = vectors[0].features.len();
        let n = vectors.len() as f64;

        let mut means = vec![0.0; feature_count];
        for v in vectors {
            for (i, &x) in v.features.iter().enumerate() {
                means[i] += x;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut std_devs = vec![0.0; feature_count];
        for v in vectors {
            for (i, &x) in v.features.iter().enumerate() {
                std_devs[i] += (x - means[i]).powi(2);
            }
        }
        for std_dev in &mut std_devs {
            *std_dev = (*std_dev / n).sqrt();
        }

        vectors
            .iter()
            .map(|v| {
                let flagged = v.features.iter().enumerate().any(|(i, &x)| {
                    if std_devs[i] < f64::EPSILON {
                        return false;
                    }
                    (x - means[i]).abs() >= self.k_sigma * std_devs[i]
                });
                if flagged {
                    debug!(
                        "Statistical flag: record={}, k_sigma={}",
                        v.transaction_id, self.k_sigma
                    );
                }
                flagged
            })
            .collect()
    }
}
