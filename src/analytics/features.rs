//! Feature Extraction
//!
//! トランザクションレコードから検知用の特徴量ベクトルを導出します。
//! すべてのレコードに対して固定長・固定順のベクトルを生成します。

use super::aggregate::AggregateSnapshot;
use crate::error::{Error, Result};
use crate::stream::TransactionRecord;
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 特徴量の名前（ベクトルの並び順と一致）
pub const FEATURE_NAMES: [&str; 6] = [
    "amount",
    "quantity",
    "unit_price",
    "hour_of_day",
    "day_of_week",
    "category_deviation",
];

/// 特徴量ベクトル
///
/// 1回の検知サイクルの間だけ有効な派生値。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// 元レコードのトランザクションID
    pub transaction_id: Uuid,
    /// 特徴量データ（[`FEATURE_NAMES`] の順）
    pub features: Vec<f64>,
}

/// 特徴量抽出器
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// 新しい特徴量抽出器を作成
    pub fn new() -> Self {
        Self
    }

    /// レコードと集計コンテキストから特徴量ベクトルを構築
    ///
    /// カテゴリ平均からの乖離を特徴量に含めるため、現在の
    /// [`AggregateSnapshot`] をコンテキストとして受け取ります。
    /// コンテキストにそのカテゴリが存在しない場合、乖離の基準は
    /// ウィンドウ全体の平均にフォールバックします（ゼロではなく。
    /// ゼロ基準は金額そのものが乖離となり、疑似的な外れ値を生みます）。
    ///
    /// 数値として使えない生フィールドがあるレコードは
    /// [`Error::Feature`] で拒否されます（そのレコードのみ）。
    pub fn build(
        &self,
        record: &TransactionRecord,
        context: &AggregateSnapshot,
    ) -> Result<FeatureVector> {
        if record.quantity == 0 {
            return Err(Error::feature(format!(
                "record {}: quantity must be positive",
                record.transaction_id
            )));
        }
        if !record.unit_price.is_finite() || record.unit_price <= 0.0 {
            return Err(Error::feature(format!(
                "record {}: unit_price is missing or not a positive number",
                record.transaction_id
            )));
        }
        if !record.total_amount.is_finite() {
            return Err(Error::feature(format!(
                "record {}: total_amount is not numeric",
                record.transaction_id
            )));
        }

        let baseline = context
            .category_mean(&record.category)
            .unwrap_or_else(|| context.global_mean());

        let features = vec![
            record.total_amount,
            record.quantity as f64,
            record.unit_price,
            record.timestamp.hour() as f64,
            record.timestamp.weekday().num_days_from_monday() as f64,
            record.total_amount - baseline,
        ];

        debug_assert_eq!(features.len(), FEATURE_NAMES.len());

        Ok(FeatureVector {
            transaction_id: record.transaction_id,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::aggregate::AggregationEngine;
    use chrono::{TimeZone, Utc};

    fn record(category: &str, quantity: u32, price: f64) -> TransactionRecord {
        TransactionRecord::new(
            Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).unwrap(),
            "STORE_003",
            "Green Tea",
            category,
            "CUST_2000",
            "Debit Card",
            quantity,
            price,
        )
    }

    #[test]
    fn test_fixed_length_and_order() {
        let builder = FeatureBuilder::new();
        let records = vec![record("Food & Beverages", 2, 3.0)];
        let context = AggregationEngine::new().aggregate(&records);

        let fv = builder.build(&records[0], &context).unwrap();
        assert_eq!(fv.features.len(), FEATURE_NAMES.len());
        assert_eq!(fv.features[0], records[0].total_amount);
        assert_eq!(fv.features[1], 2.0);
        assert_eq!(fv.features[3], 9.0); // hour_of_day
    }

    #[test]
    fn test_missing_category_falls_back_to_global_mean() {
        let builder = FeatureBuilder::new();
        let known = vec![
            record("Electronics", 1, 100.0),
            record("Electronics", 1, 200.0),
        ];
        let context = AggregationEngine::new().aggregate(&known);

        let stranger = record("Collectibles", 1, 150.0);
        let fv = builder.build(&stranger, &context).unwrap();

        let expected = stranger.total_amount - context.global_mean();
        assert!((fv.features[5] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unusable_fields_yield_feature_error() {
        let builder = FeatureBuilder::new();
        let context = AggregateSnapshot::default();

        let mut broken = record("Electronics", 1, 10.0);
        broken.unit_price = f64::NAN;
        assert!(matches!(
            builder.build(&broken, &context),
            Err(Error::Feature(_))
        ));

        let mut broken = record("Electronics", 1, 10.0);
        broken.quantity = 0;
        assert!(matches!(
            builder.build(&broken, &context),
            Err(Error::Feature(_))
        ));
    }
}
