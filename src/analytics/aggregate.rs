//! Aggregation Engine
//!
//! ウィンドウスナップショットからグループ別メトリクスを計算します。
//! 入力のみに依存する純粋関数であり、同じスナップショットに対しては
//! 常に同じ結果を返します（隠れた状態を持ちません）。

use crate::stream::TransactionRecord;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 欠損・空のグループキーの受け皿
pub const UNKNOWN_BUCKET: &str = "unknown";

/// グループ別メトリクス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMetrics {
    /// トランザクション数
    pub count: usize,
    /// 合計金額
    pub total_amount: f64,
    /// 平均金額
    pub mean_amount: f64,
}

/// ウィンドウ全体のサマリ統計
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// 総売上
    pub total_revenue: f64,
    /// トランザクション総数
    pub total_transactions: usize,
    /// 平均取引額
    pub average_transaction_value: f64,
    /// 販売数量合計
    pub total_units_sold: u64,
    /// ユニーク商品数
    pub unique_products: usize,
    /// ユニーク顧客数
    pub unique_customers: usize,
    /// ユニーク店舗数
    pub unique_stores: usize,
}

/// 集計スナップショット
///
/// 1回の計算サイクルのみ有効な派生値。常にウィンドウの現在の内容から
/// 再計算され、増分更新は行いません。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// サマリ統計
    pub summary: SummaryStats,
    /// 店舗別メトリクス
    pub by_store: HashMap<String, GroupMetrics>,
    /// カテゴリ別メトリクス
    pub by_category: HashMap<String, GroupMetrics>,
    /// 時間帯（0〜23時）別メトリクス
    pub by_hour: HashMap<u32, GroupMetrics>,
    /// 顧客別メトリクス
    pub by_customer: HashMap<String, GroupMetrics>,
}

impl AggregateSnapshot {
    /// 正規化済みキーでカテゴリ平均を引く
    pub fn category_mean(&self, category: &str) -> Option<f64> {
        self.by_category
            .get(&normalize_key(category))
            .map(|m| m.mean_amount)
    }

    /// ウィンドウ全体の平均取引額
    pub fn global_mean(&self) -> f64 {
        self.summary.average_transaction_value
    }
}

/// グループキーを正規化（トリム + 小文字化、空は `unknown` バケツへ）
pub fn normalize_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        UNKNOWN_BUCKET.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// 集計エンジン
#[derive(Debug, Clone, Default)]
pub struct AggregationEngine;

impl AggregationEngine {
    /// 新しい集計エンジンを作成
    pub fn new() -> Self {
        Self
    }

    /// ウィンドウスナップショットを集計
    ///
    /// 空のウィンドウに対してはゼロ値のスナップショットを返します
    /// （エラーにはしません）。
    pub fn aggregate(&self, records: &[TransactionRecord]) -> AggregateSnapshot {
        if records.is_empty() {
            return AggregateSnapshot::default();
        }

        let mut by_store: HashMap<String, GroupMetrics> = HashMap::new();
        let mut by_category: HashMap<String, GroupMetrics> = HashMap::new();
        let mut by_hour: HashMap<u32, GroupMetrics> = HashMap::new();
        let mut by_customer: HashMap<String, GroupMetrics> = HashMap::new();

        let mut total_revenue = 0.0;
        let mut total_units: u64 = 0;
        let mut products: HashSet<&str> = HashSet::new();
        let mut customers: HashSet<&str> = HashSet::new();
        let mut stores: HashSet<&str> = HashSet::new();

        for record in records {
            total_revenue += record.total_amount;
            total_units += record.quantity as u64;
            products.insert(record.product_name.as_str());
            customers.insert(record.customer_id.as_str());
            stores.insert(record.store_id.as_str());

            accumulate(&mut by_store, normalize_key(&record.store_id), record);
            accumulate(&mut by_category, normalize_key(&record.category), record);
            accumulate(&mut by_hour, record.timestamp.hour(), record);
            accumulate(&mut by_customer, normalize_key(&record.customer_id), record);
        }

        finalize_means(&mut by_store);
        finalize_means(&mut by_category);
        finalize_means(&mut by_hour);
        finalize_means(&mut by_customer);

        AggregateSnapshot {
            summary: SummaryStats {
                total_revenue,
                total_transactions: records.len(),
                average_transaction_value: total_revenue / records.len() as f64,
                total_units_sold: total_units,
                unique_products: products.len(),
                unique_customers: customers.len(),
                unique_stores: stores.len(),
            },
            by_store,
            by_category,
            by_hour,
            by_customer,
        }
    }
}

fn accumulate<K: std::hash::Hash + Eq>(
    groups: &mut HashMap<K, GroupMetrics>,
    key: K,
    record: &TransactionRecord,
) {
    let entry = groups.entry(key).or_default();
    entry.count += 1;
    entry.total_amount += record.total_amount;
}

fn finalize_means<K>(groups: &mut HashMap<K, GroupMetrics>) {
    for metrics in groups.values_mut() {
        if metrics.count > 0 {
            metrics.mean_amount = metrics.total_amount / metrics.count as f64;
        }
    }
}
