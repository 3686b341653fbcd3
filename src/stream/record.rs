//! Transaction Record
//!
//! 小売トランザクションの値型。レコードソースが生成し、ウィンドウに
//! 追加された後は変更されません。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 消費税率（8%）
pub const TAX_RATE: f64 = 0.08;

/// 小売トランザクションレコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// トランザクションID（一意）
    pub transaction_id: Uuid,
    /// 発生時刻
    pub timestamp: DateTime<Utc>,
    /// 店舗ID
    pub store_id: String,
    /// 商品名
    pub product_name: String,
    /// 商品カテゴリ
    pub category: String,
    /// 顧客ID
    pub customer_id: String,
    /// 支払い方法
    pub payment_method: String,
    /// 数量
    pub quantity: u32,
    /// 単価
    pub unit_price: f64,
    /// 小計（数量 × 単価）
    pub subtotal: f64,
    /// 税額
    pub tax_amount: f64,
    /// 合計金額（小計 + 税額）
    pub total_amount: f64,
}

impl TransactionRecord {
    /// 金額フィールドを単価と数量から計算してレコードを作成
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: DateTime<Utc>,
        store_id: impl Into<String>,
        product_name: impl Into<String>,
        category: impl Into<String>,
        customer_id: impl Into<String>,
        payment_method: impl Into<String>,
        quantity: u32,
        unit_price: f64,
    ) -> Self {
        let subtotal = round2(unit_price * quantity as f64);
        let tax_amount = round2(subtotal * TAX_RATE);
        let total_amount = round2(subtotal + tax_amount);

        Self {
            transaction_id: Uuid::new_v4(),
            timestamp,
            store_id: store_id.into(),
            product_name: product_name.into(),
            category: category.into(),
            customer_id: customer_id.into(),
            payment_method: payment_method.into(),
            quantity,
            unit_price,
            subtotal,
            tax_amount,
            total_amount,
        }
    }
}

/// 小数第2位に丸める（金額計算用）
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_calculation() {
        let record = TransactionRecord::new(
            Utc::now(),
            "STORE_001",
            "Premium Coffee",
            "Food & Beverages",
            "CUST_1234",
            "Cash",
            3,
            4.50,
        );

        assert_eq!(record.subtotal, 13.5);
        assert_eq!(record.tax_amount, 1.08);
        assert_eq!(record.total_amount, 14.58);
    }

    #[test]
    fn test_unique_ids() {
        let a = TransactionRecord::new(
            Utc::now(),
            "STORE_001",
            "USB Cable",
            "Electronics",
            "CUST_1000",
            "Credit Card",
            1,
            9.99,
        );
        let b = a.clone();
        let c = TransactionRecord::new(
            Utc::now(),
            "STORE_001",
            "USB Cable",
            "Electronics",
            "CUST_1000",
            "Credit Card",
            1,
            9.99,
        );

        assert_eq!(a.transaction_id, b.transaction_id);
        assert_ne!(a.transaction_id, c.transaction_id);
    }
}
