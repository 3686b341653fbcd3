//! Record Source
//!
//! トランザクションレコードの供給元。パイプラインは pull インターフェース
//! として扱い、設定された間隔で `next_record` を呼び出します。
//! `SyntheticRecordSource` は重み付きカテゴリ分布と低確率の異常注入を
//! 備えた合成データを生成します。

use super::record::{round2, TransactionRecord};
use async_trait::async_trait;
use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

/// レコード供給元の抽象
#[async_trait]
pub trait RecordSource: Send {
    /// 次のトランザクションレコードを生成
    async fn next_record(&mut self) -> TransactionRecord;
}

/// カテゴリ定義（名称、価格帯、出現重み）
const CATEGORIES: [(&str, f64, f64, f64); 6] = [
    ("Electronics", 50.0, 2000.0, 0.15),
    ("Clothing", 10.0, 200.0, 0.25),
    ("Food & Beverages", 1.0, 50.0, 0.30),
    ("Home & Garden", 5.0, 500.0, 0.15),
    ("Books & Media", 5.0, 100.0, 0.10),
    ("Toys & Games", 5.0, 150.0, 0.05),
];

/// カテゴリ別の商品名
const PRODUCTS: [&[&str]; 6] = [
    &[
        "Smartphone X1",
        "Laptop Pro",
        "Wireless Headphones",
        "Tablet Plus",
        "Smart Watch",
        "Gaming Console",
        "Bluetooth Speaker",
        "Digital Camera",
        "USB Cable",
        "Power Bank",
        "Monitor 24\"",
        "Keyboard Wireless",
    ],
    &[
        "Cotton T-Shirt",
        "Denim Jeans",
        "Running Shoes",
        "Casual Dress",
        "Winter Jacket",
        "Sports Shorts",
        "Polo Shirt",
        "Sneakers",
        "Hoodie",
        "Business Suit",
        "Summer Hat",
        "Leather Belt",
    ],
    &[
        "Premium Coffee",
        "Organic Juice",
        "Energy Drink",
        "Protein Bar",
        "Chocolate Cookies",
        "Fresh Bread",
        "Mineral Water",
        "Green Tea",
        "Instant Noodles",
        "Fruit Salad",
        "Yogurt Cup",
        "Energy Smoothie",
    ],
    &[
        "LED Light Bulb",
        "Plant Pot",
        "Kitchen Utensils",
        "Bathroom Towel",
        "Garden Hose",
        "Storage Box",
        "Picture Frame",
        "Cleaning Spray",
        "Candle Set",
        "Door Mat",
        "Wall Clock",
        "Flower Vase",
    ],
    &[
        "Best Seller Novel",
        "Programming Guide",
        "Cookbook",
        "Art Magazine",
        "Children Book",
        "Biography",
        "Science Journal",
        "Travel Guide",
        "Music CD",
        "Documentary DVD",
        "Comic Book",
        "Poetry Collection",
    ],
    &[
        "Board Game Classic",
        "Action Figure",
        "Puzzle 1000pc",
        "RC Car",
        "Building Blocks",
        "Doll House",
        "Educational Toy",
        "Card Game",
        "Stuffed Animal",
        "Art Supplies",
        "Musical Instrument",
        "Sports Ball",
    ],
];

const PAYMENT_METHODS: [&str; 4] = ["Credit Card", "Debit Card", "Cash", "Digital Wallet"];

/// 数量の出現重み（1, 2, 3, 4, 5〜10個）
const QUANTITY_WEIGHTS: [f64; 5] = [0.6, 0.25, 0.1, 0.04, 0.01];

/// 異常トランザクションの注入確率（2%）
const ANOMALY_CHANCE: f64 = 0.02;

/// 店舗数
const STORE_COUNT: u32 = 20;

/// 合成トランザクション生成器
///
/// シード付き乱数生成器を使うため、同じシードからは同じレコード列が
/// 生成されます（ID とタイムスタンプを除く）。
pub struct SyntheticRecordSource {
    rng: StdRng,
}

impl SyntheticRecordSource {
    /// 指定シードで生成器を作成
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 重み付きでカテゴリインデックスを選択
    fn pick_category(&mut self) -> usize {
        let roll: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for (i, (_, _, _, weight)) in CATEGORIES.iter().enumerate() {
            cumulative += weight;
            if roll < cumulative {
                return i;
            }
        }
        CATEGORIES.len() - 1
    }

    /// 重み付きで数量を選択
    fn pick_quantity(&mut self) -> u32 {
        let roll: f64 = self.rng.gen();
        let mut cumulative = 0.0;
        for (i, weight) in QUANTITY_WEIGHTS.iter().enumerate() {
            cumulative += weight;
            if roll < cumulative {
                return match i {
                    0..=3 => (i + 1) as u32,
                    _ => self.rng.gen_range(5..=10),
                };
            }
        }
        1
    }

    /// トランザクションを1件生成
    pub fn generate(&mut self) -> TransactionRecord {
        let cat_idx = self.pick_category();
        let (category, min_price, max_price, _) = CATEGORIES[cat_idx];
        let product = PRODUCTS[cat_idx][self.rng.gen_range(0..PRODUCTS[cat_idx].len())];

        let mut unit_price = round2(self.rng.gen_range(min_price..max_price));
        let mut quantity = self.pick_quantity();

        // 低確率で異常トランザクションを注入（価格または数量の倍増）
        if self.rng.gen::<f64>() < ANOMALY_CHANCE {
            if self.rng.gen_bool(0.5) {
                let multiplier = self.rng.gen_range(5.0..20.0);
                unit_price = round2(unit_price * multiplier);
                debug!("Injecting high-price anomaly: unit_price={:.2}", unit_price);
            } else {
                quantity *= self.rng.gen_range(10..=50);
                debug!("Injecting high-quantity anomaly: quantity={}", quantity);
            }
        }

        let store_id = format!("STORE_{:03}", self.rng.gen_range(1..=STORE_COUNT));
        let customer_id = format!("CUST_{}", self.rng.gen_range(1000..=9999));
        let payment = PAYMENT_METHODS[self.rng.gen_range(0..PAYMENT_METHODS.len())];

        TransactionRecord::new(
            Utc::now(),
            store_id,
            product,
            category,
            customer_id,
            payment,
            quantity,
            unit_price,
        )
    }
}

#[async_trait]
impl RecordSource for SyntheticRecordSource {
    async fn next_record(&mut self) -> TransactionRecord {
        self.generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_record_is_consistent() {
        let mut source = SyntheticRecordSource::new(42);

        for _ in 0..200 {
            let record = source.generate();
            assert!(record.quantity >= 1);
            assert!(record.unit_price > 0.0);
            assert!(record.total_amount >= record.subtotal);
            assert!(record.store_id.starts_with("STORE_"));
            assert!(CATEGORIES.iter().any(|(name, _, _, _)| *name == record.category));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SyntheticRecordSource::new(7);
        let mut b = SyntheticRecordSource::new(7);

        for _ in 0..50 {
            let ra = a.generate();
            let rb = b.generate();
            assert_eq!(ra.category, rb.category);
            assert_eq!(ra.quantity, rb.quantity);
            assert_eq!(ra.unit_price, rb.unit_price);
            assert_eq!(ra.store_id, rb.store_id);
        }
    }

    #[test]
    fn test_category_weights_roughly_hold() {
        let mut source = SyntheticRecordSource::new(123);
        let mut food_count = 0;
        let total = 2000;

        for _ in 0..total {
            if source.generate().category == "Food & Beverages" {
                food_count += 1;
            }
        }

        // 重み0.30のカテゴリが極端に外れないことだけ確認
        let ratio = food_count as f64 / total as f64;
        assert!(ratio > 0.2 && ratio < 0.4, "unexpected ratio: {}", ratio);
    }
}
