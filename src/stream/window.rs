//! Sliding Window Buffer
//!
//! 直近Nレコードを保持する固定容量の順序付きバッファ。
//! 追加と退避は1つの書き込みロック内で不可分に行われ、スナップショットは
//! 常に長さ整合の取れたビューを返します。

use super::record::TransactionRecord;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// ウィンドウ内容の一貫したコピー
///
/// `version` はウィンドウ生成以降に追加されたレコードの累積数
/// （単調増加）。モデル再学習の周期判定はこの値を基準にします。
#[derive(Debug, Clone)]
pub struct WindowSnapshot {
    /// 到着順のレコード列（最大でウィンドウ容量）
    pub records: Vec<TransactionRecord>,
    /// スナップショット時点の累積追加数
    pub version: u64,
}

struct WindowInner {
    buffer: VecDeque<TransactionRecord>,
    appended_total: u64,
}

/// スライディングウィンドウバッファ
#[derive(Clone)]
pub struct SlidingWindow {
    inner: Arc<RwLock<WindowInner>>,
    capacity: usize,
}

impl SlidingWindow {
    /// 指定容量でウィンドウを作成
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::config("window capacity must be positive"));
        }
        Ok(Self {
            inner: Arc::new(RwLock::new(WindowInner {
                buffer: VecDeque::with_capacity(capacity),
                appended_total: 0,
            })),
            capacity,
        })
    }

    /// レコードを末尾に追加
    ///
    /// 容量を超える場合は先頭（最古）から退避します。退避と挿入は
    /// 1回のロック取得内で完結する不可分な操作です。
    pub async fn append(&self, record: TransactionRecord) {
        let mut inner = self.inner.write().await;
        if inner.buffer.len() >= self.capacity {
            inner.buffer.pop_front();
        }
        inner.buffer.push_back(record);
        inner.appended_total += 1;
    }

    /// 退避せずに末尾へ追加する（不変条件チェックのテスト用）
    #[cfg(test)]
    pub(crate) async fn push_unchecked(&self, record: TransactionRecord) {
        let mut inner = self.inner.write().await;
        inner.buffer.push_back(record);
        inner.appended_total += 1;
    }

    /// 現在の内容の一貫したコピーを取得
    ///
    /// 長さが容量を超えていた場合はロック制御のバグであり、
    /// `BufferInvariant` エラーを返します。
    pub async fn snapshot(&self) -> Result<WindowSnapshot> {
        let inner = self.inner.read().await;
        if inner.buffer.len() > self.capacity {
            return Err(Error::BufferInvariant(format!(
                "window holds {} records but capacity is {}",
                inner.buffer.len(),
                self.capacity
            )));
        }
        Ok(WindowSnapshot {
            records: inner.buffer.iter().cloned().collect(),
            version: inner.appended_total,
        })
    }

    /// 現在のレコード数
    pub async fn len(&self) -> usize {
        self.inner.read().await.buffer.len()
    }

    /// ウィンドウが空かどうか
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.buffer.is_empty()
    }

    /// ウィンドウ容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(amount: f64) -> TransactionRecord {
        TransactionRecord::new(
            Utc::now(),
            "STORE_001",
            "Mineral Water",
            "Food & Beverages",
            "CUST_1000",
            "Cash",
            1,
            amount,
        )
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(SlidingWindow::new(0).is_err());
    }

    #[tokio::test]
    async fn test_append_within_capacity() {
        let window = SlidingWindow::new(5).unwrap();
        for i in 0..3 {
            window.append(record(10.0 + i as f64)).await;
        }
        assert_eq!(window.len().await, 3);
    }

    #[tokio::test]
    async fn test_eviction_keeps_last_n_in_order() {
        let window = SlidingWindow::new(5).unwrap();
        for i in 0..8 {
            window.append(record(i as f64 + 1.0)).await;
        }

        let snapshot = window.snapshot().await.unwrap();
        assert_eq!(snapshot.records.len(), 5);
        assert_eq!(snapshot.version, 8);

        let prices: Vec<f64> = snapshot.records.iter().map(|r| r.unit_price).collect();
        assert_eq!(prices, vec![4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[tokio::test]
    async fn test_version_is_monotonic() {
        let window = SlidingWindow::new(2).unwrap();
        window.append(record(1.0)).await;
        let v1 = window.snapshot().await.unwrap().version;
        window.append(record(2.0)).await;
        window.append(record(3.0)).await;
        let v2 = window.snapshot().await.unwrap().version;
        assert_eq!(v1, 1);
        assert_eq!(v2, 3);
    }

    #[tokio::test]
    async fn test_over_capacity_snapshot_is_an_error() {
        let window = SlidingWindow::new(2).unwrap();
        window.append(record(1.0)).await;
        window.append(record(2.0)).await;
        window.push_unchecked(record(3.0)).await;

        let result = window.snapshot().await;
        assert!(matches!(result, Err(Error::BufferInvariant(_))));
    }

    #[tokio::test]
    async fn test_concurrent_append_and_snapshot() {
        let window = SlidingWindow::new(100).unwrap();
        let writer = window.clone();

        let handle = tokio::spawn(async move {
            for i in 0..500 {
                writer.append(record(i as f64)).await;
            }
        });

        // 並行スナップショットは常に長さ整合が取れていること
        for _ in 0..50 {
            let snapshot = window.snapshot().await.unwrap();
            assert!(snapshot.records.len() <= 100);
        }

        handle.await.unwrap();
        assert_eq!(window.len().await, 100);
    }
}
