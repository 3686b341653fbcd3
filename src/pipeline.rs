//! Stream Pipeline
//!
//! レコード供給元からの取り込み（プロデューサ）と検知サイクル
//! （コンシューマ）を別々の tokio タスクとして走らせ、共有の
//! スライディングウィンドウで連結します。モデル再学習はコンシューマ側の
//! サイクル内で行われるため、遅い学習は判定の公開を遅らせるだけで、
//! 取り込みを止めることはありません。
//!
//! 停止後もウィンドウと最後に公開された判定は照会可能なまま残ります。

use crate::analytics::AggregateSnapshot;
use crate::config::AnalyticsConfig;
use crate::detect::{AnomalyVerdict, DetectionCoordinator, ModelState, ModelStats};
use crate::error::Result;
use crate::stream::{RecordSource, SlidingWindow, TransactionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// プレゼンテーション層に公開する最新状態
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// 現在の集計スナップショット
    pub aggregates: AggregateSnapshot,
    /// 現在のウィンドウに対する判定列（ウィンドウ順）
    pub verdicts: Vec<AnomalyVerdict>,
    /// モデル検知器の状態
    pub model: ModelStats,
    /// 直近のエラー面
    pub recent_errors: Vec<String>,
    /// サイクル時点のウィンドウ長
    pub window_len: usize,
    /// サイクル時点のウィンドウバージョン
    pub version: u64,
}

impl PipelineSnapshot {
    fn empty() -> Self {
        Self {
            aggregates: AggregateSnapshot::default(),
            verdicts: Vec::new(),
            model: ModelStats {
                state: ModelState::Unfitted,
                fitted_at_version: None,
                model_generation: 0,
                training_samples: 0,
            },
            recent_errors: Vec::new(),
            window_len: 0,
            version: 0,
        }
    }
}

/// 起動済みパイプラインのタスクハンドル
pub struct PipelineTasks {
    /// 取り込みタスク
    pub producer: JoinHandle<()>,
    /// 検知サイクルタスク
    pub consumer: JoinHandle<()>,
}

impl PipelineTasks {
    /// 両タスクの終了を待つ
    ///
    /// パニックで落ちたタスクがあってもエラーログを残して完了します。
    pub async fn join(self) {
        let (producer, consumer) = futures::future::join(self.producer, self.consumer).await;
        if let Err(e) = producer {
            error!("Producer task aborted: {}", e);
        }
        if let Err(e) = consumer {
            error!("Consumer task aborted: {}", e);
        }
    }
}

/// ストリーミング分析パイプライン
#[derive(Clone)]
pub struct StreamPipeline {
    window: SlidingWindow,
    coordinator: Arc<Mutex<DetectionCoordinator>>,
    published: Arc<RwLock<PipelineSnapshot>>,
    cancel: CancellationToken,
    tick_interval: Duration,
}

impl StreamPipeline {
    /// 検証済み設定からパイプラインを構築
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            window: SlidingWindow::new(config.window_capacity)?,
            coordinator: Arc::new(Mutex::new(DetectionCoordinator::new(config)?)),
            published: Arc::new(RwLock::new(PipelineSnapshot::empty())),
            cancel: CancellationToken::new(),
            tick_interval: Duration::from_millis(config.tick_interval_ms),
        })
    }

    /// レコードを1件取り込む
    pub async fn append(&self, record: TransactionRecord) {
        self.window.append(record).await;
    }

    /// 検知サイクルを1回実行し、結果を公開する
    ///
    /// スナップショットの不変条件違反はロック制御の内部バグであり
    /// 回復不能ですが、直近エラー面には記録したうえでエラーを返します。
    pub async fn cycle_now(&self) -> Result<PipelineSnapshot> {
        let snapshot = match self.window.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let mut coordinator = self.coordinator.lock().await;
                coordinator.record_error(e.to_string());
                self.published.write().await.recent_errors = coordinator.recent_errors();
                return Err(e);
            }
        };

        let published = {
            let mut coordinator = self.coordinator.lock().await;
            let output = coordinator.cycle(&snapshot);
            PipelineSnapshot {
                aggregates: output.aggregates,
                verdicts: output.verdicts,
                model: output.model,
                recent_errors: coordinator.recent_errors(),
                window_len: snapshot.records.len(),
                version: snapshot.version,
            }
        };

        *self.published.write().await = published.clone();
        Ok(published)
    }

    /// プロデューサ／コンシューマのタスクを起動
    pub fn start<S: RecordSource + 'static>(&self, mut source: S) -> PipelineTasks {
        info!(
            "Starting stream pipeline: capacity={}, tick={:?}",
            self.window.capacity(),
            self.tick_interval
        );

        let window = self.window.clone();
        let cancel = self.cancel.clone();
        let interval = self.tick_interval;
        let producer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let record = source.next_record().await;
                        window.append(record).await;
                    }
                }
            }
            info!("Producer task stopped");
        });

        let pipeline = self.clone();
        let cancel = self.cancel.clone();
        let consumer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = pipeline.cycle_now().await {
                            // 不変条件違反は回復不能なのでストリーム全体を止める
                            error!("Detection cycle failed, stopping pipeline: {}", e);
                            pipeline.cancel.cancel();
                            break;
                        }
                    }
                }
            }
            info!("Consumer task stopped");
        });

        PipelineTasks { producer, consumer }
    }

    /// ストリームを停止
    ///
    /// 実行中の追加・サイクルは完了してから終了するため、ウィンドウが
    /// 途中状態で残ることはありません。
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// 最後に公開された状態
    pub async fn latest(&self) -> PipelineSnapshot {
        self.published.read().await.clone()
    }

    /// 現在の集計スナップショット
    pub async fn aggregates(&self) -> AggregateSnapshot {
        self.published.read().await.aggregates.clone()
    }

    /// 現在のウィンドウに対する判定列
    pub async fn verdicts(&self) -> Vec<AnomalyVerdict> {
        self.published.read().await.verdicts.clone()
    }

    /// モデル検知器の状態
    pub async fn model_stats(&self) -> ModelStats {
        self.published.read().await.model.clone()
    }

    /// 直近のエラー面
    pub async fn recent_errors(&self) -> Vec<String> {
        self.published.read().await.recent_errors.clone()
    }

    /// 現在のウィンドウ長
    pub async fn window_len(&self) -> usize {
        self.window.len().await
    }
}
