use anyhow::Result;
use clap::Parser;
use retail_analytics_rs::logging::{init_logging, LogConfig};
use retail_analytics_rs::{AnalyticsConfig, StreamPipeline, SyntheticRecordSource};
use std::path::PathBuf;
use tracing::info;

/// Real-time retail analytics demo: synthetic stream + anomaly detection
#[derive(Debug, Parser)]
#[command(name = "retail-analytics", version)]
struct Args {
    /// Sliding window capacity
    #[arg(long, default_value_t = 1000)]
    window_capacity: usize,

    /// Ingestion interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    tick_interval_ms: u64,

    /// Statistical threshold in standard deviations
    #[arg(long, default_value_t = 3.0)]
    k_sigma: f64,

    /// Records between model refits
    #[arg(long, default_value_t = 50)]
    refit_interval: u64,

    /// Expected anomalous fraction of the window (0, 1)
    #[arg(long, default_value_t = 0.05)]
    contamination: f64,

    /// Minimum records before the first model fit
    #[arg(long, default_value_t = 30)]
    min_fit_samples: usize,

    /// Seed for the synthetic record source
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Optional log directory (daily rotation)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// KPI report interval in seconds
    #[arg(long, default_value_t = 10)]
    report_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _guard = init_logging(&LogConfig {
        log_dir: args.log_dir.clone(),
        ..Default::default()
    })?;

    let config = AnalyticsConfig {
        window_capacity: args.window_capacity,
        k_sigma: args.k_sigma,
        refit_interval: args.refit_interval,
        contamination: args.contamination,
        min_fit_samples: args.min_fit_samples,
        tick_interval_ms: args.tick_interval_ms,
        seed: args.seed,
        ..Default::default()
    };

    let pipeline = StreamPipeline::new(&config)?;
    let tasks = pipeline.start(SyntheticRecordSource::new(config.seed));

    let report = {
        let pipeline = pipeline.clone();
        let interval = std::time::Duration::from_secs(args.report_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let latest = pipeline.latest().await;
                let flagged = latest
                    .verdicts
                    .iter()
                    .filter(|v| v.combined_flag)
                    .count();
                info!(
                    "KPI: window={} revenue={:.2} avg={:.2} flagged={} model={:?} (gen {})",
                    latest.window_len,
                    latest.aggregates.summary.total_revenue,
                    latest.aggregates.summary.average_transaction_value,
                    flagged,
                    latest.model.state,
                    latest.model.model_generation,
                );
            }
        })
    };

    info!("Pipeline running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    pipeline.stop();
    report.abort();
    tasks.join().await;

    let latest = pipeline.latest().await;
    info!(
        "Stopped. Final window: {} records, {} verdicts, {} recent errors",
        latest.window_len,
        latest.verdicts.len(),
        latest.recent_errors.len(),
    );

    Ok(())
}
