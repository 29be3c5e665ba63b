use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use byeblock_core::{LatencySample, MonitorConfig, ProxyConfigProvider, ProxyStore, SettingsProxyProvider};
use byeblock_monitor::{
    format_sample, LatencyProbe, ProbeScheduler, SchedulerConfig, SettingsWatcher, UreqTransport, WindowStats,
};
use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Runs the monitor until Ctrl-C or until `duration` elapses, printing every
/// published sample and a window summary at the end.
pub async fn run(cfg: &MonitorConfig, duration: Option<Duration>, json: bool) -> Result<()> {
    let store = ProxyStore::load(&cfg.settings_path)
        .with_context(|| format!("loading proxy settings from {}", cfg.settings_path.display()))?;
    let store = Arc::new(RwLock::new(store));
    let provider = SettingsProxyProvider::new(Arc::clone(&store));
    match provider.current_proxy() {
        Some(ep) if !UreqTransport::supports_proxy(ep.kind()) => {
            warn!(proxy = %ep, kind = %ep.kind(), "proxy kind not supported by this build; every probe will fail")
        }
        Some(ep) => info!(proxy = %ep, target = %cfg.target_url, "monitoring"),
        None => warn!("no proxy selected; samples will report unreachable until one is selected"),
    }

    let probe = LatencyProbe::from_config(cfg)?;
    let scheduler = ProbeScheduler::new(SchedulerConfig::from(cfg), Arc::new(provider), Arc::new(probe))?;
    let mut samples = scheduler.subscribe();
    // a `byeblock proxy select` from another shell applies on the next cycle
    let watcher = match SettingsWatcher::spawn(&cfg.settings_path, Arc::clone(&store)) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(error = %e, "proxy settings will not be reloaded while running");
            None
        }
    };

    scheduler.start().await;

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
            received = samples.recv() => match received {
                Ok(sample) => print_sample(&sample, json)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output fell behind, samples dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    scheduler.stop().await;
    drop(watcher);

    let stats = WindowStats::from_samples(&scheduler.snapshot());
    if json {
        println!("{}", serde_json::to_string(&serde_json::json!({ "summary": stats }))?);
    } else {
        println!("{}", summary_line(&stats));
    }
    Ok(())
}

fn print_sample(sample: &LatencySample, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(sample)?);
    } else {
        println!("{}", format_sample(sample));
    }
    Ok(())
}

fn summary_line(stats: &WindowStats) -> String {
    let ms = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v:.0}"));
    format!(
        "window: {} samples, {} ok, {} failed ({:.1}% loss), min/mean/max: {}/{}/{} ms",
        stats.total,
        stats.ok_count,
        stats.failure_count,
        stats.loss_ratio * 100.0,
        ms(stats.min_ms),
        ms(stats.mean_ms),
        ms(stats.max_ms),
    )
}
