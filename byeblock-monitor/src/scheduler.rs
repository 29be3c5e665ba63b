#![forbid(unsafe_code)]

//! Background probe loop.
//!
//! State machine: `Idle --start()--> Running --stop()--> Idle`. While running,
//! one tokio task repeats: read the proxy, measure, push into the window,
//! publish, then wait `interval` (a post-probe delay, not a fixed-rate clock).

use std::{sync::Arc, time::Duration};

use byeblock_core::{LatencySample, MonitorConfig, ProbeState, ProxyConfigProvider, Result};
use parking_lot::RwLock;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::probe::Probe;

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay after each published sample.
    pub interval: Duration,
    /// Rolling window length.
    pub window: usize,
    /// Per-subscriber backlog before old samples are dropped.
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: byeblock_core::types::DEFAULT_INTERVAL,
            window: byeblock_core::types::DEFAULT_WINDOW,
            event_capacity: 64,
        }
    }
}

impl From<&MonitorConfig> for SchedulerConfig {
    fn from(cfg: &MonitorConfig) -> Self {
        Self { interval: cfg.interval(), window: cfg.window, event_capacity: cfg.event_capacity }
    }
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

struct LoopContext {
    interval: Duration,
    provider: Arc<dyn ProxyConfigProvider>,
    probe: Arc<dyn Probe>,
    buffer: Arc<SampleBuffer>,
    events: broadcast::Sender<LatencySample>,
}

/// Owns the probe loop, the rolling window and the live sample channel.
pub struct ProbeScheduler {
    interval: Duration,
    provider: Arc<dyn ProxyConfigProvider>,
    probe: Arc<dyn Probe>,
    buffer: Arc<SampleBuffer>,
    events: broadcast::Sender<LatencySample>,
    // serialises start/stop so a restart never overlaps a stopping loop
    running: Mutex<Option<Running>>,
    state: RwLock<ProbeState>,
}

impl ProbeScheduler {
    /// Creates an idle scheduler and its sentinel-filled window.
    ///
    /// # Errors
    /// Returns a config error when `window` or `event_capacity` is zero.
    pub fn new(
        config: SchedulerConfig,
        provider: Arc<dyn ProxyConfigProvider>,
        probe: Arc<dyn Probe>,
    ) -> Result<Self> {
        if config.event_capacity == 0 {
            return Err(byeblock_core::Error::config("event_capacity must be greater than zero"));
        }
        let buffer = Arc::new(SampleBuffer::new(config.window)?);
        let (events, _) = broadcast::channel(config.event_capacity);
        Ok(Self {
            interval: config.interval,
            provider,
            probe,
            buffer,
            events,
            running: Mutex::new(None),
            state: RwLock::new(ProbeState::Idle),
        })
    }

    /// Starts the loop. No-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            if !current.task.is_finished() {
                debug!("probe scheduler already running");
                return;
            }
            warn!("probe loop exited unexpectedly, restarting");
        }

        let cancel = CancellationToken::new();
        let ctx = LoopContext {
            interval: self.interval,
            provider: Arc::clone(&self.provider),
            probe: Arc::clone(&self.probe),
            buffer: Arc::clone(&self.buffer),
            events: self.events.clone(),
        };
        let task = tokio::spawn(run_loop(ctx, cancel.clone()));
        *running = Some(Running { cancel, task });
        *self.state.write() = ProbeState::Running;
        info!(interval_ms = self.interval.as_millis() as u64, "probe scheduler started");
    }

    /// Stops the loop and waits for it to exit. No-op when idle.
    ///
    /// A pending wait is interrupted at once; an in-flight probe runs to
    /// completion (bounded by its timeout) and its sample is discarded. Once
    /// this returns no further samples are pushed or published.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        let Some(Running { cancel, task }) = running.take() else {
            debug!("probe scheduler already idle");
            return;
        };
        cancel.cancel();
        if let Err(e) = task.await {
            warn!(error = %e, "probe loop ended abnormally");
        }
        *self.state.write() = ProbeState::Idle;
        info!("probe scheduler stopped");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProbeState {
        *self.state.read()
    }

    /// Receiver for samples published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LatencySample> {
        self.events.subscribe()
    }

    /// Copy of the rolling window, oldest first.
    pub fn snapshot(&self) -> Vec<LatencySample> {
        self.buffer.snapshot()
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.cancel.cancel();
        }
    }
}

async fn run_loop(ctx: LoopContext, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let endpoint = ctx.provider.current_proxy();
        let probe = Arc::clone(&ctx.probe);
        // a panicking probe costs one failure sample, not the loop
        let sample = match tokio::spawn(async move { probe.measure(endpoint).await }).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "probe task failed, recording failure");
                LatencySample::failure()
            }
        };
        if cancel.is_cancelled() {
            debug!("discarding sample measured after stop");
            break;
        }

        ctx.buffer.push(sample);
        match ctx.events.send(sample) {
            Ok(receivers) => debug!(value = sample.value, ok = sample.ok, receivers, "sample published"),
            Err(_) => debug!(value = sample.value, ok = sample.ok, "sample stored, no subscribers"),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }
}
