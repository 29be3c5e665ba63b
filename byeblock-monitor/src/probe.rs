//! One timed HTTP round trip through a proxy.
//!
//! [`LatencyProbe`] never reports an error to its caller: every failure mode
//! (no proxy, transport error, timeout, non-success status) collapses into the
//! sentinel [`LatencySample::failure`]. [`ProbeError`] exists only so the
//! cause can be logged.

use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use byeblock_core::{LatencySample, MonitorConfig, ProxyEndpoint, ProxyKind};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Why a probe produced a sentinel sample.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The provider reported no proxy; nothing was sent.
    #[error("no proxy configured")]
    NoProxyConfigured,
    /// DNS, connect, TLS or read failure.
    #[error("transport: {0}")]
    Transport(String),
    /// The round trip did not finish within the probe timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// The target answered with a non-2xx status.
    #[error("upstream returned HTTP {0}")]
    Upstream(u16),
}

/// Something that turns the current proxy into a latency sample.
///
/// The scheduler depends only on this seam, so hosts and tests can swap the
/// HTTP probe for anything else.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Measures one round trip. Failures are reported as
    /// [`LatencySample::failure`], never as errors.
    async fn measure(&self, endpoint: Option<ProxyEndpoint>) -> LatencySample;
}

/// Blocking HTTP GET through a forward proxy.
pub trait HttpTransport: Send + Sync {
    /// Fetches `target` through `proxy` and consumes the full response body.
    ///
    /// # Errors
    /// Returns [`ProbeError::Upstream`] for a non-2xx status,
    /// [`ProbeError::Timeout`] when `timeout` elapses, and
    /// [`ProbeError::Transport`] for everything else.
    fn get(&self, target: &Url, proxy: &ProxyEndpoint, timeout: Duration) -> Result<(), ProbeError>;
}

/// [`HttpTransport`] backed by `ureq`.
///
/// A fresh agent is built per call because the proxy may differ between
/// cycles. The agent timeout bounds connect, response and body together.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport;

impl UreqTransport {
    /// Transport with the compiled-in TLS and SOCKS support.
    pub fn new() -> Self {
        Self
    }

    /// `https` targets need the `tls` feature.
    pub fn supports_target(target: &Url) -> bool {
        target.scheme() != "https" || cfg!(feature = "tls")
    }

    /// SOCKS5 proxies need the `socks` feature.
    pub fn supports_proxy(kind: ProxyKind) -> bool {
        !matches!(kind, ProxyKind::Socks5) || cfg!(feature = "socks")
    }
}

impl HttpTransport for UreqTransport {
    fn get(&self, target: &Url, proxy: &ProxyEndpoint, timeout: Duration) -> Result<(), ProbeError> {
        if !Self::supports_proxy(proxy.kind()) {
            return Err(ProbeError::Transport(format!("{} proxies need the `socks` feature", proxy.kind())));
        }
        let started = Instant::now();
        let ureq_proxy = ureq::Proxy::new(proxy.proxy_url())
            .map_err(|e| ProbeError::Transport(format!("invalid proxy {proxy}: {e}")))?;
        let agent = ureq::AgentBuilder::new().proxy(ureq_proxy).timeout(timeout).build();

        let response = match agent.get(target.as_str()).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(ProbeError::Upstream(code)),
            Err(ureq::Error::Transport(t)) => {
                if is_timeout(&t) || started.elapsed() >= timeout {
                    return Err(ProbeError::Timeout(timeout));
                }
                return Err(ProbeError::Transport(t.to_string()));
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(ProbeError::Upstream(status));
        }

        let mut body = response.into_reader();
        io::copy(&mut body, &mut io::sink()).map_err(|e| {
            if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Transport(format!("reading body: {e}"))
            }
        })?;
        Ok(())
    }
}

fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = e.source();
    }
    false
}

/// Times a GET of a fixed target through the supplied proxy.
#[derive(Clone)]
pub struct LatencyProbe {
    target: Url,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl LatencyProbe {
    /// Probe fetching `target` over `transport`, giving up after `timeout`.
    pub fn new(target: Url, timeout: Duration, transport: Arc<dyn HttpTransport>) -> Self {
        Self { target, timeout, transport }
    }

    /// Probe for the configured target and timeout over [`UreqTransport`].
    ///
    /// # Errors
    /// Returns a config error for an invalid target, or an `https` target in
    /// a build without the `tls` feature.
    pub fn from_config(cfg: &MonitorConfig) -> byeblock_core::Result<Self> {
        let target = cfg.target()?;
        if !UreqTransport::supports_target(&target) {
            return Err(byeblock_core::Error::config(format!(
                "{target} needs the `tls` feature of byeblock-monitor"
            )));
        }
        Ok(Self::new(target, cfg.timeout(), Arc::new(UreqTransport::new())))
    }
}

impl std::fmt::Debug for LatencyProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyProbe")
            .field("target", &self.target.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Probe for LatencyProbe {
    async fn measure(&self, endpoint: Option<ProxyEndpoint>) -> LatencySample {
        let Some(endpoint) = endpoint else {
            debug!(reason = %ProbeError::NoProxyConfigured, "probe skipped");
            return LatencySample::failure();
        };

        let transport = Arc::clone(&self.transport);
        let target = self.target.clone();
        let timeout = self.timeout;
        let proxy = endpoint.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            transport.get(&target, &endpoint, timeout).map(|()| started.elapsed())
        })
        .await;

        match joined {
            Ok(Ok(elapsed)) => LatencySample::success(elapsed.as_secs_f64() * 1_000.0),
            Ok(Err(e)) => {
                debug!(%proxy, error = %e, "probe failed");
                LatencySample::failure()
            }
            Err(e) => {
                warn!(%proxy, error = %e, "probe task aborted");
                LatencySample::failure()
            }
        }
    }
}
