use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of samples kept in the rolling window.
pub const DEFAULT_WINDOW: usize = 50;

/// Delay between the end of one probe cycle and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on a single probe (connect + response + body).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Target fetched through the proxy on every cycle.
pub const DEFAULT_TARGET_URL: &str = "http://gimnazium25.ru/";

/// Protocol spoken to the proxy itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
	#[default]
	Http,
	Socks5,
}

impl ProxyKind {
	pub fn scheme(&self) -> &'static str {
		match self {
			ProxyKind::Http => "http",
			ProxyKind::Socks5 => "socks5",
		}
	}
}

impl fmt::Display for ProxyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.scheme()) }
}

impl FromStr for ProxyKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"http" => Ok(ProxyKind::Http),
			"socks5" | "socks" => Ok(ProxyKind::Socks5),
			other => Err(Error::invalid_proxy(format!("unknown proxy kind: {other}"))),
		}
	}
}

/// Host/port pair through which outbound HTTP and HTTPS traffic is routed.
///
/// Values are validated on construction: the host is non-empty and free of
/// whitespace, the port is in `1..=65535`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProxyEndpoint {
	host: String,
	port: u16,
	kind: ProxyKind,
}

impl ProxyEndpoint {
	/// Creates an HTTP proxy endpoint.
	///
	/// # Errors
	/// Returns [`Error::InvalidProxy`] for an empty host or port 0.
	pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
		Self::with_kind(host, port, ProxyKind::Http)
	}

	/// Creates an endpoint speaking the given proxy protocol.
	pub fn with_kind(host: impl Into<String>, port: u16, kind: ProxyKind) -> Result<Self> {
		let host = host.into().trim().to_string();
		if host.is_empty() {
			return Err(Error::invalid_proxy("host must not be empty"));
		}
		if host.chars().any(char::is_whitespace) {
			return Err(Error::invalid_proxy(format!("host contains whitespace: {host:?}")));
		}
		if port == 0 {
			return Err(Error::invalid_proxy("port must be in 1..=65535"));
		}
		Ok(Self { host, port, kind })
	}

	pub fn host(&self) -> &str { &self.host }
	pub fn port(&self) -> u16 { self.port }
	pub fn kind(&self) -> ProxyKind { self.kind }

	/// Proxy URL understood by HTTP clients, e.g. `http://10.0.0.1:8080`.
	pub fn proxy_url(&self) -> String {
		format!("{}://{}:{}", self.kind.scheme(), self.host, self.port)
	}
}

impl fmt::Display for ProxyEndpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}:{}", self.host, self.port) }
}

/// One latency measurement.
///
/// `ok == false` marks a failed or skipped probe; its `value` is the zero
/// sentinel and is not a real latency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
	/// Round trip in milliseconds, `0.0` for sentinels.
	pub value: f64,
	/// Whether the probe succeeded.
	pub ok: bool,
}

impl LatencySample {
	pub fn success(value_ms: f64) -> Self { Self { value: value_ms, ok: true } }

	/// Sentinel sample for a failed, timed-out or skipped probe.
	pub const fn failure() -> Self { Self { value: 0.0, ok: false } }

	/// Measured latency, `None` for sentinels.
	pub fn latency_ms(&self) -> Option<f64> { self.ok.then_some(self.value) }
}

impl Default for LatencySample {
	fn default() -> Self { Self::failure() }
}

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeState {
	/// No loop task; the window keeps its last contents.
	Idle,
	/// The probe loop is active.
	Running,
}
