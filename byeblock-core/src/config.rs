use std::{fs, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{DEFAULT_INTERVAL, DEFAULT_TARGET_URL, DEFAULT_TIMEOUT, DEFAULT_WINDOW};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Template written by `byeblock config write-template`.
pub const TEMPLATE: &str = r#"# ByeBlock latency monitor configuration

# URL fetched through the selected proxy on every probe cycle.
target_url = "http://gimnazium25.ru/"
# Delay after each probe before the next one starts.
interval_ms = 1000
# Upper bound for a single probe.
timeout_ms = 5000
# Number of samples kept in the rolling window.
window = 50
# Capacity of the live sample channel per subscriber.
event_capacity = 64
log_level = "info"
# Proxy list and current selection.
settings_path = "settings.toml"
"#;

/// Monitor tuning loaded from `byeblock.toml` and `BYEBLOCK_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
	pub target_url: String,
	pub interval_ms: u64,
	pub timeout_ms: u64,
	pub window: usize,
	pub event_capacity: usize,
	pub log_level: String,
	pub settings_path: PathBuf,
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self {
			target_url: DEFAULT_TARGET_URL.into(),
			interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
			timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
			window: DEFAULT_WINDOW,
			event_capacity: 64,
			log_level: "info".into(),
			settings_path: PathBuf::from("settings.toml"),
		}
	}
}

impl MonitorConfig {
	pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
		let data = fs::read_to_string(path)?;
		let cfg: Self = toml::from_str(&data)?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn from_env() -> Result<Self> {
		let mut cfg = Self::default();
		cfg.apply_env()?;
		cfg.validate()?;
		Ok(cfg)
	}

	/// Overlays `BYEBLOCK_*` environment variables onto `self`.
	pub fn apply_env(&mut self) -> Result<()> {
		if let Ok(v) = std::env::var("BYEBLOCK_TARGET_URL") { self.target_url = v; }
		if let Ok(v) = std::env::var("BYEBLOCK_INTERVAL_MS") { self.interval_ms = parse_env("BYEBLOCK_INTERVAL_MS", &v)?; }
		if let Ok(v) = std::env::var("BYEBLOCK_TIMEOUT_MS") { self.timeout_ms = parse_env("BYEBLOCK_TIMEOUT_MS", &v)?; }
		if let Ok(v) = std::env::var("BYEBLOCK_WINDOW") { self.window = parse_env("BYEBLOCK_WINDOW", &v)?; }
		if let Ok(v) = std::env::var("BYEBLOCK_LOG_LEVEL") { self.log_level = v; }
		if let Ok(v) = std::env::var("BYEBLOCK_SETTINGS") { self.settings_path = PathBuf::from(v); }
		Ok(())
	}

	pub fn validate(&self) -> Result<()> {
		let url = self.target()?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(Error::config(format!("unsupported target scheme: {}", url.scheme())));
		}
		if self.interval_ms == 0 {
			return Err(Error::config("interval_ms must be greater than zero"));
		}
		if self.timeout_ms == 0 {
			return Err(Error::config("timeout_ms must be greater than zero"));
		}
		if self.window == 0 {
			return Err(Error::config("window must be greater than zero"));
		}
		if self.event_capacity == 0 {
			return Err(Error::config("event_capacity must be greater than zero"));
		}
		if !LOG_LEVELS.contains(&self.log_level.as_str()) {
			return Err(Error::config(format!("invalid log_level: {}", self.log_level)));
		}
		Ok(())
	}

	pub fn target(&self) -> Result<Url> {
		Url::parse(&self.target_url).map_err(|e| Error::config(format!("invalid target_url {:?}: {e}", self.target_url)))
	}

	pub fn interval(&self) -> Duration { Duration::from_millis(self.interval_ms) }

	pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
	value.trim().parse().map_err(|_| Error::config(format!("{key}: not a number: {value:?}")))
}
