#![forbid(unsafe_code)]

//! byeblock-core: shared building blocks for the ByeBlock latency monitor.
//! This crate provides:
//! - Proxy endpoint and latency sample types
//! - Monitor configuration from TOML files and `BYEBLOCK_*` environment variables
//! - The persisted proxy list with its current selection
//! - The [`ProxyConfigProvider`] contract consulted by the probe loop

pub mod config;
pub mod error;
pub mod provider;
pub mod settings;
pub mod types;

pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use provider::{ProxyConfigProvider, SettingsProxyProvider, StaticProxyProvider};
pub use settings::{ProxyEntry, ProxyStore};
pub use types::{LatencySample, ProbeState, ProxyEndpoint, ProxyKind};
