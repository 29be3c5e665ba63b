//! Persisted proxy list and current selection.
//!
//! ```toml
//! selected = "office"
//!
//! [proxies.office]
//! host = "10.0.0.1"
//! port = 8080
//! kind = "http"
//! ```

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{ProxyEndpoint, ProxyKind};

/// One stored proxy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyEntry {
	pub host: String,
	pub port: u16,
	#[serde(default)]
	pub kind: ProxyKind,
}

impl ProxyEntry {
	/// Validated endpoint for this entry.
	pub fn endpoint(&self) -> Result<ProxyEndpoint> {
		ProxyEndpoint::with_kind(self.host.clone(), self.port, self.kind)
	}
}

/// Key/value store of proxies plus the selected identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyStore {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	selected: Option<String>,
	#[serde(default)]
	proxies: BTreeMap<String, ProxyEntry>,
}

impl ProxyStore {
	/// Loads the store, returning an empty one when the file does not exist.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		if !path.exists() {
			debug!(path = %path.display(), "settings file missing, starting empty");
			return Ok(Self::default());
		}
		let data = fs::read_to_string(path)?;
		Self::parse(&data)
	}

	/// Parses store contents from TOML.
	pub fn parse(data: &str) -> Result<Self> {
		if data.trim().is_empty() {
			return Ok(Self::default());
		}
		let store: Self = toml::from_str(data)?;
		Ok(store)
	}

	/// Writes the store as TOML through a temporary sibling file.
	pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent)?;
		}
		let body = toml::to_string_pretty(self)?;
		let tmp = path.with_extension("toml.tmp");
		fs::write(&tmp, body)?;
		fs::rename(&tmp, path)?;
		debug!(path = %path.display(), entries = self.proxies.len(), "settings saved");
		Ok(())
	}

	/// Adds or replaces a proxy. An empty `id` falls back to the host.
	///
	/// Returns the identifier the entry was stored under.
	pub fn add(&mut self, id: &str, host: &str, port: u16, kind: ProxyKind) -> Result<String> {
		let endpoint = ProxyEndpoint::with_kind(host, port, kind)?;
		let id = match id.trim() {
			"" => endpoint.host().to_string(),
			other => other.to_string(),
		};
		self.proxies.insert(
			id.clone(),
			ProxyEntry { host: endpoint.host().to_string(), port: endpoint.port(), kind: endpoint.kind() },
		);
		Ok(id)
	}

	/// Removes a proxy; clears the selection when it pointed at `id`.
	pub fn remove(&mut self, id: &str) -> Option<ProxyEntry> {
		let removed = self.proxies.remove(id);
		if removed.is_some() && self.selected.as_deref() == Some(id) {
			self.selected = None;
		}
		removed
	}

	/// Selects an existing proxy.
	pub fn select(&mut self, id: &str) -> Result<()> {
		if !self.proxies.contains_key(id) {
			return Err(Error::not_found(format!("proxy {id:?}")));
		}
		self.selected = Some(id.to_string());
		Ok(())
	}

	/// Drops the selection; the monitor then reports every probe as failed.
	pub fn clear_selection(&mut self) { self.selected = None; }

	pub fn selected_id(&self) -> Option<&str> { self.selected.as_deref() }

	pub fn get(&self, id: &str) -> Option<&ProxyEntry> { self.proxies.get(id) }

	/// Endpoint of the selected entry.
	///
	/// `None` when nothing is selected, the selection points at a missing
	/// entry, or the stored entry no longer validates.
	pub fn selected_endpoint(&self) -> Option<ProxyEndpoint> {
		let id = self.selected.as_deref()?;
		self.proxies.get(id)?.endpoint().ok()
	}

	/// Entries ordered by identifier.
	pub fn list(&self) -> impl Iterator<Item = (&str, &ProxyEntry)> {
		self.proxies.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize { self.proxies.len() }

	pub fn is_empty(&self) -> bool { self.proxies.is_empty() }
}
