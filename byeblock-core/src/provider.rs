//! Proxy configuration lookup used by the probing loop.
//!
//! The probe loop calls [`ProxyConfigProvider::current_proxy`] once per cycle
//! from its own task. Implementations must return promptly and must not
//! depend on UI thread affinity.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::settings::ProxyStore;
use crate::types::ProxyEndpoint;

/// Resolves the currently selected proxy on demand.
pub trait ProxyConfigProvider: Send + Sync {
	/// Returns the selected proxy, or `None` when no proxy is configured.
	fn current_proxy(&self) -> Option<ProxyEndpoint>;
}

impl<F> ProxyConfigProvider for F
where
	F: Fn() -> Option<ProxyEndpoint> + Send + Sync,
{
	fn current_proxy(&self) -> Option<ProxyEndpoint> { self() }
}

/// Provider returning a fixed value.
#[derive(Debug, Clone, Default)]
pub struct StaticProxyProvider {
	endpoint: Option<ProxyEndpoint>,
}

impl StaticProxyProvider {
	pub fn new(endpoint: Option<ProxyEndpoint>) -> Self { Self { endpoint } }
	pub fn unset() -> Self { Self { endpoint: None } }
}

impl ProxyConfigProvider for StaticProxyProvider {
	fn current_proxy(&self) -> Option<ProxyEndpoint> { self.endpoint.clone() }
}

/// Provider backed by the persisted proxy store.
///
/// The host owns the store and may add, remove or reselect entries at any
/// time; the probe loop only ever takes a read lock and clones the selected
/// endpoint.
#[derive(Debug, Clone)]
pub struct SettingsProxyProvider {
	store: Arc<RwLock<ProxyStore>>,
}

impl SettingsProxyProvider {
	pub fn new(store: Arc<RwLock<ProxyStore>>) -> Self { Self { store } }
}

impl ProxyConfigProvider for SettingsProxyProvider {
	fn current_proxy(&self) -> Option<ProxyEndpoint> { self.store.read().selected_endpoint() }
}
