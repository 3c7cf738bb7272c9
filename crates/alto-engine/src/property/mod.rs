//! Endpoint property providers ([RFC7285] §11.4)

mod hostname;
mod pid;

pub use hostname::HostnamePropertyProvider;
pub use pid::PidPropertyProvider;

use alto_common::VersionTag;
use alto_topology::TopologyState;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

/// PID of the endpoint in the network map
pub const PROPERTY_PID: &str = "network-map.pid";
/// Name of the device owning the endpoint
pub const PROPERTY_HOSTNAME: &str = "priv:hostname";

/// Property provider trait
pub trait PropertyProvider: Send + Sync {
    /// Served property name
    fn name(&self) -> &'static str;

    /// Property value and the resource it was derived from.
    ///
    /// `None` when the provider has nothing to say about `addr`.
    fn get_property(&self, topo: &TopologyState, addr: IpAddr) -> Option<(String, VersionTag)>;
}

/// Property providers keyed by property name
#[derive(Default)]
pub struct PropertyRegistry {
    providers: BTreeMap<&'static str, Arc<dyn PropertyProvider>>,
}

impl PropertyRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PidPropertyProvider));
        registry.register(Arc::new(HostnamePropertyProvider));
        registry
    }

    /// Add or replace the provider of its property
    pub fn register(&mut self, provider: Arc<dyn PropertyProvider>) {
        tracing::info!("Registering property provider {}", provider.name());
        self.providers.insert(provider.name(), provider);
    }

    /// Provider of a property
    pub fn get(&self, name: &str) -> Option<&Arc<dyn PropertyProvider>> {
        self.providers.get(name)
    }

    /// Registered property names
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }
}
