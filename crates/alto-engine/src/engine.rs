//! ALTO engine façade

use crate::config::EngineConfig;
use crate::cost::{CostContext, CostProvider, CostRegistry, CostType};
use crate::property::{PropertyProvider, PropertyRegistry};
use crate::response::{
    CostMeta, EndpointCostResponse, EndpointFilter, EndpointPropertiesResponse, NetworkMapMeta,
    NetworkMapResponse, PidAddressGroup, PropertiesMeta,
};
use alto_common::{AddressCodec, AltoError, AltoResult, VersionTag};
use alto_topology::{
    AdapterStats, AddressRecord, AdjacencyIndex, AltRouteEntry, AltRouteRow, Device, PresetOptions, RouteEntry,
    RouteRow, TopologyGraph,
};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;

/// ALTO engine
pub struct AltoEngine {
    config: EngineConfig,
    graph: TopologyGraph,
    adjacency: AdjacencyIndex,
    codec: AddressCodec,
    costs: CostRegistry,
    properties: PropertyRegistry,
}

impl AltoEngine {
    /// Create engine with an empty topology and the built-in providers
    pub fn new(config: EngineConfig) -> Self {
        Self {
            graph: TopologyGraph::with_pid_policy(config.pid_match),
            adjacency: AdjacencyIndex::empty(),
            codec: AddressCodec::default(),
            costs: CostRegistry::with_defaults(config.missing_capacity),
            properties: PropertyRegistry::with_defaults(),
            config,
        }
    }

    /// Create engine and run the configured startup steps: seed the preset
    /// topology, then load and validate the adjacency file.
    pub fn from_config(config: EngineConfig) -> AltoResult<Self> {
        let mut engine = Self::new(config);

        let opts = PresetOptions {
            link_capacity: engine.config.default_link_capacity_bps,
            history_len: engine.config.counter_history_len,
        };
        engine.config.topology.apply(&engine.graph, opts)?;

        if let Some(path) = engine.config.adjacency_path.clone() {
            engine.load_adjacency(&path)?;
        }
        Ok(engine)
    }

    /// Load the physical adjacency file; every device it names must exist
    pub fn load_adjacency(&mut self, path: &str) -> AltoResult<()> {
        let adjacency = AdjacencyIndex::load(path)?;
        adjacency.validate_devices(&self.graph.snapshot())?;
        tracing::info!("Adjacency data from {} covers {} devices", path, adjacency.device_count());
        self.adjacency = adjacency;
        Ok(())
    }

    /// Replace the adjacency index
    pub fn with_adjacency(mut self, adjacency: AdjacencyIndex) -> Self {
        self.adjacency = adjacency;
        self
    }

    /// Add or replace a cost provider
    pub fn register_cost_provider(&mut self, provider: Arc<dyn CostProvider>) {
        self.costs.register(provider);
    }

    /// Add or replace a property provider
    pub fn register_property_provider(&mut self, provider: Arc<dyn PropertyProvider>) {
        self.properties.register(provider);
    }

    /// Configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Topology graph
    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    /// Adjacency index
    pub fn adjacency(&self) -> &AdjacencyIndex {
        &self.adjacency
    }

    /// Served cost types
    pub fn cost_types(&self) -> Vec<CostType> {
        self.costs.cost_types()
    }

    /// Full network map of the current version
    pub fn network_map(&self) -> NetworkMapResponse {
        let snap = self.graph.snapshot();

        let network_map = snap
            .pids()
            .map(|pid| {
                let group = PidAddressGroup {
                    ipv4: pid.ipv4_prefixes().iter().map(ToString::to_string).collect(),
                    ipv6: pid.ipv6_prefixes().iter().map(ToString::to_string).collect(),
                };
                (pid.name().to_string(), group)
            })
            .collect();

        NetworkMapResponse {
            meta: NetworkMapMeta {
                vtag: snap.version_tag(),
            },
            network_map,
        }
    }

    /// Requested properties of each endpoint.
    ///
    /// Endpoints that fail to decode and unknown property names are skipped.
    pub fn endpoint_properties<S: AsRef<str>>(
        &self,
        properties: &[S],
        endpoints: &[S],
    ) -> AltoResult<EndpointPropertiesResponse> {
        if properties.is_empty() || endpoints.is_empty() {
            return Err(AltoError::InvalidInput(
                "property request needs properties and endpoints".into(),
            ));
        }

        let providers: Vec<_> = properties
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let provider = self.properties.get(name);
                if provider.is_none() {
                    tracing::warn!("Property {} is not supported", name);
                }
                provider
            })
            .collect();

        let snap = self.graph.snapshot();
        let mut vtags = BTreeSet::new();
        // Properties are read from this snapshot even when no endpoint has a value
        if !providers.is_empty() {
            vtags.insert(snap.version_tag());
        }
        let mut endpoint_properties = BTreeMap::new();

        for addr in self.codec.decode_all(endpoints) {
            let key = self.codec.encode(&addr)?;
            let mut values = BTreeMap::new();
            for provider in &providers {
                if let Some((value, vtag)) = provider.get_property(&snap, addr) {
                    values.insert(provider.name().to_string(), value);
                    vtags.insert(vtag);
                }
            }
            endpoint_properties.insert(key, values);
        }

        tracing::info!(
            "Endpoint properties: {} endpoints, {} properties",
            endpoint_properties.len(),
            providers.len()
        );
        Ok(EndpointPropertiesResponse {
            meta: PropertiesMeta {
                dependent_vtags: vtags.into_iter().collect::<Vec<VersionTag>>(),
            },
            endpoint_properties,
        })
    }

    /// Costs between endpoints for one cost type
    #[tracing::instrument(level = "debug", skip(self, filter), fields(metric = %cost_type.metric))]
    pub fn endpoint_costs(&self, cost_type: &CostType, filter: &EndpointFilter) -> AltoResult<EndpointCostResponse> {
        let provider = self.costs.get(cost_type)?;
        if filter.srcs.is_empty() || filter.dsts.is_empty() {
            return Err(AltoError::InvalidInput("srcs and dsts must not be empty".into()));
        }

        let srcs = self.codec.decode_all(&filter.srcs);
        let dsts = self.codec.decode_all(&filter.dsts);
        tracing::info!(
            "{} request: from ({}) to ({})",
            cost_type.metric,
            join(&srcs),
            join(&dsts)
        );

        let snap = self.graph.snapshot();
        let ctx = CostContext::new(&snap, &self.adjacency, self.config.trace_hop_budget);
        let costs = provider.get_cost(&ctx, &srcs, &dsts)?;

        let mut endpoint_cost_map = BTreeMap::new();
        for (src, row) in costs {
            let mut encoded = BTreeMap::new();
            for (dst, value) in row {
                encoded.insert(self.codec.encode(&dst)?, value);
            }
            endpoint_cost_map.insert(self.codec.encode(&src)?, encoded);
        }

        Ok(EndpointCostResponse {
            meta: CostMeta {
                cost_type: cost_type.clone(),
            },
            endpoint_cost_map,
        })
    }

    /// Replace a device's interface addresses
    pub fn update_device_addresses(&self, device: &str, records: Vec<AddressRecord>) -> AltoResult<()> {
        let device = self.device(device)?;
        tracing::info!("{}: {} addresses uploaded", device.name(), records.len());
        device.update_interface_addresses(records);
        Ok(())
    }

    /// Replace a device's interface addresses, grouped by adapter
    pub fn update_device_adapter_addresses(
        &self,
        device: &str,
        adapters: BTreeMap<String, Vec<AddressRecord>>,
    ) -> AltoResult<()> {
        let records = adapters
            .into_iter()
            .flat_map(|(adapter, records)| {
                records.into_iter().map(move |mut record| {
                    record.interface.get_or_insert_with(|| adapter.clone());
                    record
                })
            })
            .collect();
        self.update_device_addresses(device, records)
    }

    /// Append a counter snapshot to a device
    pub fn update_device_stats(&self, device: &str, stats: Vec<AdapterStats>) -> AltoResult<()> {
        let device = self.device(device)?;
        tracing::info!("{}: counters for {} adapters uploaded", device.name(), stats.len());
        device.record_counters(stats);
        Ok(())
    }

    /// Replace a router's forwarding table
    pub fn update_device_routing_table(&self, device: &str, rows: Vec<RouteRow>) -> AltoResult<()> {
        let device = self.router(device)?;
        let table = rows
            .into_iter()
            .map(RouteEntry::try_from)
            .collect::<AltoResult<Vec<_>>>()?;
        tracing::info!("{}: {} routes uploaded", device.name(), table.len());
        device.update_routing_table(table)
    }

    /// Replace a router's routing daemon table
    pub fn update_device_alt_routing_table(&self, device: &str, rows: Vec<AltRouteRow>) -> AltoResult<()> {
        let device = self.router(device)?;
        let table = rows
            .into_iter()
            .map(AltRouteEntry::try_from)
            .collect::<AltoResult<Vec<_>>>()?;
        tracing::info!("{}: {} routing daemon routes uploaded", device.name(), table.len());
        device.update_alt_routing_table(table)
    }

    fn device(&self, name: &str) -> AltoResult<Arc<Device>> {
        self.graph.device_by_name(name).ok_or_else(|| {
            tracing::warn!("Upload for unknown device {}", name);
            AltoError::UnknownDevice(name.to_string())
        })
    }

    fn router(&self, name: &str) -> AltoResult<Arc<Device>> {
        let device = self.device(name)?;
        if !device.is_router() {
            return Err(AltoError::InvalidRole {
                device: device.name().to_string(),
                role: device.role().to_string(),
            });
        }
        Ok(device)
    }
}

impl Default for AltoEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn join(addrs: &[IpAddr]) -> String {
    addrs.iter().map(ToString::to_string).collect::<Vec<_>>().join(";")
}
