//! Cost providers ([RFC7285] §6.1)
//!
//! Each provider serves exactly one `(cost-mode, cost-metric)` pair and is
//! looked up in the [`CostRegistry`] by exact match.

mod ospf;
mod path_hops;
mod path_load;
mod route_hops;

pub use ospf::OspfCostProvider;
pub use path_hops::PathHopsCostProvider;
pub use path_load::{MissingCapacityPolicy, PathLoadCostProvider};
pub use route_hops::RouteHopsCostProvider;

use alto_common::{AltoError, AltoResult};
use alto_topology::{AdjacencyIndex, PathTracer, TopologyState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

/// Numerical cost mode
pub const MODE_NUMERICAL: &str = "numerical";
/// Router hop count
pub const METRIC_HOPS_ROUTING: &str = "hops-routingcost";
/// Bottleneck residual bandwidth
pub const METRIC_RESIDUAL_BANDWIDTH: &str = "residual-pathbandwidth";
/// OSPF distance from the first-hop router
pub const METRIC_OSPF: &str = "ospf-routingcost";
/// Device names along the path
pub const METRIC_HOPS_PATH: &str = "hops-path";

/// Cost type: mode and metric
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CostType {
    /// Cost mode
    #[serde(rename = "cost-mode")]
    pub mode: String,
    /// Cost metric
    #[serde(rename = "cost-metric")]
    pub metric: String,
}

impl CostType {
    /// Create cost type
    pub fn new(mode: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            metric: metric.into(),
        }
    }

    /// Numerical cost type
    pub fn numerical(metric: impl Into<String>) -> Self {
        Self::new(MODE_NUMERICAL, metric)
    }
}

/// Cost of one source/destination pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostValue {
    /// Integer cost (hops, distance)
    Count(u64),
    /// Rate in bits/second
    Rate(f64),
    /// Device names
    Path(Vec<String>),
}

/// Sparse source -> destination -> cost mapping
pub type CostMap = BTreeMap<IpAddr, BTreeMap<IpAddr, CostValue>>;

/// Everything a provider reads while answering one request
pub struct CostContext<'a> {
    /// Topology snapshot of the request
    pub topo: &'a TopologyState,
    /// Physical links
    pub adjacency: &'a AdjacencyIndex,
    /// Path trace hop budget
    pub hop_budget: u32,
}

impl<'a> CostContext<'a> {
    /// Create context
    pub fn new(topo: &'a TopologyState, adjacency: &'a AdjacencyIndex, hop_budget: u32) -> Self {
        Self {
            topo,
            adjacency,
            hop_budget,
        }
    }

    /// Path tracer over this context
    pub fn tracer(&self) -> PathTracer<'a> {
        PathTracer::new(self.topo, self.adjacency).with_budget(self.hop_budget)
    }
}

/// Cost provider trait
pub trait CostProvider: Send + Sync {
    /// Served cost type
    fn cost_type(&self) -> CostType;

    /// Cost of one pair. `Ok(None)` leaves the pair out of the result.
    fn pair_cost(&self, ctx: &CostContext<'_>, src: IpAddr, dst: IpAddr) -> AltoResult<Option<CostValue>>;

    /// Costs for every source/destination pair that has one
    fn get_cost(&self, ctx: &CostContext<'_>, srcs: &[IpAddr], dsts: &[IpAddr]) -> AltoResult<CostMap> {
        if srcs.is_empty() || dsts.is_empty() {
            return Err(AltoError::InvalidInput(
                "cost request needs at least one source and one destination".into(),
            ));
        }

        let cost_type = self.cost_type();
        let mut map = CostMap::new();
        for &src in srcs {
            let mut row = BTreeMap::new();
            for &dst in dsts {
                match self.pair_cost(ctx, src, dst) {
                    Ok(Some(value)) => {
                        tracing::debug!("{} from {} to {} is {:?}", cost_type.metric, src, dst, value);
                        row.insert(dst, value);
                    }
                    Ok(None) => tracing::debug!("No {} from {} to {}", cost_type.metric, src, dst),
                    Err(e) if e.is_unreachable() => {
                        tracing::warn!("No {} from {} to {}: {}", cost_type.metric, src, dst, e);
                    }
                    Err(e) => return Err(e),
                }
            }
            if !row.is_empty() {
                map.insert(src, row);
            }
        }
        Ok(map)
    }
}

/// Cost providers keyed by cost type
#[derive(Default)]
pub struct CostRegistry {
    providers: HashMap<CostType, Arc<dyn CostProvider>>,
}

impl CostRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers
    pub fn with_defaults(missing_capacity: MissingCapacityPolicy) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RouteHopsCostProvider));
        registry.register(Arc::new(PathLoadCostProvider::new(missing_capacity)));
        registry.register(Arc::new(OspfCostProvider));
        registry.register(Arc::new(PathHopsCostProvider));
        registry
    }

    /// Add or replace the provider of its cost type
    pub fn register(&mut self, provider: Arc<dyn CostProvider>) {
        let cost_type = provider.cost_type();
        tracing::info!("Registering cost provider {}/{}", cost_type.mode, cost_type.metric);
        self.providers.insert(cost_type, provider);
    }

    /// Provider serving exactly this cost type
    pub fn get(&self, cost_type: &CostType) -> AltoResult<Arc<dyn CostProvider>> {
        self.providers
            .get(cost_type)
            .cloned()
            .ok_or_else(|| AltoError::UnsupportedCostType {
                mode: cost_type.mode.clone(),
                metric: cost_type.metric.clone(),
            })
    }

    /// Registered cost types, sorted
    pub fn cost_types(&self) -> Vec<CostType> {
        let mut types: Vec<_> = self.providers.keys().cloned().collect();
        types.sort();
        types
    }
}
