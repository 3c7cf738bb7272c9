//! Residual path bandwidth
//!
//! For every segment of the traced path the residual bandwidth is the link
//! capacity minus the load last observed on that link. The path cost is the
//! bottleneck: the smallest residual over all segments.

use super::{CostContext, CostProvider, CostType, CostValue, METRIC_RESIDUAL_BANDWIDTH};
use alto_common::AltoResult;
use alto_topology::{AdjacencyIndex, Device, DeviceRole};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Handling of links without a known capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingCapacityPolicy {
    /// The pair gets no cost
    #[default]
    Omit,
    /// The segment does not constrain the path
    Unbounded,
}

/// Residual path bandwidth provider
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLoadCostProvider {
    missing_capacity: MissingCapacityPolicy,
}

impl PathLoadCostProvider {
    /// Create provider
    pub fn new(missing_capacity: MissingCapacityPolicy) -> Self {
        Self { missing_capacity }
    }

    /// Load on the link from `a` to `b` in bits/second.
    ///
    /// Traffic toward a user is measured as transmit load on `a`, everything
    /// else as receive load on `b`. Links without counters count as idle.
    fn segment_load(adjacency: &AdjacencyIndex, a: &Device, b: &Device) -> f64 {
        let Some((on_a, on_b)) = adjacency.adapters_between(a.name(), b.name()) else {
            tracing::debug!("No adapter data for link {} -> {}", a.name(), b.name());
            return 0.0;
        };

        let load = match b.role() {
            DeviceRole::User => a.tx_load(&on_a),
            DeviceRole::Router | DeviceRole::AccessNode => b.rx_load(&on_b),
        };
        load.unwrap_or(0.0)
    }
}

impl CostProvider for PathLoadCostProvider {
    fn cost_type(&self) -> CostType {
        CostType::numerical(METRIC_RESIDUAL_BANDWIDTH)
    }

    fn pair_cost(&self, ctx: &CostContext<'_>, src: IpAddr, dst: IpAddr) -> AltoResult<Option<CostValue>> {
        let path = ctx.tracer().trace(src, dst)?;
        if path.is_degenerate() {
            tracing::info!("{} and {} belong to the same device", src, dst);
            return Ok(None);
        }

        let mut bottleneck: Option<f64> = None;
        for (a, b) in path.segments() {
            let capacity = match ctx.topo.link(a.name(), b.name()).and_then(|l| l.capacity) {
                Some(capacity) => capacity,
                None if self.missing_capacity == MissingCapacityPolicy::Unbounded => continue,
                None => {
                    tracing::info!("Unable to get link capacity from {} to {}", a.name(), b.name());
                    return Ok(None);
                }
            };

            let residual = (capacity as f64 - Self::segment_load(ctx.adjacency, a, b)).max(0.0);
            bottleneck = Some(bottleneck.map_or(residual, |cur| cur.min(residual)));
        }

        // No segment had a capacity at all
        Ok(bottleneck.map(CostValue::Rate))
    }
}
