//! OSPF distance from the source's first-hop router

use super::{CostContext, CostProvider, CostType, CostValue, METRIC_OSPF};
use alto_common::{AltoError, AltoResult};
use std::net::IpAddr;

/// OSPF routing distance provider
#[derive(Debug, Default, Clone, Copy)]
pub struct OspfCostProvider;

impl CostProvider for OspfCostProvider {
    fn cost_type(&self) -> CostType {
        CostType::numerical(METRIC_OSPF)
    }

    fn pair_cost(&self, ctx: &CostContext<'_>, src: IpAddr, dst: IpAddr) -> AltoResult<Option<CostValue>> {
        let device = ctx
            .topo
            .device_by_ip(src)
            .ok_or_else(|| AltoError::Unreachable(format!("no device has address {}", src)))?;
        let router = ctx
            .topo
            .upstream_router(device.name(), ctx.hop_budget)
            .ok_or_else(|| AltoError::Unreachable(format!("no first hop router for {}", device.name())))?;

        Ok(router.ospf_distance(dst).map(|d| CostValue::Count(u64::from(d))))
    }
}
