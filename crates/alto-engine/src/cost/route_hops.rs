//! Router hop count
//!
//! Same metric as RIP without the 15-hop horizon: the number of
//! router-to-router relays between source and destination. Endpoints on the
//! same broadcast domain cost 0.

use super::{CostContext, CostProvider, CostType, CostValue, METRIC_HOPS_ROUTING};
use alto_common::{AltoError, AltoResult};
use std::net::IpAddr;

/// Router hop count provider
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteHopsCostProvider;

impl CostProvider for RouteHopsCostProvider {
    fn cost_type(&self) -> CostType {
        CostType::numerical(METRIC_HOPS_ROUTING)
    }

    fn pair_cost(&self, ctx: &CostContext<'_>, src: IpAddr, dst: IpAddr) -> AltoResult<Option<CostValue>> {
        let device = ctx
            .topo
            .device_by_ip(src)
            .ok_or_else(|| AltoError::Unreachable(format!("no device has address {}", src)))?;
        if src == dst {
            return Ok(Some(CostValue::Count(0)));
        }
        if device.interface_for(src).is_some_and(|iface| iface.contains(dst)) {
            return Ok(Some(CostValue::Count(0)));
        }

        let path = ctx.tracer().trace(src, dst)?;
        Ok(Some(CostValue::Count(u64::from(path.relays()))))
    }
}
