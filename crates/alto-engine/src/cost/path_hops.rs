//! Device names along the traced path

use super::{CostContext, CostProvider, CostType, CostValue, METRIC_HOPS_PATH};
use alto_common::AltoResult;
use std::net::IpAddr;

/// Path listing provider
#[derive(Debug, Default, Clone, Copy)]
pub struct PathHopsCostProvider;

impl CostProvider for PathHopsCostProvider {
    fn cost_type(&self) -> CostType {
        CostType::numerical(METRIC_HOPS_PATH)
    }

    fn pair_cost(&self, ctx: &CostContext<'_>, src: IpAddr, dst: IpAddr) -> AltoResult<Option<CostValue>> {
        let path = ctx.tracer().trace(src, dst)?;
        Ok(Some(CostValue::Path(path.names())))
    }
}
