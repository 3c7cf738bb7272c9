use super::{PropertyProvider, PROPERTY_PID};
use alto_common::VersionTag;
use alto_topology::TopologyState;
use std::net::IpAddr;

/// Resolves the PID containing an endpoint
#[derive(Debug, Default, Clone, Copy)]
pub struct PidPropertyProvider;

impl PropertyProvider for PidPropertyProvider {
    fn name(&self) -> &'static str {
        PROPERTY_PID
    }

    fn get_property(&self, topo: &TopologyState, addr: IpAddr) -> Option<(String, VersionTag)> {
        let pid = topo.resolve_pid(addr)?;
        Some((pid.to_string(), topo.version_tag()))
    }
}
