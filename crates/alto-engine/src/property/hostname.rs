use super::{PropertyProvider, PROPERTY_HOSTNAME};
use alto_common::VersionTag;
use alto_topology::TopologyState;
use std::net::IpAddr;

/// Names the device owning an endpoint address
#[derive(Debug, Default, Clone, Copy)]
pub struct HostnamePropertyProvider;

impl PropertyProvider for HostnamePropertyProvider {
    fn name(&self) -> &'static str {
        PROPERTY_HOSTNAME
    }

    fn get_property(&self, topo: &TopologyState, addr: IpAddr) -> Option<(String, VersionTag)> {
        let device = topo.device_by_ip(addr)?;
        Some((device.name().to_string(), topo.version_tag()))
    }
}
