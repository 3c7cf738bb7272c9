//! Hop-by-hop path tracing
//!
//! Simulates forwarding from the device owning the source address to the
//! device owning the destination address:
//!
//! ```text
//!   user ──► access node ──► router ══► router ══► router ──► access node ──► user
//!        ascend (upstream)      relay (forwarding table)       descend
//! ```
//!
//! Non-routers climb their upstream chain unless the destination hangs below
//! them. Routers consult their forwarding table: gateway routes relay to the
//! device owning the gateway address, directly attached routes resolve the
//! physical peer on the output interface. Each router decision spends one unit
//! of the hop budget. Walks through the access tree are bounded by the number
//! of devices instead.

use crate::adjacency::AdjacencyIndex;
use crate::device::{Device, DeviceRole};
use crate::graph::TopologyState;
use alto_common::{AltoError, AltoResult};
use std::net::IpAddr;
use std::sync::Arc;

/// Default hop budget
pub const DEFAULT_HOP_BUDGET: u32 = 128;

/// Ordered devices from source to destination (both inclusive)
#[derive(Debug, Clone)]
pub struct TracedPath {
    hops: Vec<Arc<Device>>,
    relays: u32,
}

impl TracedPath {
    /// Devices on the path
    pub fn hops(&self) -> &[Arc<Device>] {
        &self.hops
    }

    /// Device names on the path
    pub fn names(&self) -> Vec<String> {
        self.hops.iter().map(|d| d.name().to_string()).collect()
    }

    /// Number of router-to-gateway relays taken
    pub fn relays(&self) -> u32 {
        self.relays
    }

    /// Source and destination are the same device
    pub fn is_degenerate(&self) -> bool {
        self.hops.len() == 2 && self.hops[0].name() == self.hops[1].name()
    }

    /// Consecutive device pairs
    pub fn segments(&self) -> impl Iterator<Item = (&Arc<Device>, &Arc<Device>)> {
        self.hops.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// First device
    pub fn source(&self) -> &Arc<Device> {
        &self.hops[0]
    }

    /// Last device
    pub fn destination(&self) -> &Arc<Device> {
        &self.hops[self.hops.len() - 1]
    }
}

/// Path tracer over one topology snapshot
pub struct PathTracer<'a> {
    topo: &'a TopologyState,
    adjacency: &'a AdjacencyIndex,
    budget: u32,
}

impl<'a> PathTracer<'a> {
    /// Create tracer with the default hop budget
    pub fn new(topo: &'a TopologyState, adjacency: &'a AdjacencyIndex) -> Self {
        Self {
            topo,
            adjacency,
            budget: DEFAULT_HOP_BUDGET,
        }
    }

    /// Set hop budget
    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Hop budget
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Topology the tracer walks
    pub fn topology(&self) -> &'a TopologyState {
        self.topo
    }

    /// Adjacency index used for directly attached hops
    pub fn adjacency(&self) -> &'a AdjacencyIndex {
        self.adjacency
    }

    /// Trace the path between two addresses
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn trace(&self, src: IpAddr, dst: IpAddr) -> AltoResult<TracedPath> {
        let src_dev = self
            .topo
            .device_by_ip(src)
            .ok_or_else(|| AltoError::Unreachable(format!("no device has address {}", src)))?;
        let dst_dev = self
            .topo
            .device_by_ip(dst)
            .ok_or_else(|| AltoError::Unreachable(format!("no device has address {}", dst)))?;

        if src_dev.name() == dst_dev.name() {
            return Ok(TracedPath {
                hops: vec![src_dev, dst_dev],
                relays: 0,
            });
        }

        let mut hops = vec![Arc::clone(&src_dev)];
        let mut relays = 0;
        let mut budget = self.budget;
        let mut tree_steps = self.topo.device_count();
        let mut descending = false;
        let mut current = src_dev;

        while current.name() != dst_dev.name() {
            let next = match current.role() {
                DeviceRole::Router => {
                    if budget == 0 {
                        tracing::warn!("TTL expired while tracing from {} to {}", src, dst);
                        return Err(AltoError::TraceBudgetExceeded { budget: self.budget });
                    }
                    budget -= 1;

                    let (next, relayed) = self.relay(&current, dst, &dst_dev)?;
                    if relayed {
                        relays += 1;
                    }
                    descending = !next.is_router();
                    next
                }
                DeviceRole::AccessNode | DeviceRole::User => {
                    if tree_steps == 0 {
                        return Err(AltoError::Unreachable(format!(
                            "access tree above {} loops",
                            current.name()
                        )));
                    }
                    tree_steps -= 1;

                    if let Some(child) = self.toward_leaf(&current, &dst_dev) {
                        descending = true;
                        child
                    } else if descending {
                        return Err(AltoError::Unreachable(format!(
                            "{} has no link toward {}",
                            current.name(),
                            dst_dev.name()
                        )));
                    } else {
                        self.ascend(&current)?
                    }
                }
            };

            hops.push(Arc::clone(&next));
            current = next;
        }

        Ok(TracedPath { hops, relays })
    }

    fn ascend(&self, device: &Device) -> AltoResult<Arc<Device>> {
        let upstream = device.upstream().ok_or_else(|| {
            AltoError::Unreachable(format!("{} ({}) has no upstream device", device.name(), device.role()))
        })?;
        self.topo
            .device_by_name(upstream)
            .ok_or_else(|| AltoError::Unreachable(format!("upstream {} of {} not found", upstream, device.name())))
    }

    /// Downstream neighbour of `device` leading to `dst`
    fn toward_leaf(&self, device: &Device, dst: &Device) -> Option<Arc<Device>> {
        if self.topo.link(device.name(), dst.name()).is_some() {
            return self.topo.device_by_name(dst.name());
        }
        let depth = u32::try_from(self.topo.device_count()).unwrap_or(u32::MAX);
        self.topo.next_toward(device.name(), dst, depth)
    }

    /// One forwarding decision. Returns the next device and whether a gateway was used.
    fn relay(&self, router: &Device, dst: IpAddr, dst_dev: &Device) -> AltoResult<(Arc<Device>, bool)> {
        let entry = router.route_lookup(dst, true).ok_or_else(|| {
            tracing::warn!("Did not find route to {} in router {}", dst, router.name());
            AltoError::Unreachable(format!("no route to {} in {}", dst, router.name()))
        })?;

        match entry.next_hop() {
            Some(gateway) => {
                let next = self.topo.device_by_ip(gateway).ok_or_else(|| {
                    AltoError::Unreachable(format!("no device has gateway address {}", gateway))
                })?;
                Ok((next, true))
            }
            None => {
                let peer = self
                    .adjacency
                    .remote_peer(router.name(), &entry.interface)
                    .and_then(|(host, _)| self.topo.device_by_name(&host))
                    .or_else(|| self.toward_leaf(router, dst_dev))
                    .ok_or_else(|| {
                        AltoError::Unreachable(format!(
                            "{} has no device attached to {} toward {}",
                            router.name(),
                            entry.interface,
                            dst
                        ))
                    })?;
                Ok((peer, false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{RouteEntry, RouteRow};
    use crate::graph::TopologyGraph;
    use ipnetwork::IpNetwork;

    fn net(s: &str) -> IpNetwork {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn route(dest: &str, mask: &str, gw: &str, ifname: &str) -> RouteEntry {
        let flags = if gw == "0.0.0.0" { vec!["U".to_string()] } else { vec!["U".to_string(), "G".to_string()] };
        RouteEntry::try_from(RouteRow {
            ifname: ifname.to_string(),
            destination: dest.to_string(),
            gateway: gw.to_string(),
            flags,
            metric: 0,
            mask: mask.to_string(),
        })
        .unwrap()
    }

    /// R(10.0.0.1) ─ A ─ {U1 10.0.0.2, U2 10.0.0.3}
    fn single_access() -> TopologyGraph {
        let graph = TopologyGraph::new();
        graph
            .edit(|tx| {
                tx.add_device(Device::new("R", DeviceRole::Router, None).with_interfaces(vec![net("10.0.0.1/24")]))?;
                tx.add_device(Device::new("A", DeviceRole::AccessNode, Some("R")))?;
                tx.add_device(Device::new("U1", DeviceRole::User, Some("A")).with_interfaces(vec![net("10.0.0.2/24")]))?;
                tx.add_device(Device::new("U2", DeviceRole::User, Some("A")).with_interfaces(vec![net("10.0.0.3/24")]))?;
                tx.add_link("R", "A", Some(100_000_000))?;
                tx.add_link("A", "U1", Some(10_000_000))?;
                tx.add_link("A", "U2", Some(10_000_000))?;
                Ok(())
            })
            .unwrap();
        graph
    }

    /// U1 ─ A1 ─ R1 ══ R2 ══ R3 ─ A3 ─ U3
    fn three_routers() -> TopologyGraph {
        let graph = TopologyGraph::new();
        graph
            .edit(|tx| {
                tx.add_device(
                    Device::new("R1", DeviceRole::Router, None)
                        .with_interfaces(vec![net("192.168.1.1/24"), net("10.255.0.1/30")]),
                )?;
                tx.add_device(
                    Device::new("R2", DeviceRole::Router, None)
                        .with_interfaces(vec![net("10.255.0.2/30"), net("10.255.0.5/30")]),
                )?;
                tx.add_device(
                    Device::new("R3", DeviceRole::Router, None)
                        .with_interfaces(vec![net("10.255.0.6/30"), net("192.168.3.1/24")]),
                )?;
                tx.add_device(Device::new("A1", DeviceRole::AccessNode, Some("R1")))?;
                tx.add_device(Device::new("A3", DeviceRole::AccessNode, Some("R3")))?;
                tx.add_device(Device::new("U1", DeviceRole::User, Some("A1")).with_interfaces(vec![net("192.168.1.2/24")]))?;
                tx.add_device(Device::new("U3", DeviceRole::User, Some("A3")).with_interfaces(vec![net("192.168.3.2/24")]))?;
                tx.add_link("U1", "A1", None)?;
                tx.add_link("A1", "R1", None)?;
                tx.add_link("R1", "R2", None)?;
                tx.add_link("R2", "R3", None)?;
                tx.add_link("R3", "A3", None)?;
                tx.add_link("A3", "U3", None)?;
                Ok(())
            })
            .unwrap();

        let snap = graph.snapshot();
        snap.device_by_name("R1")
            .unwrap()
            .update_routing_table(vec![
                route("192.168.1.0", "24", "0.0.0.0", "eth0"),
                route("0.0.0.0", "0", "10.255.0.2", "eth1"),
            ])
            .unwrap();
        snap.device_by_name("R2")
            .unwrap()
            .update_routing_table(vec![
                route("192.168.1.0", "24", "10.255.0.1", "eth0"),
                route("192.168.3.0", "24", "10.255.0.6", "eth1"),
            ])
            .unwrap();
        snap.device_by_name("R3")
            .unwrap()
            .update_routing_table(vec![
                route("192.168.3.0", "24", "0.0.0.0", "eth1"),
                route("0.0.0.0", "0", "10.255.0.5", "eth0"),
            ])
            .unwrap();
        graph
    }

    #[test]
    fn test_same_access_node() {
        let graph = single_access();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let path = PathTracer::new(&snap, &adjacency).trace(ip("10.0.0.2"), ip("10.0.0.3")).unwrap();
        assert_eq!(path.names(), vec!["U1", "A", "U2"]);
        assert_eq!(path.relays(), 0);
    }

    #[test]
    fn test_same_device() {
        let graph = single_access();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let path = PathTracer::new(&snap, &adjacency).trace(ip("10.0.0.2"), ip("10.0.0.2")).unwrap();
        assert!(path.is_degenerate());
        assert_eq!(path.source().name(), path.destination().name());
    }

    #[test]
    fn test_ascend_to_router() {
        let graph = single_access();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let path = PathTracer::new(&snap, &adjacency).trace(ip("10.0.0.2"), ip("10.0.0.1")).unwrap();
        assert_eq!(path.names(), vec!["U1", "A", "R"]);
    }

    #[test]
    fn test_across_routers() {
        let graph = three_routers();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let path = PathTracer::new(&snap, &adjacency)
            .trace(ip("192.168.1.2"), ip("192.168.3.2"))
            .unwrap();
        assert_eq!(path.names(), vec!["U1", "A1", "R1", "R2", "R3", "A3", "U3"]);
        assert_eq!(path.relays(), 2);

        let back = PathTracer::new(&snap, &adjacency)
            .trace(ip("192.168.3.2"), ip("192.168.1.2"))
            .unwrap();
        assert_eq!(back.names(), vec!["U3", "A3", "R3", "R2", "R1", "A1", "U1"]);
    }

    #[test]
    fn test_direct_hop_uses_adjacency() {
        let graph = three_routers();
        let snap = graph.snapshot();
        // R3 eth1 is wired to A3 in the adjacency data
        let adjacency = AdjacencyIndex::from_json(
            r#"{"links": {"b.1": ["r3.1", "a3.0"]},
                "names": {"R3": [["r3.1", "eth1"]], "A3": [["a3.0", "eth0"]]}}"#,
        )
        .unwrap();
        let path = PathTracer::new(&snap, &adjacency)
            .trace(ip("192.168.1.2"), ip("192.168.3.2"))
            .unwrap();
        assert_eq!(path.destination().name(), "U3");
        assert_eq!(path.hops()[5].name(), "A3");
    }

    #[test]
    fn test_unknown_address() {
        let graph = single_access();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let err = PathTracer::new(&snap, &adjacency)
            .trace(ip("10.0.0.2"), ip("10.9.9.9"))
            .unwrap_err();
        assert!(matches!(err, AltoError::Unreachable(_)));
    }

    #[test]
    fn test_missing_route() {
        let graph = three_routers();
        let snap = graph.snapshot();
        snap.device_by_name("R2").unwrap().update_routing_table(Vec::new()).unwrap();
        let adjacency = AdjacencyIndex::empty();
        let err = PathTracer::new(&snap, &adjacency)
            .trace(ip("192.168.1.2"), ip("192.168.3.2"))
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_routing_loop_exhausts_budget() {
        let graph = three_routers();
        let snap = graph.snapshot();
        // R2 points back at R1 for the destination, R1 defaults to R2
        snap.device_by_name("R2")
            .unwrap()
            .update_routing_table(vec![route("192.168.3.0", "24", "10.255.0.1", "eth0")])
            .unwrap();
        let adjacency = AdjacencyIndex::empty();
        let err = PathTracer::new(&snap, &adjacency)
            .with_budget(16)
            .trace(ip("192.168.1.2"), ip("192.168.3.2"))
            .unwrap_err();
        assert!(matches!(err, AltoError::TraceBudgetExceeded { budget: 16 }));
    }

    #[test]
    fn test_budget_counts_router_decisions_only() {
        // U1 -> A1 -> R1, R2, R3 -> A3 -> U3: three router decisions, six hops
        let graph = three_routers();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let path = PathTracer::new(&snap, &adjacency)
            .with_budget(3)
            .trace(ip("192.168.1.2"), ip("192.168.3.2"))
            .unwrap();
        assert_eq!(path.hops().len(), 7);

        let err = PathTracer::new(&snap, &adjacency)
            .with_budget(2)
            .trace(ip("192.168.1.2"), ip("192.168.3.2"))
            .unwrap_err();
        assert!(matches!(err, AltoError::TraceBudgetExceeded { budget: 2 }));
    }

    #[test]
    fn test_access_tree_ignores_budget() {
        let graph = single_access();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let path = PathTracer::new(&snap, &adjacency)
            .with_budget(0)
            .trace(ip("10.0.0.2"), ip("10.0.0.3"))
            .unwrap();
        assert_eq!(path.names(), vec!["U1", "A", "U2"]);
    }

    #[test]
    fn test_upstream_cycle_is_unreachable() {
        let graph = TopologyGraph::new();
        graph
            .edit(|tx| {
                tx.add_device(Device::new("A", DeviceRole::AccessNode, Some("B")))?;
                tx.add_device(Device::new("B", DeviceRole::AccessNode, Some("A")))?;
                tx.add_device(Device::new("U1", DeviceRole::User, Some("A")).with_interfaces(vec![net("10.0.0.2/24")]))?;
                tx.add_device(Device::new("U2", DeviceRole::User, None).with_interfaces(vec![net("10.0.0.3/24")]))?;
                tx.add_link("U1", "A", None)?;
                Ok(())
            })
            .unwrap();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let err = PathTracer::new(&snap, &adjacency)
            .trace(ip("10.0.0.2"), ip("10.0.0.3"))
            .unwrap_err();
        assert!(matches!(err, AltoError::Unreachable(_)));
    }

    #[test]
    fn test_broken_tree() {
        let graph = TopologyGraph::new();
        graph
            .edit(|tx| {
                tx.add_device(Device::new("U1", DeviceRole::User, None).with_interfaces(vec![net("10.0.0.2/24")]))?;
                tx.add_device(Device::new("U2", DeviceRole::User, None).with_interfaces(vec![net("10.0.0.3/24")]))?;
                Ok(())
            })
            .unwrap();
        let snap = graph.snapshot();
        let adjacency = AdjacencyIndex::empty();
        let err = PathTracer::new(&snap, &adjacency)
            .trace(ip("10.0.0.2"), ip("10.0.0.3"))
            .unwrap_err();
        assert!(matches!(err, AltoError::Unreachable(_)));
    }
}
