//! Topology graph with versioned snapshots
//!
//! Readers take an immutable [`TopologyState`] snapshot and keep it for the
//! whole request. Structural edits copy the current state, apply the change,
//! bump the version and swap the new state in atomically, so a version number
//! always corresponds to a structurally complete graph.
//!
//! Devices are shared between snapshots through `Arc`; their telemetry is
//! mutated in place under each device's own lock and is not versioned.

use crate::device::Device;
use crate::pid::{Pid, PidMatchPolicy};
use alto_common::{AltoError, AltoResult, VersionTag};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

/// Unidirectional link between two devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Source device name
    pub from: String,
    /// Target device name
    pub to: String,
    /// Capacity in bits/second, if known
    pub capacity: Option<u64>,
}

/// Immutable view of the topology at one version
#[derive(Debug, Clone, Default)]
pub struct TopologyState {
    devices: Vec<Arc<Device>>,
    by_name: HashMap<String, usize>,
    out_edges: HashMap<String, Vec<Link>>,
    pids: BTreeMap<String, Pid>,
    pid_policy: PidMatchPolicy,
    version: u64,
}

impl TopologyState {
    /// Structural version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Map tag: hex SHA-256 of the version number
    pub fn map_tag(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Version tag of the network map
    pub fn version_tag(&self) -> VersionTag {
        VersionTag::network_map(self.map_tag())
    }

    /// All devices in insertion order
    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.iter()
    }

    /// Number of devices
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Device by name
    pub fn device_by_name(&self, name: &str) -> Option<Arc<Device>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.devices[i]))
    }

    /// Device having an interface with exactly this address
    pub fn device_by_ip(&self, addr: IpAddr) -> Option<Arc<Device>> {
        self.devices.iter().find(|d| d.has_address(addr)).cloned()
    }

    /// Outgoing links of a device
    pub fn out_edges(&self, name: &str) -> &[Link] {
        self.out_edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First link from `from` to `to`
    pub fn link(&self, from: &str, to: &str) -> Option<&Link> {
        self.out_edges(from).iter().find(|l| l.to == to)
    }

    /// Number of directed links
    pub fn link_count(&self) -> usize {
        self.out_edges.values().map(Vec::len).sum()
    }

    /// PIDs in name order
    pub fn pids(&self) -> impl Iterator<Item = &Pid> {
        self.pids.values()
    }

    /// PID by name
    pub fn pid(&self, name: &str) -> Option<&Pid> {
        self.pids.get(name)
    }

    /// Active PID match policy
    pub fn pid_policy(&self) -> PidMatchPolicy {
        self.pid_policy
    }

    /// Name of the PID containing `addr`, ranked by the match policy
    pub fn resolve_pid(&self, addr: IpAddr) -> Option<&str> {
        self.pid_policy.select(self.pids.values(), addr).map(Pid::name)
    }

    /// First router found by walking upstream from `name` (inclusive).
    ///
    /// Gives up after `budget` steps so a cyclic upstream chain terminates.
    pub fn upstream_router(&self, name: &str, budget: u32) -> Option<Arc<Device>> {
        let mut current = self.device_by_name(name)?;
        for _ in 0..=budget {
            if current.is_router() {
                return Some(current);
            }
            current = self.device_by_name(current.upstream()?)?;
        }
        tracing::warn!("Upstream chain of {} exceeds {} hops", name, budget);
        None
    }

    /// Child of `from` on the upstream chain of `dst`, if `dst` hangs below `from`
    pub fn next_toward(&self, from: &str, dst: &Device, budget: u32) -> Option<Arc<Device>> {
        let mut child = self.device_by_name(dst.name())?;
        for _ in 0..budget {
            let parent = child.upstream()?;
            if parent == from {
                return Some(child);
            }
            child = self.device_by_name(parent)?;
        }
        None
    }
}

/// Batch of structural changes applied with a single version increment
pub struct TopologyEdit<'a> {
    state: &'a mut TopologyState,
    changed: bool,
}

impl TopologyEdit<'_> {
    /// Add a device; names are unique
    pub fn add_device(&mut self, device: Device) -> AltoResult<Arc<Device>> {
        if self.state.by_name.contains_key(device.name()) {
            return Err(AltoError::InvalidInput(format!("device {} already exists", device.name())));
        }

        let device = Arc::new(device);
        self.state.by_name.insert(device.name().to_string(), self.state.devices.len());
        self.state.devices.push(Arc::clone(&device));
        self.changed = true;
        Ok(device)
    }

    /// Add one directed edge
    pub fn add_edge(&mut self, from: &str, to: &str, capacity: Option<u64>) -> AltoResult<()> {
        for name in [from, to] {
            if !self.state.by_name.contains_key(name) {
                return Err(AltoError::UnknownDevice(name.to_string()));
            }
        }

        self.state.out_edges.entry(from.to_string()).or_default().push(Link {
            from: from.to_string(),
            to: to.to_string(),
            capacity,
        });
        self.changed = true;
        Ok(())
    }

    /// Add a physical link as two opposite directed edges
    pub fn add_link(&mut self, a: &str, b: &str, capacity: Option<u64>) -> AltoResult<()> {
        self.add_edge(a, b, capacity)?;
        self.add_edge(b, a, capacity)
    }

    /// Add or replace a PID
    pub fn add_pid(&mut self, pid: Pid) {
        self.state.pids.insert(pid.name().to_string(), pid);
        self.changed = true;
    }

    /// Read access to the state being edited
    pub fn state(&self) -> &TopologyState {
        self.state
    }
}

/// Shared, versioned topology
pub struct TopologyGraph {
    current: ArcSwap<TopologyState>,
    writer: Mutex<()>,
}

impl TopologyGraph {
    /// Create empty graph
    pub fn new() -> Self {
        Self::with_pid_policy(PidMatchPolicy::default())
    }

    /// Create empty graph with a PID match policy
    pub fn with_pid_policy(policy: PidMatchPolicy) -> Self {
        Self {
            current: ArcSwap::from_pointee(TopologyState {
                pid_policy: policy,
                ..TopologyState::default()
            }),
            writer: Mutex::new(()),
        }
    }

    /// Consistent snapshot of the current version
    pub fn snapshot(&self) -> Arc<TopologyState> {
        self.current.load_full()
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Apply structural changes atomically.
    ///
    /// Nothing is published if `f` fails. The version is bumped once when
    /// `f` changed anything.
    pub fn edit<R>(&self, f: impl FnOnce(&mut TopologyEdit<'_>) -> AltoResult<R>) -> AltoResult<R> {
        let _guard = self.writer.lock();

        let mut next = TopologyState::clone(&self.current.load());
        let mut tx = TopologyEdit {
            state: &mut next,
            changed: false,
        };
        let out = f(&mut tx)?;

        if tx.changed {
            next.version += 1;
            tracing::debug!("Topology version now {}", next.version);
            self.current.store(Arc::new(next));
        }
        Ok(out)
    }

    /// Add a device
    pub fn add_device(&self, device: Device) -> AltoResult<Arc<Device>> {
        self.edit(|tx| tx.add_device(device))
    }

    /// Add a bidirectional link
    pub fn add_link(&self, a: &str, b: &str, capacity: Option<u64>) -> AltoResult<()> {
        self.edit(|tx| tx.add_link(a, b, capacity))
    }

    /// Add or replace a PID
    pub fn add_pid(&self, pid: Pid) -> AltoResult<()> {
        self.edit(|tx| {
            tx.add_pid(pid);
            Ok(())
        })
    }

    /// Device by name in the current version
    pub fn device_by_name(&self, name: &str) -> Option<Arc<Device>> {
        self.current.load().device_by_name(name)
    }
}

impl Default for TopologyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceRole;
    use std::thread;

    fn net(s: &str) -> ipnetwork::IpNetwork {
        s.parse().unwrap()
    }

    fn tree() -> TopologyGraph {
        let graph = TopologyGraph::new();
        graph
            .edit(|tx| {
                tx.add_device(Device::new("R", DeviceRole::Router, None))?;
                tx.add_device(Device::new("A", DeviceRole::AccessNode, Some("R")))?;
                tx.add_device(
                    Device::new("U1", DeviceRole::User, Some("A")).with_interfaces(vec![net("10.0.0.2/24")]),
                )?;
                tx.add_link("R", "A", Some(1_000_000))?;
                tx.add_link("A", "U1", None)?;
                Ok(())
            })
            .unwrap();
        graph
    }

    #[test]
    fn test_edit_bumps_version_once() {
        let graph = tree();
        assert_eq!(graph.version(), 1);
        let snap = graph.snapshot();
        assert_eq!(snap.device_count(), 3);
        assert_eq!(snap.link_count(), 4);
    }

    #[test]
    fn test_failed_edit_publishes_nothing() {
        let graph = tree();
        let before = graph.snapshot();

        let res = graph.edit(|tx| {
            tx.add_device(Device::new("U2", DeviceRole::User, Some("A")))?;
            tx.add_link("U2", "missing", None)
        });
        assert!(matches!(res, Err(AltoError::UnknownDevice(_))));
        assert_eq!(graph.version(), before.version());
        assert!(graph.device_by_name("U2").is_none());
    }

    #[test]
    fn test_duplicate_device_rejected() {
        let graph = tree();
        assert!(graph.add_device(Device::new("R", DeviceRole::Router, None)).is_err());
        assert_eq!(graph.version(), 1);
    }

    #[test]
    fn test_map_tag_tracks_version() {
        let graph = tree();
        let a = graph.snapshot().map_tag();
        let b = graph.snapshot().map_tag();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        graph.add_pid(Pid::new("pid-a", vec![net("10.0.0.0/24")]).unwrap()).unwrap();
        let b = graph.snapshot().map_tag();
        assert_ne!(b, a);

        graph.add_device(Device::new("R2", DeviceRole::Router, None)).unwrap();
        let c = graph.snapshot().map_tag();
        assert_ne!(c, b);

        graph.add_link("R", "R2", Some(1_000_000_000)).unwrap();
        assert_ne!(graph.snapshot().map_tag(), c);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let graph = tree();
        let snap = graph.snapshot();
        graph.add_device(Device::new("R2", DeviceRole::Router, None)).unwrap();
        assert!(snap.device_by_name("R2").is_none());
        assert!(graph.snapshot().device_by_name("R2").is_some());
    }

    #[test]
    fn test_device_by_ip_exact_match() {
        let graph = tree();
        let snap = graph.snapshot();
        assert_eq!(snap.device_by_ip("10.0.0.2".parse().unwrap()).unwrap().name(), "U1");
        assert!(snap.device_by_ip("10.0.0.3".parse().unwrap()).is_none());
    }

    #[test]
    fn test_pid_last_write_wins() {
        let graph = tree();
        graph.add_pid(Pid::new("p", vec![net("10.0.0.0/24")]).unwrap()).unwrap();
        graph.add_pid(Pid::new("p", vec![net("10.1.0.0/24")]).unwrap()).unwrap();
        let snap = graph.snapshot();
        assert_eq!(snap.pids().count(), 1);
        assert_eq!(snap.resolve_pid("10.1.0.9".parse().unwrap()), Some("p"));
        assert_eq!(snap.resolve_pid("10.0.0.9".parse().unwrap()), None);
    }

    #[test]
    fn test_upstream_router() {
        let graph = tree();
        let snap = graph.snapshot();
        assert_eq!(snap.upstream_router("U1", 16).unwrap().name(), "R");
        assert_eq!(snap.upstream_router("R", 16).unwrap().name(), "R");
        assert!(snap.upstream_router("nope", 16).is_none());
    }

    #[test]
    fn test_upstream_cycle_terminates() {
        let graph = TopologyGraph::new();
        graph
            .edit(|tx| {
                tx.add_device(Device::new("a", DeviceRole::AccessNode, Some("b")))?;
                tx.add_device(Device::new("b", DeviceRole::AccessNode, Some("a")))?;
                Ok(())
            })
            .unwrap();
        assert!(graph.snapshot().upstream_router("a", 8).is_none());
    }

    #[test]
    fn test_next_toward() {
        let graph = tree();
        let snap = graph.snapshot();
        let u1 = snap.device_by_name("U1").unwrap();
        assert_eq!(snap.next_toward("R", &u1, 8).unwrap().name(), "A");
        assert_eq!(snap.next_toward("A", &u1, 8).unwrap().name(), "U1");
        assert!(snap.next_toward("U1", &u1, 8).is_none());
    }

    #[test]
    fn test_concurrent_readers_see_complete_versions() {
        let graph = Arc::new(TopologyGraph::new());

        let writer = {
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                for i in 0..50 {
                    graph
                        .edit(|tx| {
                            let a = format!("r{}a", i);
                            let b = format!("r{}b", i);
                            tx.add_device(Device::new(a.clone(), DeviceRole::Router, None))?;
                            tx.add_device(Device::new(b.clone(), DeviceRole::Router, None))?;
                            tx.add_link(&a, &b, None)
                        })
                        .unwrap();
                }
            })
        };

        for _ in 0..200 {
            let snap = graph.snapshot();
            // every version adds exactly two devices and two edges
            assert_eq!(snap.device_count() as u64, snap.version() * 2);
            assert_eq!(snap.link_count() as u64, snap.version() * 2);
        }
        writer.join().unwrap();
        assert_eq!(graph.version(), 50);
    }
}
