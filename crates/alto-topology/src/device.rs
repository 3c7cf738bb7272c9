//! Network device model
//!
//! A [`Device`] has an immutable identity (name, role, upstream) and a block
//! of telemetry that collectors overwrite at runtime. Each device guards its
//! telemetry with its own lock so uploads to different devices never contend.

use alto_common::{AltoError, AltoResult};
use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::net::IpAddr;

/// Number of counter snapshots kept per device
pub const DEFAULT_COUNTER_HISTORY: usize = 10;

/// Device role in the access/aggregation tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceRole {
    /// L3 device with a forwarding table
    Router,
    /// L2 aggregation device (DSLAM, switch)
    #[serde(alias = "adslam")]
    AccessNode,
    /// End-user host
    User,
}

impl DeviceRole {
    /// Wire name of the role
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::AccessNode => "access-node",
            Self::User => "user",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address assigned to a device interface, as uploaded by a collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Address with prefix length, e.g. `10.0.0.2/24`
    pub address: IpNetwork,
    /// Interface carrying the address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

/// Route flags from the kernel table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFlags {
    /// Route is up (`U`)
    pub up: bool,
    /// Route uses a gateway (`G`)
    pub gateway: bool,
}

/// Forwarding table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Destination network
    pub destination: IpNetwork,
    /// Gateway, `None` for directly attached networks
    pub gateway: Option<IpAddr>,
    /// Flags
    pub flags: RouteFlags,
    /// Route metric
    pub metric: u32,
    /// Output interface
    pub interface: String,
}

impl RouteEntry {
    /// Gateway to relay through, if the destination is not directly attached
    pub fn next_hop(&self) -> Option<IpAddr> {
        if self.flags.gateway {
            self.gateway
        } else {
            None
        }
    }

    /// Whether this is a default route
    pub fn is_default(&self) -> bool {
        self.destination.prefix() == 0
    }
}

/// Kernel routing table row as pushed by the stats collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRow {
    /// Output interface
    pub ifname: String,
    /// Destination network address
    pub destination: String,
    /// Gateway address (`0.0.0.0` when none)
    pub gateway: String,
    /// Flag letters (`U`, `G`, ...)
    #[serde(default)]
    pub flags: Vec<String>,
    /// Metric
    #[serde(default)]
    pub metric: u32,
    /// Netmask in dotted form or as prefix length
    pub mask: String,
}

impl TryFrom<RouteRow> for RouteEntry {
    type Error = AltoError;

    fn try_from(row: RouteRow) -> AltoResult<Self> {
        let dest: IpAddr = row
            .destination
            .parse()
            .map_err(|_| AltoError::InvalidInput(format!("bad route destination: {}", row.destination)))?;

        let network = match row.mask.parse::<u8>() {
            Ok(prefix) => IpNetwork::new(dest, prefix),
            Err(_) => {
                let mask: IpAddr = row
                    .mask
                    .parse()
                    .map_err(|_| AltoError::InvalidInput(format!("bad route mask: {}", row.mask)))?;
                IpNetwork::with_netmask(dest, mask)
            }
        }
        .map_err(|e| AltoError::InvalidInput(format!("bad route {}/{}: {}", row.destination, row.mask, e)))?;

        let gateway = if row.gateway.is_empty() {
            None
        } else {
            let gw: IpAddr = row
                .gateway
                .parse()
                .map_err(|_| AltoError::InvalidInput(format!("bad route gateway: {}", row.gateway)))?;
            (!gw.is_unspecified()).then_some(gw)
        };

        let flags = RouteFlags {
            up: row.flags.iter().any(|f| f == "U"),
            gateway: row.flags.iter().any(|f| f == "G"),
        };

        Ok(Self {
            destination: normalize(network),
            gateway,
            flags,
            metric: row.metric,
            interface: row.ifname,
        })
    }
}

/// Origin of a route in the routing daemon's table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteProtocol {
    /// OSPF
    Ospf,
    /// Directly connected
    Connected,
    /// Kernel route
    Kernel,
    /// Static route
    Static,
    /// BGP
    Bgp,
    /// RIP
    Rip,
    /// Any other protocol code
    Other(String),
}

impl From<&str> for RouteProtocol {
    fn from(code: &str) -> Self {
        match code {
            "O" => Self::Ospf,
            "C" => Self::Connected,
            "K" => Self::Kernel,
            "S" => Self::Static,
            "B" => Self::Bgp,
            "R" => Self::Rip,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Routing daemon (link-state view) table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltRouteEntry {
    /// Protocol the route was learned from
    pub protocol: RouteProtocol,
    /// Destination network
    pub subnet: IpNetwork,
    /// Advertised routing distance
    pub distance: u32,
    /// Next hop, if reported
    pub next_hop: Option<IpAddr>,
    /// Output interface, if reported
    pub interface: Option<String>,
}

/// Routing daemon table row as pushed by the stats collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AltRouteRow {
    /// Protocol code (`O`, `C`, `K`, ...)
    pub protocol: String,
    /// Destination network in CIDR form
    pub subnet: String,
    /// Routing distance
    #[serde(rename = "RD")]
    pub distance: u32,
    /// Next hop
    #[serde(default)]
    pub nexthop: Option<IpAddr>,
    /// Output interface
    #[serde(default)]
    pub ifname: Option<String>,
}

impl TryFrom<AltRouteRow> for AltRouteEntry {
    type Error = AltoError;

    fn try_from(row: AltRouteRow) -> AltoResult<Self> {
        let subnet: IpNetwork = row
            .subnet
            .parse()
            .map_err(|_| AltoError::InvalidInput(format!("bad subnet: {}", row.subnet)))?;

        Ok(Self {
            protocol: RouteProtocol::from(row.protocol.as_str()),
            subnet: normalize(subnet),
            distance: row.distance,
            next_hop: row.nexthop,
            interface: row.ifname,
        })
    }
}

/// Byte/packet counters of one interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    /// Received bytes
    #[serde(default)]
    pub rx_bytes: u64,
    /// Transmitted bytes
    #[serde(default)]
    pub tx_bytes: u64,
    /// Remaining counters (packets, errors, drops, ...)
    #[serde(flatten)]
    pub other: BTreeMap<String, u64>,
}

/// Counters of one adapter as pushed by the stats collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterStats {
    /// Local interface name
    pub name: String,
    /// Counter values
    pub stats: InterfaceCounters,
}

/// Timestamped counters of all interfaces of a device
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    /// Arrival time
    pub timestamp: DateTime<Utc>,
    /// Counters per local interface name
    pub interfaces: BTreeMap<String, InterfaceCounters>,
}

/// Traffic direction on an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received traffic
    Rx,
    /// Transmitted traffic
    Tx,
}

#[derive(Debug, Default)]
struct DeviceState {
    interfaces: Vec<IpNetwork>,
    address_details: Vec<AddressRecord>,
    routing_table: Vec<RouteEntry>,
    alt_routing_table: Vec<AltRouteEntry>,
    counter_history: VecDeque<CounterSnapshot>,
}

/// Single network element
#[derive(Debug)]
pub struct Device {
    name: String,
    role: DeviceRole,
    upstream: Option<String>,
    history_len: usize,
    state: RwLock<DeviceState>,
}

impl Device {
    /// Create device without addresses
    pub fn new(name: impl Into<String>, role: DeviceRole, upstream: Option<&str>) -> Self {
        Self {
            name: name.into(),
            role,
            upstream: upstream.map(str::to_string),
            history_len: DEFAULT_COUNTER_HISTORY,
            state: RwLock::new(DeviceState::default()),
        }
    }

    /// Set initial interface addresses
    pub fn with_interfaces(self, interfaces: Vec<IpNetwork>) -> Self {
        self.state.write().interfaces = interfaces;
        self
    }

    /// Set counter history capacity (at least 2 samples are kept)
    pub fn with_history_len(mut self, len: usize) -> Self {
        self.history_len = len.max(2);
        self
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device role
    pub fn role(&self) -> DeviceRole {
        self.role
    }

    /// Name of the device one level toward the core
    pub fn upstream(&self) -> Option<&str> {
        self.upstream.as_deref()
    }

    /// Whether the device forwards at L3
    #[inline]
    pub fn is_router(&self) -> bool {
        self.role == DeviceRole::Router
    }

    /// Configured interface addresses
    pub fn interfaces(&self) -> Vec<IpNetwork> {
        self.state.read().interfaces.clone()
    }

    /// Raw address records from the last address upload
    pub fn address_details(&self) -> Vec<AddressRecord> {
        self.state.read().address_details.clone()
    }

    /// Whether any interface carries exactly this address
    pub fn has_address(&self, addr: IpAddr) -> bool {
        self.state.read().interfaces.iter().any(|i| i.ip() == addr)
    }

    /// Interface carrying exactly this address
    pub fn interface_for(&self, addr: IpAddr) -> Option<IpNetwork> {
        self.state.read().interfaces.iter().find(|i| i.ip() == addr).copied()
    }

    /// Replace interface addresses
    pub fn update_interface_addresses(&self, records: Vec<AddressRecord>) {
        let mut state = self.state.write();
        state.interfaces = records.iter().map(|r| r.address).collect();
        for iface in &state.interfaces {
            tracing::debug!("{}: added interface {}", self.name, iface);
        }
        state.address_details = records;
    }

    /// Append a counter snapshot stamped with the current time
    pub fn record_counters(&self, stats: Vec<AdapterStats>) {
        self.record_counters_at(Utc::now(), stats);
    }

    /// Append a counter snapshot, evicting the oldest one when full
    pub fn record_counters_at(&self, timestamp: DateTime<Utc>, stats: Vec<AdapterStats>) {
        let snapshot = CounterSnapshot {
            timestamp,
            interfaces: stats.into_iter().map(|a| (a.name, a.stats)).collect(),
        };

        let mut state = self.state.write();
        while state.counter_history.len() >= self.history_len {
            state.counter_history.pop_front();
        }
        state.counter_history.push_back(snapshot);
    }

    /// Number of stored counter snapshots
    pub fn counter_samples(&self) -> usize {
        self.state.read().counter_history.len()
    }

    /// Most recent counter snapshot
    pub fn latest_counters(&self) -> Option<CounterSnapshot> {
        self.state.read().counter_history.back().cloned()
    }

    /// Replace the forwarding table (routers only)
    pub fn update_routing_table(&self, table: Vec<RouteEntry>) -> AltoResult<()> {
        self.ensure_router()?;
        self.state.write().routing_table = table;
        Ok(())
    }

    /// Replace the routing daemon table (routers only)
    pub fn update_alt_routing_table(&self, table: Vec<AltRouteEntry>) -> AltoResult<()> {
        self.ensure_router()?;
        self.state.write().alt_routing_table = table;
        Ok(())
    }

    /// Forwarding table, empty for non-routers
    pub fn routing_table(&self) -> Vec<RouteEntry> {
        self.state.read().routing_table.clone()
    }

    /// Routing daemon table, empty for non-routers
    pub fn alt_routing_table(&self) -> Vec<AltRouteEntry> {
        self.state.read().alt_routing_table.clone()
    }

    /// Longest-prefix match in the forwarding table.
    ///
    /// With `allow_default` the first gateway route is returned when no
    /// network contains `dst`.
    pub fn route_lookup(&self, dst: IpAddr, allow_default: bool) -> Option<RouteEntry> {
        let state = self.state.read();

        let best = state
            .routing_table
            .iter()
            .filter(|r| r.destination.contains(dst))
            .max_by_key(|r| r.destination.prefix());

        match best {
            Some(entry) => Some(entry.clone()),
            None if allow_default => state.routing_table.iter().find(|r| r.flags.gateway).cloned(),
            None => None,
        }
    }

    /// Smallest OSPF distance advertised for a network containing `dst`
    pub fn ospf_distance(&self, dst: IpAddr) -> Option<u32> {
        self.state
            .read()
            .alt_routing_table
            .iter()
            .filter(|r| r.protocol == RouteProtocol::Ospf && r.subnet.contains(dst))
            .map(|r| r.distance)
            .min()
    }

    /// Load in bits/second from the two most recent snapshots
    pub fn load(&self, interface: &str, direction: Direction) -> Option<f64> {
        let state = self.state.read();
        let n = state.counter_history.len();
        if n < 2 {
            return None;
        }

        let newer = &state.counter_history[n - 1];
        let older = &state.counter_history[n - 2];

        let (Some(new_c), Some(old_c)) = (newer.interfaces.get(interface), older.interfaces.get(interface)) else {
            tracing::warn!("Did not find adapter {} in node {}", interface, self.name);
            return None;
        };

        let (new_bytes, old_bytes) = match direction {
            Direction::Rx => (new_c.rx_bytes, old_c.rx_bytes),
            Direction::Tx => (new_c.tx_bytes, old_c.tx_bytes),
        };

        let delta_bytes = new_bytes.checked_sub(old_bytes)?;
        let delta_us = (newer.timestamp - older.timestamp).num_microseconds()?;
        if delta_us <= 0 {
            return None;
        }

        Some(delta_bytes as f64 * 8.0 * 1_000_000.0 / delta_us as f64)
    }

    /// Transmit load in bits/second
    pub fn tx_load(&self, interface: &str) -> Option<f64> {
        self.load(interface, Direction::Tx)
    }

    /// Receive load in bits/second
    pub fn rx_load(&self, interface: &str) -> Option<f64> {
        self.load(interface, Direction::Rx)
    }

    fn ensure_router(&self) -> AltoResult<()> {
        if self.is_router() {
            Ok(())
        } else {
            Err(AltoError::InvalidRole {
                device: self.name.clone(),
                role: self.role.to_string(),
            })
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node: {} Type: {}", self.name, self.role)
    }
}

fn normalize(net: IpNetwork) -> IpNetwork {
    IpNetwork::new(net.network(), net.prefix()).unwrap_or(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn stats(name: &str, rx: u64, tx: u64) -> AdapterStats {
        AdapterStats {
            name: name.to_string(),
            stats: InterfaceCounters {
                rx_bytes: rx,
                tx_bytes: tx,
                other: BTreeMap::new(),
            },
        }
    }

    fn row(dest: &str, mask: &str, gw: &str, flags: &[&str], ifname: &str) -> RouteRow {
        RouteRow {
            ifname: ifname.to_string(),
            destination: dest.to_string(),
            gateway: gw.to_string(),
            flags: flags.iter().map(|f| f.to_string()).collect(),
            metric: 0,
            mask: mask.to_string(),
        }
    }

    #[test]
    fn test_route_row_conversion() {
        let entry = RouteEntry::try_from(row("10.0.1.0", "255.255.255.0", "10.0.0.1", &["U", "G"], "eth0")).unwrap();
        assert_eq!(entry.destination, "10.0.1.0/24".parse::<IpNetwork>().unwrap());
        assert_eq!(entry.next_hop(), Some("10.0.0.1".parse().unwrap()));

        let direct = RouteEntry::try_from(row("10.0.2.7", "24", "0.0.0.0", &["U"], "eth1")).unwrap();
        assert_eq!(direct.destination, "10.0.2.0/24".parse::<IpNetwork>().unwrap());
        assert_eq!(direct.gateway, None);
        assert_eq!(direct.next_hop(), None);
    }

    #[test]
    fn test_route_row_rejects_garbage() {
        assert!(RouteEntry::try_from(row("nope", "24", "0.0.0.0", &["U"], "eth0")).is_err());
        assert!(RouteEntry::try_from(row("10.0.0.0", "255.0.255.0", "0.0.0.0", &["U"], "eth0")).is_err());
    }

    #[test]
    fn test_routing_table_requires_router() {
        let user = Device::new("home-0-0", DeviceRole::User, Some("adslam-0"));
        let err = user.update_routing_table(Vec::new()).unwrap_err();
        assert!(matches!(err, AltoError::InvalidRole { .. }));
        assert!(user.update_alt_routing_table(Vec::new()).is_err());

        let router = Device::new("bras-0", DeviceRole::Router, None);
        assert!(router.update_routing_table(Vec::new()).is_ok());
    }

    #[test]
    fn test_longest_prefix_match() {
        let router = Device::new("bras-0", DeviceRole::Router, None);
        let table = vec![
            row("0.0.0.0", "0", "10.0.0.254", &["U", "G"], "eth0"),
            row("10.0.0.0", "8", "10.0.0.1", &["U", "G"], "eth1"),
            row("10.1.0.0", "16", "0.0.0.0", &["U"], "eth2"),
        ]
        .into_iter()
        .map(|r| RouteEntry::try_from(r).unwrap())
        .collect();
        router.update_routing_table(table).unwrap();

        let hit = router.route_lookup("10.1.2.3".parse().unwrap(), false).unwrap();
        assert_eq!(hit.interface, "eth2");

        let hit = router.route_lookup("10.9.9.9".parse().unwrap(), false).unwrap();
        assert_eq!(hit.interface, "eth1");

        let hit = router.route_lookup("8.8.8.8".parse().unwrap(), false).unwrap();
        assert!(hit.is_default());
    }

    #[test]
    fn test_default_fallback() {
        let router = Device::new("bras-0", DeviceRole::Router, None);
        let entries = vec![
            RouteEntry::try_from(row("10.0.0.0", "8", "0.0.0.0", &["U"], "eth1")).unwrap(),
            RouteEntry::try_from(row("172.16.0.0", "12", "10.0.0.9", &["U", "G"], "eth0")).unwrap(),
        ];
        router.update_routing_table(entries).unwrap();

        let dst = "8.8.8.8".parse().unwrap();
        assert!(router.route_lookup(dst, false).is_none());
        assert_eq!(router.route_lookup(dst, true).unwrap().interface, "eth0");
    }

    #[test]
    fn test_counter_history_is_bounded() {
        let dev = Device::new("adslam-0", DeviceRole::AccessNode, Some("bras-0"));
        let start = Utc::now();
        for i in 0..15 {
            dev.record_counters_at(start + Duration::seconds(i), vec![stats("eth0", i as u64, 0)]);
        }
        assert_eq!(dev.counter_samples(), DEFAULT_COUNTER_HISTORY);
        let latest = dev.latest_counters().unwrap();
        assert_eq!(latest.interfaces["eth0"].rx_bytes, 14);
    }

    #[test]
    fn test_load_from_last_two_samples() {
        let dev = Device::new("adslam-0", DeviceRole::AccessNode, Some("bras-0"));
        let start = Utc::now();
        assert_eq!(dev.tx_load("eth0"), None);

        dev.record_counters_at(start, vec![stats("eth0", 0, 0)]);
        assert_eq!(dev.tx_load("eth0"), None);

        dev.record_counters_at(start + Duration::seconds(2), vec![stats("eth0", 1_000, 500)]);
        assert_eq!(dev.rx_load("eth0"), Some(4_000.0));
        assert_eq!(dev.tx_load("eth0"), Some(2_000.0));
        assert_eq!(dev.tx_load("eth1"), None);
    }

    #[test]
    fn test_load_ignores_counter_reset() {
        let dev = Device::new("adslam-0", DeviceRole::AccessNode, Some("bras-0"));
        let start = Utc::now();
        dev.record_counters_at(start, vec![stats("eth0", 5_000, 0)]);
        dev.record_counters_at(start + Duration::seconds(1), vec![stats("eth0", 10, 0)]);
        assert_eq!(dev.rx_load("eth0"), None);
    }

    #[test]
    fn test_address_update_replaces() {
        let dev = Device::new("home-0-0", DeviceRole::User, Some("adslam-0"))
            .with_interfaces(vec!["10.0.0.2/24".parse().unwrap()]);
        assert!(dev.has_address("10.0.0.2".parse().unwrap()));

        dev.update_interface_addresses(vec![AddressRecord {
            address: "10.0.0.7/24".parse().unwrap(),
            interface: Some("eth0".into()),
        }]);
        assert!(!dev.has_address("10.0.0.2".parse().unwrap()));
        assert!(dev.has_address("10.0.0.7".parse().unwrap()));
        assert_eq!(dev.address_details().len(), 1);
    }

    #[test]
    fn test_ospf_distance_minimum() {
        let router = Device::new("bras-0", DeviceRole::Router, None);
        let rows = vec![
            AltRouteRow { protocol: "O".into(), subnet: "10.0.0.0/8".into(), distance: 30, nexthop: None, ifname: None },
            AltRouteRow { protocol: "O".into(), subnet: "10.1.0.0/16".into(), distance: 20, nexthop: None, ifname: None },
            AltRouteRow { protocol: "C".into(), subnet: "10.1.1.0/24".into(), distance: 0, nexthop: None, ifname: None },
        ];
        let table = rows.into_iter().map(|r| AltRouteEntry::try_from(r).unwrap()).collect();
        router.update_alt_routing_table(table).unwrap();

        assert_eq!(router.ospf_distance("10.1.1.1".parse().unwrap()), Some(20));
        assert_eq!(router.ospf_distance("10.2.0.1".parse().unwrap()), Some(30));
        assert_eq!(router.ospf_distance("192.168.0.1".parse().unwrap()), None);
    }

    #[test]
    fn test_counters_wire_format() {
        let json = r#"[{"name": "eth0", "stats": {"rx_bytes": 10, "tx_bytes": 20, "rx_errors": 1}}]"#;
        let parsed: Vec<AdapterStats> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0].stats.tx_bytes, 20);
        assert_eq!(parsed[0].stats.other["rx_errors"], 1);
    }
}
