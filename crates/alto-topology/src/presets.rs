//! Reference topologies for development and testing
//!
//! Both presets build a BRAS -> access node -> home tree. Homes of access
//! node `K` get `192.168.K.2` .. `192.168.K.8`, and each access node is
//! exported as a PID covering `192.168.K.0/24`.

use crate::device::{Device, DeviceRole, DEFAULT_COUNTER_HISTORY};
use crate::graph::{TopologyEdit, TopologyGraph};
use crate::pid::Pid;
use alto_common::{AltoError, AltoResult};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

const HOMES_PER_ACCESS_NODE: u8 = 7;

/// Built-in topology to seed the graph with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyPreset {
    /// Start empty
    #[default]
    None,
    /// `core-dev` plus a ring of six BRAS routers
    Simple,
    /// `core-0` plus three meshed BRAS routers
    Small,
}

/// Knobs applied to every preset device and link
#[derive(Debug, Clone, Copy)]
pub struct PresetOptions {
    /// Capacity of every link in bits/second
    pub link_capacity: Option<u64>,
    /// Counter history length of every device
    pub history_len: usize,
}

impl Default for PresetOptions {
    fn default() -> Self {
        Self {
            link_capacity: None,
            history_len: DEFAULT_COUNTER_HISTORY,
        }
    }
}

impl TopologyPreset {
    /// Build the preset into `graph` as one structural change
    pub fn apply(self, graph: &TopologyGraph, opts: PresetOptions) -> AltoResult<()> {
        match self {
            Self::None => return Ok(()),
            Self::Simple => graph.edit(|tx| build_simple(tx, opts))?,
            Self::Small => graph.edit(|tx| build_small(tx, opts))?,
        }

        let snap = graph.snapshot();
        tracing::info!(
            "Seeded {:?} topology: {} devices, {} links, version {}",
            self,
            snap.device_count(),
            snap.link_count(),
            snap.version()
        );
        Ok(())
    }
}

fn build_simple(tx: &mut TopologyEdit<'_>, opts: PresetOptions) -> AltoResult<()> {
    // Development machine, not wired to the access network
    tx.add_device(Device::new("core-dev", DeviceRole::Router, None).with_history_len(opts.history_len))?;

    let mut next_access = 0;
    for bras in 0..6 {
        add_bras(tx, bras, 3, &mut next_access, opts)?;
    }

    for (a, b) in [(0, 1), (1, 2), (0, 3), (2, 5), (3, 4), (4, 5)] {
        tx.add_link(&bras_name(a), &bras_name(b), opts.link_capacity)?;
    }
    Ok(())
}

fn build_small(tx: &mut TopologyEdit<'_>, opts: PresetOptions) -> AltoResult<()> {
    tx.add_device(Device::new("core-0", DeviceRole::Router, None).with_history_len(opts.history_len))?;
    tx.add_pid(Pid::new(
        "core-dc",
        [prefix(Ipv4Addr::new(192, 168, 240, 0), 24)?, prefix(Ipv4Addr::new(192, 168, 245, 0), 24)?],
    )?);

    let mut next_access = 0;
    for bras in 0..3 {
        add_bras(tx, bras, 2, &mut next_access, opts)?;
    }

    for (a, b) in [(0, 1), (1, 2), (0, 2)] {
        tx.add_link(&bras_name(a), &bras_name(b), opts.link_capacity)?;
    }
    tx.add_link(&bras_name(0), "core-0", opts.link_capacity)?;
    tx.add_link(&bras_name(2), "core-0", opts.link_capacity)?;
    Ok(())
}

fn add_bras(
    tx: &mut TopologyEdit<'_>,
    bras: u8,
    access_nodes: u8,
    next_access: &mut u8,
    opts: PresetOptions,
) -> AltoResult<()> {
    let bras = bras_name(bras);
    tx.add_device(Device::new(bras.as_str(), DeviceRole::Router, None).with_history_len(opts.history_len))?;

    for _ in 0..access_nodes {
        let k = *next_access;
        *next_access += 1;

        let access = format!("adslam-{}", k);
        tx.add_device(
            Device::new(access.as_str(), DeviceRole::AccessNode, Some(bras.as_str())).with_history_len(opts.history_len),
        )?;
        tx.add_link(&access, &bras, opts.link_capacity)?;

        for home in 0..HOMES_PER_ACCESS_NODE {
            let name = format!("home-{}-{}", k, home);
            let addr = prefix(Ipv4Addr::new(192, 168, k, home + 2), 32)?;
            tx.add_device(
                Device::new(name.as_str(), DeviceRole::User, Some(access.as_str()))
                    .with_interfaces(vec![addr])
                    .with_history_len(opts.history_len),
            )?;
            tx.add_link(&name, &access, opts.link_capacity)?;
        }

        tx.add_pid(Pid::new(access, [prefix(Ipv4Addr::new(192, 168, k, 0), 24)?])?);
    }
    Ok(())
}

fn bras_name(id: u8) -> String {
    format!("bras-{}", id)
}

fn prefix(addr: Ipv4Addr, len: u8) -> AltoResult<IpNetwork> {
    IpNetwork::new(IpAddr::V4(addr), len).map_err(|e| AltoError::InvalidInput(e.to_string()))
}
