//! Physical adjacency between device interfaces
//!
//! Loaded once at startup from the simulator's topology database:
//!
//! ```json
//! {
//!   "links": { "b.1": ["n1.0", "n2.0"] },
//!   "names": { "bras-0": [["n1.0", "eth0"]], "adslam-0": [["n2.0", "eth1"]] }
//! }
//! ```
//!
//! `links` pairs global adapter names that share a bridge; `names` maps each
//! host to its `(global, local)` adapter names.

use crate::graph::TopologyState;
use alto_common::{AltoError, AltoResult};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct AdjacencyFile {
    links: BTreeMap<String, Vec<String>>,
    names: BTreeMap<String, Vec<(String, String)>>,
}

/// Adapter at one end of a link: `(device, local interface)`
pub type Endpoint = (String, String);

/// Read-only index of physical links
#[derive(Debug, Default, Clone)]
pub struct AdjacencyIndex {
    /// global adapter -> global adapter at the other end
    peers: HashMap<String, String>,
    /// global adapter -> (device, local adapter)
    owners: HashMap<String, Endpoint>,
    /// device -> [(global, local)]
    adapters: HashMap<String, Vec<(String, String)>>,
}

impl AdjacencyIndex {
    /// Index without any links
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a topology database file
    pub fn load(path: impl AsRef<Path>) -> AltoResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AltoError::TopologyLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse and validate a topology database document
    pub fn from_json(content: &str) -> AltoResult<Self> {
        let file: AdjacencyFile =
            serde_json::from_str(content).map_err(|e| AltoError::TopologyLoad(format!("malformed adjacency data: {}", e)))?;
        Self::build(file)
    }

    fn build(file: AdjacencyFile) -> AltoResult<Self> {
        let mut index = Self::default();

        for (device, adapters) in file.names {
            for (global, local) in &adapters {
                if let Some((other, _)) = index.owners.insert(global.clone(), (device.clone(), local.clone())) {
                    return Err(load_error(format!(
                        "adapter {} claimed by both {} and {}",
                        global, other, device
                    )));
                }
            }
            index.adapters.insert(device, adapters);
        }

        for (bridge, adapters) in file.links {
            let [a, b] = adapters.as_slice() else {
                return Err(load_error(format!(
                    "bridge {} has {} adapters, expected 2",
                    bridge,
                    adapters.len()
                )));
            };

            for global in [a, b] {
                if !index.owners.contains_key(global) {
                    return Err(load_error(format!("no host having global adapter {}", global)));
                }
            }

            index.peers.insert(a.clone(), b.clone());
            index.peers.insert(b.clone(), a.clone());
        }

        tracing::info!(
            "Loaded adjacency data: {} links, {} devices",
            index.peers.len() / 2,
            index.adapters.len()
        );
        Ok(index)
    }

    /// Number of indexed devices
    pub fn device_count(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no links are known
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Global adapter name of a device's local interface
    pub fn global_name(&self, device: &str, local: &str) -> Option<&str> {
        self.adapters
            .get(device)?
            .iter()
            .find(|(_, l)| l == local)
            .map(|(g, _)| g.as_str())
    }

    /// Local interface name of a device's global adapter
    pub fn local_name(&self, device: &str, global: &str) -> Option<&str> {
        self.adapters
            .get(device)?
            .iter()
            .find(|(g, _)| g == global)
            .map(|(_, l)| l.as_str())
    }

    /// Device and local interface at the far end of `device`'s `local` interface
    pub fn remote_peer(&self, device: &str, local: &str) -> Option<Endpoint> {
        let Some(global) = self.global_name(device, local) else {
            tracing::warn!("No connection found to {} adapter {}", device, local);
            return None;
        };
        let remote = self.peers.get(global)?;
        self.owners.get(remote).cloned()
    }

    /// Local interface names `(on a, on b)` of a link between two devices
    pub fn adapters_between(&self, a: &str, b: &str) -> Option<(String, String)> {
        self.adapters.get(a)?.iter().find_map(|(global, local)| {
            let remote = self.peers.get(global)?;
            let (host, remote_local) = self.owners.get(remote)?;
            (host == b).then(|| (local.clone(), remote_local.clone()))
        })
    }

    /// Check every indexed device exists in the topology
    pub fn validate_devices(&self, topo: &TopologyState) -> AltoResult<()> {
        let mut names: Vec<_> = self.adapters.keys().collect();
        names.sort();
        for name in names {
            if topo.device_by_name(name).is_none() {
                return Err(load_error(format!("adjacency data references unknown device {}", name)));
            }
        }
        Ok(())
    }
}

fn load_error(msg: String) -> AltoError {
    tracing::error!("Adjacency validation failed: {}", msg);
    AltoError::TopologyLoad(msg)
}
