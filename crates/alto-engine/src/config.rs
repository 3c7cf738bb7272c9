//! Engine Configuration

use crate::cost::MissingCapacityPolicy;
use alto_common::AltoResult;
use alto_topology::{PidMatchPolicy, TopologyPreset, DEFAULT_COUNTER_HISTORY, DEFAULT_HOP_BUDGET};
use serde::{Deserialize, Serialize};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Router forwarding decisions allowed in a single path trace
    pub trace_hop_budget: u32,
    /// Counter snapshots kept per device
    pub counter_history_len: usize,
    /// Ranking of overlapping PIDs
    pub pid_match: PidMatchPolicy,
    /// Path load handling of links without capacity
    pub missing_capacity: MissingCapacityPolicy,
    /// Physical adjacency file loaded at startup
    pub adjacency_path: Option<String>,
    /// Topology seeded at startup
    pub topology: TopologyPreset,
    /// Capacity of seeded links in bits/second
    pub default_link_capacity_bps: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_hop_budget: DEFAULT_HOP_BUDGET,
            counter_history_len: DEFAULT_COUNTER_HISTORY,
            pid_match: PidMatchPolicy::LongestPrefix,
            missing_capacity: MissingCapacityPolicy::Omit,
            adjacency_path: None,
            topology: TopologyPreset::None,
            default_link_capacity_bps: None,
        }
    }
}

impl EngineConfig {
    /// Load from file
    pub fn load(path: &str) -> AltoResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to file
    pub fn save(&self, path: &str) -> AltoResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
