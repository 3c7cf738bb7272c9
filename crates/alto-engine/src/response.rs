//! Request and response records ([RFC7285] §11)

use crate::cost::{CostType, CostValue};
use alto_common::VersionTag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source and destination endpoints of a cost query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointFilter {
    /// Source endpoints (`"ipv4:..."`)
    #[serde(default)]
    pub srcs: Vec<String>,
    /// Destination endpoints
    #[serde(default)]
    pub dsts: Vec<String>,
}

/// Prefixes of one PID, by address family
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidAddressGroup {
    /// IPv4 prefixes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv4: Vec<String>,
    /// IPv6 prefixes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv6: Vec<String>,
}

/// Network map metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMapMeta {
    /// Version of the map
    pub vtag: VersionTag,
}

/// Full network map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMapResponse {
    /// Metadata
    pub meta: NetworkMapMeta,
    /// Address groups per PID name
    #[serde(rename = "network-map")]
    pub network_map: BTreeMap<String, PidAddressGroup>,
}

/// Endpoint property metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertiesMeta {
    /// Versions of the resources the values were derived from
    #[serde(rename = "dependent-vtags")]
    pub dependent_vtags: Vec<VersionTag>,
}

/// Endpoint properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPropertiesResponse {
    /// Metadata
    pub meta: PropertiesMeta,
    /// Property values per endpoint
    #[serde(rename = "endpoint-properties")]
    pub endpoint_properties: BTreeMap<String, BTreeMap<String, String>>,
}

/// Endpoint cost metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostMeta {
    /// Cost type of the values
    #[serde(rename = "cost-type")]
    pub cost_type: CostType,
}

/// Endpoint cost map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCostResponse {
    /// Metadata
    pub meta: CostMeta,
    /// Cost per source and destination endpoint
    #[serde(rename = "endpoint-cost-map")]
    pub endpoint_cost_map: BTreeMap<String, BTreeMap<String, CostValue>>,
}
