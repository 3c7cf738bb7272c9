//! ALTO Common - Shared types for the ALTO engine
//!
//! This crate provides:
//! - The error taxonomy shared by topology and engine crates
//! - The endpoint address codec (`"ipv4:..."`, `"ipv6:..."`)
//! - Version tags identifying a network map snapshot

#![warn(missing_docs)]

pub mod address;
pub mod error;

pub use address::{AddressCodec, AddressParser, IpAddrParser};
pub use error::*;

use serde::{Deserialize, Serialize};

/// Resource id of the (single) network map served by the engine
pub const NETWORK_MAP_RESOURCE_ID: &str = "network-map";

/// Version tag of an information resource ([RFC7285] §10.3)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionTag {
    /// Resource identifier
    #[serde(rename = "resource-id")]
    pub resource_id: String,
    /// Opaque tag
    pub tag: String,
}

impl VersionTag {
    /// Tag of the network map resource
    pub fn network_map(tag: impl Into<String>) -> Self {
        Self {
            resource_id: NETWORK_MAP_RESOURCE_ID.to_string(),
            tag: tag.into(),
        }
    }
}
