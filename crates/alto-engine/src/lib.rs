//! ALTO Engine - Query and upload handling for an ALTO server
//!
//! ```text
//!   query ──► AltoEngine ──► AddressCodec ──► CostRegistry / PropertyRegistry
//!                 │                                  │
//!                 │ snapshot                         ▼
//!                 └────────► TopologyState ◄──── PathTracer
//!
//!   upload ──► AltoEngine ──► Device (per-device lock)
//! ```
//!
//! Every query works on one topology snapshot, so it never observes a half
//! applied structural change. Uploads mutate device telemetry in place.

#![warn(missing_docs)]

pub mod config;
pub mod cost;
pub mod engine;
pub mod property;
pub mod response;

pub use config::EngineConfig;
pub use cost::{
    CostContext, CostMap, CostProvider, CostRegistry, CostType, CostValue, MissingCapacityPolicy,
    OspfCostProvider, PathHopsCostProvider, PathLoadCostProvider, RouteHopsCostProvider,
};
pub use engine::AltoEngine;
pub use property::{HostnamePropertyProvider, PidPropertyProvider, PropertyProvider, PropertyRegistry};
pub use response::{
    CostMeta, EndpointCostResponse, EndpointFilter, EndpointPropertiesResponse, NetworkMapMeta, NetworkMapResponse,
    PidAddressGroup, PropertiesMeta,
};
