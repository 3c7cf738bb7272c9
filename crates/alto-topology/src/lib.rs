//! ALTO Topology - Network model behind the ALTO engine
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    TopologyGraph                      │
//! │   ArcSwap<TopologyState>  (version, devices, PIDs)    │
//! │                                                       │
//! │  ┌──────────┐   upstream    ┌──────────┐              │
//! │  │  Device  │──────────────►│  Device  │──► router    │
//! │  │ RwLock<> │               │ RwLock<> │              │
//! │  └──────────┘               └──────────┘              │
//! └───────────────────────────┬───────────────────────────┘
//!                             │ snapshot
//!                             ▼
//!         PathTracer ◄──── AdjacencyIndex (physical links)
//! ```

#![warn(missing_docs)]

pub mod adjacency;
pub mod device;
pub mod graph;
pub mod pid;
pub mod presets;
pub mod tracer;

pub use adjacency::{AdjacencyIndex, Endpoint};
pub use device::{
    AdapterStats, AddressRecord, AltRouteEntry, AltRouteRow, CounterSnapshot, Device, DeviceRole, Direction,
    InterfaceCounters, RouteEntry, RouteFlags, RouteProtocol, RouteRow, DEFAULT_COUNTER_HISTORY,
};
pub use graph::{Link, TopologyEdit, TopologyGraph, TopologyState};
pub use pid::{Pid, PidMatchPolicy, MAX_PID_NAME_LEN};
pub use presets::{PresetOptions, TopologyPreset};
pub use tracer::{PathTracer, TracedPath, DEFAULT_HOP_BUDGET};
