//! Error types for the ALTO engine

use thiserror::Error;

/// ALTO error type
#[derive(Error, Debug)]
pub enum AltoError {
    /// Empty or malformed request payload
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Named device does not exist in the topology
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// No route or device could be resolved between two endpoints
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// No cost provider registered for the requested mode/metric
    #[error("unsupported cost type: mode={mode} metric={metric}")]
    UnsupportedCostType {
        /// Requested cost mode
        mode: String,
        /// Requested cost metric
        metric: String,
    },

    /// Path trace ran out of hop budget
    #[error("trace budget of {budget} hops exceeded")]
    TraceBudgetExceeded {
        /// Initial hop budget
        budget: u32,
    },

    /// Operation not permitted for the device role
    #[error("device {device} has role {role}, operation requires a router")]
    InvalidRole {
        /// Device name
        device: String,
        /// Actual device role
        role: String,
    },

    /// PID name violates naming rules
    #[error("invalid PID name: {0}")]
    InvalidPidName(String),

    /// Topology description could not be loaded
    #[error("topology load error: {0}")]
    TopologyLoad(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AltoError {
    /// Failures that only affect a single source/destination pair.
    ///
    /// Batch operations drop the pair and carry on when this returns true.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::TraceBudgetExceeded { .. } | Self::UnknownDevice(_)
        )
    }
}

/// Result type for ALTO operations
pub type AltoResult<T> = Result<T, AltoError>;
