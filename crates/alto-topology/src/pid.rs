//! ALTO PIDs ([RFC7285] §5.1)

use alto_common::{AltoError, AltoResult};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Maximum PID name length ([RFC7285] §10.1)
pub const MAX_PID_NAME_LEN: usize = 64;

/// Provider-defined identifier: a named set of address prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pid {
    name: String,
    ipv4: Vec<IpNetwork>,
    ipv6: Vec<IpNetwork>,
}

impl Pid {
    /// Create PID, validating the name
    pub fn new(name: impl Into<String>, prefixes: impl IntoIterator<Item = IpNetwork>) -> AltoResult<Self> {
        let name = name.into();
        Self::verify_name(&name)?;

        let (ipv4, ipv6) = prefixes.into_iter().partition(|p| p.is_ipv4());
        Ok(Self { name, ipv4, ipv6 })
    }

    /// Name rules: 1..=64 chars of alphanumerics and `-:@_.`
    pub fn verify_name(name: &str) -> AltoResult<()> {
        if name.is_empty() || name.len() > MAX_PID_NAME_LEN {
            return Err(AltoError::InvalidPidName(format!(
                "{:?} must be 1..={} characters",
                name, MAX_PID_NAME_LEN
            )));
        }
        if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || "-:@_.".contains(*c))) {
            return Err(AltoError::InvalidPidName(format!("{:?} contains {:?}", name, c)));
        }
        Ok(())
    }

    /// PID name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// IPv4 prefixes
    pub fn ipv4_prefixes(&self) -> &[IpNetwork] {
        &self.ipv4
    }

    /// IPv6 prefixes
    pub fn ipv6_prefixes(&self) -> &[IpNetwork] {
        &self.ipv6
    }

    /// Prefix lengths of this PID's prefixes containing `addr`
    pub fn matching_prefix_lengths(&self, addr: IpAddr) -> impl Iterator<Item = u8> + '_ {
        let prefixes = if addr.is_ipv4() { &self.ipv4 } else { &self.ipv6 };
        prefixes.iter().filter(move |p| p.contains(addr)).map(|p| p.prefix())
    }
}

/// How overlapping PIDs are ranked when several contain an address.
///
/// Ties between equally specific prefixes go to the PID whose name sorts
/// first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PidMatchPolicy {
    /// Most specific prefix wins
    #[default]
    LongestPrefix,
    /// Least specific prefix wins
    ShortestPrefix,
}

impl PidMatchPolicy {
    /// Pick the PID for `addr` among `pids` (iterated in name order)
    pub fn select<'a>(&self, pids: impl Iterator<Item = &'a Pid>, addr: IpAddr) -> Option<&'a Pid> {
        let mut best: Option<(u8, &Pid)> = None;

        for pid in pids {
            let candidate = match self {
                Self::LongestPrefix => pid.matching_prefix_lengths(addr).max(),
                Self::ShortestPrefix => pid.matching_prefix_lengths(addr).min(),
            };
            let Some(len) = candidate else { continue };

            let better = match (best, self) {
                (None, _) => true,
                (Some((cur, _)), Self::LongestPrefix) => len > cur,
                (Some((cur, _)), Self::ShortestPrefix) => len < cur,
            };
            if better {
                best = Some((len, pid));
            }
        }

        best.map(|(_, pid)| pid)
    }
}
