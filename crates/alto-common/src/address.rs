//! Endpoint address codec ([RFC7285] §14.4)
//!
//! Endpoints travel as `"<type>:<value>"` strings. The codec splits on the
//! first colon and hands the value to the parser registered for the type
//! prefix. Encoding goes the other way and picks the parser by value family.

use crate::{AltoError, AltoResult};
use std::net::IpAddr;

/// Converts one family of endpoint identifiers to and from typed values
pub trait AddressParser: Send + Sync {
    /// Type prefixes handled by this parser (lowercase)
    fn identifiers(&self) -> &[&'static str];

    /// Whether this parser can encode the given value
    fn handles(&self, addr: &IpAddr) -> bool;

    /// Parse the value part of an endpoint string
    fn decode(&self, identifier: &str, value: &str) -> AltoResult<IpAddr>;

    /// Render a value as a full endpoint string
    fn encode(&self, addr: &IpAddr) -> String;
}

/// Parser for `ipv4:` and `ipv6:` endpoints
#[derive(Debug, Default, Clone, Copy)]
pub struct IpAddrParser;

impl AddressParser for IpAddrParser {
    fn identifiers(&self) -> &[&'static str] {
        &["ipv4", "ipv6"]
    }

    fn handles(&self, _addr: &IpAddr) -> bool {
        true
    }

    fn decode(&self, identifier: &str, value: &str) -> AltoResult<IpAddr> {
        let addr: IpAddr = value
            .parse()
            .map_err(|_| AltoError::InvalidInput(format!("malformed {} address: {}", identifier, value)))?;

        match (identifier, addr) {
            ("ipv4", IpAddr::V4(_)) | ("ipv6", IpAddr::V6(_)) => Ok(addr),
            _ => Err(AltoError::InvalidInput(format!(
                "address {} does not match type {}",
                value, identifier
            ))),
        }
    }

    fn encode(&self, addr: &IpAddr) -> String {
        match addr {
            IpAddr::V4(v4) => format!("ipv4:{}", v4),
            IpAddr::V6(v6) => format!("ipv6:{}", v6),
        }
    }
}

/// Registry of address parsers keyed by type prefix
pub struct AddressCodec {
    parsers: Vec<Box<dyn AddressParser>>,
}

impl AddressCodec {
    /// Create codec without any parsers
    pub fn empty() -> Self {
        Self { parsers: Vec::new() }
    }

    /// Register a parser. Later registrations win on prefix collisions.
    pub fn register(&mut self, parser: Box<dyn AddressParser>) {
        self.parsers.insert(0, parser);
    }

    /// Decode a single `"type:value"` endpoint
    pub fn decode(&self, endpoint: &str) -> AltoResult<IpAddr> {
        let (kind, value) = endpoint
            .split_once(':')
            .ok_or_else(|| AltoError::InvalidInput(format!("endpoint without type prefix: {}", endpoint)))?;
        let kind = kind.to_ascii_lowercase();

        let parser = self
            .parsers
            .iter()
            .find(|p| p.identifiers().contains(&kind.as_str()))
            .ok_or_else(|| AltoError::InvalidInput(format!("unknown address type: {}", kind)))?;

        parser.decode(&kind, value)
    }

    /// Decode many endpoints, skipping the ones that fail
    pub fn decode_all<S: AsRef<str>>(&self, endpoints: &[S]) -> Vec<IpAddr> {
        endpoints
            .iter()
            .filter_map(|e| match self.decode(e.as_ref()) {
                Ok(addr) => Some(addr),
                Err(err) => {
                    tracing::warn!("Skipping endpoint {}: {}", e.as_ref(), err);
                    None
                }
            })
            .collect()
    }

    /// Encode a value as an endpoint string
    pub fn encode(&self, addr: &IpAddr) -> AltoResult<String> {
        self.parsers
            .iter()
            .find(|p| p.handles(addr))
            .map(|p| p.encode(addr))
            .ok_or_else(|| AltoError::InvalidInput(format!("no address type handles {}", addr)))
    }
}

impl Default for AddressCodec {
    fn default() -> Self {
        let mut codec = Self::empty();
        codec.register(Box::new(IpAddrParser));
        codec
    }
}
