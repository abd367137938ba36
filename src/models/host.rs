// src/models/host.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// An IPv4 game server (or master server) endpoint, keyed as `"ip:port"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostAddress {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl HostAddress {
    /// `0.0.0.0:0`, the master protocol's seed and end-of-list marker.
    pub const SENTINEL: HostAddress = HostAddress {
        ip: Ipv4Addr::UNSPECIFIED,
        port: 0,
    };

    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip, self.port))
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidHostAddress(pub String);

impl fmt::Display for InvalidHostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid host address (expected ipv4:port): {}", self.0)
    }
}

impl std::error::Error for InvalidHostAddress {}

impl FromStr for HostAddress {
    type Err = InvalidHostAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let addr: SocketAddrV4 = s
            .trim()
            .parse()
            .map_err(|_| InvalidHostAddress(s.to_string()))?;
        Ok(Self::new(*addr.ip(), addr.port()))
    }
}

impl From<SocketAddrV4> for HostAddress {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl Serialize for HostAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HostAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
