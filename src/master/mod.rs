// src/master/mod.rs
//! Host discovery: the paginated UDP master protocol or the Steam Web API,
//! picked by configuration.

pub mod http;
pub mod udp;

use log::info;
use std::fmt;
use std::io;

use crate::config::{Config, DiscoveryMode};
use crate::models::host::HostAddress;

pub use http::HttpMaster;
pub use udp::UdpMaster;

#[derive(Debug)]
pub enum DiscoveryError {
    Connection(io::Error),
    Transmit(io::Error),
    Timeout,
    BadHeader,
    Http(reqwest::Error),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "Could not reach master server: {}", e),
            Self::Transmit(e) => write!(f, "Error talking to master server: {}", e),
            Self::Timeout => write!(f, "Timed out waiting for master server"),
            Self::BadHeader => write!(f, "Master server reply had an unexpected header"),
            Self::Http(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(e) | Self::Transmit(e) => Some(e),
            Self::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

pub enum HostDiscovery {
    Udp(UdpMaster),
    Http(HttpMaster),
}

impl HostDiscovery {
    pub fn from_config(config: &Config) -> Self {
        match config.discovery_mode {
            DiscoveryMode::Udp => Self::Udp(UdpMaster::new(
                config.master_server.clone(),
                config.master_region,
                config.master_timeout(),
                config.max_hosts,
            )),
            DiscoveryMode::Http => Self::Http(HttpMaster::new(
                config.steam_api_url.clone(),
                config.steam_api_key.clone(),
                config.max_hosts,
                config.master_timeout(),
            )),
        }
    }

    /// All hosts matching `filter`; no partial list is returned on error.
    pub async fn discover(&self, filter: &str) -> Result<Vec<HostAddress>, DiscoveryError> {
        let hosts = match self {
            Self::Udp(master) => master.discover(filter).await?,
            Self::Http(master) => master.discover(filter).await?,
        };
        info!("Discovered {} hosts for filter {}", hosts.len(), filter);
        Ok(hosts)
    }
}
