// src/geo.rs
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;
use ipnetwork::IpNetwork;
use log::{info, warn};
use serde::Deserialize;

use crate::models::server::GeoData;

/// Resolves an IP to a location. Unresolvable IPs yield `GeoData::unknown()`.
pub trait GeoLocator: Send + Sync {
    fn lookup(&self, ip: Ipv4Addr) -> GeoData;
}

/// Used when no location data is configured.
#[derive(Debug, Default)]
pub struct UnknownLocator;

impl GeoLocator for UnknownLocator {
    fn lookup(&self, _ip: Ipv4Addr) -> GeoData {
        GeoData::unknown()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeRecord {
    network: String,
    country_name: String,
    country_code: String,
    continent: String,
    #[serde(default)]
    state: Option<String>,
}

/// CIDR table lookup; the most specific matching network wins.
#[derive(Debug, Default)]
pub struct RangeLocator {
    ranges: Vec<(IpNetwork, GeoData)>,
}

impl RangeLocator {
    pub fn new(mut ranges: Vec<(IpNetwork, GeoData)>) -> Self {
        ranges.sort_by(|a, b| b.0.prefix().cmp(&a.0.prefix()));
        Self { ranges }
    }

    /// Reads a JSON array of `{network, countryName, countryCode, continent, state}`.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let text = std::fs::read_to_string(path)?;
        let records: Vec<RangeRecord> = serde_json::from_str(&text)?;

        let mut ranges = Vec::with_capacity(records.len());
        for record in records {
            match IpNetwork::from_str(record.network.trim()) {
                Ok(network) => ranges.push((
                    network,
                    GeoData {
                        country_name: record.country_name,
                        country_code: record.country_code,
                        continent: record.continent,
                        state: record.state.unwrap_or_else(|| "Unknown".to_string()),
                    },
                )),
                Err(e) => warn!("Skipping geo range {}: {}", record.network, e),
            }
        }
        info!("Loaded {} geo ranges from {}", ranges.len(), path.display());
        Ok(Self::new(ranges))
    }
}

impl GeoLocator for RangeLocator {
    fn lookup(&self, ip: Ipv4Addr) -> GeoData {
        self.ranges
            .iter()
            .find(|(network, _)| network.contains(IpAddr::V4(ip)))
            .map(|(_, geo)| geo.clone())
            .unwrap_or_else(GeoData::unknown)
    }
}
