// src/models/server.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::host::HostAddress;

/// Rule name to rule value, as reported by A2S_RULES.
pub type RuleSet = HashMap<String, String>;

/// Optional trailing A2S_INFO fields, present when the matching EDF bit is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraData {
    pub port: u16,
    pub steam_id: u64,
    pub source_tv_port: u16,
    pub source_tv_name: String,
    pub keywords: String,
    pub game_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub protocol: u8,
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub id: u16,
    pub players: u8,
    pub max_players: u8,
    pub bots: u8,
    pub server_type: String,
    pub environment: String,
    pub visibility: bool,
    pub vac: bool,
    pub version: String,
    pub extra_data_flags: u8,
    pub extra_data: ExtraData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub name: String,
    pub score: i32,
    pub time_connected_secs: f32,
    pub time_connected: String,
}

impl PlayerRecord {
    pub fn new(name: String, score: i32, time_connected_secs: f32) -> Self {
        Self {
            time_connected: format_duration(time_connected_secs),
            name,
            score,
            time_connected_secs,
        }
    }
}

pub fn server_type_name(code: u8) -> &'static str {
    match code.to_ascii_lowercase() {
        b'd' => "dedicated",
        b'l' => "listen",
        b'p' => "sourcetv",
        _ => "unknown",
    }
}

pub fn environment_name(code: u8) -> &'static str {
    match code.to_ascii_lowercase() {
        b'l' => "Linux",
        b'w' => "Windows",
        b'm' | b'o' => "Mac",
        _ => "unknown",
    }
}

/// Renders whole seconds as `1h 2m 3s`, dropping leading zero units.
pub fn format_duration(secs: f32) -> String {
    let total = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoData {
    pub country_name: String,
    pub country_code: String,
    pub continent: String,
    pub state: String,
}

impl GeoData {
    pub fn unknown() -> Self {
        Self {
            country_name: "Unknown".to_string(),
            country_code: "XX".to_string(),
            continent: "Unknown".to_string(),
            state: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerListEntry {
    pub id: i64,
    pub address: HostAddress,
    pub ip: String,
    pub port: u16,
    pub game: String,
    pub info: ServerInfo,
    pub players: Vec<PlayerRecord>,
    pub rules: RuleSet,
    pub location: GeoData,
}

impl ServerListEntry {
    pub fn new(address: HostAddress, game: &str) -> Self {
        Self {
            id: 0,
            address,
            ip: address.ip.to_string(),
            port: address.port,
            game: game.to_string(),
            info: ServerInfo::default(),
            players: Vec::new(),
            rules: RuleSet::new(),
            location: GeoData::unknown(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerListResult {
    pub retrieval_date: String,
    pub timestamp: i64,
    pub server_count: usize,
    pub servers: Vec<ServerListEntry>,
    pub failed_count: usize,
    pub failed_servers: Vec<HostAddress>,
}

impl ServerListResult {
    pub fn new(servers: Vec<ServerListEntry>, failed_servers: Vec<HostAddress>) -> Self {
        Self::at(Utc::now(), servers, failed_servers)
    }

    pub fn at(
        retrieved: DateTime<Utc>,
        servers: Vec<ServerListEntry>,
        failed_servers: Vec<HostAddress>,
    ) -> Self {
        Self {
            retrieval_date: retrieved.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            timestamp: retrieved.timestamp(),
            server_count: servers.len(),
            servers,
            failed_count: failed_servers.len(),
            failed_servers,
        }
    }
}
