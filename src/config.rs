// src/config.rs
use std::env;
use std::time::Duration;
use std::num::NonZeroU32;
use std::path::PathBuf;
use governor::Quota;

use crate::a2s::codec::TitleFilter;
use crate::batch::DEFAULT_RETRIES;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiscoveryMode {
    Udp,
    Http,
}

impl DiscoveryMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "udp" => Some(Self::Udp),
            "http" | "web" => Some(Self::Http),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,

    // Server queries
    pub query_timeout_secs: u64,
    pub query_retries: usize,
    pub max_concurrent_queries: usize,
    pub unsupported_app_ids: String,

    // Discovery
    pub discovery_mode: DiscoveryMode,
    pub master_server: String,
    pub master_region: u8,
    pub master_timeout_secs: u64,
    pub max_hosts: usize,
    pub steam_api_url: String,
    pub steam_api_key: String,

    // Timed retrieval
    pub retrieval_game: Option<String>,
    pub retrieval_interval_secs: u64,
    pub output_file: Option<PathBuf>,
    pub games_file: Option<PathBuf>,
    pub geo_file: Option<PathBuf>,

    // Rate limiting for explicit queries
    pub query_period_secs: u64,
    pub query_burst_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            query_timeout_secs: 5,
            query_retries: DEFAULT_RETRIES,
            max_concurrent_queries: 512,
            unsupported_app_ids: "2400-2412".to_string(),
            discovery_mode: DiscoveryMode::Udp,
            master_server: "hl2master.steampowered.com:27011".to_string(),
            master_region: 0xFF,
            master_timeout_secs: 5,
            max_hosts: 10000,
            steam_api_url: "https://api.steampowered.com/IGameServersService/GetServerList/v1/"
                .to_string(),
            steam_api_key: String::new(),
            retrieval_game: None,
            retrieval_interval_secs: 0,
            output_file: None,
            games_file: None,
            geo_file: None,
            query_period_secs: 5,
            query_burst_limit: 10,
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: parsed("PORT", defaults.port),

            query_timeout_secs: parsed("QUERY_TIMEOUT_SECS", defaults.query_timeout_secs),
            query_retries: parsed("QUERY_RETRIES", defaults.query_retries),
            max_concurrent_queries: parsed(
                "MAX_CONCURRENT_QUERIES",
                defaults.max_concurrent_queries,
            ),
            unsupported_app_ids: env::var("UNSUPPORTED_APP_IDS")
                .unwrap_or(defaults.unsupported_app_ids),

            discovery_mode: env::var("DISCOVERY_MODE")
                .ok()
                .and_then(|v| DiscoveryMode::parse(&v))
                .unwrap_or(defaults.discovery_mode),
            master_server: env::var("MASTER_SERVER").unwrap_or(defaults.master_server),
            master_region: parsed("MASTER_REGION", defaults.master_region),
            master_timeout_secs: parsed("MASTER_TIMEOUT_SECS", defaults.master_timeout_secs),
            max_hosts: parsed("MAX_HOSTS", defaults.max_hosts),
            steam_api_url: env::var("STEAM_API_URL").unwrap_or(defaults.steam_api_url),
            steam_api_key: env::var("STEAM_API_KEY").unwrap_or(defaults.steam_api_key),

            retrieval_game: optional("RETRIEVAL_GAME"),
            retrieval_interval_secs: parsed(
                "RETRIEVAL_INTERVAL_SECS",
                defaults.retrieval_interval_secs,
            ),
            output_file: optional("OUTPUT_FILE").map(PathBuf::from),
            games_file: optional("GAMES_FILE").map(PathBuf::from),
            geo_file: optional("GEO_FILE").map(PathBuf::from),

            query_period_secs: parsed("QUERY_PERIOD_SECS", defaults.query_period_secs),
            query_burst_limit: parsed("QUERY_BURST_LIMIT", defaults.query_burst_limit),
        }
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn master_timeout(&self) -> Duration {
        Duration::from_secs(self.master_timeout_secs)
    }

    pub fn title_filter(&self) -> TitleFilter {
        TitleFilter::parse(&self.unsupported_app_ids)
    }

    pub fn query_quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.query_burst_limit).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(Duration::from_secs(self.query_period_secs))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst)
    }
}
