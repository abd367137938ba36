// src/master/http.rs
use log::warn;
use serde::Deserialize;
use std::time::Duration;

use crate::master::DiscoveryError;
use crate::models::host::HostAddress;

#[derive(Debug, Deserialize)]
pub struct ServerListResponse {
    pub response: ServerListBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerListBody {
    #[serde(default)]
    pub servers: Vec<WebServer>,
}

/// One entry of `IGameServersService/GetServerList`. `addr` is the query
/// endpoint, `gameport` the client connect port.
#[derive(Debug, Deserialize)]
pub struct WebServer {
    pub addr: String,
    #[serde(default)]
    pub gameport: Option<u16>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn project_hosts(body: ServerListBody) -> Vec<HostAddress> {
    body.servers
        .into_iter()
        .filter_map(|server| match server.addr.parse::<HostAddress>() {
            Ok(host) => Some(host),
            Err(e) => {
                warn!("Skipping web master entry: {}", e);
                None
            }
        })
        .collect()
}

pub struct HttpMaster {
    client: reqwest::Client,
    url: String,
    api_key: String,
    limit: usize,
    pub(super) timeout: Duration,
}

impl HttpMaster {
    pub fn new(url: String, api_key: String, limit: usize, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            api_key,
            limit,
            timeout,
        }
    }

    /// One request, no retry. The timeout covers the whole exchange,
    /// body included.
    pub async fn discover(&self, filter: &str) -> Result<Vec<HostAddress>, DiscoveryError> {
        let limit = self.limit.to_string();
        let list = self
            .fetch(filter, &limit)
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Timeout
                } else {
                    DiscoveryError::Http(e)
                }
            })?;

        Ok(project_hosts(list.response))
    }

    async fn fetch(&self, filter: &str, limit: &str) -> Result<ServerListResponse, reqwest::Error> {
        self.client
            .get(&self.url)
            .timeout(self.timeout)
            .query(&[("key", self.api_key.as_str()), ("filter", filter), ("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json::<ServerListResponse>()
            .await
    }
}
