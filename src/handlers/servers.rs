// src/handlers/servers.rs
use actix_web::{web, HttpResponse, HttpRequest};
use governor::{RateLimiter, clock::DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use log::{debug, error};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;

use crate::assembler::ServerLister;
use crate::batch::A2sClient;
use crate::config::Config;
use crate::models::host::HostAddress;
use crate::retrieval::ServerCache;
use crate::utils::{client_ip, RequestError};

pub type KeyedRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

pub async fn get_servers(cache: web::Data<ServerCache>) -> Result<HttpResponse, RequestError> {
    let latest = cache.latest().ok_or(RequestError::ListNotReady)?;
    debug!("Serving cached list with {} servers", latest.server_count);
    Ok(HttpResponse::Ok().json(&*latest))
}

/// `{"servers": {"1.2.3.4:27960": "QuakeLive", ...}}`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    servers: HashMap<String, String>,
}

fn parse_hosts(
    request: QueryRequest,
    max_hosts: usize,
) -> Result<HashMap<HostAddress, String>, RequestError> {
    if request.servers.is_empty() {
        return Err(RequestError::InvalidRequest("no servers given".to_string()));
    }
    if request.servers.len() > max_hosts {
        return Err(RequestError::InvalidRequest(format!(
            "at most {} servers per request",
            max_hosts
        )));
    }
    request
        .servers
        .into_iter()
        .map(|(addr, game)| {
            addr.parse::<HostAddress>()
                .map(|host| (host, game))
                .map_err(|e| RequestError::InvalidRequest(e.to_string()))
        })
        .collect()
}

pub async fn query_servers<C: A2sClient>(
    req: HttpRequest,
    lister: web::Data<ServerLister<C>>,
    config: web::Data<Config>,
    rate_limiter: web::Data<KeyedRateLimiter>,
    body: web::Json<QueryRequest>,
) -> Result<HttpResponse, RequestError> {
    let peer_ip = client_ip(&req)?;

    // Rate Limiting
    if rate_limiter.check_key(&peer_ip).is_err() {
        error!("Rate limit exceeded for server query for ip: {}", peer_ip);
        return Err(RequestError::RateLimitExceeded);
    }

    let host_games = parse_hosts(body.into_inner(), config.max_hosts)?;
    debug!("{} requested {} servers", peer_ip, host_games.len());

    let result = lister.query_hosts(&host_games).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::a2s::QueryType;
    use crate::batch::{BatchQuerier, QueryPayload};
    use crate::geo::UnknownLocator;
    use crate::master::{HostDiscovery, UdpMaster};
    use crate::models::game::GameRegistry;
    use crate::models::server::ServerInfo;
    use crate::storage::memory::MemoryIdentityStore;
    use crate::testing::{host, FakeClient, Reply};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    fn lister(client: FakeClient) -> web::Data<ServerLister<FakeClient>> {
        web::Data::new(ServerLister::new(
            BatchQuerier::new(client, 0, 8),
            GameRegistry::default(),
            HostDiscovery::Udp(UdpMaster::new(
                "127.0.0.1:9".to_string(),
                0xFF,
                Duration::from_secs(1),
                10,
            )),
            Arc::new(MemoryIdentityStore::new()),
            Arc::new(UnknownLocator),
        ))
    }

    fn limiter(config: &Config) -> web::Data<KeyedRateLimiter> {
        web::Data::new(RateLimiter::keyed(config.query_quota()))
    }

    #[actix_web::test]
    async fn cached_list_not_ready() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(ServerCache::new()))
                .route("/servers", web::get().to(get_servers)),
        )
        .await;
        let req = test::TestRequest::get().uri("/servers").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn queries_explicit_hosts() {
        let h = host(20);
        let client = FakeClient::new();
        client.script(h, QueryType::Info, 0, Reply::Ok(QueryPayload::Info(ServerInfo::default())));
        client.script(h, QueryType::Players, 0, Reply::Empty);
        let config = Config::default();

        let app = test::init_service(
            App::new()
                .app_data(lister(client))
                .app_data(limiter(&config))
                .app_data(web::Data::new(config))
                .route("/servers/query", web::post().to(query_servers::<FakeClient>)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/servers/query")
            .peer_addr("192.0.2.1:4000".parse().unwrap())
            .set_json(serde_json::json!({ "servers": { (h.to_string()): "Reflex" } }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["serverCount"], 1);
        assert_eq!(body["failedCount"], 0);
        assert_eq!(body["servers"][0]["id"], 0);
    }

    #[actix_web::test]
    async fn rejects_bad_addresses() {
        let config = Config::default();
        let app = test::init_service(
            App::new()
                .app_data(lister(FakeClient::new()))
                .app_data(limiter(&config))
                .app_data(web::Data::new(config))
                .route("/servers/query", web::post().to(query_servers::<FakeClient>)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/servers/query")
            .peer_addr("192.0.2.1:4000".parse().unwrap())
            .set_json(serde_json::json!({ "servers": { "not-a-host": "Reflex" } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
