// src/handlers/index.rs
use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::collections::HashMap;

use crate::assembler::ServerLister;
use crate::batch::A2sClient;
use crate::retrieval::ServerCache;
use crate::storage::memory::MemoryIdentityStore;
use crate::utils::RequestError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    status: &'static str,
    games: Vec<&'a str>,
    known_servers: usize,
    known_servers_by_game: HashMap<String, usize>,
    last_retrieval: Option<String>,
    last_server_count: Option<usize>,
}

pub async fn index<C: A2sClient>(
    lister: web::Data<ServerLister<C>>,
    store: web::Data<MemoryIdentityStore>,
    cache: web::Data<ServerCache>,
) -> Result<HttpResponse, RequestError> {
    let latest = cache.latest();
    let mut games: Vec<&str> = lister.games().names().collect();
    games.sort_unstable();

    Ok(HttpResponse::Ok().json(Status {
        status: "ok",
        games,
        known_servers: store.len(),
        known_servers_by_game: store.game_counts(),
        last_retrieval: latest.as_ref().map(|r| r.retrieval_date.clone()),
        last_server_count: latest.as_ref().map(|r| r.server_count),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchQuerier;
    use crate::geo::UnknownLocator;
    use crate::master::{HostDiscovery, UdpMaster};
    use crate::models::game::GameRegistry;
    use crate::models::server::ServerListResult;
    use crate::testing::{host, FakeClient};
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    #[actix_web::test]
    async fn reports_games_and_last_run() {
        let store = web::Data::new(MemoryIdentityStore::new());
        let lister = ServerLister::new(
            BatchQuerier::new(FakeClient::new(), 0, 4),
            GameRegistry::default(),
            HostDiscovery::Udp(UdpMaster::new(
                "127.0.0.1:9".to_string(),
                0xFF,
                Duration::from_secs(1),
                10,
            )),
            store.clone().into_inner(),
            Arc::new(UnknownLocator),
        );
        let cache = ServerCache::new();
        cache.store(ServerListResult::new(vec![], vec![host(1)]));

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(lister))
                .app_data(store)
                .app_data(web::Data::new(cache))
                .route("/", web::get().to(index::<FakeClient>)),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["knownServers"], 0);
        assert_eq!(body["lastServerCount"], 0);
        assert!(body["games"].as_array().unwrap().iter().any(|g| g == "QuakeLive"));
    }
}
