// src/main.rs
mod a2s;
mod assembler;
mod batch;
mod config;
mod geo;
mod handlers;
mod master;
mod models;
mod retrieval;
mod storage;
mod utils;

#[cfg(test)]
mod testing;

use actix_web::{ web, App, HttpServer };
use env_logger::Env;
use governor::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use log::{ error, info, warn };

use crate::assembler::ServerLister;
use crate::batch::{ BatchQuerier, UdpA2sClient };
use crate::config::Config;
use crate::geo::{ GeoLocator, RangeLocator, UnknownLocator };
use crate::handlers::servers::KeyedRateLimiter;
use crate::master::HostDiscovery;
use crate::models::game::GameRegistry;
use crate::retrieval::{ Retriever, ServerCache };
use crate::storage::memory::MemoryIdentityStore;

fn load_games(config: &Config) -> std::io::Result<GameRegistry> {
    match &config.games_file {
        Some(path) => GameRegistry::from_file(path).map_err(|e| {
            error!("Failed to load games from {}: {}", path.display(), e);
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        }),
        None => Ok(GameRegistry::default()),
    }
}

fn load_geo(config: &Config) -> Arc<dyn GeoLocator> {
    match &config.geo_file {
        Some(path) => match RangeLocator::from_file(path) {
            Ok(locator) => Arc::new(locator),
            Err(e) => {
                warn!("Failed to load geo ranges from {}: {}", path.display(), e);
                Arc::new(UnknownLocator)
            }
        },
        None => Arc::new(UnknownLocator),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let games = load_games(&config)?;

    let store = web::Data::new(MemoryIdentityStore::new());
    let client = UdpA2sClient::new(config.query_timeout(), config.title_filter());
    let lister = Arc::new(
        ServerLister::new(
            BatchQuerier::new(client, config.query_retries, config.max_concurrent_queries),
            games,
            HostDiscovery::from_config(&config),
            store.clone().into_inner(),
            load_geo(&config)
        )
    );
    let cache = Arc::new(ServerCache::new());

    match &config.retrieval_game {
        Some(game) if config.retrieval_interval_secs > 0 => {
            if let Err(e) = lister.games().get(game) {
                error!("Retrieval disabled: {}", e);
            } else {
                info!("Retrieving {} every {}s", game, config.retrieval_interval_secs);
                let retriever = Retriever::new(
                    lister.clone(),
                    cache.clone(),
                    game.clone(),
                    Duration::from_secs(config.retrieval_interval_secs),
                    config.output_file.clone()
                );
                actix_web::rt::spawn(retriever.run());
            }
        }
        _ => info!("Timed retrieval disabled"),
    }

    let query_rate_limiter: web::Data<KeyedRateLimiter> = web::Data::new(
        RateLimiter::keyed(config.query_quota())
    );
    let lister = web::Data::from(lister);
    let cache = web::Data::from(cache);
    let bind = config.bind();
    let config = web::Data::new(config);

    info!("Starting server on {}", bind);
    HttpServer::new(move || {
        App::new()
            .app_data(config.clone())
            .app_data(store.clone())
            .app_data(lister.clone())
            .app_data(cache.clone())
            .app_data(query_rate_limiter.clone())
            .route("/", web::get().to(handlers::index::index::<UdpA2sClient>))
            .route("/servers", web::get().to(handlers::servers::get_servers))
            .route(
                "/servers/query",
                web::post().to(handlers::servers::query_servers::<UdpA2sClient>)
            )
    })
        .bind(&bind)?
        .run().await
}
