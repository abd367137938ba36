// src/retrieval.rs
//! Timed master retrieval: discover every host for one game, build its
//! server list and keep the newest result around for the HTTP layer.

use log::{error, info};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::assembler::{ListError, ServerLister};
use crate::batch::A2sClient;
use crate::models::server::ServerListResult;

/// Latest completed retrieval, shared with request handlers.
#[derive(Debug, Default)]
pub struct ServerCache {
    latest: RwLock<Option<Arc<ServerListResult>>>,
}

impl ServerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Arc<ServerListResult>> {
        self.latest.read().clone()
    }

    pub fn store(&self, result: ServerListResult) -> Arc<ServerListResult> {
        let result = Arc::new(result);
        *self.latest.write() = Some(result.clone());
        result
    }
}

async fn write_output(path: &Path, result: &ServerListResult) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(result)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}

pub struct Retriever<C> {
    lister: Arc<ServerLister<C>>,
    cache: Arc<ServerCache>,
    game: String,
    interval: Duration,
    output_file: Option<PathBuf>,
}

impl<C: A2sClient> Retriever<C> {
    pub fn new(
        lister: Arc<ServerLister<C>>,
        cache: Arc<ServerCache>,
        game: String,
        interval: Duration,
        output_file: Option<PathBuf>,
    ) -> Self {
        Self {
            lister,
            cache,
            game,
            interval,
            output_file,
        }
    }

    pub async fn retrieve_once(&self) -> Result<Arc<ServerListResult>, ListError> {
        info!("Retrieving {} servers from master", self.game);
        let result = self.lister.query_game(&self.game).await?;

        if let Some(path) = &self.output_file {
            match write_output(path, &result).await {
                Ok(()) => info!("Wrote server list to {}", path.display()),
                Err(e) => error!("Failed to write {}: {}", path.display(), e),
            }
        }
        Ok(self.cache.store(result))
    }

    /// Runs until the process exits. Failed runs keep the previous list.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.retrieve_once().await {
                Ok(result) => info!(
                    "{} retrieval done: {} servers, {} failed",
                    self.game, result.server_count, result.failed_count
                ),
                Err(e) => error!("{} retrieval failed: {}", self.game, e),
            }
        }
    }
}
