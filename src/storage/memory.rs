// src/storage/memory.rs
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::models::host::HostAddress;
use crate::storage::IdentityStore;

#[derive(Debug, Clone)]
struct StoredServer {
    id: i64,
    game: String,
}

/// Process-local identity store. IDs start at 1; 0 means unassigned.
pub struct MemoryIdentityStore {
    servers: DashMap<HostAddress, StoredServer>,
    next_id: AtomicI64,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            servers: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Known servers per game.
    pub fn game_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for server in self.servers.iter() {
            *counts.entry(server.value().game.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn assign_or_lookup_ids(
        &self,
        host_games: &HashMap<HostAddress, String>,
    ) -> HashMap<HostAddress, i64> {
        host_games
            .iter()
            .map(|(host, game)| {
                let mut entry = self.servers.entry(*host).or_insert_with(|| StoredServer {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    game: game.clone(),
                });
                if entry.game != *game {
                    entry.game = game.clone();
                }
                (*host, entry.id)
            })
            .collect()
    }

    fn lookup_ids(&self, hosts: &[HostAddress]) -> HashMap<HostAddress, i64> {
        hosts
            .iter()
            .map(|host| {
                let id = self.servers.get(host).map(|r| r.value().id).unwrap_or(0);
                (*host, id)
            })
            .collect()
    }
}
