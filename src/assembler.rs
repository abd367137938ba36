// src/assembler.rs
//! Merges the INFO, PLAYER and RULES tables under each host's game policy
//! into a single server list.

use log::{debug, info};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::a2s::QueryType;
use crate::batch::{A2sClient, BatchQuerier, BatchReport, QueryOutcome, QueryPayload};
use crate::geo::GeoLocator;
use crate::master::{DiscoveryError, HostDiscovery};
use crate::models::game::{GameError, GamePolicy, GameRegistry};
use crate::models::host::HostAddress;
use crate::models::server::{RuleSet, ServerInfo, ServerListEntry, ServerListResult};
use crate::storage::IdentityStore;

#[derive(Debug)]
pub enum ListError {
    Game(GameError),
    Discovery(DiscoveryError),
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Game(e) => write!(f, "{}", e),
            Self::Discovery(e) => write!(f, "Host discovery failed: {}", e),
        }
    }
}

impl std::error::Error for ListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Game(e) => Some(e),
            Self::Discovery(e) => Some(e),
        }
    }
}

impl From<GameError> for ListError {
    fn from(e: GameError) -> Self {
        Self::Game(e)
    }
}

impl From<DiscoveryError> for ListError {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

/// How listed servers get their numeric IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMode {
    /// Unknown hosts are registered with a new ID.
    Assign,
    /// Unknown hosts keep ID 0.
    LookupOnly,
}

/// A host succeeds when every query type its game does not ignore answered.
pub fn is_successful(
    policy: &GamePolicy,
    iok: bool,
    pok: bool,
    rok: bool,
) -> Result<bool, GameError> {
    let success = match (policy.ignore_info, policy.ignore_players, policy.ignore_rules) {
        (false, false, false) => iok && pok && rok,
        (true, false, false) => pok && rok,
        (false, true, false) => iok && rok,
        (false, false, true) => iok && pok,
        (true, true, false) => rok,
        (true, false, true) => pok,
        (false, true, true) => iok,
        (true, true, true) => return Err(GameError::AllQueryTypesIgnored(policy.name.clone())),
    };
    Ok(success)
}

fn build_entry(
    host: HostAddress,
    policy: &GamePolicy,
    info: Option<QueryOutcome>,
    players: Option<QueryOutcome>,
    rules: Option<QueryOutcome>,
) -> ServerListEntry {
    let mut entry = ServerListEntry::new(host, &policy.name);
    entry.info = match info {
        Some(QueryOutcome::Success(QueryPayload::Info(info))) if !policy.ignore_info => info,
        _ => ServerInfo::default(),
    };
    entry.players = match players {
        Some(QueryOutcome::Success(QueryPayload::Players(players))) => players,
        _ => Vec::new(),
    };
    entry.rules = match rules {
        Some(QueryOutcome::Success(QueryPayload::Rules(rules))) if !policy.ignore_rules => rules,
        _ => RuleSet::new(),
    };
    entry
}

pub struct ServerLister<C> {
    querier: BatchQuerier<C>,
    games: GameRegistry,
    discovery: HostDiscovery,
    ids: Arc<dyn IdentityStore>,
    geo: Arc<dyn GeoLocator>,
}

impl<C: A2sClient> ServerLister<C> {
    pub fn new(
        querier: BatchQuerier<C>,
        games: GameRegistry,
        discovery: HostDiscovery,
        ids: Arc<dyn IdentityStore>,
        geo: Arc<dyn GeoLocator>,
    ) -> Self {
        Self {
            querier,
            games,
            discovery,
            ids,
            geo,
        }
    }

    pub fn games(&self) -> &GameRegistry {
        &self.games
    }

    /// Explicit host to game pairs, as sent by API clients. IDs are looked up only.
    pub async fn query_hosts(
        &self,
        host_games: &HashMap<HostAddress, String>,
    ) -> Result<ServerListResult, ListError> {
        self.build_list(host_games, IdMode::LookupOnly).await
    }

    /// Every host the master lists for `game`. New hosts are assigned IDs.
    pub async fn query_game(&self, game: &str) -> Result<ServerListResult, ListError> {
        let policy = self.games.get(game)?;
        policy.validate()?;

        let hosts = self.discovery.discover(&policy.filter()).await?;
        let host_games: HashMap<HostAddress, String> = hosts
            .into_iter()
            .map(|host| (host, policy.name.clone()))
            .collect();
        self.build_list(&host_games, IdMode::Assign).await
    }

    async fn query_type(
        &self,
        policies: &HashMap<HostAddress, &GamePolicy>,
        query_type: QueryType,
    ) -> BatchReport {
        let hosts: Vec<HostAddress> = policies
            .iter()
            .filter(|(_, policy)| !policy.ignores(query_type))
            .map(|(host, _)| *host)
            .collect();
        if hosts.is_empty() {
            return BatchReport::default();
        }
        self.querier.batch_query(&hosts, query_type).await
    }

    pub async fn build_list(
        &self,
        host_games: &HashMap<HostAddress, String>,
        id_mode: IdMode,
    ) -> Result<ServerListResult, ListError> {
        // Every policy is checked before any packet goes out.
        let mut policies = HashMap::with_capacity(host_games.len());
        for (host, game) in host_games {
            let policy = self.games.get(game)?;
            policy.validate()?;
            policies.insert(*host, policy);
        }

        let (mut info, mut players, mut rules) = tokio::join!(
            self.query_type(&policies, QueryType::Info),
            self.query_type(&policies, QueryType::Players),
            self.query_type(&policies, QueryType::Rules),
        );

        let mut hosts: Vec<HostAddress> = policies.keys().copied().collect();
        hosts.sort();

        let mut servers = Vec::new();
        let mut failed = Vec::new();
        for host in hosts {
            let policy = policies[&host];
            let iok = info.contains(&host);
            let pok = players.contains(&host);
            let rok = rules.contains(&host);
            if is_successful(policy, iok, pok, rok)? {
                servers.push(build_entry(
                    host,
                    policy,
                    info.take(&host),
                    players.take(&host),
                    rules.take(&host),
                ));
            } else {
                debug!("{} failed (info: {}, players: {}, rules: {})", host, iok, pok, rok);
                failed.push(host);
            }
        }

        self.enrich(&mut servers, id_mode);

        let result = ServerListResult::new(servers, failed);
        info!(
            "Server list built: {} servers, {} failed",
            result.server_count, result.failed_count
        );
        Ok(result)
    }

    fn enrich(&self, servers: &mut [ServerListEntry], id_mode: IdMode) {
        let ids = match id_mode {
            IdMode::Assign => {
                let host_games: HashMap<HostAddress, String> = servers
                    .iter()
                    .map(|entry| (entry.address, entry.game.clone()))
                    .collect();
                self.ids.assign_or_lookup_ids(&host_games)
            }
            IdMode::LookupOnly => {
                let hosts: Vec<HostAddress> = servers.iter().map(|entry| entry.address).collect();
                self.ids.lookup_ids(&hosts)
            }
        };

        for entry in servers.iter_mut() {
            entry.id = ids.get(&entry.address).copied().unwrap_or(0);
            entry.location = self.geo.lookup(entry.address.ip);
        }
    }
}
