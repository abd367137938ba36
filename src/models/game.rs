// src/models/game.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::a2s::QueryType;

/// Per-game query policy: which A2S query types this game's servers
/// legitimately omit, plus the filter used to discover them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePolicy {
    pub name: String,
    pub app_id: u32,
    #[serde(default)]
    pub ignore_info: bool,
    #[serde(default)]
    pub ignore_players: bool,
    #[serde(default)]
    pub ignore_rules: bool,
    /// Master server filter, e.g. `\appid\282440`. Defaults to the app id.
    #[serde(default)]
    pub master_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    AllQueryTypesIgnored(String),
    UnknownGame(String),
    Load(String),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllQueryTypesIgnored(game) => {
                write!(f, "Game {} ignores every query type, its servers can never succeed", game)
            }
            Self::UnknownGame(game) => write!(f, "Unknown game: {}", game),
            Self::Load(e) => write!(f, "Failed to load game definitions: {}", e),
        }
    }
}

impl std::error::Error for GameError {}

impl GamePolicy {
    pub fn new(name: &str, app_id: u32) -> Self {
        Self {
            name: name.to_string(),
            app_id,
            ignore_info: false,
            ignore_players: false,
            ignore_rules: false,
            master_filter: None,
        }
    }

    pub fn ignoring(mut self, query_type: QueryType) -> Self {
        match query_type {
            QueryType::Info => self.ignore_info = true,
            QueryType::Players => self.ignore_players = true,
            QueryType::Rules => self.ignore_rules = true,
        }
        self
    }

    pub fn ignores(&self, query_type: QueryType) -> bool {
        match query_type {
            QueryType::Info => self.ignore_info,
            QueryType::Players => self.ignore_players,
            QueryType::Rules => self.ignore_rules,
        }
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.ignore_info && self.ignore_players && self.ignore_rules {
            return Err(GameError::AllQueryTypesIgnored(self.name.clone()));
        }
        Ok(())
    }

    pub fn filter(&self) -> String {
        self.master_filter
            .clone()
            .unwrap_or_else(|| format!("\\appid\\{}", self.app_id))
    }
}

fn default_games() -> Vec<GamePolicy> {
    vec![
        GamePolicy::new("QuakeLive", 282440),
        GamePolicy::new("Reflex", 328070).ignoring(QueryType::Rules),
        GamePolicy::new("TeamFortress2", 440),
        GamePolicy::new("CounterStrike2", 730).ignoring(QueryType::Rules),
    ]
}

/// Name-keyed set of validated game policies.
#[derive(Debug, Clone)]
pub struct GameRegistry {
    games: HashMap<String, GamePolicy>,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self {
            games: default_games()
                .into_iter()
                .map(|g| (g.name.clone(), g))
                .collect(),
        }
    }
}

impl GameRegistry {
    pub fn from_policies(policies: Vec<GamePolicy>) -> Result<Self, GameError> {
        let mut games = HashMap::with_capacity(policies.len());
        for policy in policies {
            policy.validate()?;
            games.insert(policy.name.clone(), policy);
        }
        Ok(Self { games })
    }

    /// Reads a JSON array of policies.
    pub fn from_file(path: &Path) -> Result<Self, GameError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| GameError::Load(format!("{}: {}", path.display(), e)))?;
        let policies: Vec<GamePolicy> =
            serde_json::from_str(&data).map_err(|e| GameError::Load(e.to_string()))?;
        Self::from_policies(policies)
    }

    pub fn get(&self, name: &str) -> Result<&GamePolicy, GameError> {
        self.games
            .get(name)
            .ok_or_else(|| GameError::UnknownGame(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.games.keys().map(String::as_str)
    }
}
