//! Persistence collaborator. Only the scheduler talks to a store; the engine
//! runs the same with no store at all.

pub mod json;
pub mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::engines::generation::StrategyGenome;
use crate::error::Result;
use crate::services::ChampionRecord;
use crate::types::ScopeKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Population,
    Champion,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Population => "population",
            Self::Champion => "champion",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final population of the latest run for a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub scope: ScopeKey,
    pub generation_index: usize,
    pub genomes: Vec<StrategyGenome>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistedState {
    Population(PopulationSnapshot),
    Champion(ChampionRecord),
}

impl PersistedState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Population(_) => StateKind::Population,
            Self::Champion(_) => StateKind::Champion,
        }
    }
}

/// `save_state` fails only with `StorageUnavailable`; `load_state` fails
/// with `NotFound` when nothing was saved, `StorageUnavailable` otherwise.
pub trait StateStore: Send + Sync {
    fn save_state(&self, scope: &ScopeKey, state: &PersistedState) -> Result<()>;
    fn load_state(&self, scope: &ScopeKey, kind: StateKind) -> Result<PersistedState>;
}

pub fn build_store(config: &StorageConfig) -> Option<Arc<dyn StateStore>> {
    match config {
        StorageConfig::Json { directory } => Some(Arc::new(JsonFileStore::new(directory.clone()))),
        StorageConfig::Memory => Some(Arc::new(MemoryStore::new())),
        StorageConfig::None => None,
    }
}
