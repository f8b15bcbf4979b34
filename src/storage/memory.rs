use std::collections::HashMap;
use std::sync::RwLock;

use super::{PersistedState, StateKind, StateStore};
use crate::error::{EvolverError, Result};
use crate::types::ScopeKey;

#[derive(Debug, Default)]
pub struct MemoryStore {
    states: RwLock<HashMap<(ScopeKey, StateKind), PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn save_state(&self, scope: &ScopeKey, state: &PersistedState) -> Result<()> {
        let mut guard = self
            .states
            .write()
            .map_err(|_| EvolverError::StorageUnavailable("memory store lock poisoned".to_string()))?;
        guard.insert((scope.clone(), state.kind()), state.clone());
        Ok(())
    }

    fn load_state(&self, scope: &ScopeKey, kind: StateKind) -> Result<PersistedState> {
        let guard = self
            .states
            .read()
            .map_err(|_| EvolverError::StorageUnavailable("memory store lock poisoned".to_string()))?;
        guard
            .get(&(scope.clone(), kind))
            .cloned()
            .ok_or_else(|| EvolverError::NotFound(format!("{} state for {}", kind, scope)))
    }
}
