use log::debug;
use std::fs;
use std::path::PathBuf;

use super::{PersistedState, StateKind, StateStore};
use crate::error::{EvolverError, Result};
use crate::types::ScopeKey;

/// One JSON file per scope and state kind: `<dir>/BTC-USDT_1h.champion.json`.
/// Writes go through a temporary file and a rename, so a reader never sees
/// a half-written state.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    directory: PathBuf,
}

impl JsonFileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn path_for(&self, scope: &ScopeKey, kind: StateKind) -> PathBuf {
        self.directory.join(format!("{}.{}.json", scope.storage_key(), kind))
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> EvolverError {
    EvolverError::StorageUnavailable(format!("{}: {}", context, err))
}

impl StateStore for JsonFileStore {
    fn save_state(&self, scope: &ScopeKey, state: &PersistedState) -> Result<()> {
        let path = self.path_for(scope, state.kind());
        let tmp = path.with_extension("json.tmp");

        fs::create_dir_all(&self.directory).map_err(|e| unavailable("create state directory", e))?;
        let body = serde_json::to_string_pretty(state).map_err(|e| unavailable("encode state", e))?;
        fs::write(&tmp, body).map_err(|e| unavailable("write state", e))?;
        fs::rename(&tmp, &path).map_err(|e| unavailable("commit state", e))?;

        debug!("Saved {} state to {}", state.kind(), path.display());
        Ok(())
    }

    fn load_state(&self, scope: &ScopeKey, kind: StateKind) -> Result<PersistedState> {
        let path = self.path_for(scope, kind);
        if !path.exists() {
            return Err(EvolverError::NotFound(format!("{} state for {}", kind, scope)));
        }

        let body = fs::read_to_string(&path).map_err(|e| unavailable("read state", e))?;
        let state: PersistedState = serde_json::from_str(&body).map_err(|e| unavailable("decode state", e))?;
        if state.kind() != kind {
            return Err(unavailable(
                "decode state",
                format!("{} holds {} state", path.display(), state.kind()),
            ));
        }
        Ok(state)
    }
}
