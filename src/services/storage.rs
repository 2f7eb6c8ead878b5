use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::{
    error::PersistenceError,
    models::{ConnectionStatus, EcosystemState},
};

/// Durable key/value storage for the persisted state blob.
pub trait StateStorage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// One JSON file per key under a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StateStorage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        // Write-then-rename so a crash never leaves a half-written blob.
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub fn encode_state(state: &EcosystemState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(state)?)
}

/// Decodes a persisted blob merged over defaults. Unknown fields are ignored and
/// fields that fail to decode keep their default; only a blob that is not a
/// JSON object at all is reported as corrupt.
pub fn decode_state(raw: &str) -> Result<EcosystemState, PersistenceError> {
    let persisted: Value =
        serde_json::from_str(raw).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    let Value::Object(fields) = persisted else {
        return Err(PersistenceError::Corrupt(
            "persisted state is not a JSON object".to_string(),
        ));
    };

    let mut merged = serde_json::to_value(EcosystemState::default())?;
    for (key, value) in fields {
        if merged.get(&key).is_none() {
            tracing::debug!("ignoring unknown persisted field {}", key);
            continue;
        }
        let mut candidate = merged.clone();
        candidate[key.as_str()] = value;
        if serde_json::from_value::<EcosystemState>(candidate.clone()).is_ok() {
            merged = candidate;
        } else {
            tracing::warn!("persisted field {} has an unexpected shape; using default", key);
        }
    }

    let state: EcosystemState =
        serde_json::from_value(merged).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    Ok(settle_loaded(state))
}

/// In-flight statuses cannot survive a reload; settle them onto the session.
fn settle_loaded(mut state: EcosystemState) -> EcosystemState {
    state.session = state.session.normalized();
    state.status = if state.session.is_connected() {
        ConnectionStatus::Connected
    } else {
        match state.status {
            ConnectionStatus::Error { reason, code } => ConnectionStatus::Error { reason, code },
            _ => ConnectionStatus::Disconnected,
        }
    };
    if !state.session.is_connected() {
        state.balances.clear();
    }
    state
}
