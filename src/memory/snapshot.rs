//! JSON snapshots of local memory state.
//!
//! A snapshot holds the space logs and the evolution log. It never includes
//! the atom cache or anything about the server.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::evolution::EvolutionRecord;
use crate::error::MemoryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Seconds since the UNIX epoch.
    pub taken_at: u64,
    pub spaces: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub evolution: Vec<EvolutionRecord>,
}

impl MemorySnapshot {
    pub fn new(spaces: BTreeMap<String, Vec<String>>, evolution: Vec<EvolutionRecord>) -> Self {
        let taken_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            taken_at,
            spaces,
            evolution,
        }
    }

    /// Write as pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), MemoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| snapshot_error(path, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| snapshot_error(path, e))?;
        std::fs::write(path, json).map_err(|e| snapshot_error(path, e))
    }

    pub fn load(path: &Path) -> Result<Self, MemoryError> {
        let json = std::fs::read_to_string(path).map_err(|e| snapshot_error(path, e))?;
        serde_json::from_str(&json).map_err(|e| snapshot_error(path, e))
    }

    /// Total stored payloads across spaces.
    pub fn payload_count(&self) -> usize {
        self.spaces.values().map(Vec::len).sum()
    }
}

fn snapshot_error(path: &Path, e: impl std::fmt::Display) -> MemoryError {
    MemoryError::Snapshot {
        message: format!("{}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memory.json");
        let mut spaces = BTreeMap::new();
        spaces.insert("user".to_string(), vec!["a".to_string(), "b".to_string()]);
        let snap = MemorySnapshot::new(spaces, Vec::new());
        snap.save(&path).unwrap();

        let loaded = MemorySnapshot::load(&path).unwrap();
        assert_eq!(loaded, snap);
        assert_eq!(loaded.payload_count(), 2);
    }

    #[test]
    fn garbage_is_a_snapshot_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MemorySnapshot::load(&path),
            Err(MemoryError::Snapshot { .. })
        ));
        assert!(MemorySnapshot::load(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn evolution_is_optional_in_json() {
        let snap: MemorySnapshot =
            serde_json::from_str(r#"{"taken_at": 1, "spaces": {"s": ["x"]}}"#).unwrap();
        assert!(snap.evolution.is_empty());
    }
}
