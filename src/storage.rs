// src/storage.rs

//! Key-value persistence contract consumed by apps through `OsContext`.
//!
//! Values are namespaced by app name. Two implementations ship with the
//! runtime: an in-memory map for headless/test use and a write-through
//! JSON file document.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::PathBuf;

type StoreMap = HashMap<String, HashMap<String, String>>;

/// Simple get/set key-value storage, namespaced by app name.
pub trait Storage {
    fn get(&self, app: &str, key: &str) -> Option<String>;

    fn set(&mut self, app: &str, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage; contents die with the process.
#[derive(Default)]
pub struct MemoryStorage {
    data: StoreMap,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, app: &str, key: &str) -> Option<String> {
        self.data.get(app).and_then(|m| m.get(key)).cloned()
    }

    fn set(&mut self, app: &str, key: &str, value: &str) -> Result<()> {
        self.data
            .entry(app.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON-file-backed storage. The whole document is loaded at construction
/// and rewritten on every `set`; app persistence is low-rate (scores,
/// settings), so write-through keeps crash behavior simple.
pub struct JsonFileStorage {
    path: PathBuf,
    data: StoreMap,
}

impl JsonFileStorage {
    pub fn open(path: PathBuf) -> Self {
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "JsonFileStorage: {} is not valid JSON ({}); starting empty",
                        path.display(),
                        e
                    );
                    StoreMap::new()
                }
            },
            Err(_) => {
                debug!(
                    "JsonFileStorage: {} not found; starting empty",
                    path.display()
                );
                StoreMap::new()
            }
        };
        JsonFileStorage { path, data }
    }

    fn flush(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.data)
            .context("JsonFileStorage: failed to serialize store")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("JsonFileStorage: failed to write {}", self.path.display()))
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, app: &str, key: &str) -> Option<String> {
        self.data.get(app).and_then(|m| m.get(key)).cloned()
    }

    fn set(&mut self, app: &str, key: &str, value: &str) -> Result<()> {
        self.data
            .entry(app.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_round_trips_per_app() {
        let mut storage = MemoryStorage::new();
        storage.set("snake", "high-score", "42").unwrap();
        storage.set("clock", "high-score", "7").unwrap();

        assert_eq!(storage.get("snake", "high-score").as_deref(), Some("42"));
        assert_eq!(storage.get("clock", "high-score").as_deref(), Some("7"));
        assert_eq!(storage.get("snake", "missing"), None);
        assert_eq!(storage.get("missing", "high-score"), None);
    }

    #[test]
    fn json_storage_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!(
            "matrix-os-storage-test-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut storage = JsonFileStorage::open(path.clone());
        storage.set("snake", "high-score", "42").unwrap();
        drop(storage);

        let reopened = JsonFileStorage::open(path.clone());
        assert_eq!(reopened.get("snake", "high-score").as_deref(), Some("42"));
        let _ = std::fs::remove_file(&path);
    }
}
