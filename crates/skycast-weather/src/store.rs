//! Last successfully fetched coordinate, kept across restarts.
//!
//! Values live behind a small key-value trait so the JSON file used by
//! the app can be swapped for an in-memory map in tests.

use parking_lot::Mutex;
use skycast_core::PersistenceError;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use crate::types::Coordinate;

pub const LATITUDE_KEY: &str = "lat";
pub const LONGITUDE_KEY: &str = "lon";

/// Scalar settings storage keyed by logical name.
pub trait KeyValueStore: Send + Sync {
    fn get_f64(&self, key: &str) -> Result<Option<f64>, PersistenceError>;

    fn set_f64(&self, key: &str, value: f64) -> Result<(), PersistenceError>;
}

/// Key-value pairs in a single pretty-printed JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, f64>, PersistenceError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| PersistenceError::Serialization(e.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get_f64(&self, key: &str) -> Result<Option<f64>, PersistenceError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.get(key).copied())
    }

    fn set_f64(&self, key: &str, value: f64) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock();
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&values)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_f64(&self, key: &str) -> Result<Option<f64>, PersistenceError> {
        Ok(self.values.lock().get(key).copied())
    }

    fn set_f64(&self, key: &str, value: f64) -> Result<(), PersistenceError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Remembers the coordinate of the last successful weather fetch.
///
/// `{0, 0}` is read back as "nothing saved", so a reading taken exactly at
/// the equator/prime meridian intersection is never restored.
#[derive(Clone)]
pub struct LastLocationStore {
    backend: Arc<dyn KeyValueStore>,
}

impl LastLocationStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Persist `coord` without blocking the caller.
    ///
    /// Inside a Tokio runtime the write runs as a detached blocking task whose
    /// outcome is dropped; outside one it runs inline. Failures are only logged.
    pub fn save(&self, coord: Coordinate) {
        let backend = Arc::clone(&self.backend);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn_blocking(move || write_coordinate(backend.as_ref(), coord)));
            }
            Err(_) => write_coordinate(backend.as_ref(), coord),
        }
    }

    /// Last saved coordinate, or `None` when nothing was saved.
    pub fn load(&self) -> Option<Coordinate> {
        let latitude = read_component(self.backend.as_ref(), LATITUDE_KEY);
        let longitude = read_component(self.backend.as_ref(), LONGITUDE_KEY);
        let coord = Coordinate::new(latitude, longitude);

        if coord.is_unset() {
            None
        } else {
            Some(coord)
        }
    }
}

fn write_coordinate(backend: &dyn KeyValueStore, coord: Coordinate) {
    let result = backend
        .set_f64(LATITUDE_KEY, coord.latitude)
        .and_then(|()| backend.set_f64(LONGITUDE_KEY, coord.longitude));

    match result {
        Ok(()) => tracing::debug!(
            "Saved last location {}, {}",
            coord.latitude,
            coord.longitude
        ),
        Err(e) => tracing::debug!("Failed to save last location: {}", e),
    }
}

// Missing or unreadable values read as 0.0, like an unset default
fn read_component(backend: &dyn KeyValueStore, key: &str) -> f64 {
    match backend.get_f64(key) {
        Ok(value) => value.unwrap_or(0.0),
        Err(e) => {
            tracing::debug!("Failed to read {} from last location store: {}", key, e);
            0.0
        }
    }
}
