//! In-memory [`Store`] backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use hearth_protocol::{Document, unix_millis};
use serde::Deserialize;
use serde_json::Value;

use crate::{Credential, Store, StoreError, TIMESTAMP_KEY, UpdateOutcome, ZONE_KEY};

/// Initial contents for a [`MemoryStore`], as read from a seed file.
///
/// ```json
/// { "users": [ { "user": "alice", "password": "secret" } ],
///   "zones": [ { "zone": "meadow", "weather": "rain" } ] }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<Credential>,
    #[serde(default)]
    pub zones: Vec<Document>,
}

/// A store that keeps both collections in process memory.
///
/// Zones keep their insertion order so snapshots are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, Credential>>,
    zones: RwLock<Vec<Document>>,
}

fn zone_name(doc: &Document) -> Option<&str> {
    doc.get(ZONE_KEY).and_then(Value::as_str)
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from seed data.
    ///
    /// # Errors
    /// `StoreError::UnnamedZone` if a zone lacks a `zone` name.
    pub fn from_seed(seed: Seed) -> Result<Self, StoreError> {
        let store = Self::new();
        for credential in seed.users {
            store.insert_credential(credential);
        }
        for zone in seed.zones {
            store.insert_zone(zone)?;
        }
        Ok(store)
    }

    /// Parses seed JSON and builds a store from it.
    ///
    /// # Errors
    /// `SeedFormat` for bad JSON, `UnnamedZone` for a nameless zone.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let seed: Seed = serde_json::from_str(json).map_err(StoreError::SeedFormat)?;
        Self::from_seed(seed)
    }

    /// Reads a seed file from disk.
    ///
    /// # Errors
    /// `SeedIo` if the file can't be read, otherwise as [`from_json`](Self::from_json).
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(|source| StoreError::SeedIo {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            users = store.user_count(),
            zones = store.zone_count(),
            "loaded store seed"
        );
        Ok(store)
    }

    /// Adds or replaces a user.
    pub fn insert_credential(&self, credential: Credential) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential.user.clone(), credential);
    }

    /// Adds a zone document, replacing any zone with the same name.
    ///
    /// # Errors
    /// `StoreError::UnnamedZone` if `doc` has no string `zone` field.
    pub fn insert_zone(&self, doc: Document) -> Result<(), StoreError> {
        let name = zone_name(&doc).ok_or(StoreError::UnnamedZone)?.to_string();
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        match zones.iter_mut().find(|z| zone_name(z) == Some(name.as_str())) {
            Some(existing) => *existing = doc,
            None => zones.push(doc),
        }
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Store for MemoryStore {
    async fn find_credential(&self, name: &str) -> Result<Option<Credential>, StoreError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(name).cloned())
    }

    async fn find_zones(&self) -> Result<Vec<Document>, StoreError> {
        let zones = self.zones.read().unwrap_or_else(PoisonError::into_inner);
        Ok(zones.clone())
    }

    async fn find_zone(&self, name: &str) -> Result<Option<Document>, StoreError> {
        let zones = self.zones.read().unwrap_or_else(PoisonError::into_inner);
        Ok(zones.iter().find(|z| zone_name(z) == Some(name)).cloned())
    }

    async fn update_zone(&self, name: &str, patch: Document) -> Result<UpdateOutcome, StoreError> {
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        let Some(zone) = zones.iter_mut().find(|z| zone_name(z) == Some(name)) else {
            return Ok(UpdateOutcome::NotFound);
        };
        for (key, value) in patch {
            // The name is the lookup key; renaming through a patch is not allowed.
            if key != ZONE_KEY {
                zone.insert(key, value);
            }
        }
        zone.insert(TIMESTAMP_KEY.to_string(), Value::from(unix_millis()));
        Ok(UpdateOutcome::Updated(zone.clone()))
    }
}
