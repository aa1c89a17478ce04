// Timecapsule — Capsule Repository
//
// Encodes capsules as JSON documents under `capsule:<id>`. This is the only
// code that knows the key scheme or the stored layout. It neither filters
// nor redacts; the service does both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::Capsule;
use crate::store::{KvStore, StoreError};

/// Key prefix shared by every capsule record.
pub const KEY_PREFIX: &str = "capsule:";

pub fn capsule_key(id: &str) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over capsule persistence.
pub trait CapsuleRepository {
    /// Upsert the full record, credential included.
    fn put(&self, capsule: &Capsule) -> Result<(), StoreError>;

    /// Overwrite an existing record. Returns false if the record is gone.
    fn update(&self, capsule: &Capsule) -> Result<bool, StoreError>;

    fn get_by_id(&self, id: &str) -> Result<Option<Capsule>, StoreError>;

    /// Every stored capsule, unfiltered and unordered. Records that fail to
    /// decode are skipped.
    fn list_all(&self) -> Result<Vec<Capsule>, StoreError>;

    /// Remove a record. Returns true if it existed.
    fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;
}

// ─── Stored layout ───────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct StoredCapsule {
    id: String,
    owner: String,
    credential: String,
    message: String,
    open_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    opened: bool,
}

impl From<&Capsule> for StoredCapsule {
    fn from(capsule: &Capsule) -> Self {
        Self {
            id: capsule.id.clone(),
            owner: capsule.owner.clone(),
            credential: capsule.credential().to_string(),
            message: capsule.message.clone(),
            open_at: capsule.open_at,
            created_at: capsule.created_at,
            opened: capsule.opened,
        }
    }
}

impl From<StoredCapsule> for Capsule {
    fn from(stored: StoredCapsule) -> Self {
        Capsule::new(
            stored.id,
            stored.owner,
            stored.credential,
            stored.message,
            stored.open_at,
            stored.created_at,
            stored.opened,
        )
    }
}

// ─── Key-Value Implementation ───────────────────────────────────────────────

pub struct KvCapsuleRepository<S> {
    store: S,
}

impl<S: KvStore> KvCapsuleRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn encode(capsule: &Capsule) -> Result<serde_json::Value, StoreError> {
        Ok(serde_json::to_value(StoredCapsule::from(capsule))?)
    }

    fn decode(value: serde_json::Value) -> Result<Capsule, StoreError> {
        let stored: StoredCapsule = serde_json::from_value(value)?;
        Ok(stored.into())
    }
}

impl<S: KvStore> CapsuleRepository for KvCapsuleRepository<S> {
    fn put(&self, capsule: &Capsule) -> Result<(), StoreError> {
        self.store.set(&capsule_key(&capsule.id), &Self::encode(capsule)?)
    }

    fn update(&self, capsule: &Capsule) -> Result<bool, StoreError> {
        self.store.replace(&capsule_key(&capsule.id), &Self::encode(capsule)?)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Capsule>, StoreError> {
        self.store
            .get(&capsule_key(id))?
            .map(Self::decode)
            .transpose()
    }

    fn list_all(&self) -> Result<Vec<Capsule>, StoreError> {
        let mut capsules = Vec::new();
        for value in self.store.get_by_prefix(KEY_PREFIX)? {
            // One damaged record must not hide every other owner's capsules.
            match Self::decode(value) {
                Ok(capsule) => capsules.push(capsule),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable capsule record"),
            }
        }
        Ok(capsules)
    }

    fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(&capsule_key(id))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
