// Timecapsule — Key-Value Store
//
// The storage primitive the capsule repository is written against: point
// get/set/delete plus a prefix scan. No transactions and no secondary
// indexes. `replace` is the one conditional write, so callers can update a
// record without resurrecting it after a concurrent delete.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::db::Database;
use super::StoreError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a string-keyed store of JSON values.
pub trait KvStore {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or overwrite the value under `key`.
    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Overwrite the value under `key` only if the key already exists.
    /// Returns false when nothing was written.
    fn replace(&self, key: &str, value: &Value) -> Result<bool, StoreError>;

    /// Remove `key`. Returns true if it existed; absence is not an error.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Every value whose key starts with `prefix`, in no particular order.
    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError>;
}

// ─── SQLite Implementation ──────────────────────────────────────────────────

pub struct SqliteKvStore<'a> {
    db: &'a Database,
}

impl<'a> SqliteKvStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn decode(raw: &str) -> Result<Value, StoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl<'a> KvStore for SqliteKvStore<'a> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .db
            .conn()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        raw.as_deref().map(Self::decode).transpose()
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.db.conn().execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, json],
        )?;

        tracing::debug!(key = %key, "Key written");
        Ok(())
    }

    fn replace(&self, key: &str, value: &Value) -> Result<bool, StoreError> {
        let json = serde_json::to_string(value)?;
        let affected = self.db.conn().execute(
            "UPDATE kv_store SET value = ?2 WHERE key = ?1",
            params![key, json],
        )?;

        tracing::debug!(key = %key, written = affected > 0, "Conditional replace");
        Ok(affected > 0)
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let affected = self
            .db
            .conn()
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;

        tracing::debug!(key = %key, removed = affected > 0, "Key deleted");
        Ok(affected > 0)
    }

    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, StoreError> {
        // substr comparison rather than LIKE so '%' and '_' in the prefix stay literal.
        let mut stmt = self.db.conn().prepare(
            "SELECT value FROM kv_store WHERE substr(key, 1, length(?1)) = ?1",
        )?;

        let rows = stmt.query_map(params![prefix], |row| row.get::<_, String>(0))?;

        let mut values = Vec::new();
        for row in rows {
            values.push(Self::decode(&row?)?);
        }

        Ok(values)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
