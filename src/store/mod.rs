// Timecapsule — Store Module
//
// The key-value layer underneath the capsule repository. Values are JSON
// documents keyed by plain strings; the only query beyond point access is
// a prefix scan.

mod db;
mod error;
mod kv;

pub use db::Database;
pub use error::StoreError;
pub use kv::{KvStore, SqliteKvStore};
