// Timecapsule — Library root
//
// Re-exports the store, capsule, gateway, and CLI modules.

pub mod capsule;
pub mod cli;
pub mod error;
pub mod gateway;
pub mod open_time;
pub mod store;

pub use error::{Result, TimecapsuleError};
