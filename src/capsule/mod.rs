// Timecapsule — Capsule Module
//
// Capsule lifecycle and access control: creation, owner-scoped listing,
// time-gated credential-checked unlock, and owner-checked deletion. The
// repository is the only code that touches the key-value store; the service
// is the only code that enforces the rules.

mod clock;
mod error;
mod models;
mod repository;
mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CapsuleError;
pub use models::{Capsule, CapsuleStatus, CapsuleSummary, Countdown, NewCapsule};
pub use repository::{capsule_key, CapsuleRepository, KvCapsuleRepository, KEY_PREFIX};
pub use service::CapsuleService;
