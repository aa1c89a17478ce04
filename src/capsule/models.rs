// Timecapsule — Capsule data models
//
// SECURITY: the credential lives in a private field. `Capsule` has no
// Serialize impl, and its Debug/Display never print the credential. Anything
// that leaves the service goes out as a `CapsuleSummary`, which has neither
// the credential nor the message body.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The full capsule record as held by the repository.
pub struct Capsule {
    pub id: String,
    pub owner: String,
    /// Compared exactly on unlock — NEVER printed, logged, or returned
    credential: Zeroizing<String>,
    pub message: String,
    pub open_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub opened: bool,
}

impl Capsule {
    pub fn new(
        id: String,
        owner: String,
        credential: String,
        message: String,
        open_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        opened: bool,
    ) -> Self {
        Self {
            id,
            owner,
            credential: Zeroizing::new(credential),
            message,
            open_at,
            created_at,
            opened,
        }
    }

    /// Raw credential, for the repository's encoder only.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn credential_matches(&self, candidate: &str) -> bool {
        self.credential.as_str() == candidate
    }

    /// True once `now` has reached the open time.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        now >= self.open_at
    }

    /// The form that is allowed to cross the service boundary.
    pub fn redacted(&self) -> CapsuleSummary {
        CapsuleSummary {
            id: self.id.clone(),
            owner: self.owner.clone(),
            open_at: self.open_at,
            created_at: self.created_at,
            opened: self.opened,
        }
    }
}

impl fmt::Debug for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capsule")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("credential", &"[REDACTED]")
            .field("message", &"[SEALED]")
            .field("open_at", &self.open_at)
            .field("created_at", &self.created_at)
            .field("opened", &self.opened)
            .finish()
    }
}

impl fmt::Display for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] owner={} opens {}", self.id, self.owner, self.open_at.to_rfc3339())
    }
}

/// Redacted view of a capsule, used for create and list responses.
/// Carries neither the credential nor the message; only unlock reveals the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapsuleSummary {
    pub id: String,
    pub owner: String,
    pub open_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub opened: bool,
}

impl CapsuleSummary {
    pub fn status(&self, now: DateTime<Utc>) -> CapsuleStatus {
        if self.opened {
            CapsuleStatus::Opened
        } else if now >= self.open_at {
            CapsuleStatus::Ready
        } else {
            CapsuleStatus::Sealed
        }
    }

    /// Time left until the open time, or None once it has passed.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Countdown> {
        let left = self.open_at.signed_duration_since(now);
        if left <= chrono::Duration::zero() {
            return None;
        }
        Some(Countdown::from_seconds(left.num_seconds()))
    }
}

impl fmt::Display for CapsuleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] owner={} opens {}", self.id, self.owner, self.open_at.to_rfc3339())
    }
}

/// Where a capsule stands relative to its open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapsuleStatus {
    /// Open time not reached yet.
    Sealed,
    /// Open time reached, never unlocked.
    Ready,
    /// Unlocked at least once.
    Opened,
}

impl fmt::Display for CapsuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sealed => "sealed",
            Self::Ready => "ready",
            Self::Opened => "opened",
        };
        f.pad(label)
    }
}

/// Remaining time broken into days/hours/minutes/seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    fn from_seconds(total: i64) -> Self {
        Self {
            days: total / 86_400,
            hours: (total / 3_600) % 24,
            minutes: (total / 60) % 60,
            seconds: total % 60,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d {:02}h {:02}m {:02}s", self.days, self.hours, self.minutes, self.seconds)
    }
}

/// Input for creating a capsule. `open_at` is already parsed; the service
/// never sees a raw time string.
pub struct NewCapsule {
    pub owner: String,
    pub credential: String,
    pub message: String,
    pub open_at: DateTime<Utc>,
}

impl fmt::Debug for NewCapsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCapsule")
            .field("owner", &self.owner)
            .field("credential", &"[REDACTED]")
            .field("message", &"[SEALED]")
            .field("open_at", &self.open_at)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
