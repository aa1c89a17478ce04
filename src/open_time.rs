// Timecapsule — Open-time parsing
//
// Boundary helper: turns the wire/CLI spelling of an open time into an
// instant before anything reaches the capsule service. Accepted forms:
//   2026-12-31T23:59:00Z      RFC 3339 with offset
//   2026-12-31T23:59[:00]     naive, read as UTC
//   +90s / 30m / 1h / 7d      relative to `now`

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::capsule::CapsuleError;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

pub fn parse_open_at(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, CapsuleError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CapsuleError::Validation("open time is required".to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Some(offset) = parse_relative(raw) {
        return now
            .checked_add_signed(offset)
            .ok_or_else(|| CapsuleError::Validation("open time is out of range".to_string()));
    }

    Err(CapsuleError::Validation(format!(
        "unrecognised open time '{}': use RFC 3339 or a relative offset like 1h",
        raw
    )))
}

/// Parse "<n><unit>" with an optional leading '+'. Units: s, m, h, d.
fn parse_relative(raw: &str) -> Option<Duration> {
    let body = raw.strip_prefix('+').unwrap_or(raw);
    let unit = body.chars().last()?;
    let digits = &body[..body.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let amount: i64 = digits.parse().ok()?;

    match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
