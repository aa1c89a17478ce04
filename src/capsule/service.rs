// Timecapsule — Capsule Service
//
// The only place the business rules live. The service holds no state of its
// own: every call reads from the repository, checks, and writes back, so any
// number of instances can run against the same store.
//
// Unlock checks readiness BEFORE the credential. A caller probing a sealed
// capsule learns nothing about whether their guess was right.

use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::error::CapsuleError;
use super::models::{Capsule, CapsuleSummary, NewCapsule};
use super::repository::CapsuleRepository;

pub struct CapsuleService<R, C = SystemClock> {
    repo: R,
    clock: C,
}

impl<R: CapsuleRepository> CapsuleService<R, SystemClock> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, SystemClock)
    }
}

impl<R: CapsuleRepository, C: Clock> CapsuleService<R, C> {
    pub fn with_clock(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Seal a new capsule. Returns the redacted record.
    pub fn create(&self, input: NewCapsule) -> Result<CapsuleSummary, CapsuleError> {
        require_non_empty("owner", &input.owner)?;
        require_non_empty("credential", &input.credential)?;
        require_non_empty("message", &input.message)?;

        let now = self.clock.now();
        if input.open_at <= now {
            return Err(CapsuleError::Validation(
                "open time must be in the future".to_string(),
            ));
        }

        let capsule = Capsule::new(
            Uuid::now_v7().to_string(),
            input.owner,
            input.credential,
            input.message,
            input.open_at,
            now,
            false,
        );

        self.repo.put(&capsule)?;

        tracing::info!(
            capsule_id = %capsule.id,
            owner = %capsule.owner,
            open_at = %capsule.open_at.to_rfc3339(),
            "Capsule sealed"
        );

        Ok(capsule.redacted())
    }

    /// Redacted capsules belonging to `owner` (exact, case-sensitive match).
    /// Order is unspecified.
    pub fn list_by_owner(&self, owner: &str) -> Result<Vec<CapsuleSummary>, CapsuleError> {
        require_non_empty("owner", owner)?;

        let summaries: Vec<CapsuleSummary> = self
            .repo
            .list_all()?
            .iter()
            .filter(|capsule| capsule.owner == owner)
            .map(Capsule::redacted)
            .collect();

        tracing::debug!(owner = %owner, count = summaries.len(), "Listed capsules");
        Ok(summaries)
    }

    /// Reveal the message once the open time has passed and the credential
    /// matches. Repeatable: an opened capsule can be unlocked again.
    pub fn unlock(&self, id: &str, credential: &str) -> Result<String, CapsuleError> {
        require_non_empty("credential", credential)?;

        let mut capsule = self.find(id)?;

        if !capsule.is_ready(self.clock.now()) {
            tracing::warn!(capsule_id = %id, "Unlock attempted before open time");
            return Err(CapsuleError::NotReady {
                id: capsule.id,
                open_at: capsule.open_at,
            });
        }

        if !capsule.credential_matches(credential) {
            tracing::warn!(capsule_id = %id, "Unlock rejected: credential mismatch");
            return Err(CapsuleError::Unauthorized(capsule.id));
        }

        let first_open = !capsule.opened;
        capsule.opened = true;
        // A delete that landed between the read and this write wins.
        if !self.repo.update(&capsule)? {
            return Err(CapsuleError::NotFound(capsule.id));
        }

        tracing::info!(capsule_id = %id, first_open, "Capsule unlocked");

        Ok(std::mem::take(&mut capsule.message))
    }

    /// Remove a capsule. Only the stored owner may do this.
    pub fn delete(&self, id: &str, owner: &str) -> Result<(), CapsuleError> {
        require_non_empty("owner", owner)?;

        let capsule = self.find(id)?;

        if capsule.owner != owner {
            tracing::warn!(capsule_id = %id, "Delete rejected: owner mismatch");
            return Err(CapsuleError::Forbidden(capsule.id));
        }

        if !self.repo.delete_by_id(id)? {
            return Err(CapsuleError::NotFound(id.to_string()));
        }

        tracing::info!(capsule_id = %id, owner = %owner, "Capsule deleted");
        Ok(())
    }

    fn find(&self, id: &str) -> Result<Capsule, CapsuleError> {
        self.repo
            .get_by_id(id)?
            .ok_or_else(|| CapsuleError::NotFound(id.to_string()))
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CapsuleError> {
    if value.is_empty() {
        return Err(CapsuleError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::capsule::{KvCapsuleRepository, ManualClock};
    use crate::store::{Database, SqliteKvStore};

    type TestService<'a> = CapsuleService<KvCapsuleRepository<SqliteKvStore<'a>>, ManualClock>;

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn service<'a>(db: &'a Database, clock: &ManualClock) -> TestService<'a> {
        CapsuleService::with_clock(
            KvCapsuleRepository::new(SqliteKvStore::new(db)),
            clock.clone(),
        )
    }

    fn new_capsule(owner: &str, credential: &str, message: &str, open_at: DateTime<Utc>) -> NewCapsule {
        NewCapsule {
            owner: owner.to_string(),
            credential: credential.to_string(),
            message: message.to_string(),
            open_at,
        }
    }

    fn stored_opened(db: &Database, id: &str) -> Option<bool> {
        KvCapsuleRepository::new(SqliteKvStore::new(db))
            .get_by_id(id)
            .unwrap()
            .map(|c| c.opened)
    }

    #[test]
    fn test_create_returns_redacted_capsule() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        let summary = svc
            .create(new_capsule("alice", "p1", "hi future", start() + Duration::hours(1)))
            .unwrap();

        assert_eq!(summary.owner, "alice");
        assert_eq!(summary.created_at, start());
        assert_eq!(summary.open_at, start() + Duration::hours(1));
        assert!(!summary.opened);
        assert!(!summary.id.is_empty());

        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("\"p1\""), "Create response must never contain the credential");
    }

    #[test]
    fn test_create_assigns_unique_ids_in_rapid_succession() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        let ids: HashSet<String> = (0..50)
            .map(|i| {
                svc.create(new_capsule("alice", "p", &format!("m{}", i), start() + Duration::hours(1)))
                    .unwrap()
                    .id
            })
            .collect();

        assert_eq!(ids.len(), 50, "Every capsule must get its own id");
    }

    #[test]
    fn test_create_rejects_empty_fields() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let later = start() + Duration::hours(1);

        for input in [
            new_capsule("", "p", "m", later),
            new_capsule("alice", "", "m", later),
            new_capsule("alice", "p", "", later),
        ] {
            let err = svc.create(input).unwrap_err();
            assert!(matches!(err, CapsuleError::Validation(_)), "Got {:?}", err);
        }
        assert!(svc.list_by_owner("alice").unwrap().is_empty(), "Nothing should be stored");
    }

    #[test]
    fn test_create_rejects_open_time_not_in_future() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        let at_now = svc.create(new_capsule("alice", "p", "m", start())).unwrap_err();
        assert!(matches!(at_now, CapsuleError::Validation(_)));

        let past = svc
            .create(new_capsule("alice", "p", "m", start() - Duration::seconds(1)))
            .unwrap_err();
        assert!(matches!(past, CapsuleError::Validation(_)));
    }

    #[test]
    fn test_list_by_owner_is_exact_set() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let later = start() + Duration::days(1);

        let a1 = svc.create(new_capsule("alice", "p", "one", later)).unwrap();
        let a2 = svc.create(new_capsule("alice", "p", "two", later)).unwrap();
        svc.create(new_capsule("bob", "p", "three", later)).unwrap();
        svc.create(new_capsule("Alice", "p", "four", later)).unwrap();

        let listed: HashSet<CapsuleSummary> = svc.list_by_owner("alice").unwrap().into_iter().collect();
        let expected: HashSet<CapsuleSummary> = [a1, a2].into_iter().collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_list_by_owner_without_capsules_is_empty() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        assert!(svc.list_by_owner("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_list_by_owner_rejects_empty_owner() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        assert!(matches!(svc.list_by_owner(""), Err(CapsuleError::Validation(_))));
    }

    #[test]
    fn test_list_never_contains_credential() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        svc.create(new_capsule("alice", "very-secret-credential", "m", start() + Duration::hours(1)))
            .unwrap();

        let json = serde_json::to_string(&svc.list_by_owner("alice").unwrap()).unwrap();
        assert!(!json.contains("very-secret-credential"));
    }

    #[test]
    fn test_unlock_before_open_time_is_not_ready_regardless_of_credential() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let id = svc
            .create(new_capsule("alice", "p1", "m", start() + Duration::hours(1)))
            .unwrap()
            .id;

        for guess in ["p1", "wrong"] {
            let err = svc.unlock(&id, guess).unwrap_err();
            assert!(matches!(err, CapsuleError::NotReady { .. }), "Got {:?}", err);
        }
        assert_eq!(stored_opened(&db, &id), Some(false), "NotReady must not mutate");
    }

    #[test]
    fn test_unlock_wrong_credential_is_unauthorized() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let id = svc
            .create(new_capsule("alice", "p1", "m", start() + Duration::hours(1)))
            .unwrap()
            .id;
        clock.advance(Duration::hours(2));

        let err = svc.unlock(&id, "P1").unwrap_err();
        assert!(matches!(err, CapsuleError::Unauthorized(_)));
        assert_eq!(stored_opened(&db, &id), Some(false), "Unauthorized must not mutate");
    }

    #[test]
    fn test_unlock_at_exact_open_time_succeeds() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let open_at = start() + Duration::minutes(5);
        let id = svc.create(new_capsule("alice", "p1", "on the dot", open_at)).unwrap().id;

        clock.set(open_at);
        assert_eq!(svc.unlock(&id, "p1").unwrap(), "on the dot");
    }

    #[test]
    fn test_unlock_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let id = svc
            .create(new_capsule("alice", "p1", "again and again", start() + Duration::hours(1)))
            .unwrap()
            .id;
        clock.advance(Duration::hours(1));

        assert_eq!(svc.unlock(&id, "p1").unwrap(), "again and again");
        assert_eq!(svc.unlock(&id, "p1").unwrap(), "again and again");
        assert_eq!(stored_opened(&db, &id), Some(true));

        // Opened stays opened even after a failed attempt.
        assert!(matches!(svc.unlock(&id, "nope"), Err(CapsuleError::Unauthorized(_))));
        assert_eq!(stored_opened(&db, &id), Some(true));
        assert!(svc.list_by_owner("alice").unwrap()[0].opened);
    }

    #[test]
    fn test_unlock_missing_capsule_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        assert!(matches!(svc.unlock("missing", "p"), Err(CapsuleError::NotFound(_))));
    }

    #[test]
    fn test_unlock_rejects_empty_credential() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        assert!(matches!(svc.unlock("any", ""), Err(CapsuleError::Validation(_))));
    }

    #[test]
    fn test_errors_never_leak_credential() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let id = svc
            .create(new_capsule("alice", "leak-check-secret", "m", start() + Duration::hours(1)))
            .unwrap()
            .id;

        let not_ready = svc.unlock(&id, "leak-check-secret").unwrap_err();
        clock.advance(Duration::hours(1));
        let unauthorized = svc.unlock(&id, "guess").unwrap_err();
        let forbidden = svc.delete(&id, "mallory").unwrap_err();

        for err in [not_ready, unauthorized, forbidden] {
            let text = format!("{} {:?}", err, err);
            assert!(!text.contains("leak-check-secret"), "Error leaked credential: {}", text);
        }
    }

    #[test]
    fn test_delete_by_other_owner_is_forbidden() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let id = svc
            .create(new_capsule("alice", "p1", "m", start() + Duration::hours(1)))
            .unwrap()
            .id;

        assert!(matches!(svc.delete(&id, "bob"), Err(CapsuleError::Forbidden(_))));
        assert!(stored_opened(&db, &id).is_some(), "Record must survive a forbidden delete");
    }

    #[test]
    fn test_delete_missing_capsule_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        assert!(matches!(svc.delete("missing", "alice"), Err(CapsuleError::NotFound(_))));
        assert!(matches!(svc.delete("missing", ""), Err(CapsuleError::Validation(_))));
    }

    #[test]
    fn test_delete_works_on_sealed_and_opened_capsules() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let sealed = svc.create(new_capsule("alice", "p", "a", start() + Duration::days(9))).unwrap().id;
        let opened = svc.create(new_capsule("alice", "p", "b", start() + Duration::hours(1))).unwrap().id;
        clock.advance(Duration::hours(1));
        svc.unlock(&opened, "p").unwrap();

        svc.delete(&sealed, "alice").unwrap();
        svc.delete(&opened, "alice").unwrap();
        assert!(svc.list_by_owner("alice").unwrap().is_empty());
    }

    /// Deletes the record right before the write-back, like a delete that
    /// lands between unlock's read and its write.
    struct DeleteBeforeUpdate<'a>(KvCapsuleRepository<SqliteKvStore<'a>>);

    impl CapsuleRepository for DeleteBeforeUpdate<'_> {
        fn put(&self, capsule: &Capsule) -> Result<(), crate::store::StoreError> {
            self.0.put(capsule)
        }

        fn update(&self, capsule: &Capsule) -> Result<bool, crate::store::StoreError> {
            self.0.delete_by_id(&capsule.id)?;
            self.0.update(capsule)
        }

        fn get_by_id(&self, id: &str) -> Result<Option<Capsule>, crate::store::StoreError> {
            self.0.get_by_id(id)
        }

        fn list_all(&self) -> Result<Vec<Capsule>, crate::store::StoreError> {
            self.0.list_all()
        }

        fn delete_by_id(&self, id: &str) -> Result<bool, crate::store::StoreError> {
            self.0.delete_by_id(id)
        }
    }

    /// A store that has gone away: every call fails.
    struct Unavailable;

    fn disk_gone() -> crate::store::StoreError {
        std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into()
    }

    impl CapsuleRepository for Unavailable {
        fn put(&self, _: &Capsule) -> Result<(), crate::store::StoreError> {
            Err(disk_gone())
        }

        fn update(&self, _: &Capsule) -> Result<bool, crate::store::StoreError> {
            Err(disk_gone())
        }

        fn get_by_id(&self, _: &str) -> Result<Option<Capsule>, crate::store::StoreError> {
            Err(disk_gone())
        }

        fn list_all(&self) -> Result<Vec<Capsule>, crate::store::StoreError> {
            Err(disk_gone())
        }

        fn delete_by_id(&self, _: &str) -> Result<bool, crate::store::StoreError> {
            Err(disk_gone())
        }
    }

    #[test]
    fn test_store_failure_surfaces_as_storage_error() {
        let svc = CapsuleService::with_clock(Unavailable, ManualClock::new(start()));

        let results = [
            svc.create(new_capsule("alice", "p1", "m", start() + Duration::hours(1)))
                .map(|_| ())
                .unwrap_err(),
            svc.list_by_owner("alice").map(|_| ()).unwrap_err(),
            svc.unlock("c1", "p1").map(|_| ()).unwrap_err(),
            svc.delete("c1", "alice").unwrap_err(),
        ];

        for err in results {
            assert!(matches!(err, CapsuleError::Storage(_)), "Got {:?}", err);
            assert_eq!(err.kind(), "storage_error");
            assert!(err.is_retryable(), "Storage failures may be retried by the caller");
        }
    }

    #[test]
    fn test_validation_runs_before_touching_the_store() {
        let svc = CapsuleService::with_clock(Unavailable, ManualClock::new(start()));

        assert!(matches!(svc.list_by_owner(""), Err(CapsuleError::Validation(_))));
        assert!(matches!(svc.unlock("c1", ""), Err(CapsuleError::Validation(_))));
        assert!(matches!(svc.delete("c1", ""), Err(CapsuleError::Validation(_))));
    }

    #[test]
    fn test_list_by_owner_skips_damaged_records() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);
        let kept = svc.create(new_capsule("alice", "p", "m", start() + Duration::hours(1))).unwrap();
        crate::store::KvStore::set(
            &SqliteKvStore::new(&db),
            "capsule:junk",
            &serde_json::json!({"owner": "mallory"}),
        )
        .unwrap();

        assert_eq!(svc.list_by_owner("alice").unwrap(), vec![kept]);
        assert!(svc.list_by_owner("mallory").unwrap().is_empty());
    }

    #[test]
    fn test_unlock_racing_delete_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let id = service(&db, &clock)
            .create(new_capsule("alice", "p1", "m", start() + Duration::hours(1)))
            .unwrap()
            .id;
        clock.advance(Duration::hours(1));

        let racing = CapsuleService::with_clock(
            DeleteBeforeUpdate(KvCapsuleRepository::new(SqliteKvStore::new(&db))),
            clock.clone(),
        );

        assert!(matches!(racing.unlock(&id, "p1"), Err(CapsuleError::NotFound(_))));
        assert!(stored_opened(&db, &id).is_none(), "Unlock must not resurrect a deleted capsule");
    }

    #[test]
    fn test_full_lifecycle_scenario() {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new(start());
        let svc = service(&db, &clock);

        let id = svc
            .create(new_capsule("alice", "p1", "hi future", start() + Duration::hours(1)))
            .unwrap()
            .id;

        assert!(matches!(svc.unlock(&id, "p1"), Err(CapsuleError::NotReady { .. })));

        clock.advance(Duration::hours(1) + Duration::seconds(1));
        assert!(matches!(svc.unlock(&id, "wrong"), Err(CapsuleError::Unauthorized(_))));
        assert_eq!(svc.unlock(&id, "p1").unwrap(), "hi future");

        assert!(matches!(svc.delete(&id, "bob"), Err(CapsuleError::Forbidden(_))));
        svc.delete(&id, "alice").unwrap();

        assert!(matches!(svc.unlock(&id, "p1"), Err(CapsuleError::NotFound(_))));
    }
}
