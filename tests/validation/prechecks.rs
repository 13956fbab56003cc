//! Ban, expiry, and store-failure handling

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};

use crate::common::*;

const HWID: &str = "GPU-123";

fn expiring(valid_until: &str) -> NewLicense {
    NewLicense {
        valid_until: Some(valid_until.to_string()),
        duration: "30_days".to_string(),
        ..new_license(EMAIL, KEY)
    }
}

#[test]
fn test_banned_license_refused_and_unbound() {
    let store = memory_store();
    seed(&*store, EMAIL, KEY);
    store.set_banned(KEY, true, None).expect("Failed to ban");
    let validator = validator_for(&store);

    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::ValidationError(ValidationFailure::Banned)
    );
    assert_eq!(fetch(&*store, KEY).bound_hardware_id, None);
}

#[test]
fn test_banned_bound_license_refused_on_same_device() {
    let (store, _dir) = sqlite_store();
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    validator.validate(EMAIL, KEY, HWID);
    store.set_banned(KEY, true, Some("REVOKED: chargeback")).expect("Failed to ban");

    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::ValidationError(ValidationFailure::Banned)
    );
}

#[test]
fn test_ban_checked_before_expiry() {
    let store = memory_store();
    let past = (Utc::now() - Duration::days(1)).to_rfc3339();
    seed_with(&*store, expiring(&past));
    store.set_banned(KEY, true, None).expect("Failed to ban");
    let validator = validator_for(&store);

    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::ValidationError(ValidationFailure::Banned)
    );
}

#[test]
fn test_expired_license_refused() {
    let (store, _dir) = sqlite_store();
    let past = (Utc::now() - Duration::days(1)).to_rfc3339();
    seed_with(&*store, expiring(&past));
    let validator = validator_for(&store);

    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::ValidationError(ValidationFailure::Expired)
    );
    assert_eq!(fetch(&*store, KEY).bound_hardware_id, None);
}

#[test]
fn test_future_expiry_allowed() {
    let store = memory_store();
    let future = (Utc::now() + Duration::days(30)).to_rfc3339();
    seed_with(&*store, expiring(&future));
    let validator = validator_for(&store);

    assert!(matches!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::AllowedNewBinding(_)
    ));
}

#[test]
fn test_expiry_evaluated_against_supplied_clock() {
    let store = memory_store();
    seed_with(&*store, expiring("2030-01-01T00:00:00Z"));
    let validator = validator_for(&store);

    let before = "2029-12-31T23:59:59Z".parse().expect("valid timestamp");
    let after = "2030-01-01T00:00:01Z".parse().expect("valid timestamp");

    assert_eq!(
        validator.validate_at(EMAIL, KEY, HWID, after),
        Outcome::ValidationError(ValidationFailure::Expired)
    );
    assert!(matches!(
        validator.validate_at(EMAIL, KEY, HWID, before),
        Outcome::AllowedNewBinding(_)
    ));
}

#[test]
fn test_unparseable_expiry_fails_closed() {
    let store = memory_store();
    seed_with(&*store, expiring("next tuesday"));
    let validator = validator_for(&store);

    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::ValidationError(ValidationFailure::Expired)
    );
}

#[test]
fn test_naive_and_date_only_expiry_formats() {
    let store = memory_store();
    seed_with(&*store, expiring("2030-06-01 12:00:00"));
    seed_with(
        &*store,
        NewLicense {
            valid_until: Some("2030-06-01".into()),
            ..new_license("c@d.com", "CS-BBBB-2222")
        },
    );
    let validator = validator_for(&store);
    let now = "2030-05-01T00:00:00Z".parse().expect("valid timestamp");

    assert!(validator.validate_at(EMAIL, KEY, HWID, now).is_granted());
    assert!(
        validator
            .validate_at("c@d.com", "CS-BBBB-2222", HWID, now)
            .is_granted()
    );
}

#[test]
fn test_lookup_failure_is_validation_error() {
    let record = MemoryStore::new()
        .insert_license(&new_license(EMAIL, KEY))
        .expect("Failed to build record");
    let store = Arc::new(FlakyStore::new([record]));
    store.fail_lookup.store(true, Ordering::SeqCst);
    let validator = validator_for(&store);

    let outcome = validator.validate(EMAIL, KEY, HWID);
    assert!(
        matches!(
            outcome,
            Outcome::ValidationError(ValidationFailure::Store(_))
        ),
        "{:?}",
        outcome
    );
    assert!(!outcome.is_granted());
}

#[test]
fn test_bind_failure_is_validation_error() {
    let record = MemoryStore::new()
        .insert_license(&new_license(EMAIL, KEY))
        .expect("Failed to build record");
    let store = Arc::new(FlakyStore::new([record]));
    store.fail_bind.store(true, Ordering::SeqCst);
    let validator = validator_for(&store);

    assert!(matches!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::ValidationError(ValidationFailure::Store(_))
    ));
    // Nothing was bound, so a later attempt still gets the first binding
    store.fail_bind.store(false, Ordering::SeqCst);
    assert!(matches!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::AllowedNewBinding(_)
    ));
}

#[test]
fn test_bound_license_survives_bind_failures() {
    let record = MemoryStore::new()
        .insert_license(&new_license(EMAIL, KEY))
        .expect("Failed to build record");
    let store = Arc::new(FlakyStore::new([record]));
    let validator = validator_for(&store);
    validator.validate(EMAIL, KEY, HWID);

    // Already bound: no write is attempted, so a broken write path is irrelevant
    store.fail_bind.store(true, Ordering::SeqCst);
    assert!(matches!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::Allowed(_)
    ));
    assert_eq!(
        validator.validate(EMAIL, KEY, "GPU-999"),
        Outcome::DeviceLimitReached
    );
}

#[test]
fn test_unapplied_write_is_not_a_grant() {
    let inner = MemoryStore::new();
    inner
        .insert_license(&new_license(EMAIL, KEY))
        .expect("Failed to build record");
    let store = Arc::new(LostWriteStore { inner });
    let validator = validator_for(&store);

    let outcome = validator.validate(EMAIL, KEY, HWID);
    assert!(
        matches!(
            outcome,
            Outcome::ValidationError(ValidationFailure::Store(_))
        ),
        "{:?}",
        outcome
    );
}
