//! Hardware binding reset

use std::sync::Arc;
use std::sync::atomic::Ordering;

use licensegate::{LicenseAdmin, ResetError};

use crate::common::*;

fn admin_for<S: LicenseRegistry + 'static>(store: &Arc<S>) -> LicenseAdmin {
    LicenseAdmin::new(store.clone(), "CS")
}

fn check_reset_clears_binding<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);
    let admin = admin_for(&store);

    validator.validate(EMAIL, KEY, "GPU-123");
    admin.reset_binding(KEY).expect("Failed to reset binding");

    let record = fetch(&*store, KEY);
    assert_eq!(record.bound_hardware_id, None);
    assert_eq!(record.activated_at, None);

    assert!(matches!(
        validator.validate(EMAIL, KEY, "GPU-999"),
        Outcome::AllowedNewBinding(_)
    ));
}

#[test]
fn test_reset_clears_binding_memory() {
    check_reset_clears_binding(memory_store());
}

#[test]
fn test_reset_clears_binding_sqlite() {
    let (store, _dir) = sqlite_store();
    check_reset_clears_binding(store);
}

#[test]
fn test_reset_unbound_license_is_noop() {
    let store = memory_store();
    seed(&*store, EMAIL, KEY);
    let admin = admin_for(&store);

    admin.reset_binding(KEY).expect("First reset failed");
    admin.reset_binding(KEY).expect("Second reset failed");
    assert_eq!(fetch(&*store, KEY).bound_hardware_id, None);
}

#[test]
fn test_reset_leaves_other_fields_alone() {
    let (store, _dir) = sqlite_store();
    seed_with(
        &*store,
        NewLicense {
            valid_until: Some("2030-01-01T00:00:00Z".into()),
            notes: Some("gift".into()),
            ..new_license(EMAIL, KEY)
        },
    );
    store.set_banned(KEY, true, None).expect("Failed to ban");
    store.set_hardware_id(KEY, Some("GPU-123")).expect("Failed to bind");
    let admin = admin_for(&store);

    admin.reset_binding(KEY).expect("Failed to reset binding");

    let record = fetch(&*store, KEY);
    assert_eq!(record.bound_hardware_id, None);
    assert!(record.is_banned);
    assert_eq!(record.valid_until.as_deref(), Some("2030-01-01T00:00:00Z"));
    assert_eq!(record.notes.as_deref(), Some("gift"));
    assert_eq!(record.email, EMAIL);
}

#[test]
fn test_reset_unknown_key() {
    let store = memory_store();
    seed(&*store, EMAIL, KEY);
    let admin = admin_for(&store);

    let err = admin.reset_binding("CS-ZZZZ-9999").unwrap_err();
    assert!(matches!(err, ResetError::NotFound(ref k) if k == "CS-ZZZZ-9999"), "{:?}", err);
}

#[test]
fn test_reset_empty_key() {
    let admin = admin_for(&memory_store());
    assert!(matches!(admin.reset_binding(""), Err(ResetError::MalformedKey)));
    assert!(matches!(admin.reset_binding("   "), Err(ResetError::MalformedKey)));
}

#[test]
fn test_reset_trims_key() {
    let store = memory_store();
    seed(&*store, EMAIL, KEY);
    store.set_hardware_id(KEY, Some("GPU-123")).expect("Failed to bind");

    admin_for(&store)
        .reset_binding(&format!("  {}\n", KEY))
        .expect("Failed to reset binding");
    assert_eq!(fetch(&*store, KEY).bound_hardware_id, None);
}

#[test]
fn test_reset_store_failure() {
    let record = MemoryStore::new()
        .insert_license(&new_license(EMAIL, KEY))
        .expect("Failed to build record");
    let store = Arc::new(FlakyStore::new([record]));
    store.fail_reset.store(true, Ordering::SeqCst);

    let err = admin_for(&store).reset_binding(KEY).unwrap_err();
    assert!(matches!(err, ResetError::Store(_)), "{:?}", err);
}
