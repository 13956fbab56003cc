//! Binding scenarios: first activation, same device, different device

use std::sync::Arc;

use licensegate::input::InputProblem;

use crate::common::*;

const HWID: &str = "GPU-123";
const OTHER_HWID: &str = "GPU-999";

fn check_first_activation_binds<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    let outcome = validator.validate(EMAIL, KEY, HWID);
    match &outcome {
        Outcome::AllowedNewBinding(record) => {
            assert_eq!(record.bound_hardware_id.as_deref(), Some(HWID));
            assert!(record.activated_at.is_some());
        }
        other => panic!("Expected AllowedNewBinding, got {:?}", other),
    }

    let stored = fetch(&*store, KEY);
    assert_eq!(stored.bound_hardware_id.as_deref(), Some(HWID));
    assert!(stored.activated_at.is_some());
}

fn check_same_device_allowed<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    assert!(matches!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::AllowedNewBinding(_)
    ));
    for _ in 0..3 {
        match validator.validate(EMAIL, KEY, HWID) {
            Outcome::Allowed(record) => {
                assert_eq!(record.bound_hardware_id.as_deref(), Some(HWID))
            }
            other => panic!("Expected Allowed, got {:?}", other),
        }
    }
    assert_eq!(fetch(&*store, KEY).bound_hardware_id.as_deref(), Some(HWID));
}

fn check_other_device_refused<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    validator.validate(EMAIL, KEY, HWID);
    assert_eq!(
        validator.validate(EMAIL, KEY, OTHER_HWID),
        Outcome::DeviceLimitReached
    );
    // The refusal must not move the binding
    assert_eq!(fetch(&*store, KEY).bound_hardware_id.as_deref(), Some(HWID));
    assert!(matches!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::Allowed(_)
    ));
}

fn check_unknown_credentials<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);
    let not_found = Outcome::InvalidCredentials(CredentialRejection::NotFound);

    assert_eq!(validator.validate("x@b.com", KEY, HWID), not_found);
    assert_eq!(validator.validate(EMAIL, "CS-AAAA-2222", HWID), not_found);
    assert_eq!(validator.validate("x@b.com", "CS-AAAA-2222", HWID), not_found);
    // Keys are case-sensitive
    assert_eq!(validator.validate(EMAIL, "cs-aaaa-1111", HWID), not_found);

    // Failed attempts never bind
    assert_eq!(fetch(&*store, KEY).bound_hardware_id, None);
}

fn check_email_normalized<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    assert!(matches!(
        validator.validate("  A@B.COM ", &format!(" {} ", KEY), HWID),
        Outcome::AllowedNewBinding(_)
    ));
    assert!(matches!(
        validator.validate("a@B.com", KEY, HWID),
        Outcome::Allowed(_)
    ));
}

fn check_hardware_id_case_insensitive<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    validator.validate(EMAIL, KEY, HWID);
    assert!(matches!(
        validator.validate(EMAIL, KEY, "gpu-123"),
        Outcome::Allowed(_)
    ));
}

fn check_reset_then_rebind<S: LicenseRegistry + 'static>(store: Arc<S>) {
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    validator.validate(EMAIL, KEY, HWID);
    assert!(store.set_hardware_id(KEY, None).expect("Failed to reset"));

    assert!(matches!(
        validator.validate(EMAIL, KEY, OTHER_HWID),
        Outcome::AllowedNewBinding(_)
    ));
    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::DeviceLimitReached
    );
}

#[test]
fn test_first_activation_binds_memory() {
    check_first_activation_binds(memory_store());
}

#[test]
fn test_first_activation_binds_sqlite() {
    let (store, _dir) = sqlite_store();
    check_first_activation_binds(store);
}

#[test]
fn test_same_device_allowed_memory() {
    check_same_device_allowed(memory_store());
}

#[test]
fn test_same_device_allowed_sqlite() {
    let (store, _dir) = sqlite_store();
    check_same_device_allowed(store);
}

#[test]
fn test_other_device_refused_memory() {
    check_other_device_refused(memory_store());
}

#[test]
fn test_other_device_refused_sqlite() {
    let (store, _dir) = sqlite_store();
    check_other_device_refused(store);
}

#[test]
fn test_unknown_credentials_memory() {
    check_unknown_credentials(memory_store());
}

#[test]
fn test_unknown_credentials_sqlite() {
    let (store, _dir) = sqlite_store();
    check_unknown_credentials(store);
}

#[test]
fn test_email_normalized_memory() {
    check_email_normalized(memory_store());
}

#[test]
fn test_email_normalized_sqlite() {
    let (store, _dir) = sqlite_store();
    check_email_normalized(store);
}

#[test]
fn test_hardware_id_case_insensitive_memory() {
    check_hardware_id_case_insensitive(memory_store());
}

#[test]
fn test_hardware_id_case_insensitive_sqlite() {
    let (store, _dir) = sqlite_store();
    check_hardware_id_case_insensitive(store);
}

#[test]
fn test_reset_then_rebind_memory() {
    check_reset_then_rebind(memory_store());
}

#[test]
fn test_reset_then_rebind_sqlite() {
    let (store, _dir) = sqlite_store();
    check_reset_then_rebind(store);
}

#[test]
fn test_malformed_input_skips_store() {
    // A store that fails every lookup proves no query was made
    let store = Arc::new(FlakyStore::new([]));
    store.fail_lookup.store(true, std::sync::atomic::Ordering::SeqCst);
    let validator = validator_for(&store);

    assert_eq!(
        validator.validate("", KEY, HWID),
        Outcome::InvalidCredentials(CredentialRejection::Malformed(InputProblem::EmptyEmail))
    );
    assert_eq!(
        validator.validate("   ", KEY, HWID),
        Outcome::InvalidCredentials(CredentialRejection::Malformed(InputProblem::EmptyEmail))
    );
    assert_eq!(
        validator.validate(EMAIL, "  ", HWID),
        Outcome::InvalidCredentials(CredentialRejection::Malformed(InputProblem::EmptyKey))
    );
    for bad in ["not-an-email", "a@b", "@b.com", "a@.com", "a@b.", "a b@c.com"] {
        assert_eq!(
            validator.validate(bad, KEY, HWID),
            Outcome::InvalidCredentials(CredentialRejection::Malformed(
                InputProblem::MalformedEmail
            )),
            "{}",
            bad
        );
    }
}

#[test]
fn test_licenses_are_independent() {
    let store = memory_store();
    seed(&*store, EMAIL, KEY);
    seed(&*store, "c@d.com", "CS-BBBB-2222");
    let validator = validator_for(&store);

    validator.validate(EMAIL, KEY, HWID);
    assert!(matches!(
        validator.validate("c@d.com", "CS-BBBB-2222", OTHER_HWID),
        Outcome::AllowedNewBinding(_)
    ));
    // One email's key does not unlock another's record
    assert_eq!(
        validator.validate("c@d.com", KEY, OTHER_HWID),
        Outcome::InvalidCredentials(CredentialRejection::NotFound)
    );
}

#[test]
fn test_sentinel_hardware_id_binds_like_any_other() {
    let store = memory_store();
    seed(&*store, EMAIL, KEY);
    let validator = validator_for(&store);

    let sentinel = licensegate::UNKNOWN_HARDWARE_ID;
    assert!(matches!(
        validator.validate(EMAIL, KEY, sentinel),
        Outcome::AllowedNewBinding(_)
    ));
    assert!(matches!(
        validator.validate(EMAIL, KEY, sentinel),
        Outcome::Allowed(_)
    ));
    assert_eq!(
        validator.validate(EMAIL, KEY, HWID),
        Outcome::DeviceLimitReached
    );
}
