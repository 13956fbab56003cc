//! License/device-binding validation.
//!
//! Given (email, license key, hardware id) the validator decides between
//! three scenarios over the record's binding:
//!
//! | bound id | compared to current id | outcome |
//! |----------|------------------------|---------|
//! | none     | -                      | bind, `AllowedNewBinding` |
//! | some     | equal (ignoring case)  | `Allowed` |
//! | some     | different              | `DeviceLimitReached` |
//!
//! Ban and expiry checks run before the scenario match. Every store error is
//! caught here and becomes `ValidationError`; nothing ambiguous resolves to
//! access being granted.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::hardware::hardware_ids_match;
use crate::input::{Credentials, InputProblem};
use crate::models::LicenseRecord;
use crate::store::LicenseStore;
use crate::util::is_expired;

/// Result of one validation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Bound to this device already.
    Allowed(LicenseRecord),
    /// Was unbound; now bound to this device.
    AllowedNewBinding(LicenseRecord),
    /// Bound to a different device.
    DeviceLimitReached,
    /// Malformed input or no record for this (email, key) pair.
    InvalidCredentials(CredentialRejection),
    /// Record unusable or the store could not be consulted.
    ValidationError(ValidationFailure),
}

impl Outcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Outcome::Allowed(_) | Outcome::AllowedNewBinding(_))
    }

    /// The record, for granted outcomes.
    pub fn record(&self) -> Option<&LicenseRecord> {
        match self {
            Outcome::Allowed(r) | Outcome::AllowedNewBinding(r) => Some(r),
            _ => None,
        }
    }
}

/// Why credentials were refused. Both kinds render identically to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRejection {
    /// Rejected locally without a store query.
    Malformed(InputProblem),
    /// No record matches the pair. Wrong email, wrong key, and both wrong
    /// are not distinguished.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    Banned,
    /// Past `valid_until`, or `valid_until` could not be parsed.
    Expired,
    /// Lookup or binding update failed; the cause is kept for logs only.
    Store(String),
}

/// Stateless decision engine over an injected store.
#[derive(Clone)]
pub struct LicenseValidator {
    store: Arc<dyn LicenseStore>,
}

impl LicenseValidator {
    pub fn new(store: Arc<dyn LicenseStore>) -> Self {
        Self { store }
    }

    pub fn validate(&self, email: &str, license_key: &str, hardware_id: &str) -> Outcome {
        self.validate_at(email, license_key, hardware_id, Utc::now())
    }

    /// `validate` with an explicit clock for the expiry check.
    pub fn validate_at(
        &self,
        email: &str,
        license_key: &str,
        hardware_id: &str,
        now: DateTime<Utc>,
    ) -> Outcome {
        let creds = match Credentials::parse(email, license_key) {
            Ok(c) => c,
            Err(problem) => {
                tracing::debug!(?problem, "rejected credentials before lookup");
                return Outcome::InvalidCredentials(CredentialRejection::Malformed(problem));
            }
        };

        let record = match self
            .store
            .find_by_email_and_key(&creds.email, &creds.license_key)
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!("no license matches the supplied email and key");
                return Outcome::InvalidCredentials(CredentialRejection::NotFound);
            }
            Err(e) => return store_failure("lookup", &creds.license_key, e),
        };

        if let Some(failure) = precheck(&record, now) {
            tracing::warn!(license_key = %record.license_key, ?failure, "license not usable");
            return Outcome::ValidationError(failure);
        }

        // Null-check strictly before any string comparison
        match record.bound_hardware_id.as_deref() {
            None => self.bind(record, &creds, hardware_id),
            Some(bound) if hardware_ids_match(bound, hardware_id) => {
                tracing::debug!(license_key = %record.license_key, "hardware id matches binding");
                Outcome::Allowed(record)
            }
            Some(bound) => {
                tracing::warn!(
                    license_key = %record.license_key,
                    bound_hardware_id = %bound,
                    hardware_id = %hardware_id,
                    "license already bound to another device"
                );
                Outcome::DeviceLimitReached
            }
        }
    }

    /// First activation: conditionally claim the unbound record.
    fn bind(&self, mut record: LicenseRecord, creds: &Credentials, hardware_id: &str) -> Outcome {
        match self
            .store
            .compare_and_set_hardware_id(&record.license_key, hardware_id)
        {
            Ok(true) => {
                tracing::info!(
                    license_key = %record.license_key,
                    hardware_id = %hardware_id,
                    "license bound to device"
                );
                record.bound_hardware_id = Some(hardware_id.to_string());
                record.activated_at = Some(Utc::now().timestamp());
                Outcome::AllowedNewBinding(record)
            }
            Ok(false) => self.resolve_lost_race(creds, hardware_id),
            Err(e) => store_failure("bind", &record.license_key, e),
        }
    }

    /// Someone else bound the record between our read and our write; re-read
    /// and match against whatever won.
    fn resolve_lost_race(&self, creds: &Credentials, hardware_id: &str) -> Outcome {
        let record = match self
            .store
            .find_by_email_and_key(&creds.email, &creds.license_key)
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Outcome::ValidationError(ValidationFailure::Store(
                    "license disappeared during binding".into(),
                ));
            }
            Err(e) => return store_failure("re-read", &creds.license_key, e),
        };

        match record.bound_hardware_id.as_deref() {
            Some(bound) if hardware_ids_match(bound, hardware_id) => {
                tracing::debug!(license_key = %record.license_key, "concurrent binding by same device");
                Outcome::Allowed(record)
            }
            Some(bound) => {
                tracing::warn!(
                    license_key = %record.license_key,
                    bound_hardware_id = %bound,
                    hardware_id = %hardware_id,
                    "lost binding race to another device"
                );
                Outcome::DeviceLimitReached
            }
            None => Outcome::ValidationError(ValidationFailure::Store(
                "binding update was not applied".into(),
            )),
        }
    }
}

/// Ban and expiry checks, before any scenario matching.
fn precheck(record: &LicenseRecord, now: DateTime<Utc>) -> Option<ValidationFailure> {
    if record.is_banned {
        return Some(ValidationFailure::Banned);
    }
    if is_expired(record.valid_until.as_deref(), now) {
        return Some(ValidationFailure::Expired);
    }
    None
}

fn store_failure(stage: &str, license_key: &str, err: crate::error::AppError) -> Outcome {
    tracing::error!(stage = stage, license_key = %license_key, error = %err, "license store failure");
    Outcome::ValidationError(ValidationFailure::Store(err.to_string()))
}
