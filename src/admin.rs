//! Operator-side license management: issuing keys, resetting bindings,
//! bans, expiry edits, and reporting.
//!
//! Privilege checks belong to the caller. Every operation here assumes the
//! caller has already established that the operator may perform it, and
//! `reset_binding` additionally assumes the operator confirmed it, since a
//! reset lets a different device claim the license on its next validation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::input::{is_plausible_email, normalize_email, normalize_license_key};
use crate::keygen::{generate_license_key, is_valid_prefix};
use crate::models::{IssueLicense, LicenseRecord, LicenseStats, LicenseStatus, NewLicense};
use crate::store::LicenseRegistry;
use crate::util::{LicenseDuration, is_expired, valid_until_from_days};

/// Attempts at minting an unused key before giving up.
const MAX_KEY_ATTEMPTS: usize = 5;

/// Devices a license may be bound to. The binding model holds one id.
const DEVICE_LIMIT: i32 = 1;

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("license key is empty")]
    MalformedKey,

    #[error("no license with key {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] AppError),
}

#[derive(Clone)]
pub struct LicenseAdmin {
    registry: Arc<dyn LicenseRegistry>,
    key_prefix: String,
}

impl LicenseAdmin {
    pub fn new(registry: Arc<dyn LicenseRegistry>, key_prefix: impl Into<String>) -> Self {
        Self {
            registry,
            key_prefix: key_prefix.into(),
        }
    }

    /// Return a license to the unbound state.
    ///
    /// Looks the record up by key alone. Resetting an unbound license
    /// succeeds without change. Only the binding is touched.
    pub fn reset_binding(&self, license_key: &str) -> std::result::Result<(), ResetError> {
        let license_key = normalize_license_key(license_key);
        if license_key.is_empty() {
            return Err(ResetError::MalformedKey);
        }

        let previous = self
            .registry
            .get_by_key(license_key)?
            .ok_or_else(|| ResetError::NotFound(license_key.to_string()))?;

        if !self.registry.set_hardware_id(license_key, None)? {
            return Err(ResetError::NotFound(license_key.to_string()));
        }

        tracing::info!(
            license_key = %license_key,
            previous_hardware_id = previous.bound_hardware_id.as_deref().unwrap_or("<none>"),
            "hardware binding reset"
        );
        Ok(())
    }

    /// Mint a key and insert an unbound license.
    pub fn issue(&self, input: &IssueLicense) -> Result<LicenseRecord> {
        self.issue_at(input, Utc::now())
    }

    pub fn issue_at(&self, input: &IssueLicense, now: DateTime<Utc>) -> Result<LicenseRecord> {
        if !is_valid_prefix(&self.key_prefix) {
            return Err(AppError::BadRequest(format!(
                "Invalid key prefix: {:?}",
                self.key_prefix
            )));
        }

        let email = normalize_email(&input.email);
        if !is_plausible_email(&email) {
            return Err(AppError::BadRequest("Please enter a valid email address".into()));
        }
        let duration: LicenseDuration = input.duration.parse()?;
        let valid_until = duration.valid_until(now)?;

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let new_license = NewLicense {
                email: email.clone(),
                license_key: generate_license_key(&self.key_prefix),
                device_limit: DEVICE_LIMIT,
                tier: input.tier,
                duration: duration.label(),
                valid_until: valid_until.clone(),
                notes: input.notes.clone(),
            };

            match self.registry.insert_license(&new_license) {
                Ok(record) => {
                    tracing::info!(
                        license_key = %record.license_key,
                        email = %record.email,
                        tier = record.tier.as_ref(),
                        duration = %record.duration,
                        "license issued"
                    );
                    return Ok(record);
                }
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(attempt = attempt, "generated license key collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Internal(
            "Could not generate an unused license key".into(),
        ))
    }

    /// Ban a license, recording the reason in its notes.
    pub fn ban(&self, license_key: &str, reason: Option<&str>) -> Result<()> {
        let license_key = normalize_license_key(license_key);
        let note = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| format!("REVOKED: {}", r));
        require_found(self.registry.set_banned(license_key, true, note.as_deref())?, license_key)?;
        tracing::info!(license_key = %license_key, reason = reason.unwrap_or(""), "license banned");
        Ok(())
    }

    pub fn unban(&self, license_key: &str) -> Result<()> {
        let license_key = normalize_license_key(license_key);
        require_found(self.registry.set_banned(license_key, false, None)?, license_key)?;
        tracing::info!(license_key = %license_key, "license reactivated");
        Ok(())
    }

    /// Set the license to expire `days` from now.
    pub fn extend(&self, license_key: &str, days: u32) -> Result<String> {
        if days == 0 {
            return Err(AppError::BadRequest("Duration must be positive".into()));
        }
        let license_key = normalize_license_key(license_key);
        let valid_until = valid_until_from_days(days, Utc::now())?;
        require_found(
            self.registry.set_valid_until(license_key, Some(&valid_until))?,
            license_key,
        )?;
        tracing::info!(license_key = %license_key, valid_until = %valid_until, "license expiry set");
        Ok(valid_until)
    }

    pub fn get(&self, license_key: &str) -> Result<LicenseRecord> {
        self.registry
            .get_by_key(normalize_license_key(license_key))?
            .ok_or_else(|| AppError::NotFound("License key not found".into()))
    }

    /// All licenses, optionally filtered by derived status.
    pub fn list(&self, status: Option<LicenseStatus>) -> Result<Vec<LicenseRecord>> {
        let now = Utc::now();
        let all = self.registry.list_all()?;
        Ok(match status {
            None => all,
            Some(status) => all
                .into_iter()
                .filter(|r| status_of(r, now) == status)
                .collect(),
        })
    }

    pub fn search(&self, term: &str) -> Result<Vec<LicenseRecord>> {
        let term = term.trim();
        if term.is_empty() {
            return self.registry.list_all();
        }
        self.registry.search(term)
    }

    pub fn stats(&self) -> Result<LicenseStats> {
        Ok(compute_stats(&self.registry.list_all()?, Utc::now()))
    }
}

fn require_found(found: bool, license_key: &str) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("License key not found: {}", license_key)))
    }
}

/// Derived status; a banned license reports `Banned` even when also expired.
pub fn status_of(record: &LicenseRecord, now: DateTime<Utc>) -> LicenseStatus {
    if record.is_banned {
        LicenseStatus::Banned
    } else if is_expired(record.valid_until.as_deref(), now) {
        LicenseStatus::Expired
    } else {
        LicenseStatus::Active
    }
}

pub fn compute_stats(records: &[LicenseRecord], now: DateTime<Utc>) -> LicenseStats {
    records.iter().fold(LicenseStats::default(), |mut stats, r| {
        stats.total += 1;
        match status_of(r, now) {
            LicenseStatus::Active => stats.active += 1,
            LicenseStatus::Banned => stats.banned += 1,
            LicenseStatus::Expired => stats.expired += 1,
        }
        if r.is_bound() {
            stats.bound += 1;
        }
        stats
    })
}
