//! Record store contract consumed by the validator and the reset operation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::input::normalize_email;
use crate::models::{LicenseRecord, NewLicense};

/// Exact-match access to license records.
///
/// Implementations must make `compare_and_set_hardware_id` atomic: of two
/// concurrent calls for the same unbound key, exactly one returns `true`.
pub trait LicenseStore: Send + Sync {
    /// Find the record whose email equals `email` (already case-folded) and
    /// whose key equals `license_key` exactly.
    fn find_by_email_and_key(&self, email: &str, license_key: &str)
    -> Result<Option<LicenseRecord>>;

    /// Bind `hardware_id` only if the record is currently unbound.
    ///
    /// Returns `true` if the write applied, `false` if the record was already
    /// bound (or no longer exists).
    fn compare_and_set_hardware_id(&self, license_key: &str, hardware_id: &str) -> Result<bool>;

    /// Unconditionally set the binding. Returns `false` if no record has this key.
    fn set_hardware_id(&self, license_key: &str, hardware_id: Option<&str>) -> Result<bool>;
}

/// Administrative access on top of the validation contract: issuance,
/// ban flags, expiry edits, and listings.
pub trait LicenseRegistry: LicenseStore {
    /// Insert an unbound record. A taken key is `AppError::Conflict`.
    fn insert_license(&self, input: &NewLicense) -> Result<LicenseRecord>;

    fn get_by_key(&self, license_key: &str) -> Result<Option<LicenseRecord>>;

    /// Set the ban flag, appending `note` to the record's notes when given.
    fn set_banned(&self, license_key: &str, banned: bool, note: Option<&str>) -> Result<bool>;

    fn set_valid_until(&self, license_key: &str, valid_until: Option<&str>) -> Result<bool>;

    /// All records, newest first.
    fn list_all(&self) -> Result<Vec<LicenseRecord>>;

    /// Case-insensitive substring match over email, key, or bound hardware
    /// id, newest first.
    fn search(&self, term: &str) -> Result<Vec<LicenseRecord>>;
}

/// Append `note` to existing notes with a ` | ` separator.
pub(crate) fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{} | {}", existing, note),
        _ => note.to_string(),
    }
}

/// In-memory store keyed by license key.
///
/// Useful for testing or for embedding a fixed set of records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, LicenseRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from existing records. Fails on a duplicate key.
    pub fn with_records(records: impl IntoIterator<Item = LicenseRecord>) -> Result<Self> {
        let store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    /// Insert a record. Fails if the key is already taken.
    pub fn insert(&self, record: LicenseRecord) -> Result<()> {
        let mut records = self.write()?;
        if records.contains_key(&record.license_key) {
            return Err(AppError::Conflict(format!(
                "License key already exists: {}",
                record.license_key
            )));
        }
        records.insert(record.license_key.clone(), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, LicenseRecord>>> {
        self.records
            .read()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, LicenseRecord>>> {
        self.records
            .write()
            .map_err(|_| AppError::Internal("memory store lock poisoned".into()))
    }
}

impl LicenseStore for MemoryStore {
    fn find_by_email_and_key(
        &self,
        email: &str,
        license_key: &str,
    ) -> Result<Option<LicenseRecord>> {
        let email = normalize_email(email);
        Ok(self
            .read()?
            .get(license_key)
            .filter(|r| normalize_email(&r.email) == email)
            .cloned())
    }

    fn compare_and_set_hardware_id(&self, license_key: &str, hardware_id: &str) -> Result<bool> {
        let mut records = self.write()?;
        match records.get_mut(license_key) {
            Some(record) if record.bound_hardware_id.is_none() => {
                record.bound_hardware_id = Some(hardware_id.to_string());
                record.activated_at = Some(Utc::now().timestamp());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn set_hardware_id(&self, license_key: &str, hardware_id: Option<&str>) -> Result<bool> {
        let mut records = self.write()?;
        let Some(record) = records.get_mut(license_key) else {
            return Ok(false);
        };
        record.bound_hardware_id = hardware_id.map(String::from);
        record.activated_at = hardware_id.map(|_| Utc::now().timestamp());
        Ok(true)
    }
}

impl LicenseRegistry for MemoryStore {
    fn insert_license(&self, input: &NewLicense) -> Result<LicenseRecord> {
        let record = LicenseRecord {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(&input.email),
            license_key: input.license_key.clone(),
            bound_hardware_id: None,
            device_limit: input.device_limit,
            tier: input.tier,
            duration: input.duration.clone(),
            valid_until: input.valid_until.clone(),
            is_banned: false,
            notes: input.notes.clone(),
            created_at: Utc::now().timestamp(),
            activated_at: None,
        };
        self.insert(record.clone())?;
        Ok(record)
    }

    fn get_by_key(&self, license_key: &str) -> Result<Option<LicenseRecord>> {
        Ok(self.read()?.get(license_key).cloned())
    }

    fn set_banned(&self, license_key: &str, banned: bool, note: Option<&str>) -> Result<bool> {
        let mut records = self.write()?;
        let Some(record) = records.get_mut(license_key) else {
            return Ok(false);
        };
        record.is_banned = banned;
        if let Some(note) = note {
            record.notes = Some(append_note(record.notes.as_deref(), note));
        }
        Ok(true)
    }

    fn set_valid_until(&self, license_key: &str, valid_until: Option<&str>) -> Result<bool> {
        let mut records = self.write()?;
        let Some(record) = records.get_mut(license_key) else {
            return Ok(false);
        };
        record.valid_until = valid_until.map(String::from);
        Ok(true)
    }

    fn list_all(&self) -> Result<Vec<LicenseRecord>> {
        let mut all: Vec<LicenseRecord> = self.read()?.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    fn search(&self, term: &str) -> Result<Vec<LicenseRecord>> {
        let term = term.to_lowercase();
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| {
                r.email.to_lowercase().contains(&term)
                    || r.license_key.to_lowercase().contains(&term)
                    || r
                        .bound_hardware_id
                        .as_deref()
                        .is_some_and(|id| id.to_lowercase().contains(&term))
            })
            .collect())
    }
}
