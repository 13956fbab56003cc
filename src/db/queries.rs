use chrono::Utc;
use rusqlite::{Connection, params, types::Value};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;
use crate::input::normalize_email;

use super::from_row::{LICENSE_COLS, query_all, query_one};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for single-row UPDATE statements addressed by license key.
/// Only the columns that are `set` are written.
struct UpdateBuilder {
    license_key: String,
    fields: Vec<(&'static str, Value)>,
}

impl UpdateBuilder {
    fn new(license_key: &str) -> Self {
        Self {
            license_key: license_key.to_string(),
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Set a column to an explicit value (including NULL).
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    fn execute(self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.license_key.into());
        let sql = format!(
            "UPDATE licenses SET {} WHERE license_key = ?",
            sets.join(", ")
        );
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

// ============ Licenses ============

/// Insert a new, unbound license. The email is stored in normalized form.
pub fn create_license(conn: &Connection, input: &NewLicense) -> Result<LicenseRecord> {
    let id = gen_id();
    let now = now();
    let email = normalize_email(&input.email);

    let inserted = conn.execute(
        "INSERT INTO licenses (id, email, license_key, bound_hardware_id, device_limit, tier, duration, valid_until, is_banned, notes, created_at, activated_at)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7, 0, ?8, ?9, NULL)",
        params![
            &id,
            &email,
            &input.license_key,
            input.device_limit,
            input.tier.as_ref(),
            &input.duration,
            &input.valid_until,
            &input.notes,
            now
        ],
    );

    if let Err(e) = inserted {
        let err = AppError::from(e);
        if err.is_unique_violation() {
            return Err(AppError::Conflict(format!(
                "License key already exists: {}",
                input.license_key
            )));
        }
        return Err(err);
    }

    Ok(LicenseRecord {
        id,
        email,
        license_key: input.license_key.clone(),
        bound_hardware_id: None,
        device_limit: input.device_limit,
        tier: input.tier,
        duration: input.duration.clone(),
        valid_until: input.valid_until.clone(),
        is_banned: false,
        notes: input.notes.clone(),
        created_at: now,
        activated_at: None,
    })
}

pub fn get_license_by_key(conn: &Connection, license_key: &str) -> Result<Option<LicenseRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE license_key = ?1", LICENSE_COLS),
        [license_key],
    )
}

/// Look up a license by (email, key). The email column is NOCASE; the key
/// comparison is exact.
pub fn get_license_by_email_and_key(
    conn: &Connection,
    email: &str,
    license_key: &str,
) -> Result<Option<LicenseRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE email = ?1 AND license_key = ?2",
            LICENSE_COLS
        ),
        [email, license_key],
    )
}

/// Bind a hardware id only if the license is currently unbound.
///
/// The `IS NULL` guard makes this a compare-and-set: of two racing writers,
/// SQLite applies exactly one and the other sees zero affected rows.
pub fn bind_hardware_id_if_unbound(
    conn: &Connection,
    license_key: &str,
    hardware_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET bound_hardware_id = ?1, activated_at = ?2
         WHERE license_key = ?3 AND bound_hardware_id IS NULL",
        params![hardware_id, now(), license_key],
    )?;
    Ok(affected > 0)
}

/// Unconditionally set (or clear) the bound hardware id.
pub fn set_hardware_id(
    conn: &Connection,
    license_key: &str,
    hardware_id: Option<&str>,
) -> Result<bool> {
    let activated_at = hardware_id.map(|_| now());
    UpdateBuilder::new(license_key)
        .set_nullable("bound_hardware_id", hardware_id.map(String::from))
        .set_nullable("activated_at", activated_at)
        .execute(conn)
}

/// Set or clear the ban flag, appending `note` to the notes column if given.
///
/// The append happens inside the UPDATE so concurrent bans cannot drop a note.
pub fn set_banned(
    conn: &Connection,
    license_key: &str,
    banned: bool,
    note: Option<&str>,
) -> Result<bool> {
    let Some(note) = note else {
        return UpdateBuilder::new(license_key)
            .set("is_banned", banned as i64)
            .execute(conn);
    };
    let affected = conn.execute(
        "UPDATE licenses
         SET is_banned = ?1, notes = COALESCE(NULLIF(notes, '') || ' | ', '') || ?2
         WHERE license_key = ?3",
        params![banned as i64, note, license_key],
    )?;
    Ok(affected > 0)
}

pub fn set_valid_until(
    conn: &Connection,
    license_key: &str,
    valid_until: Option<&str>,
) -> Result<bool> {
    UpdateBuilder::new(license_key)
        .set_nullable("valid_until", valid_until.map(String::from))
        .execute(conn)
}

pub fn list_licenses(conn: &Connection) -> Result<Vec<LicenseRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses ORDER BY created_at DESC, rowid DESC",
            LICENSE_COLS
        ),
        params![],
    )
}

/// Case-insensitive substring search over email, key, and bound hardware id.
pub fn search_licenses(conn: &Connection, term: &str) -> Result<Vec<LicenseRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses
             WHERE instr(lower(email), lower(?1)) > 0
                OR instr(lower(license_key), lower(?1)) > 0
                OR instr(lower(COALESCE(bound_hardware_id, '')), lower(?1)) > 0
             ORDER BY created_at DESC, rowid DESC",
            LICENSE_COLS
        ),
        [term],
    )
}
