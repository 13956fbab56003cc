//! Row mapping helpers shared by the query functions.

use rusqlite::{Connection, Params, Row, types::Type};

use crate::error::Result;
use crate::models::{LicenseRecord, LicenseTier};

pub const LICENSE_COLS: &str = "id, email, license_key, bound_hardware_id, device_limit, tier, duration, valid_until, is_banned, notes, created_at, activated_at";

pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl FromRow for LicenseRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tier: String = row.get(5)?;
        let tier = tier
            .parse::<LicenseTier>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        Ok(LicenseRecord {
            id: row.get(0)?,
            email: row.get(1)?,
            license_key: row.get(2)?,
            bound_hardware_id: row.get(3)?,
            device_limit: row.get(4)?,
            tier,
            duration: row.get(6)?,
            valid_until: row.get(7)?,
            is_banned: row.get::<_, i32>(8)? != 0,
            notes: row.get(9)?,
            created_at: row.get(10)?,
            activated_at: row.get(11)?,
        })
    }
}

pub fn query_one<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow, P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}
