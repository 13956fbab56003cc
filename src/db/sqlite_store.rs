use crate::error::Result;
use crate::models::{LicenseRecord, NewLicense};
use crate::store::{LicenseRegistry, LicenseStore};

use super::{DbPool, queries};

/// `LicenseStore` over a pooled SQLite database.
///
/// Each call checks out its own connection, so one store can be shared
/// across threads.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl LicenseStore for SqliteStore {
    fn find_by_email_and_key(
        &self,
        email: &str,
        license_key: &str,
    ) -> Result<Option<LicenseRecord>> {
        let conn = self.pool.get()?;
        queries::get_license_by_email_and_key(&conn, email, license_key)
    }

    fn compare_and_set_hardware_id(&self, license_key: &str, hardware_id: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        queries::bind_hardware_id_if_unbound(&conn, license_key, hardware_id)
    }

    fn set_hardware_id(&self, license_key: &str, hardware_id: Option<&str>) -> Result<bool> {
        let conn = self.pool.get()?;
        queries::set_hardware_id(&conn, license_key, hardware_id)
    }
}

impl LicenseRegistry for SqliteStore {
    fn insert_license(&self, input: &NewLicense) -> Result<LicenseRecord> {
        let conn = self.pool.get()?;
        queries::create_license(&conn, input)
    }

    fn get_by_key(&self, license_key: &str) -> Result<Option<LicenseRecord>> {
        let conn = self.pool.get()?;
        queries::get_license_by_key(&conn, license_key)
    }

    fn set_banned(&self, license_key: &str, banned: bool, note: Option<&str>) -> Result<bool> {
        let conn = self.pool.get()?;
        queries::set_banned(&conn, license_key, banned, note)
    }

    fn set_valid_until(&self, license_key: &str, valid_until: Option<&str>) -> Result<bool> {
        let conn = self.pool.get()?;
        queries::set_valid_until(&conn, license_key, valid_until)
    }

    fn list_all(&self) -> Result<Vec<LicenseRecord>> {
        let conn = self.pool.get()?;
        queries::list_licenses(&conn)
    }

    fn search(&self, term: &str) -> Result<Vec<LicenseRecord>> {
        let conn = self.pool.get()?;
        queries::search_licenses(&conn, term)
    }
}
