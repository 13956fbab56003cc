use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseTier {
    Trial,
    Standard,
    Extended,
    Enterprise,
}

/// Administrative view of a record's usability.
///
/// Derived, never stored: `Banned` wins over `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Banned,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: String,
    /// Case-folded contact address; half of the lookup key
    pub email: String,
    /// `PREFIX-XXXX-XXXX`, case-sensitive, never reused
    pub license_key: String,
    /// None = unbound, any device may claim it once
    pub bound_hardware_id: Option<String>,
    /// Always 1 for single-device binding; carried for forward compatibility
    pub device_limit: i32,
    pub tier: LicenseTier,
    /// Issuer label such as `lifetime` or `30_days`
    pub duration: String,
    /// ISO-8601 text exactly as stored (None = lifetime)
    pub valid_until: Option<String>,
    pub is_banned: bool,
    pub notes: Option<String>,
    pub created_at: i64,
    pub activated_at: Option<i64>,
}

impl LicenseRecord {
    pub fn is_bound(&self) -> bool {
        self.bound_hardware_id.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLicense {
    pub email: String,
    pub tier: LicenseTier,
    /// Parsed with `LicenseDuration::from_str`
    pub duration: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Fully-formed row for insertion; the issuer fills every column.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub email: String,
    pub license_key: String,
    pub device_limit: i32,
    pub tier: LicenseTier,
    pub duration: String,
    pub valid_until: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LicenseStats {
    pub total: i64,
    pub active: i64,
    pub banned: i64,
    pub expired: i64,
    pub bound: i64,
}
