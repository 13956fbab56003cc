//! Local normalization and sanity checks for caller-supplied credentials.
//!
//! Nothing here touches the store. The email check is a deliberately loose
//! heuristic (`local@domain.tld` shape), not an RFC 5322 validator.

use unicode_normalization::UnicodeNormalization;

/// Trim, NFKC-normalize, and lowercase an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Trim surrounding whitespace from a license key. Case is significant.
pub fn normalize_license_key(key: &str) -> &str {
    key.trim()
}

/// Minimal shape check: a non-empty local part, one `@`, and a domain that
/// contains a `.` with something on both sides of it.
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot < domain.len() - 1,
        None => false,
    }
}

/// Credentials after normalization, ready for a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub license_key: String,
}

/// Why credentials were rejected before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputProblem {
    EmptyEmail,
    EmptyKey,
    MalformedEmail,
}

impl Credentials {
    pub fn parse(email: &str, license_key: &str) -> Result<Self, InputProblem> {
        let email = normalize_email(email);
        let license_key = normalize_license_key(license_key);

        if email.is_empty() {
            return Err(InputProblem::EmptyEmail);
        }
        if license_key.is_empty() {
            return Err(InputProblem::EmptyKey);
        }
        if !is_plausible_email(&email) {
            return Err(InputProblem::MalformedEmail);
        }

        Ok(Self {
            email,
            license_key: license_key.to_string(),
        })
    }
}
