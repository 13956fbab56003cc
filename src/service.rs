//! Caller-facing surface: the two operations a client application or admin
//! tool invokes, with outcomes mapped to user-visible text.
//!
//! Validation talks to the store synchronously, so both operations run on
//! tokio's blocking pool and can be awaited from a UI or event runtime.

use std::sync::Arc;

use serde::Serialize;

use crate::admin::{LicenseAdmin, ResetError};
use crate::config::Config;
use crate::hardware::HardwareIdProvider;
use crate::store::LicenseRegistry;
use crate::validator::{LicenseValidator, Outcome, ValidationFailure};

pub const MSG_ALLOWED: &str = "License verified. Welcome back!";
pub const MSG_ACTIVATED: &str = "License activated on this device.";
pub const MSG_DEVICE_LIMIT: &str =
    "This license is already activated on another device. Contact support to transfer it.";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or license key.";
pub const MSG_BANNED: &str = "This license has been revoked. Contact support.";
pub const MSG_EXPIRED: &str = "This license has expired.";
pub const MSG_TRY_AGAIN: &str =
    "Unable to verify your license right now. Please check your connection and try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationResponse {
    pub granted: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdminResetResponse {
    pub success: bool,
}

impl From<&Outcome> for ActivationResponse {
    fn from(outcome: &Outcome) -> Self {
        let message = match outcome {
            Outcome::Allowed(_) => MSG_ALLOWED,
            Outcome::AllowedNewBinding(_) => MSG_ACTIVATED,
            Outcome::DeviceLimitReached => MSG_DEVICE_LIMIT,
            Outcome::InvalidCredentials(_) => MSG_INVALID_CREDENTIALS,
            Outcome::ValidationError(ValidationFailure::Banned) => MSG_BANNED,
            Outcome::ValidationError(ValidationFailure::Expired) => MSG_EXPIRED,
            Outcome::ValidationError(ValidationFailure::Store(_)) => MSG_TRY_AGAIN,
        };
        Self {
            granted: outcome.is_granted(),
            message: message.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct LicenseService {
    validator: LicenseValidator,
    admin: LicenseAdmin,
    hardware: Arc<dyn HardwareIdProvider>,
}

impl LicenseService {
    pub fn new(
        validator: LicenseValidator,
        admin: LicenseAdmin,
        hardware: Arc<dyn HardwareIdProvider>,
    ) -> Self {
        Self {
            validator,
            admin,
            hardware,
        }
    }

    /// Wire a validator and an admin over one shared store.
    pub fn with_store<S: LicenseRegistry + 'static>(
        store: Arc<S>,
        config: &Config,
        hardware: Arc<dyn HardwareIdProvider>,
    ) -> Self {
        let validator = LicenseValidator::new(store.clone());
        let admin = LicenseAdmin::new(store, config.key_prefix.clone());
        Self::new(validator, admin, hardware)
    }

    /// Validate (email, key) for this machine. Never fails; a panic or
    /// cancelled task on the blocking pool reports the generic retry message.
    pub async fn activate(&self, email: &str, license_key: &str) -> ActivationResponse {
        let outcome = self.activate_outcome(email, license_key).await;
        ActivationResponse::from(&outcome)
    }

    /// Like `activate`, but returns the full outcome for callers that need
    /// the record (tier, expiry) after a grant.
    pub async fn activate_outcome(&self, email: &str, license_key: &str) -> Outcome {
        let validator = self.validator.clone();
        let hardware = self.hardware.clone();
        let email = email.to_string();
        let license_key = license_key.to_string();

        let joined = tokio::task::spawn_blocking(move || {
            let hardware_id = hardware.current_hardware_id();
            validator.validate(&email, &license_key, &hardware_id)
        })
        .await;

        match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "validation task failed");
                Outcome::ValidationError(ValidationFailure::Store(e.to_string()))
            }
        }
    }

    /// Clear the hardware binding. The caller must have obtained explicit
    /// operator confirmation first.
    pub async fn admin_reset_hwid(&self, license_key: &str) -> AdminResetResponse {
        let admin = self.admin.clone();
        let license_key = license_key.to_string();

        let joined = tokio::task::spawn_blocking(move || admin.reset_binding(&license_key)).await;

        let success = match joined {
            Ok(Ok(())) => true,
            Ok(Err(ResetError::NotFound(key))) => {
                tracing::warn!(license_key = %key, "reset requested for unknown license");
                false
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "hardware binding reset failed");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "reset task failed");
                false
            }
        };
        AdminResetResponse { success }
    }

    /// Hardware id this service would bind, for display in support flows.
    pub fn current_hardware_id(&self) -> String {
        self.hardware.current_hardware_id()
    }

    pub fn admin(&self) -> &LicenseAdmin {
        &self.admin
    }

    pub fn validator(&self) -> &LicenseValidator {
        &self.validator
    }
}
