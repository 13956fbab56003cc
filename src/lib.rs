//! Single-device license gatekeeper.
//!
//! A license key is bound to the first machine that validates it; later
//! validations from that machine are allowed, others are refused until an
//! operator resets the binding. See [`validator`] for the decision table.

pub mod admin;
pub mod config;
pub mod db;
pub mod error;
pub mod hardware;
pub mod input;
pub mod keygen;
pub mod models;
pub mod service;
pub mod store;
pub mod util;
pub mod validator;

pub use admin::{LicenseAdmin, ResetError};
pub use error::{AppError, Result};
pub use hardware::{FixedHardwareId, HardwareIdProvider, ProbeChain, UNKNOWN_HARDWARE_ID};
pub use service::{ActivationResponse, AdminResetResponse, LicenseService};
pub use store::{LicenseRegistry, LicenseStore, MemoryStore};
pub use validator::{CredentialRejection, LicenseValidator, Outcome, ValidationFailure};
