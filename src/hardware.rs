//! Best-effort hardware identity for license binding.
//!
//! The identity is the first non-empty answer from an ordered chain of
//! probes: a platform product/board identifier, then a storage-device
//! serial. If every probe comes back empty the provider answers
//! [`UNKNOWN_HARDWARE_ID`].
//!
//! The sentinel is compared like any other id. A machine that only ever
//! produces the sentinel still gets exactly one binding, and a second machine
//! that also falls back to it collides with the first. That weakness is
//! accepted; fingerprinting here is best-effort, not tamper-proof.

use std::process::Command;

/// Identity reported when no probe yields a usable value.
pub const UNKNOWN_HARDWARE_ID: &str = "UNKNOWN-HWID";

/// Values firmware vendors ship in unfilled DMI/SMBIOS fields.
const PLACEHOLDER_IDS: &[&str] = &[
    "none",
    "default string",
    "to be filled by o.e.m.",
    "not specified",
    "not applicable",
    "system serial number",
    "serial number",
    "uuid",
    "serialnumber",
    "03000200-0400-0500-0006-000700080009",
    "ffffffff-ffff-ffff-ffff-ffffffffffff",
];

/// Supplies the current machine's identity. Never fails.
pub trait HardwareIdProvider: Send + Sync {
    fn current_hardware_id(&self) -> String;
}

/// One strategy for reading a machine identifier.
pub trait HardwareProbe: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Raw identifier, or None if this source is unavailable on this host.
    fn probe(&self) -> Option<String>;
}

/// Ordered fallback chain of probes.
pub struct ProbeChain {
    probes: Vec<Box<dyn HardwareProbe>>,
}

impl ProbeChain {
    pub fn new(probes: Vec<Box<dyn HardwareProbe>>) -> Self {
        Self { probes }
    }

    /// Board/product identifier first, storage serial second.
    pub fn host_default() -> Self {
        Self::new(vec![Box::new(BoardIdProbe), Box::new(DiskSerialProbe)])
    }
}

impl Default for ProbeChain {
    fn default() -> Self {
        Self::host_default()
    }
}

impl HardwareIdProvider for ProbeChain {
    fn current_hardware_id(&self) -> String {
        for probe in &self.probes {
            if let Some(id) = probe.probe().as_deref().and_then(clean_identifier) {
                tracing::debug!(probe = probe.name(), "hardware id resolved");
                return id;
            }
            tracing::debug!(probe = probe.name(), "hardware probe returned nothing usable");
        }
        tracing::warn!("no hardware probe succeeded, using {}", UNKNOWN_HARDWARE_ID);
        UNKNOWN_HARDWARE_ID.to_string()
    }
}

/// A constant identity, for tests and for callers that compute the id
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedHardwareId(pub String);

impl FixedHardwareId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl HardwareIdProvider for FixedHardwareId {
    fn current_hardware_id(&self) -> String {
        self.0.clone()
    }
}

/// Comparison form of a hardware id: trimmed and lowercased.
pub fn normalize_hardware_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Case-insensitive equality of two hardware ids.
pub fn hardware_ids_match(a: &str, b: &str) -> bool {
    normalize_hardware_id(a) == normalize_hardware_id(b)
}

/// Trim a raw probe value and drop empty or placeholder answers.
fn clean_identifier(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(char::from(0)).trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if PLACEHOLDER_IDS.contains(&lower.as_str()) {
        return None;
    }
    if trimmed.chars().all(|c| c == '0' || c == '-') {
        return None;
    }
    Some(trimmed.to_string())
}

/// Platform product/board identifier.
pub struct BoardIdProbe;

impl HardwareProbe for BoardIdProbe {
    fn name(&self) -> &'static str {
        "board"
    }

    fn probe(&self) -> Option<String> {
        board_id()
    }
}

/// Serial number of the first storage device.
pub struct DiskSerialProbe;

impl HardwareProbe for DiskSerialProbe {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn probe(&self) -> Option<String> {
        disk_serial()
    }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// First usable line of a tabular command output, skipping a header row.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn first_value_after_header(output: &str, header: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case(header))
        .find_map(clean_identifier)
}

/// Value of the first `key: value` line whose key matches.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn first_labelled_value(output: &str, label: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(label) {
            clean_identifier(value)
        } else {
            None
        }
    })
}

#[cfg(target_os = "linux")]
fn board_id() -> Option<String> {
    [
        "/sys/class/dmi/id/product_uuid",
        "/sys/class/dmi/id/board_serial",
        "/sys/class/dmi/id/product_serial",
        "/etc/machine-id",
        "/var/lib/dbus/machine-id",
    ]
    .iter()
    .find_map(|path| {
        std::fs::read_to_string(path)
            .ok()
            .as_deref()
            .and_then(clean_identifier)
    })
}

#[cfg(target_os = "linux")]
fn disk_serial() -> Option<String> {
    if let Some(serial) = command_output("lsblk", &["-ndo", "SERIAL"])
        .and_then(|out| out.lines().find_map(clean_identifier))
    {
        return Some(serial);
    }

    let mut devices: Vec<_> = std::fs::read_dir("/sys/block")
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    devices.sort();
    devices.iter().find_map(|dev| {
        std::fs::read_to_string(dev.join("device/serial"))
            .ok()
            .as_deref()
            .and_then(clean_identifier)
    })
}

#[cfg(target_os = "macos")]
fn board_id() -> Option<String> {
    command_output("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"]).and_then(|output| {
        output
            .lines()
            .find(|l| l.contains("IOPlatformUUID"))
            .and_then(|l| l.split('"').nth(3))
            .and_then(clean_identifier)
    })
}

#[cfg(target_os = "macos")]
fn disk_serial() -> Option<String> {
    command_output("system_profiler", &["SPNVMeDataType", "SPSerialATADataType"])
        .and_then(|output| first_labelled_value(&output, "Serial Number"))
}

#[cfg(target_os = "windows")]
fn board_id() -> Option<String> {
    command_output("wmic", &["csproduct", "get", "uuid"])
        .and_then(|output| first_value_after_header(&output, "UUID"))
        .or_else(|| {
            command_output("wmic", &["baseboard", "get", "serialnumber"])
                .and_then(|output| first_value_after_header(&output, "SerialNumber"))
        })
}

#[cfg(target_os = "windows")]
fn disk_serial() -> Option<String> {
    command_output("wmic", &["diskdrive", "get", "serialnumber"])
        .and_then(|output| first_value_after_header(&output, "SerialNumber"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn board_id() -> Option<String> {
    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn disk_serial() -> Option<String> {
    let _ = command_output;
    None
}
