//! License key generation.

use rand::Rng;

/// Unambiguous alphabet: no 0/O or 1/I.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GROUP_LEN: usize = 4;
const GROUPS: usize = 2;

/// Generate a license key in the format PREFIX-XXXX-XXXX.
pub fn generate_license_key(prefix: &str) -> String {
    let mut rng = rand::thread_rng();

    let mut part = || -> String {
        (0..GROUP_LEN)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect()
    };

    let groups: Vec<String> = (0..GROUPS).map(|_| part()).collect();
    format!("{}-{}", prefix, groups.join("-"))
}

/// Whether `key` has the issuer's PREFIX-XXXX-XXXX shape.
///
/// The prefix is any run of ASCII alphanumerics; each group is four
/// uppercase letters or digits. Used by the issuer as a sanity check only;
/// validation treats keys as opaque.
pub fn is_well_formed_key(key: &str) -> bool {
    let mut parts = key.split('-');
    let Some(prefix) = parts.next() else {
        return false;
    };
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let groups: Vec<&str> = parts.collect();
    groups.len() == GROUPS
        && groups.iter().all(|g| {
            g.len() == GROUP_LEN
                && g.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
}

/// Whether a configured prefix can be used to mint keys.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric())
}
