//! One-way digests for the dismissal code and the uninstall PIN.
//!
//! Nothing in the crate keeps a scanned payload or a PIN in the clear. Both
//! are reduced to a hex-encoded SHA-256 digest before they reach the store,
//! and verification compares digests, so a leaked state file does not
//! disclose the enrolled code.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Shortest accepted uninstall PIN.
pub const PIN_MIN_LEN: usize = 4;

/// Longest accepted uninstall PIN.
pub const PIN_MAX_LEN: usize = 8;

/// Hex-encoded SHA-256 digest of a secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretDigest(String);

impl SecretDigest {
    /// Digest a raw payload.
    ///
    /// Surrounding whitespace is trimmed first: scanners disagree on
    /// trailing newlines, and the same printed code must always produce
    /// the same digest.
    pub fn of(raw: &str) -> Self {
        let hash = Sha256::digest(raw.trim().as_bytes());
        Self(hex::encode(hash))
    }

    /// Check a candidate payload against this digest.
    pub fn matches(&self, candidate: &str) -> bool {
        *self == Self::of(candidate)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Logs get a short prefix only.
impl fmt::Debug for SecretDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "SecretDigest({prefix}..)")
    }
}

/// Whether `pin` has the accepted shape: 4 to 8 ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
    (PIN_MIN_LEN..=PIN_MAX_LEN).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        // echo -n abc | sha256sum
        let digest = SecretDigest::of("abc");
        assert_eq!(
            digest.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_ignores_surrounding_whitespace() {
        assert_eq!(SecretDigest::of("XYZ123\n"), SecretDigest::of("  XYZ123"));
    }

    #[test]
    fn matches_only_same_payload() {
        let digest = SecretDigest::of("XYZ123");
        assert!(digest.matches("XYZ123"));
        assert!(!digest.matches("xyz123"));
        assert!(!digest.matches("WRONG"));
    }

    #[test]
    fn debug_does_not_print_full_digest() {
        let digest = SecretDigest::of("XYZ123");
        let shown = format!("{digest:?}");
        assert!(shown.len() < digest.as_str().len());
        assert!(!shown.contains(digest.as_str()));
    }

    #[test_case("1234", true; "four_digits")]
    #[test_case("12345678", true; "eight_digits")]
    #[test_case("123", false; "too_short")]
    #[test_case("123456789", false; "too_long")]
    #[test_case("12a4", false; "letter")]
    #[test_case("١٢٣٤", false; "non_ascii_digits")]
    fn pin_shape(pin: &str, valid: bool) {
        assert_eq!(is_valid_pin(pin), valid);
    }
}
