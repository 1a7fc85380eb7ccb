//! Identity fingerprints.
//!
//! A fingerprint is a deterministic, non-cryptographic 32-bit digest of a
//! string. It is only a lookup key for stored records: two different strings
//! can collide and will then share a record. It offers no secrecy and must not
//! be used where a password hash is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

const ACC_MULTIPLIER: u32 = 1217;
const CHAR_MULTIPLIER: u32 = 1847;

/// 32-bit lookup key derived from a username or password.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(u32);

impl Fingerprint {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn of(s: &str) -> Self {
        fingerprint(s)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Widened form used for signed `BIGINT` columns.
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Inverse of [`Fingerprint::as_i64`]; `None` when out of the `u32` range.
    pub fn from_i64(value: i64) -> Option<Self> {
        u32::try_from(value).ok().map(Self)
    }
}

impl From<u32> for Fingerprint {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint a string.
///
/// Each character contributes its Unicode scalar value:
/// `acc = (acc * 1217) ^ (c * 1847)`, truncated to 32 bits after every step.
/// Existing `auth_data` rows were keyed with this exact formula, so it must
/// not change.
pub fn fingerprint(s: &str) -> Fingerprint {
    let acc = s.chars().fold(0u32, |acc, c| {
        acc.wrapping_mul(ACC_MULTIPLIER) ^ (c as u32).wrapping_mul(CHAR_MULTIPLIER)
    });
    Fingerprint(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(fingerprint("alice").value(), 2_115_190_746);
        assert_eq!(fingerprint("secret").value(), 658_598_690);
        assert_eq!(fingerprint("bob").value(), 1_887_502_745);
        assert_eq!(fingerprint("a").value(), 179_159);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(fingerprint("").value(), 0);
    }

    #[test]
    fn test_non_ascii_uses_code_points() {
        assert_eq!(fingerprint("héllo").value(), 2_729_684_686);
        assert_eq!(fingerprint("🚗").value(), 237_640_561);
    }

    #[test]
    fn test_deterministic() {
        for s in ["alice", "Alice", "", "user@example.com", "p@ss w0rd!"] {
            assert_eq!(fingerprint(s), fingerprint(s));
            assert_eq!(Fingerprint::of(s), fingerprint(s));
        }
    }

    #[test]
    fn test_case_sensitive() {
        assert_ne!(fingerprint("alice"), fingerprint("Alice"));
    }

    #[test]
    fn test_i64_roundtrip_bounds() {
        let max = Fingerprint::new(u32::MAX);
        assert_eq!(max.as_i64(), 4_294_967_295);
        assert_eq!(Fingerprint::from_i64(max.as_i64()), Some(max));
        assert_eq!(Fingerprint::from_i64(-1), None);
        assert_eq!(Fingerprint::from_i64(1 << 32), None);
    }
}
