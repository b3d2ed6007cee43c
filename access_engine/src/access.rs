/// Access Kernel: Permission Primitives
///
/// Permission bits compose with `|` and are tested with `&`.
/// Expiry is an i64 with two sentinels; everything else is a timestamp.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, AccessResult};

/// Expiry sentinel: the grant has been revoked.
pub const EXPIRED: i64 = 0;

/// Expiry sentinel: the grant never lapses.
pub const NEVER_EXPIRES: i64 = -1;

/// Composable permission bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMask(pub u32);

impl AccessMask {
    pub const NONE: AccessMask = AccessMask(0);
    pub const WRITE: AccessMask = AccessMask(0x001);
    pub const READ: AccessMask = AccessMask(0x010);
    pub const DELETE: AccessMask = AccessMask(0x100);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if any bit of `flag` is set in `self`.
    pub const fn allows(self, flag: AccessMask) -> bool {
        self.0 & flag.0 != 0
    }

    /// Parse a decimal argument as received from the boundary.
    pub fn parse_arg(name: &str, raw: &str) -> AccessResult<Self> {
        raw.trim()
            .parse::<u32>()
            .map(AccessMask)
            .map_err(|_| {
                AccessError::Validation(format!(
                    "{} must be a non-negative integer bitmask, got {:?}",
                    name, raw
                ))
            })
    }
}

impl BitOr for AccessMask {
    type Output = AccessMask;

    fn bitor(self, rhs: AccessMask) -> AccessMask {
        AccessMask(self.0 | rhs.0)
    }
}

impl fmt::Display for AccessMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// Parse an expiry argument. Accepts the sentinels and any timestamp.
pub fn parse_expiry(raw: &str) -> AccessResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        AccessError::Validation(format!("expiredAt must be an integer, got {:?}", raw))
    })
}

/// Reject empty ids and ids that would break composite-key framing.
pub fn validate_id(field: &str, id: &str) -> AccessResult<()> {
    if id.is_empty() {
        return Err(AccessError::Validation(format!("{} must not be empty", field)));
    }
    if id.contains('\u{0}') {
        return Err(AccessError::Validation(format!(
            "{} {:?} contains a U+0000 delimiter",
            field, id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_compose_with_or() {
        let rw = AccessMask::READ | AccessMask::WRITE;
        assert_eq!(rw.bits(), 0x011);
        assert!(rw.allows(AccessMask::READ));
        assert!(rw.allows(AccessMask::WRITE));
        assert!(!rw.allows(AccessMask::DELETE));
    }

    #[test]
    fn test_none_allows_nothing() {
        assert!(!AccessMask::NONE.allows(AccessMask::READ));
    }

    #[test]
    fn test_parse_arg_decimal() {
        assert_eq!(AccessMask::parse_arg("access", "16").unwrap(), AccessMask::READ);
        assert_eq!(AccessMask::parse_arg("access", " 273 ").unwrap().bits(), 0x111);
    }

    #[test]
    fn test_parse_arg_rejects_garbage() {
        let err = AccessMask::parse_arg("access", "READ").unwrap_err();
        assert_eq!(err.kind().as_str(), "ValidationError");
        assert!(AccessMask::parse_arg("access", "-1").is_err());
    }

    #[test]
    fn test_parse_expiry_sentinels() {
        assert_eq!(parse_expiry("0").unwrap(), EXPIRED);
        assert_eq!(parse_expiry("-1").unwrap(), NEVER_EXPIRES);
        assert_eq!(parse_expiry("1700000000").unwrap(), 1_700_000_000);
        assert!(parse_expiry("soon").is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("org id", "Org1MSP").is_ok());
        assert!(validate_id("org id", "").is_err());
        assert!(validate_id("org id", "a\u{0}b").is_err());
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(AccessMask::READ.to_string(), "0x010");
    }
}
