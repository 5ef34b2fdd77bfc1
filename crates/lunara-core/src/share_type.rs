//! Share relationship type and its wire encodings.
//!
//! The registry stores the relationship as a small integer; packages and
//! links carry the lowercase name. This module owns both mappings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Who a share is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareType {
    Partner,
    Family,
    Doctor,
}

/// Bidirectional mapping between share types and registry codes.
const CODE_TABLE: [(ShareType, u8); 3] = [
    (ShareType::Partner, 0),
    (ShareType::Family, 1),
    (ShareType::Doctor, 2),
];

impl ShareType {
    /// All variants in code order.
    pub const ALL: [ShareType; 3] = [ShareType::Partner, ShareType::Family, ShareType::Doctor];

    /// Registry integer code.
    pub fn code(self) -> u8 {
        CODE_TABLE
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }

    /// Look up a share type by registry code.
    pub fn from_code(code: u8) -> Option<Self> {
        CODE_TABLE
            .iter()
            .find(|(_, c)| *c == code)
            .map(|(t, _)| *t)
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            ShareType::Partner => "partner",
            ShareType::Family => "family",
            ShareType::Doctor => "doctor",
        }
    }
}

impl TryFrom<u8> for ShareType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
            .ok_or_else(|| Error::InvalidInput(format!("unknown share type code: {}", code)))
    }
}

impl From<ShareType> for u8 {
    fn from(t: ShareType) -> Self {
        t.code()
    }
}

impl FromStr for ShareType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partner" => Ok(ShareType::Partner),
            "family" => Ok(ShareType::Family),
            "doctor" => Ok(ShareType::Doctor),
            other => Err(Error::InvalidInput(format!("unknown share type: {}", other))),
        }
    }
}

impl fmt::Display for ShareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_codes() {
        assert_eq!(ShareType::Partner.code(), 0);
        assert_eq!(ShareType::Family.code(), 1);
        assert_eq!(ShareType::Doctor.code(), 2);
    }

    #[test]
    fn test_code_mapping_is_bijective() {
        for t in ShareType::ALL {
            assert_eq!(ShareType::from_code(t.code()), Some(t));
            assert_eq!(t.as_str().parse::<ShareType>().unwrap(), t);
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!(ShareType::from_code(3).is_none());
        assert!(matches!(ShareType::try_from(7), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_name_rejected() {
        assert!("Partner".parse::<ShareType>().is_err());
        assert!("friend".parse::<ShareType>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_name() {
        assert_eq!(
            serde_json::to_string(&ShareType::Doctor).unwrap(),
            "\"doctor\""
        );
        let t: ShareType = serde_json::from_str("\"family\"").unwrap();
        assert_eq!(t, ShareType::Family);
    }
}
