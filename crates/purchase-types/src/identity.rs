//! Identity types for purchase agreements
//!
//! Parties and items are identified by opaque strings supplied by the host
//! (a public key, a session subject, a token mint). Agreement handles are
//! generated here and wrap a UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate string-backed identifier types
macro_rules! define_label_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Empty or whitespace-only identifiers are malformed
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_label_type!(PartyId, "Authenticated identity of a seller or buyer");
define_label_type!(ItemId, "Opaque identifier of the item on offer");

/// Handle of an agreement held by the authority
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgreementId(pub Uuid);

impl AgreementId {
    const PREFIX: &'static str = "agr";

    /// Create a new random handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string (with or without prefix)
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        let s = s
            .strip_prefix(Self::PREFIX)
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(s);
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AgreementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", Self::PREFIX, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_id_roundtrips_through_display() {
        let id = AgreementId::new();
        let parsed = AgreementId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("agr_"));
    }

    #[test]
    fn test_agreement_id_parse_rejects_garbage() {
        assert!(AgreementId::parse("agr_not-a-uuid").is_err());
    }

    #[test]
    fn test_blank_party_id() {
        assert!(PartyId::new("").is_blank());
        assert!(PartyId::new("   ").is_blank());
        assert!(!PartyId::new("seller").is_blank());
    }
}
