// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Identity
//!
//! A tenant owns exactly one provisioning workspace. The tenant identifier is
//! used verbatim as the workspace directory name, so it is validated the same
//! way the path sanitizer treats untrusted path segments: no separators, no
//! `.`/`..`, bounded length.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tenant identity value object

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a tenant identifier (one filesystem path segment)
const MAX_TENANT_ID_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantIdError {
    #[error("Tenant id cannot be empty")]
    Empty,

    #[error("Tenant id too long ({0} characters)")]
    TooLong(usize),

    #[error("Tenant id contains invalid character {0:?}")]
    InvalidCharacter(char),

    #[error("Tenant id cannot be a relative path component: {0}")]
    RelativeComponent(String),
}

/// Identity of the tenant a workspace and its resources belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse and validate a tenant identifier.
    ///
    /// Allowed characters are ASCII alphanumerics plus `.`, `_`, `@` and `-`,
    /// which covers both opaque ids and email-style identities.
    pub fn parse(value: impl Into<String>) -> Result<Self, TenantIdError> {
        let value = value.into();

        if value.is_empty() {
            return Err(TenantIdError::Empty);
        }
        if value.len() > MAX_TENANT_ID_LEN {
            return Err(TenantIdError::TooLong(value.len()));
        }
        if value == "." || value == ".." {
            return Err(TenantIdError::RelativeComponent(value));
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-')))
        {
            return Err(TenantIdError::InvalidCharacter(c));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = TenantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_opaque_and_email_ids() {
        assert!(TenantId::parse("64b7f0c2a1").is_ok());
        assert!(TenantId::parse("ops@example.com").is_ok());
        assert!(TenantId::parse("team_blue-01").is_ok());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        assert_eq!(TenantId::parse(""), Err(TenantIdError::Empty));
        assert_eq!(
            TenantId::parse(".."),
            Err(TenantIdError::RelativeComponent("..".to_string()))
        );
        assert_eq!(
            TenantId::parse("a/b"),
            Err(TenantIdError::InvalidCharacter('/'))
        );
        assert_eq!(
            TenantId::parse("a b"),
            Err(TenantIdError::InvalidCharacter(' '))
        );
        assert!(matches!(
            TenantId::parse("x".repeat(200)),
            Err(TenantIdError::TooLong(200))
        ));
    }

    #[test]
    fn test_serde_validates() {
        let ok: TenantId = serde_json::from_str("\"tenant-1\"").unwrap();
        assert_eq!(ok.as_str(), "tenant-1");
        assert!(serde_json::from_str::<TenantId>("\"../etc\"").is_err());
    }
}
