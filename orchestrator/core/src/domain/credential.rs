// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credentials
//!
//! Two kinds of secret flow into a workspace. Transport secrets are handed to
//! the automation as-is (database passwords, login passwords); digests are
//! one-way SHA-512 crypt strings written for host user accounts, never the
//! plaintext.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Credential value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Random secret stored and transmitted verbatim
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportSecret(String);

impl TransportSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for TransportSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportSecret(***)")
    }
}

/// Salted one-way password digest in `$6$<salt>$<hash>` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub const PREFIX: &'static str = "$6$";

    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a private key staged under `files/<key-id>.pem`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the key file relative to the workspace root
    pub fn relative_path(&self) -> String {
        format!("files/{}.pem", self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
