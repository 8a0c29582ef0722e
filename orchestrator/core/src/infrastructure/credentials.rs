// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Credential Generator
//!
//! Random secrets and suffixes come from the OS CSPRNG. Host user passwords
//! are written as SHA-512 crypt digests (`$6$` format) so the automation can
//! hand them straight to the account tooling on the target host.
//!
//! Nothing here consults stored state; whether an existing credential is
//! reused is decided by the lifecycle services.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand_core::{OsRng, RngCore};

use crate::domain::credential::{Digest, TransportSecret};

/// Byte length of generated transport secrets (20 base64 characters)
pub const SECRET_BYTES: usize = 15;

/// Byte length of generated identifier suffixes (8 hex characters)
pub const SUFFIX_BYTES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Failed to compute password digest: {0}")]
    Digest(String),
}

pub struct CredentialGenerator;

impl CredentialGenerator {
    /// `byte_len` random bytes, standard base64 encoded
    pub fn generate_secret(byte_len: usize) -> TransportSecret {
        TransportSecret::new(STANDARD.encode(random_bytes(byte_len)))
    }

    /// `byte_len` random bytes as lowercase hex (`2 * byte_len` characters)
    pub fn generate_suffix(byte_len: usize) -> String {
        hex::encode(random_bytes(byte_len))
    }

    /// Salted SHA-512 crypt digest of `password`
    pub fn digest(password: &str) -> Result<Digest, CredentialError> {
        pwhash::sha512_crypt::hash(password)
            .map(Digest::new)
            .map_err(|e| CredentialError::Digest(e.to_string()))
    }

    pub fn verify_digest(password: &str, digest: &Digest) -> bool {
        pwhash::sha512_crypt::verify(password, digest.as_str())
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    OsRng.fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_length_and_alphabet() {
        let secret = CredentialGenerator::generate_secret(SECRET_BYTES);
        assert_eq!(secret.expose().len(), 20);
        assert!(STANDARD.decode(secret.expose()).is_ok());
        assert_ne!(
            secret.expose(),
            CredentialGenerator::generate_secret(SECRET_BYTES).expose()
        );
    }

    #[test]
    fn test_suffix_is_lowercase_hex() {
        let suffix = CredentialGenerator::generate_suffix(SUFFIX_BYTES);
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_digest_is_salted_and_verifiable() {
        let first = CredentialGenerator::digest("P@ss1").unwrap();
        let second = CredentialGenerator::digest("P@ss1").unwrap();

        assert!(first.as_str().starts_with(Digest::PREFIX));
        assert_ne!(first, second);
        assert!(!first.as_str().contains("P@ss1"));
        assert!(CredentialGenerator::verify_digest("P@ss1", &first));
        assert!(!CredentialGenerator::verify_digest("wrong", &first));
    }
}
