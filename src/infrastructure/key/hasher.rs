//! Key hashing, format checks and generation
//!
//! Secrets are never stored. Lookups go through a SHA-256 digest encoded as
//! URL-safe base64 and tagged with the algorithm (`sha256$...`).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Default upper bound on secret length
pub const DEFAULT_MAX_KEY_LENGTH: usize = 256;

const HASH_ALGORITHM: &str = "sha256";

/// Number of random characters kept in a key's display `start`
const START_RANDOM_CHARS: usize = 4;

static KEY_CHARSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Why a secret was rejected before any lookup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyFormatError {
    #[error("Key is empty")]
    Empty,

    #[error("Key exceeds maximum length of {0} characters")]
    TooLong(usize),

    #[error("Key contains characters outside [A-Za-z0-9_-]")]
    InvalidCharacters,

    #[error("Key does not start with prefix '{0}'")]
    MissingPrefix(String),
}

/// Freshly generated key; `secret` is shown once and never persisted
#[derive(Debug, Clone)]
pub struct GeneratedKey {
    pub secret: String,
    /// Prefix plus the first random characters, for display
    pub start: String,
    pub hash: String,
}

/// Hashes, checks and generates key secrets
#[derive(Debug, Clone)]
pub struct KeyHasher {
    prefix: Option<String>,
    max_key_length: usize,
    key_bytes: usize,
}

impl KeyHasher {
    pub fn new() -> Self {
        Self {
            prefix: None,
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            key_bytes: 16,
        }
    }

    /// Require (and generate) secrets of the form `<prefix>_<random>`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_max_key_length(mut self, max_key_length: usize) -> Self {
        self.max_key_length = max_key_length;
        self
    }

    pub fn with_key_bytes(mut self, bytes: usize) -> Self {
        self.key_bytes = bytes;
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Reject secrets that cannot possibly be valid keys
    pub fn check_format(&self, secret: &str) -> Result<(), KeyFormatError> {
        if secret.is_empty() {
            return Err(KeyFormatError::Empty);
        }

        if secret.len() > self.max_key_length {
            return Err(KeyFormatError::TooLong(self.max_key_length));
        }

        if !KEY_CHARSET.is_match(secret) {
            return Err(KeyFormatError::InvalidCharacters);
        }

        if let Some(prefix) = &self.prefix {
            let expected = format!("{}_", prefix);
            if !secret.starts_with(&expected) || secret.len() == expected.len() {
                return Err(KeyFormatError::MissingPrefix(prefix.clone()));
            }
        }

        Ok(())
    }

    /// Deterministic one-way hash of a secret
    pub fn hash(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        format!("{}${}", HASH_ALGORITHM, URL_SAFE_NO_PAD.encode(digest))
    }

    /// Compare a secret against a stored hash in constant time
    pub fn verify(&self, secret: &str, stored_hash: &str) -> bool {
        constant_time_compare(&self.hash(secret), stored_hash)
    }

    pub fn generate(&self) -> GeneratedKey {
        let mut random_bytes = vec![0u8; self.key_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let random = URL_SAFE_NO_PAD.encode(&random_bytes);
        let head = &random[..START_RANDOM_CHARS.min(random.len())];

        let (secret, start) = match &self.prefix {
            Some(prefix) => (
                format!("{}_{}", prefix, random),
                format!("{}_{}", prefix, head),
            ),
            None => (random.clone(), head.to_string()),
        };

        let hash = self.hash(&secret);

        GeneratedKey {
            secret,
            start,
            hash,
        }
    }
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
