//! Request fingerprints: deterministic cache keys for story requests.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const PREFIX: &str = "story-v2-";
const DIGEST_HEX_LEN: usize = 64;

/// A fingerprint string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid story fingerprint: {0:?}")]
pub struct FingerprintError(pub String);

/// Cache key derived from an `(age, concept)` request.
///
/// Exact-match only: the concept keeps its case and only whitespace is
/// normalized, so requests for different ages or concepts never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Computes the fingerprint of a story request.
    #[must_use]
    pub fn new(age: u32, concept: &str) -> Self {
        let normalized = normalize_concept(concept);
        let digest = Sha256::digest(format!("{age}\u{1f}{normalized}").as_bytes());

        let mut key = String::with_capacity(PREFIX.len() + DIGEST_HEX_LEN);
        key.push_str(PREFIX);
        for byte in digest {
            // Writing to a String cannot fail.
            let _ = write!(key, "{byte:02x}");
        }
        Self(key)
    }

    /// The key as stored in the cache.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Trims a concept and collapses internal whitespace runs to single spaces.
#[must_use]
pub fn normalize_concept(concept: &str) -> String {
    concept.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RequestFingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.strip_prefix(PREFIX).is_some_and(|digest| {
            digest.len() == DIGEST_HEX_LEN
                && digest
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        });
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(FingerprintError(s.to_owned()))
        }
    }
}

impl TryFrom<String> for RequestFingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RequestFingerprint> for String {
    fn from(value: RequestFingerprint) -> Self {
        value.0
    }
}
