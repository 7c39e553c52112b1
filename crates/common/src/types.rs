//! Common data types for NomNom components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of an object in packet storage.
///
/// The key doubles as the object's identity and its storage path, e.g.
/// `hugo2024/novel/finalist-a.epub`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Wrap a raw storage key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The directory-like part of the key: everything before the final `/`.
    ///
    /// A key with no `/` is its own prefix, so listing by it still finds the
    /// object.
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((prefix, _)) => prefix,
            None => &self.0,
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}
