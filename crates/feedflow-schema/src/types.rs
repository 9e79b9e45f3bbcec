//! Core newtypes such as package names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Newtype for package names.
///
/// Feeds treat package ids case-insensitively, so equality, ordering and
/// hashing all go through a lowercase key. The spelling the caller used is
/// kept for display and for install directory names.
#[derive(Debug, Clone)]
pub struct PackageName {
    display: String,
    key: String,
}

impl PackageName {
    /// Create a new package name, trimming surrounding whitespace.
    pub fn new(name: &str) -> Self {
        let display = name.trim().to_string();
        let key = display.to_lowercase();
        Self { display, key }
    }

    /// The name as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The lowercase lookup key, used for feed paths and cache paths.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if the name is empty after trimming.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    /// Returns `true` if the name can be used as a single path component.
    ///
    /// Names end up in install and cache paths, so separators, parent
    /// references, drive prefixes and control characters are refused.
    pub fn is_path_safe(&self) -> bool {
        !self.key.is_empty()
            && !self.key.contains("..")
            && !self
                .key
                .chars()
                .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PackageName {}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.display
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.key == other.trim().to_lowercase()
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.key == other.trim().to_lowercase()
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl Serialize for PackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}
