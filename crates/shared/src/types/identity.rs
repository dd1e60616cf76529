//! Caller identity as supplied by the upstream authentication collaborator.
//!
//! `ActorId` is an opaque, stable identifier; `Role` is a normalized role
//! name. How actors map to roles is injected (see `vaultline_core::policy`).

use serde::{Deserialize, Serialize};

/// Stable identifier of the human or system actor performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Actor used for timer-triggered jobs and other unattended operations.
    pub const SYSTEM: &'static str = "system";

    /// Creates an actor id, trimming surrounding whitespace.
    ///
    /// Returns `None` for blank identifiers.
    pub fn new(id: impl AsRef<str>) -> Option<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The unattended system actor.
    #[must_use]
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A role name such as `FINANCE_MANAGER`.
///
/// Names are normalized to upper case with `-` and spaces folded to `_`, so
/// `finance-manager`, `Finance Manager` and `FINANCE_MANAGER` are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Creates a normalized role. Returns `None` for blank names.
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let normalized: String = name
            .as_ref()
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();

        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    /// Returns the normalized name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).ok_or_else(|| serde::de::Error::custom("role name must not be blank"))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| "role name must not be blank".to_string())
    }
}
