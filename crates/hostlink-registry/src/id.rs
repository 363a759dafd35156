//! Identity types for providers, hosts and registration epochs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BrokerError, BrokerResult};

/// Validate an identity string shared by [`ProviderId`] and [`HostId`].
///
/// Identities are non-empty and contain only lowercase ASCII alphanumerics,
/// `-`, `_` and `.`. They must not start or end with a separator.
fn validate(kind: &str, id: &str) -> BrokerResult<()> {
    if id.is_empty() {
        return Err(BrokerError::InvalidId(format!("{kind} id must not be empty")));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err(BrokerError::InvalidId(format!(
            "{kind} id must contain only lowercase alphanumeric characters, '-', '_' or '.', got: {id}"
        )));
    }
    let is_separator = |c: char| matches!(c, '-' | '_' | '.');
    if id.starts_with(is_separator) || id.ends_with(is_separator) {
        return Err(BrokerError::InvalidId(format!(
            "{kind} id must not start or end with a separator, got: {id}"
        )));
    }
    Ok(())
}

/// Stable identity of a capability provider.
///
/// At most one live registration exists per `ProviderId` at a time. The id is
/// chosen by the provider implementation and is known before any instance
/// exists, which is what lets consumers `require` it ahead of registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProviderId(String);

/// Deserialize with validation so malformed ids never enter the registry.
impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl ProviderId {
    /// Create a new `ProviderId`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidId`] if the id is empty or malformed.
    pub fn new(id: impl Into<String>) -> BrokerResult<Self> {
        let id = id.into();
        validate("provider", &id)?;
        Ok(Self(id))
    }

    /// Create a `ProviderId` without validation (for constants and tests).
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of an execution host, used for set membership and equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostId(String);

impl<'de> Deserialize<'de> for HostId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl HostId {
    /// Create a new `HostId`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidId`] if the id is empty or malformed.
    pub fn new(id: impl Into<String>) -> BrokerResult<Self> {
        let id = id.into();
        validate("host", &id)?;
        Ok(Self(id))
    }

    /// Create a `HostId` without validation (for constants and tests).
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HostId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifies one registration epoch of a provider.
///
/// A fresh id is minted every time a record is created, so a record that was
/// disabled and registered again is distinguishable from the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(Uuid);

impl RegistrationId {
    /// Mint a new random registration id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_provider_ids() {
        assert!(ProviderId::new("my-api").is_ok());
        assert!(ProviderId::new("net.example.another_api").is_ok());
        assert!(ProviderId::new("api2").is_ok());
        assert!(ProviderId::new("a").is_ok());
    }

    #[test]
    fn test_invalid_provider_ids() {
        assert!(ProviderId::new("").is_err());
        assert!(ProviderId::new("MyAPI").is_err());
        assert!(ProviderId::new("my api").is_err());
        assert!(ProviderId::new("-api").is_err());
        assert!(ProviderId::new("api.").is_err());
        assert!(ProviderId::new("api@1").is_err());
    }

    #[test]
    fn test_host_id_validation_matches_provider_rules() {
        assert!(HostId::new("my-awesome-plugin").is_ok());
        assert!(HostId::new("Plugin").is_err());
        assert!(HostId::new("_plugin").is_err());
    }

    #[test]
    fn test_provider_id_display() {
        let id = ProviderId::new("my-api").unwrap();
        assert_eq!(id.to_string(), "my-api");
        assert_eq!(id.as_str(), "my-api");
    }

    #[test]
    fn test_provider_id_deserialize_rejects_malformed() {
        let ok: ProviderId = serde_json::from_str("\"my-api\"").unwrap();
        assert_eq!(ok, ProviderId::from_static("my-api"));
        assert!(serde_json::from_str::<ProviderId>("\"../etc\"").is_err());
    }

    #[test]
    fn test_registration_ids_are_unique() {
        assert_ne!(RegistrationId::new(), RegistrationId::new());
    }
}
