//! Canonical contact identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EnvelopeError;

/// Canonical `user@domain` identity of a remote party.
///
/// Parsing trims surrounding whitespace, lower-cases the text and drops any
/// `/resource` suffix so that the same contact always compares equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Parses and canonicalises an identity.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidIdentity`] when nothing remains after
    /// canonicalisation.
    pub fn parse(raw: &str) -> Result<Self, EnvelopeError> {
        let bare = raw.split('/').next().unwrap_or_default().trim();
        if bare.is_empty() || bare.starts_with('@') || bare.ends_with('@') {
            return Err(EnvelopeError::invalid_identity(raw));
        }
        Ok(Self(bare.to_lowercase()))
    }

    /// Parses an identity, appending `@domain` when the input has no domain.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidIdentity`] when the input is empty.
    pub fn qualify(raw: &str, domain: &str) -> Result<Self, EnvelopeError> {
        let bare = raw.split('/').next().unwrap_or_default().trim();
        if bare.is_empty() || bare.contains('@') || domain.trim().is_empty() {
            return Self::parse(raw);
        }
        Self::parse(&format!("{bare}@{}", domain.trim()))
    }

    /// Returns the local part before `@`.
    #[must_use]
    pub fn user(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }

    /// Returns the domain after `@`, if present.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.0.split_once('@').map(|(_, domain)| domain)
    }

    /// Returns the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = EnvelopeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::parse(input)
    }
}

impl TryFrom<String> for Identity {
    type Error = EnvelopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
