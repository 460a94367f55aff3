//! Credential resolution and the password decrypt hook.

use std::fmt;

use thiserror::Error;

use herald_types::Identity;

/// Encryption scheme names that mean "the password is stored in plain text".
const PLAINTEXT_SCHEMES: &[&str] = &["", "none"];

/// Login credentials for the transport.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: Identity,
    password: String,
}

impl Credentials {
    /// Builds credentials from already validated parts.
    #[must_use]
    pub fn new(username: Identity, password: impl Into<String>) -> Self {
        Self {
            username,
            password: password.into(),
        }
    }

    /// Account identity, always of the form `user@domain`.
    #[must_use]
    pub fn username(&self) -> &Identity {
        &self.username
    }

    /// Domain part of the account identity.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.username.domain().unwrap_or_default()
    }

    /// Decrypted password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Hook that turns a stored password into plain text.
pub trait PasswordDecryptor: Send + Sync {
    /// Decrypts `stored` according to `scheme`.
    ///
    /// Only invoked for schemes other than `none`.
    fn decrypt(&self, scheme: &str, stored: &str) -> Result<String, CredentialError>;
}

/// Decryptor for deployments that only store plain-text passwords.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextOnly;

impl PasswordDecryptor for PlaintextOnly {
    fn decrypt(&self, scheme: &str, _stored: &str) -> Result<String, CredentialError> {
        Err(CredentialError::UnsupportedEncryption {
            scheme: scheme.to_owned(),
        })
    }
}

/// Errors raised while resolving credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No username was configured.
    #[error("credentials_username is required")]
    MissingUsername,
    /// The username has no `@domain` part.
    #[error("username '{username}' does not specify a domain")]
    UsernameWithoutDomain {
        /// Configured username.
        username: String,
    },
    /// No password was configured.
    #[error("credentials_password is required")]
    MissingPassword,
    /// The configured encryption scheme is not supported by the decryptor.
    #[error("unsupported credentials encryption '{scheme}'")]
    UnsupportedEncryption {
        /// Configured scheme.
        scheme: String,
    },
    /// The decryptor failed.
    #[error("failed to decrypt password with '{scheme}': {message}")]
    Decrypt {
        /// Configured scheme.
        scheme: String,
        /// Description supplied by the decryptor.
        message: String,
    },
}

pub(crate) fn resolve(
    username: Option<&str>,
    password: Option<&str>,
    encryption: Option<&str>,
    decryptor: &dyn PasswordDecryptor,
) -> Result<Credentials, CredentialError> {
    let raw_username = username
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(CredentialError::MissingUsername)?;
    let identity = Identity::parse(raw_username)
        .ok()
        .filter(|identity| identity.domain().is_some_and(|domain| !domain.is_empty()))
        .ok_or_else(|| CredentialError::UsernameWithoutDomain {
            username: raw_username.to_owned(),
        })?;
    let stored = password.ok_or(CredentialError::MissingPassword)?;

    let scheme = encryption.map(str::trim).unwrap_or_default();
    let password = if PLAINTEXT_SCHEMES
        .iter()
        .any(|plain| plain.eq_ignore_ascii_case(scheme))
    {
        stored.to_owned()
    } else {
        decryptor.decrypt(scheme, stored)?
    };

    Ok(Credentials::new(identity, password))
}
