//! Credentials for TP-Link Tapo devices and the Tapo cloud.
//!
//! Both device protocols authenticate with the email address and password
//! of the Tapo cloud account that owns the device.
//!
//! # Security
//!
//! Passwords are stored using [`SecretString`] from the `secrecy` crate to prevent
//! accidental logging or display. Use [`Credentials::expose_password()`] to access
//! the raw password value when needed for authentication.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Credentials for authenticating with Tapo devices.
///
/// # Example
///
/// ```
/// use tapo_core::Credentials;
///
/// let creds = Credentials::new("user@example.com", "password123");
/// assert_eq!(creds.username, "user@example.com");
/// assert!(creds.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct Credentials {
    /// The cloud account email address.
    pub username: String,
    /// The account password (protected from accidental logging).
    password: SecretString,
}

impl Credentials {
    /// Creates new credentials with the given username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Checks that neither the username nor the password is empty.
    ///
    /// Devices answer empty credentials with an opaque hash mismatch, so
    /// they are rejected before any network traffic.
    pub fn validate(&self) -> Result<(), Error> {
        if self.username.is_empty() {
            return Err(Error::InvalidInput("username must not be empty".into()));
        }
        if self.password.expose_secret().is_empty() {
            return Err(Error::InvalidInput("password must not be empty".into()));
        }
        Ok(())
    }

    /// Exposes the password for authentication purposes.
    ///
    /// # Security
    ///
    /// Only use this method when the password is actually needed for
    /// authentication. Never log or display the returned value.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl Eq for Credentials {}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
