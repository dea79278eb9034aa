//! Error types for tapo-core.
//!
//! Every fallible operation in the library returns [`Error`]. Failures that
//! originate on the device are reported as [`Error::DeviceRejected`] with the
//! raw `error_code` and the [`DeviceErrorKind`] it maps to.

use thiserror::Error;

use crate::transport::ProtocolKind;

/// Error type for tapo-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP exchange itself failed (connection, I/O, timeout, status).
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The handshake could not be authenticated.
    ///
    /// Raised on a KLAP server hash mismatch or when the SecurePassthrough
    /// key exchange cannot be decrypted. The caller must start over with a
    /// fresh handshake.
    #[error("handshake authentication failed: {0}")]
    HandshakeAuth(String),

    /// The device did not grant a session cookie during the handshake.
    #[error("no session cookie: {0}")]
    MissingSessionCookie(String),

    /// A payload decrypted correctly but was not the JSON we expected.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A ciphertext failed to decrypt (bad padding or truncated data).
    ///
    /// This means the session keys disagree with the device's, either
    /// because the session desynchronized or because it expired.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The device answered with a nonzero `error_code`.
    #[error("device rejected request: {kind} (error_code {code})")]
    DeviceRejected {
        /// What the code means.
        kind: DeviceErrorKind,
        /// The raw code returned by the device.
        code: i32,
    },

    /// A session was handed to the engine of the other protocol.
    #[error("protocol mismatch: {actual} session used with {expected} engine")]
    ProtocolMismatch {
        /// Protocol of the engine that received the session.
        expected: ProtocolKind,
        /// Protocol the session was established with.
        actual: ProtocolKind,
    },

    /// The name of a device protocol was not recognized.
    #[error("unknown device protocol: {0}")]
    UnknownProtocol(String),

    /// Wire-level violation outside of JSON parsing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A caller-supplied argument failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Failures of the underlying HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish a connection.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The exchange did not complete within the configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Reading or writing the socket failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The response was not parseable HTTP.
    #[error("invalid HTTP response: {0}")]
    InvalidResponse(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.into())
    }
}

/// Meaning of a nonzero `error_code` returned by a device or by the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// The request was malformed or the credentials were rejected.
    InvalidRequest,
    /// The device rejected the JSON it received.
    JsonFormat,
    /// The device session token expired or is not valid.
    DeviceTokenExpiredOrInvalid,
    /// The cloud token expired or is not valid.
    CloudTokenExpiredOrInvalid,
    /// Any code without a more specific meaning.
    Unknown,
}

impl DeviceErrorKind {
    /// Maps a raw `error_code` to its kind.
    ///
    /// Callers must not pass `0`, which means success.
    pub fn from_code(code: i32) -> Self {
        match code {
            -1501 | -1002 | 1002 | -1010 | -1012 => DeviceErrorKind::InvalidRequest,
            -1003 | 1003 => DeviceErrorKind::JsonFormat,
            9999 => DeviceErrorKind::DeviceTokenExpiredOrInvalid,
            -20675 | -20651 => DeviceErrorKind::CloudTokenExpiredOrInvalid,
            _ => DeviceErrorKind::Unknown,
        }
    }
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceErrorKind::InvalidRequest => write!(f, "invalid request or credentials"),
            DeviceErrorKind::JsonFormat => write!(f, "JSON format error"),
            DeviceErrorKind::DeviceTokenExpiredOrInvalid => {
                write!(f, "device token expired or invalid")
            }
            DeviceErrorKind::CloudTokenExpiredOrInvalid => {
                write!(f, "cloud token expired or invalid")
            }
            DeviceErrorKind::Unknown => write!(f, "device rejected request"),
        }
    }
}

impl Error {
    /// Returns an error for a nonzero `error_code`, or `Ok` for zero.
    pub fn check_code(code: i32) -> Result<(), Error> {
        if code == 0 {
            Ok(())
        } else {
            Err(Error::DeviceRejected {
                kind: DeviceErrorKind::from_code(code),
                code,
            })
        }
    }

    /// Returns `true` if the error means the session is no longer usable
    /// and the caller should perform a new handshake.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            Error::Decryption(_)
                | Error::DeviceRejected {
                    kind: DeviceErrorKind::DeviceTokenExpiredOrInvalid,
                    ..
                }
                | Error::Transport(TransportError::Status(403))
        )
    }
}
