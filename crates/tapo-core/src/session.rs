//! Authenticated device sessions.
//!
//! A [`DeviceSession`] is produced by a successful login and then handed back
//! to the same engine for every request. It carries the session cookie, the
//! advisory expiry the device announced, and the secret material of its
//! protocol.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::crypto::KlapCipher;
use crate::error::Error;
use crate::transport::ProtocolKind;

/// Session cookie name used by both protocols.
pub const SESSION_COOKIE_NAME: &str = "TP_SESSIONID";

/// Cookie attribute carrying the session lifetime in seconds.
const TIMEOUT_ATTRIBUTE: &str = "TIMEOUT";

/// Session cookie granted during a handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Value of `TP_SESSIONID`.
    pub value: String,
    /// Lifetime announced through the `TIMEOUT` attribute.
    pub timeout: Option<Duration>,
}

impl SessionCookie {
    /// Returns the value to send in the `Cookie` request header.
    pub fn header_value(&self) -> String {
        format!("{}={}", SESSION_COOKIE_NAME, self.value)
    }
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookie")
            .field("value", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Parses a `Set-Cookie` header such as `TP_SESSIONID=ABC;TIMEOUT=86400`.
///
/// Fails with [`Error::MissingSessionCookie`] when the header is absent or
/// has no `TP_SESSIONID`, and with [`Error::Protocol`] when `TIMEOUT` is not
/// a number of seconds.
pub fn parse_set_cookie(header: Option<&str>) -> Result<SessionCookie, Error> {
    let header = header.ok_or_else(|| {
        Error::MissingSessionCookie("response carried no Set-Cookie header".into())
    })?;

    let mut value = None;
    let mut timeout = None;

    for attribute in header.split(';') {
        let Some((key, val)) = attribute.trim().split_once('=') else {
            continue;
        };
        match key.trim() {
            SESSION_COOKIE_NAME => value = Some(val.trim().to_string()),
            TIMEOUT_ATTRIBUTE => {
                let seconds: u64 = val.trim().parse().map_err(|_| {
                    Error::Protocol(format!("invalid session TIMEOUT {:?}", val))
                })?;
                timeout = Some(Duration::from_secs(seconds));
            }
            _ => {}
        }
    }

    let value = value.ok_or_else(|| {
        Error::MissingSessionCookie(format!("Set-Cookie has no {}", SESSION_COOKIE_NAME))
    })?;

    Ok(SessionCookie { value, timeout })
}

/// Fields shared by both session variants.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Protocol the session was established with.
    pub protocol: ProtocolKind,
    /// Device hostname or IP address.
    pub host: String,
    /// Device HTTP port.
    pub port: u16,
    /// Cookie granted by the handshake.
    pub cookie: SessionCookie,
    /// When the handshake was started.
    pub issued_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Announced lifetime of the session.
    pub fn timeout(&self) -> Option<Duration> {
        self.cookie.timeout
    }

    /// When the device will stop honouring the session, if it said.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let timeout = chrono::Duration::from_std(self.timeout()?).ok()?;
        self.issued_at.checked_add_signed(timeout)
    }

    /// Returns `true` once the announced lifetime has elapsed.
    ///
    /// Advisory only: a device may drop a session earlier, which shows up as
    /// a rejected request.
    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|at| Utc::now() >= at)
    }
}

/// Session established through KLAP.
#[derive(Debug)]
pub struct KlapSession {
    /// Common session fields.
    pub info: SessionInfo,
    /// Cipher state; held for a whole request so sequence numbers are never
    /// reused or sent out of order.
    pub(crate) cipher: Mutex<KlapCipher>,
}

impl KlapSession {
    pub(crate) fn new(info: SessionInfo, cipher: KlapCipher) -> Self {
        Self {
            info,
            cipher: Mutex::new(cipher),
        }
    }

    /// Sequence number of the most recent request.
    pub async fn seq(&self) -> i32 {
        self.cipher.lock().await.seq()
    }
}

/// Session established through SecurePassthrough.
pub struct PassthroughSession {
    /// Common session fields.
    pub info: SessionInfo,
    pub(crate) key: [u8; 16],
    pub(crate) iv: [u8; 16],
    pub(crate) token: String,
}

impl PassthroughSession {
    pub(crate) fn new(info: SessionInfo, key: [u8; 16], iv: [u8; 16], token: String) -> Self {
        Self {
            info,
            key,
            iv,
            token,
        }
    }

    /// Bearer token returned by `login_device`.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for PassthroughSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughSession")
            .field("info", &self.info)
            .field("key", &"[REDACTED]")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// An authenticated session with one device.
///
/// Cloning is cheap and clones share state, so concurrent requests through
/// clones of one KLAP session still get distinct sequence numbers.
#[derive(Debug, Clone)]
pub enum DeviceSession {
    /// KLAP session.
    Klap(Arc<KlapSession>),
    /// SecurePassthrough session.
    SecurePassthrough(Arc<PassthroughSession>),
}

impl DeviceSession {
    /// Protocol of this session.
    pub fn kind(&self) -> ProtocolKind {
        self.info().protocol
    }

    /// Common session fields.
    pub fn info(&self) -> &SessionInfo {
        match self {
            DeviceSession::Klap(s) => &s.info,
            DeviceSession::SecurePassthrough(s) => &s.info,
        }
    }

    /// Returns the KLAP session or [`Error::ProtocolMismatch`].
    pub fn as_klap(&self) -> Result<&KlapSession, Error> {
        match self {
            DeviceSession::Klap(s) => Ok(s.as_ref()),
            other => Err(Error::ProtocolMismatch {
                expected: ProtocolKind::Klap,
                actual: other.kind(),
            }),
        }
    }

    /// Returns the SecurePassthrough session or [`Error::ProtocolMismatch`].
    pub fn as_passthrough(&self) -> Result<&PassthroughSession, Error> {
        match self {
            DeviceSession::SecurePassthrough(s) => Ok(s.as_ref()),
            other => Err(Error::ProtocolMismatch {
                expected: ProtocolKind::SecurePassthrough,
                actual: other.kind(),
            }),
        }
    }
}

impl From<KlapSession> for DeviceSession {
    fn from(session: KlapSession) -> Self {
        DeviceSession::Klap(Arc::new(session))
    }
}

impl From<PassthroughSession> for DeviceSession {
    fn from(session: PassthroughSession) -> Self {
        DeviceSession::SecurePassthrough(Arc::new(session))
    }
}
