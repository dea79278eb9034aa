//! SecurePassthrough engine for older Tapo firmware.
//!
//! # Protocol Overview
//!
//! 1. **Handshake**: the client POSTs a fresh RSA-1024 public key to
//!    `/?app`; the device answers with a 32-byte AES key and IV encrypted
//!    under it, and sets the session cookie
//! 2. **Device login**: `login_device` is sent through the encrypted
//!    envelope with `token=undefined` and returns a bearer token
//! 3. **Request**: every command is AES-encrypted, base64-encoded and
//!    wrapped as `{"method":"securePassthrough","params":{"request":...}}`,
//!    then POSTed to `/app?token=<token>`
//!
//! The key, IV, cookie and token never change for the life of a session.
//! Device responses carry two error codes: one on the outer envelope, one
//! on the decrypted inner response.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use crate::{
    Credentials,
    crypto::{
        aes_cbc_decrypt, aes_cbc_encrypt, base64_decode_bytes, base64_encode, base64_encode_bytes,
        generate_key_pair, rsa_decrypt, sha1,
    },
    envelope::{Request, decode_result},
    error::Error,
    response::{DeviceLogin, HandshakeResult, PassthroughResult},
    session::{DeviceSession, PassthroughSession, SessionCookie, SessionInfo, parse_set_cookie},
    transport::{
        ClientConfig, DeviceProtocol, ProtocolKind,
        http::{CONTENT_TYPE_JSON, HttpClient, HttpRequest},
    },
};

/// RSA modulus size accepted by devices.
const RSA_KEY_BITS: usize = 1024;

/// Token placeholder sent before `login_device` has returned one.
const NO_TOKEN: &str = "undefined";

/// SecurePassthrough protocol engine.
pub struct PassthroughProtocol {
    http: Arc<dyn HttpClient>,
    port: u16,
    timeout: Duration,
    key_password: String,
}

/// Address and secrets needed to wrap one request.
struct Channel<'a> {
    host: &'a str,
    port: u16,
    cookie: &'a SessionCookie,
    key: &'a [u8; 16],
    iv: &'a [u8; 16],
    token: Option<&'a str>,
}

impl PassthroughProtocol {
    /// Creates an engine that reaches devices through `http`.
    ///
    /// Private keys generated by this engine are protected with a random
    /// password that lives as long as the engine.
    pub fn new(http: Arc<dyn HttpClient>, config: &ClientConfig) -> Self {
        Self {
            http,
            port: config.port,
            timeout: config.timeout,
            key_password: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Performs the RSA handshake and `login_device`, returning the session.
    pub async fn handshake(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<PassthroughSession, Error> {
        if host.is_empty() {
            return Err(Error::InvalidInput("host must not be empty".into()));
        }
        credentials.validate()?;

        let port = self.port;
        let issued_at = Utc::now();

        debug!(host, port, "Performing SecurePassthrough handshake");

        let key_pair = generate_key_pair(&self.key_password, RSA_KEY_BITS)?;
        let body = Request::with_params("handshake", json!({ "key": key_pair.public_pem }))
            .to_json()?;

        let response = self
            .http
            .post(HttpRequest {
                host: host.to_string(),
                port,
                path: "/?app".into(),
                body: body.into_bytes(),
                content_type: CONTENT_TYPE_JSON,
                cookie: None,
                timeout: self.timeout,
            })
            .await?
            .error_for_status()?;

        let text = std::str::from_utf8(&response.body)
            .map_err(|e| Error::MalformedPayload(format!("handshake response is not UTF-8: {}", e)))?;
        let result: HandshakeResult = decode_result(text)?;
        let cookie = parse_set_cookie(response.set_cookie.as_deref())?;

        let secret = rsa_decrypt(&result.key, &key_pair.private_pem, &self.key_password)?;
        if secret.len() < 32 {
            return Err(Error::HandshakeAuth(format!(
                "handshake key has {} bytes, expected 32",
                secret.len()
            )));
        }
        let mut key = [0u8; 16];
        let mut iv = [0u8; 16];
        key.copy_from_slice(&secret[..16]);
        iv.copy_from_slice(&secret[16..32]);

        debug!(host, port, timeout = ?cookie.timeout, "Handshake completed, logging in");

        let email_hash = hex::encode(sha1(credentials.username.as_bytes()));
        let login = Request::with_params(
            "login_device",
            json!({
                "username": base64_encode(&email_hash),
                "password": base64_encode(credentials.expose_password()),
            }),
        )
        .to_json()?;

        let channel = Channel {
            host,
            port,
            cookie: &cookie,
            key: &key,
            iv: &iv,
            token: None,
        };
        let response = self.passthrough(&channel, &login).await?;
        let DeviceLogin { token } = decode_result(&response)?;

        debug!(host, port, "SecurePassthrough login succeeded");

        Ok(PassthroughSession::new(
            SessionInfo {
                protocol: ProtocolKind::SecurePassthrough,
                host: host.to_string(),
                port,
                cookie,
                issued_at,
            },
            key,
            iv,
            token,
        ))
    }

    /// Sends an encrypted request and returns the decrypted inner response.
    ///
    /// The outer `error_code` is checked here; the inner one is left to the
    /// caller.
    pub async fn send_request(
        &self,
        session: &PassthroughSession,
        request: &str,
    ) -> Result<String, Error> {
        let channel = Channel {
            host: &session.info.host,
            port: session.info.port,
            cookie: &session.info.cookie,
            key: &session.key,
            iv: &session.iv,
            token: Some(session.token.as_str()),
        };
        self.passthrough(&channel, request).await
    }

    async fn passthrough(&self, channel: &Channel<'_>, request: &str) -> Result<String, Error> {
        let encrypted = aes_cbc_encrypt(request.as_bytes(), channel.key, channel.iv);
        let body = Request::with_params(
            "securePassthrough",
            json!({ "request": base64_encode_bytes(&encrypted) }),
        )
        .to_json()?;

        debug!(
            host = channel.host,
            port = channel.port,
            has_token = channel.token.is_some(),
            "Sending SecurePassthrough request"
        );

        let response = self
            .http
            .post(HttpRequest {
                host: channel.host.to_string(),
                port: channel.port,
                path: format!("/app?token={}", channel.token.unwrap_or(NO_TOKEN)),
                body: body.into_bytes(),
                content_type: CONTENT_TYPE_JSON,
                cookie: Some(channel.cookie.header_value()),
                timeout: self.timeout,
            })
            .await?
            .error_for_status()?;

        let text = std::str::from_utf8(&response.body)
            .map_err(|e| Error::MalformedPayload(format!("response is not UTF-8: {}", e)))?;
        let result: PassthroughResult = decode_result(text)?;

        let ciphertext = base64_decode_bytes(&result.response)?;
        let decrypted = aes_cbc_decrypt(&ciphertext, channel.key, channel.iv)?;

        String::from_utf8(decrypted)
            .map_err(|e| Error::MalformedPayload(format!("response is not valid UTF-8: {}", e)))
    }
}

#[async_trait]
impl DeviceProtocol for PassthroughProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::SecurePassthrough
    }

    async fn login(&self, host: &str, credentials: &Credentials) -> Result<DeviceSession, Error> {
        Ok(self.handshake(host, credentials).await?.into())
    }

    async fn send(&self, session: &DeviceSession, request: &str) -> Result<String, Error> {
        self.send_request(session.as_passthrough()?, request).await
    }
}

impl std::fmt::Debug for PassthroughProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassthroughProtocol")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("key_password", &"[REDACTED]")
            .finish()
    }
}
