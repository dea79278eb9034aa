//! KLAP engine for newer Tapo firmware.
//!
//! # Protocol Overview
//!
//! 1. **Handshake 1**: client POSTs 16 random bytes to `/app/handshake1`;
//!    the device answers with its own 16-byte seed followed by
//!    `sha256(local_seed + remote_seed + auth_hash)`, and sets the session
//!    cookie
//! 2. **Handshake 2**: client POSTs `sha256(remote_seed + local_seed + auth_hash)`
//!    to `/app/handshake2`, proving it knows the credentials too
//! 3. **Request**: client POSTs the encrypted command to
//!    `/app/request?seq=N`; the device answers encrypted under the same `N`
//!
//! # Authentication
//!
//! `auth_hash = sha256(sha1(username) + sha1(password))`, where the
//! credentials are those of the Tapo cloud account that owns the device.
//! A server hash that does not match means the credentials are wrong; there
//! is no fallback to other credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::{
    Credentials,
    crypto::{
        KlapCipher, generate_auth_hash, handshake2_seed_auth_hash, random_bytes,
        verify_server_hash,
    },
    error::Error,
    session::{DeviceSession, KlapSession, SessionInfo, parse_set_cookie},
    transport::{
        ClientConfig, DeviceProtocol, ProtocolKind,
        http::{CONTENT_TYPE_OCTET_STREAM, HttpClient, HttpRequest, HttpResponse},
    },
};

/// Length of the handshake seeds.
const SEED_LEN: usize = 16;

/// KLAP protocol engine.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tapo_core::{ClientConfig, Credentials};
/// use tapo_core::transport::{KlapProtocol, TcpHttpClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let klap = KlapProtocol::new(Arc::new(TcpHttpClient::new()), &ClientConfig::new());
///     let credentials = Credentials::new("user@example.com", "password");
///
///     let session = klap.handshake("192.168.1.100", &credentials).await?;
///     let response = klap.send_request(&session, r#"{"method":"get_device_info"}"#).await?;
///     println!("{}", response);
///     Ok(())
/// }
/// ```
pub struct KlapProtocol {
    http: Arc<dyn HttpClient>,
    port: u16,
    timeout: Duration,
}

impl KlapProtocol {
    /// Creates an engine that reaches devices through `http`.
    pub fn new(http: Arc<dyn HttpClient>, config: &ClientConfig) -> Self {
        Self {
            http,
            port: config.port,
            timeout: config.timeout,
        }
    }

    /// Performs both handshakes and returns the established session.
    pub async fn handshake(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<KlapSession, Error> {
        if host.is_empty() {
            return Err(Error::InvalidInput("host must not be empty".into()));
        }
        credentials.validate()?;

        let port = self.port;
        let issued_at = Utc::now();
        let local_seed = random_bytes(SEED_LEN);

        debug!(
            host,
            port,
            local_seed = %hex::encode(&local_seed),
            "Performing KLAP handshake1"
        );

        let response = self
            .post(host, "/app/handshake1", local_seed.clone(), None)
            .await?
            .error_for_status()?;

        if response.body.len() < SEED_LEN {
            return Err(Error::Protocol(format!(
                "handshake1 response has {} bytes, expected at least {}",
                response.body.len(),
                SEED_LEN
            )));
        }
        let (remote_seed, server_hash) = response.body.split_at(SEED_LEN);

        debug!(
            remote_seed = %hex::encode(remote_seed),
            server_hash = %hex::encode(server_hash),
            "Handshake1 received response"
        );

        let auth_hash = generate_auth_hash(credentials);
        if let Err(e) = verify_server_hash(&local_seed, remote_seed, &auth_hash, server_hash) {
            debug!(host, port, "Server hash did not match credentials");
            return Err(e);
        }

        let cookie = parse_set_cookie(response.set_cookie.as_deref())?;

        debug!(host, port, timeout = ?cookie.timeout, "Performing KLAP handshake2");

        let payload = handshake2_seed_auth_hash(&local_seed, remote_seed, &auth_hash);
        self.post(
            host,
            "/app/handshake2",
            payload.to_vec(),
            Some(cookie.header_value()),
        )
        .await?
        .error_for_status()?;

        let cipher = KlapCipher::new(&local_seed, remote_seed, &auth_hash);

        debug!(host, port, seq = cipher.seq(), "KLAP handshake completed successfully");

        Ok(KlapSession::new(
            SessionInfo {
                protocol: ProtocolKind::Klap,
                host: host.to_string(),
                port,
                cookie,
                issued_at,
            },
            cipher,
        ))
    }

    /// Sends an encrypted request and returns the decrypted response.
    ///
    /// The session's cipher stays locked from encryption until the response
    /// is decrypted, so concurrent callers are serialized and every request
    /// gets its own sequence number.
    pub async fn send_request(&self, session: &KlapSession, request: &str) -> Result<String, Error> {
        let info = &session.info;
        let mut cipher = session.cipher.lock().await;

        let payload = cipher.encrypt(request.as_bytes());
        let seq = cipher.seq();

        debug!(host = %info.host, port = info.port, seq, "Sending KLAP request");

        let response = self
            .post_to(
                &info.host,
                info.port,
                &format!("/app/request?seq={}", seq),
                payload,
                Some(info.cookie.header_value()),
            )
            .await?
            .error_for_status()?;

        let decrypted = cipher.decrypt(&response.body, seq)?;
        drop(cipher);

        String::from_utf8(decrypted)
            .map_err(|e| Error::MalformedPayload(format!("response is not valid UTF-8: {}", e)))
    }

    async fn post(
        &self,
        host: &str,
        path: &str,
        body: Vec<u8>,
        cookie: Option<String>,
    ) -> Result<HttpResponse, Error> {
        self.post_to(host, self.port, path, body, cookie).await
    }

    async fn post_to(
        &self,
        host: &str,
        port: u16,
        path: &str,
        body: Vec<u8>,
        cookie: Option<String>,
    ) -> Result<HttpResponse, Error> {
        self.http
            .post(HttpRequest {
                host: host.to_string(),
                port,
                path: path.to_string(),
                body,
                content_type: CONTENT_TYPE_OCTET_STREAM,
                cookie,
                timeout: self.timeout,
            })
            .await
    }
}

#[async_trait]
impl DeviceProtocol for KlapProtocol {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Klap
    }

    async fn login(&self, host: &str, credentials: &Credentials) -> Result<DeviceSession, Error> {
        Ok(self.handshake(host, credentials).await?.into())
    }

    async fn send(&self, session: &DeviceSession, request: &str) -> Result<String, Error> {
        self.send_request(session.as_klap()?, request).await
    }
}

impl std::fmt::Debug for KlapProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlapProtocol")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish()
    }
}
