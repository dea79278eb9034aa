//! Protocol engines for communicating with Tapo devices.
//!
//! Two mutually incompatible protocols exist, depending on firmware:
//!
//! - [`KlapProtocol`]: two-step seeded handshake, then AES with a
//!   per-request sequence number (newer firmware)
//! - [`PassthroughProtocol`]: RSA key exchange, then AES inside a
//!   `securePassthrough` JSON envelope (older firmware)
//!
//! Both implement [`DeviceProtocol`]; the typed operations live on the
//! blanket extension trait [`DeviceProtocolExt`].

pub mod http;
pub mod klap;
pub mod passthrough;

#[cfg(test)]
pub(crate) mod mock;

pub use http::{HttpClient, HttpRequest, HttpResponse, TcpHttpClient};
pub use klap::KlapProtocol;
pub use passthrough::PassthroughProtocol;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Credentials, DEFAULT_TIMEOUT,
    color::Color,
    crypto::base64_decode,
    envelope::{Request, decode_response, decode_result},
    error::Error,
    response::{DeviceInfo, EnergyUsage},
    session::DeviceSession,
    state::{BulbState, DeviceState, PlugState},
};

/// Default HTTP port of both protocols.
pub const DEFAULT_PORT: u16 = 80;

/// Device protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProtocolKind {
    /// KLAP handshake and cipher (newer firmware).
    #[default]
    Klap,
    /// RSA handshake and `securePassthrough` envelope (older firmware).
    SecurePassthrough,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Klap => write!(f, "KLAP"),
            ProtocolKind::SecurePassthrough => write!(f, "SecurePassthrough"),
        }
    }
}

impl std::str::FromStr for ProtocolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "klap" => Ok(ProtocolKind::Klap),
            "securepassthrough" | "passthrough" => Ok(ProtocolKind::SecurePassthrough),
            _ => Err(Error::UnknownProtocol(s.to_string())),
        }
    }
}

/// Settings shared by the protocol engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Device HTTP port.
    pub port: u16,
    /// Limit on each network operation of an exchange.
    pub timeout: Duration,
    /// Protocol used by [`DeviceClient::login_by_ip`](crate::DeviceClient::login_by_ip).
    pub protocol: ProtocolKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            protocol: ProtocolKind::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with default port, timeout and protocol.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the default protocol.
    pub fn with_protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }
}

/// A device protocol engine.
///
/// Engines hold no per-device state: everything a request needs is in the
/// [`DeviceSession`] returned by [`login`](Self::login). Passing a session
/// created by another protocol fails with [`Error::ProtocolMismatch`].
#[async_trait]
pub trait DeviceProtocol: Send + Sync {
    /// Protocol implemented by this engine.
    fn kind(&self) -> ProtocolKind;

    /// Authenticates with the device at `host` and returns a new session.
    async fn login(&self, host: &str, credentials: &Credentials) -> Result<DeviceSession, Error>;

    /// Sends a JSON request envelope and returns the decrypted response
    /// envelope, whose `error_code` has not been checked yet.
    async fn send(&self, session: &DeviceSession, request: &str) -> Result<String, Error>;
}

/// Typed device operations, available on every [`DeviceProtocol`].
///
/// # Example
///
/// ```no_run
/// use tapo_core::{ClientConfig, Credentials, DeviceClient, transport::DeviceProtocolExt};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DeviceClient::new(ClientConfig::new());
///     let credentials = Credentials::new("user@example.com", "password");
///     let session = client.login_by_ip("192.168.1.100", &credentials).await?;
///
///     let info = client.get_device_info(&session).await?;
///     println!("{} ({})", info.nickname, info.model);
///
///     client.set_power(&session, true).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DeviceProtocolExt: DeviceProtocol {
    /// Calls `method` with `params` and returns the decoded `result`.
    async fn request<T: DeserializeOwned + Send>(
        &self,
        session: &DeviceSession,
        method: &str,
        params: Option<Value>,
    ) -> Result<Option<T>, Error>;

    /// Gets device information, with `ssid` and `nickname` decoded to text.
    async fn get_device_info(&self, session: &DeviceSession) -> Result<DeviceInfo, Error>;

    /// Gets energy usage (plugs with energy monitoring only).
    async fn get_energy_usage(&self, session: &DeviceSession) -> Result<EnergyUsage, Error>;

    /// Switches the device on or off.
    async fn set_power(&self, session: &DeviceSession, on: bool) -> Result<(), Error>;

    /// Sets the bulb brightness in percent.
    async fn set_brightness(&self, session: &DeviceSession, brightness: u8) -> Result<(), Error>;

    /// Sets the bulb color.
    async fn set_color(&self, session: &DeviceSession, color: Color) -> Result<(), Error>;

    /// Applies an arbitrary device state.
    async fn set_state(&self, session: &DeviceSession, state: &DeviceState) -> Result<(), Error>;
}

#[async_trait]
impl<P: DeviceProtocol + ?Sized> DeviceProtocolExt for P {
    async fn request<T: DeserializeOwned + Send>(
        &self,
        session: &DeviceSession,
        method: &str,
        params: Option<Value>,
    ) -> Result<Option<T>, Error> {
        let request = Request {
            method: method.to_string(),
            params,
        }
        .to_json()?;
        let response = self.send(session, &request).await?;
        decode_response(&response)
    }

    async fn get_device_info(&self, session: &DeviceSession) -> Result<DeviceInfo, Error> {
        let request = Request::new("get_device_info").to_json()?;
        let response = self.send(session, &request).await?;
        let mut info: DeviceInfo = decode_result(&response)?;

        info.ssid = base64_decode(&info.ssid)?;
        info.nickname = base64_decode(&info.nickname)?;

        Ok(info)
    }

    async fn get_energy_usage(&self, session: &DeviceSession) -> Result<EnergyUsage, Error> {
        let request = Request::new("get_energy_usage").to_json()?;
        let response = self.send(session, &request).await?;
        decode_result(&response)
    }

    async fn set_power(&self, session: &DeviceSession, on: bool) -> Result<(), Error> {
        self.set_state(session, &PlugState { device_on: on }.into())
            .await
    }

    async fn set_brightness(&self, session: &DeviceSession, brightness: u8) -> Result<(), Error> {
        self.set_state(session, &BulbState::brightness(brightness).into())
            .await
    }

    async fn set_color(&self, session: &DeviceSession, color: Color) -> Result<(), Error> {
        self.set_state(session, &BulbState::color(color, None).into())
            .await
    }

    async fn set_state(&self, session: &DeviceSession, state: &DeviceState) -> Result<(), Error> {
        let params = serde_json::to_value(state)
            .map_err(|e| Error::MalformedPayload(format!("cannot serialize state: {}", e)))?;
        self.request::<Value>(session, "set_device_info", Some(params))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_kind_parse() {
        assert_eq!("klap".parse::<ProtocolKind>().unwrap(), ProtocolKind::Klap);
        assert_eq!("KLAP".parse::<ProtocolKind>().unwrap(), ProtocolKind::Klap);
        assert_eq!(
            "secure-passthrough".parse::<ProtocolKind>().unwrap(),
            ProtocolKind::SecurePassthrough
        );
        assert_eq!(
            "SecurePassthrough".parse::<ProtocolKind>().unwrap(),
            ProtocolKind::SecurePassthrough
        );
        assert!(matches!(
            "xor".parse::<ProtocolKind>(),
            Err(Error::UnknownProtocol(name)) if name == "xor"
        ));
    }

    #[test]
    fn test_protocol_kind_display() {
        assert_eq!(ProtocolKind::Klap.to_string(), "KLAP");
        assert_eq!(
            ProtocolKind::SecurePassthrough.to_string(),
            "SecurePassthrough"
        );
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_port(8080)
            .with_timeout(Duration::from_secs(3))
            .with_protocol(ProtocolKind::SecurePassthrough);

        assert_eq!(config.port, 8080);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.protocol, ProtocolKind::SecurePassthrough);

        let default = ClientConfig::default();
        assert_eq!(default.port, DEFAULT_PORT);
        assert_eq!(default.timeout, DEFAULT_TIMEOUT);
        assert_eq!(default.protocol, ProtocolKind::Klap);
    }
}
