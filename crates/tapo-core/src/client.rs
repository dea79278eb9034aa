//! Single entry point over both protocol engines.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Credentials,
    error::Error,
    session::DeviceSession,
    transport::{
        ClientConfig, DeviceProtocol, KlapProtocol, PassthroughProtocol, ProtocolKind,
        http::{HttpClient, TcpHttpClient},
    },
};

/// Client for Tapo devices speaking either protocol.
///
/// Logging in picks an engine; every later call is routed to the engine
/// matching the session, so callers never have to track which protocol a
/// device uses. The typed operations come from
/// [`DeviceProtocolExt`](crate::transport::DeviceProtocolExt).
///
/// # Example
///
/// ```no_run
/// use tapo_core::{ClientConfig, Color, Credentials, DeviceClient, ProtocolKind};
/// use tapo_core::transport::DeviceProtocolExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = DeviceClient::new(ClientConfig::new());
///     let credentials = Credentials::new("user@example.com", "password");
///
///     let bulb = client
///         .login_with(ProtocolKind::SecurePassthrough, "192.168.1.101", &credentials)
///         .await?;
///     client.set_color(&bulb, Color::from_hex("#34eba4")?).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DeviceClient {
    config: ClientConfig,
    klap: KlapProtocol,
    passthrough: PassthroughProtocol,
}

impl DeviceClient {
    /// Creates a client that talks to devices over TCP.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(config, Arc::new(TcpHttpClient::new()))
    }

    /// Creates a client that talks to devices through `http`.
    pub fn with_http_client(config: ClientConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            klap: KlapProtocol::new(http.clone(), &config),
            passthrough: PassthroughProtocol::new(http, &config),
            config,
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Logs in with the configured default protocol.
    pub async fn login_by_ip(
        &self,
        host: &str,
        credentials: &Credentials,
    ) -> Result<DeviceSession, Error> {
        self.login_with(self.config.protocol, host, credentials).await
    }

    /// Logs in with an explicit protocol.
    pub async fn login_with(
        &self,
        protocol: ProtocolKind,
        host: &str,
        credentials: &Credentials,
    ) -> Result<DeviceSession, Error> {
        self.engine(protocol).login(host, credentials).await
    }

    /// Returns the engine for `protocol`.
    pub fn engine(&self, protocol: ProtocolKind) -> &dyn DeviceProtocol {
        match protocol {
            ProtocolKind::Klap => &self.klap,
            ProtocolKind::SecurePassthrough => &self.passthrough,
        }
    }
}

#[async_trait]
impl DeviceProtocol for DeviceClient {
    fn kind(&self) -> ProtocolKind {
        self.config.protocol
    }

    async fn login(&self, host: &str, credentials: &Credentials) -> Result<DeviceSession, Error> {
        self.login_by_ip(host, credentials).await
    }

    async fn send(&self, session: &DeviceSession, request: &str) -> Result<String, Error> {
        self.engine(session.kind()).send(session, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::state::{BulbState, PlugState};
    use crate::transport::DeviceProtocolExt;
    use crate::transport::mock::{MockDevice, MockOptions};
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials::new("user@example.com", "hunter2")
    }

    fn client(device: &Arc<MockDevice>, protocol: ProtocolKind) -> DeviceClient {
        DeviceClient::with_http_client(
            ClientConfig::new().with_protocol(protocol),
            device.clone(),
        )
    }

    #[tokio::test]
    async fn test_login_by_ip_uses_configured_protocol() {
        let device = MockDevice::new(credentials(), MockOptions::default());

        let klap = client(&device, ProtocolKind::Klap)
            .login_by_ip("10.0.0.4", &credentials())
            .await
            .unwrap();
        assert_eq!(klap.kind(), ProtocolKind::Klap);

        let passthrough = client(&device, ProtocolKind::SecurePassthrough)
            .login_by_ip("10.0.0.4", &credentials())
            .await
            .unwrap();
        assert_eq!(passthrough.kind(), ProtocolKind::SecurePassthrough);
    }

    #[tokio::test]
    async fn test_dispatches_on_session_variant() {
        let device = MockDevice::new(credentials(), MockOptions::default());
        let client = client(&device, ProtocolKind::Klap);

        let klap = client.login_by_ip("10.0.0.4", &credentials()).await.unwrap();
        let passthrough = client
            .login_with(ProtocolKind::SecurePassthrough, "10.0.0.4", &credentials())
            .await
            .unwrap();

        client.set_power(&klap, true).await.unwrap();
        client
            .set_color(&passthrough, Color::from_hex("34eba4").unwrap())
            .await
            .unwrap();

        let paths = device.paths();
        assert!(paths.iter().any(|p| p.starts_with("/app/request?seq=")));
        assert!(paths.contains(&format!("/app?token={}", MockDevice::TOKEN)));

        assert_eq!(
            device.requests(),
            vec![
                json!({"method": "login_device", "params": {
                    "username": "NjNhNzEwNTY5MjYxYTI0YjM3NjYyNzViNzAwMGNlOGQ3YjMyZTJmNw==",
                    "password": "aHVudGVyMg=="
                }}),
                json!({"method": "set_device_info", "params": {"device_on": true}}),
                json!({"method": "set_device_info", "params": {
                    "brightness": 92, "hue": 157, "saturation": 78, "color_temp": 0
                }}),
            ]
        );
    }

    #[tokio::test]
    async fn test_set_state_variants() {
        let device = MockDevice::new(credentials(), MockOptions::default());
        let client = client(&device, ProtocolKind::Klap);
        let session = client.login_by_ip("10.0.0.4", &credentials()).await.unwrap();

        client
            .set_state(&session, &PlugState { device_on: true }.into())
            .await
            .unwrap();
        client
            .set_state(
                &session,
                &BulbState::color(Color::from_temperature(2700, Some(50)), Some(true)).into(),
            )
            .await
            .unwrap();

        assert_eq!(
            device.requests(),
            vec![
                json!({"method": "set_device_info", "params": {"device_on": true}}),
                json!({"method": "set_device_info", "params": {
                    "device_on": true, "brightness": 50, "color_temp": 2700
                }}),
            ]
        );
    }

    #[tokio::test]
    async fn test_energy_usage() {
        let device = MockDevice::new(credentials(), MockOptions::default());
        device.respond("get_energy_usage", json!({
            "error_code": 0,
            "result": {"current_power": 5000, "today_energy": 12, "local_time": "2024-03-09 14:27:31"}
        }));

        let client = client(&device, ProtocolKind::Klap);
        let session = client.login_by_ip("10.0.0.4", &credentials()).await.unwrap();
        let usage = client.get_energy_usage(&session).await.unwrap();

        assert_eq!(usage.current_power_w(), 5.0);
        assert_eq!(usage.today_energy, 12.0);
        assert!(usage.local_time.is_some());
    }
}
