//! Tapo cloud account API.
//!
//! Plain JSON over HTTPS: log in with the account credentials, refresh the
//! token, and list the devices bound to the account. Unlike the device
//! protocols this needs nothing from the local network, so it uses
//! `reqwest` with rustls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    Credentials, DEFAULT_TIMEOUT,
    crypto::base64_decode,
    envelope::{Request, decode_result},
    error::{Error, TransportError},
};

/// Default cloud endpoint.
pub const DEFAULT_CLOUD_URL: &str = "https://eu-wap.tplinkcloud.com";

/// Application type reported to the cloud.
pub const DEFAULT_APP_TYPE: &str = "Tapo_Android";

/// Device types whose cloud `alias` is base64-encoded.
const TAPO_DEVICE_TYPES: [&str; 3] = ["SMART.TAPOPLUG", "SMART.TAPOBULB", "SMART.IPCAMERA"];

/// Returns `true` for Tapo plugs, bulbs and cameras (case-insensitive).
pub fn is_tapo_device(device_type: &str) -> bool {
    TAPO_DEVICE_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(device_type))
}

/// Result of `login`.
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudLogin {
    #[serde(default)]
    pub account_id: String,
    /// Registration time as sent by the cloud.
    #[serde(default)]
    pub reg_time: Option<String>,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub risk_detected: i32,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    /// Token for later cloud requests.
    pub token: String,
    /// Present when requested at login.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for CloudLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudLogin")
            .field("account_id", &self.account_id)
            .field("nickname", &self.nickname)
            .field("email", &self.email)
            .field("token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Result of `refreshToken`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CloudRefreshLogin {
    /// New cloud token.
    pub token: String,
}

impl std::fmt::Debug for CloudRefreshLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudRefreshLogin")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// A device bound to the account.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudDevice {
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub role: i32,
    #[serde(default)]
    pub fw_ver: String,
    #[serde(default)]
    pub app_server_url: String,
    #[serde(default)]
    pub device_region: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub device_hw_ver: String,
    /// Name set in the app; decoded from base64 for Tapo devices.
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub device_mac: String,
    #[serde(default)]
    pub oem_id: String,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub hw_id: String,
    #[serde(default)]
    pub fw_id: String,
    #[serde(default)]
    pub is_same_region: bool,
    /// 1 when the device is online.
    #[serde(default)]
    pub status: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudDeviceList {
    #[serde(default)]
    device_list: Vec<CloudDevice>,
}

/// Client for the Tapo cloud.
///
/// # Example
///
/// ```no_run
/// use tapo_core::{CloudClient, Credentials};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cloud = CloudClient::new(tapo_core::cloud::DEFAULT_CLOUD_URL)?;
///     let login = cloud
///         .login(&Credentials::new("user@example.com", "password"), false)
///         .await?;
///
///     for device in cloud.list_devices(&login.token).await? {
///         println!("{} ({})", device.alias, device.device_model);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    url: String,
    app_type: String,
}

impl CloudClient {
    /// Creates a client for the cloud at `url` with the default timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Creates a client for the cloud at `url`.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::InvalidInput("cloud URL must not be empty".into()));
        }

        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connect(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url,
            app_type: DEFAULT_APP_TYPE.to_string(),
        })
    }

    /// Overrides the application type sent on login.
    pub fn with_app_type(mut self, app_type: impl Into<String>) -> Self {
        self.app_type = app_type.into();
        self
    }

    /// Logs in to the cloud account.
    pub async fn login(
        &self,
        credentials: &Credentials,
        refresh_token_needed: bool,
    ) -> Result<CloudLogin, Error> {
        credentials.validate()?;

        debug!(url = %self.url, email = %credentials.username, "Logging in to Tapo cloud");

        let request = Request::with_params(
            "login",
            json!({
                "appType": self.app_type,
                "cloudUserName": credentials.username,
                "cloudPassword": credentials.expose_password(),
                "refreshTokenNeeded": refresh_token_needed,
                "terminalUUID": uuid::Uuid::new_v4().to_string(),
            }),
        );
        let body = self.post(&self.url, &request).await?;
        decode_result(&body)
    }

    /// Exchanges a refresh token for a new token.
    pub async fn refresh_login(&self, refresh_token: &str) -> Result<CloudRefreshLogin, Error> {
        if refresh_token.is_empty() {
            return Err(Error::InvalidInput("refresh token must not be empty".into()));
        }

        let request = Request::with_params(
            "refreshToken",
            json!({
                "appType": self.app_type,
                "refreshToken": refresh_token,
                "terminalUUID": uuid::Uuid::new_v4().to_string(),
            }),
        );
        let body = self.post(&self.url, &request).await?;
        decode_result(&body)
    }

    /// Lists the devices bound to the account.
    pub async fn list_devices(&self, token: &str) -> Result<Vec<CloudDevice>, Error> {
        if token.is_empty() {
            return Err(Error::InvalidInput("cloud token must not be empty".into()));
        }

        let url = format!("{}?token={}", self.url, token);
        let body = self.post(&url, &Request::new("getDeviceList")).await?;
        let mut list: CloudDeviceList = decode_result(&body)?;

        for device in &mut list.device_list {
            if is_tapo_device(&device.device_type) {
                device.alias = base64_decode(&device.alias)?;
            }
        }

        debug!(count = list.device_list.len(), "Listed cloud devices");
        Ok(list.device_list)
    }

    async fn post(&self, url: &str, request: &Request<Value>) -> Result<String, Error> {
        debug!(method = %request.method, "Sending cloud request");

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()).into());
        }

        response.text().await.map_err(transport_error)
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    let err = if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    };
    err.into()
}
