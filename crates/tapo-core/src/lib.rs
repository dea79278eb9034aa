//! Client library for TP-Link Tapo smart plugs and bulbs.
//!
//! Tapo devices speak JSON over HTTP on port 80, wrapped in one of two
//! encryption protocols:
//!
//! - **KLAP**, used by current firmware: a two-step handshake proves that
//!   both sides know the account credentials, after which every request is
//!   AES-CBC encrypted with a per-request IV and signed with SHA-256.
//! - **SecurePassthrough**, used by older firmware: the client sends an RSA
//!   public key, the device answers with an encrypted AES key, and requests
//!   are tunneled base64-encoded through a `securePassthrough` envelope.
//!
//! Both protocols are exposed through the [`DeviceProtocol`] trait, and
//! [`DeviceClient`] picks the right engine for each session. A separate
//! [`CloudClient`] talks to the Tapo cloud to list the devices of an
//! account.
//!
//! # Example
//!
//! ```no_run
//! use tapo_core::{ClientConfig, Credentials, DeviceClient};
//! use tapo_core::transport::DeviceProtocolExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tapo_core::Error> {
//!     let client = DeviceClient::new(ClientConfig::new());
//!     let credentials = Credentials::new("user@example.com", "password");
//!
//!     let session = client.login_by_ip("192.168.1.100", &credentials).await?;
//!     let info = client.get_device_info(&session).await?;
//!     println!("{} is {}", info.nickname, if info.device_on { "on" } else { "off" });
//!
//!     client.set_power(&session, true).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Sessions
//!
//! A [`DeviceSession`] carries the keys negotiated during the handshake.
//! Sessions expire on the device after the timeout it announced; an
//! expired session shows up as an error for which
//! [`Error::is_session_expired`] returns `true`, and the caller should log
//! in again.

use std::time::Duration;

pub mod client;
pub mod cloud;
pub mod color;
pub mod credentials;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod response;
pub mod session;
pub mod state;
pub mod transport;

pub use client::DeviceClient;
pub use cloud::{CloudClient, CloudDevice, CloudLogin};
pub use color::Color;
pub use credentials::Credentials;
pub use error::{DeviceErrorKind, Error, TransportError};
pub use response::{DeviceInfo, EnergyUsage};
pub use session::DeviceSession;
pub use state::{BulbState, DeviceState, PlugState};
pub use transport::{ClientConfig, DEFAULT_PORT, DeviceProtocol, ProtocolKind};

/// The version of the tapo-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for a single HTTP exchange.
///
/// Covers connecting, writing the request, and reading the response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
