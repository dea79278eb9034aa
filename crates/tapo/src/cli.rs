use std::time::Duration;

use clap::{Parser, Subcommand};
use tapo_core::{DEFAULT_PORT, ProtocolKind, cloud::DEFAULT_CLOUD_URL};

pub fn parse_duration(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let seconds = arg.parse()?;
    Ok(Duration::from_secs(seconds))
}

/// TP-Link Tapo smart plug and bulb client
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Tapo cloud account username (email).
    /// Devices authenticate with the account that owns them.
    #[arg(short, long, global = true, env = "TAPO_USERNAME")]
    pub username: Option<String>,

    /// Read password from stdin.
    /// Useful for scripting: echo "password" | tapo -u user@example.com --password-stdin device 192.168.1.100 info
    #[arg(long, global = true)]
    pub password_stdin: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show version information for CLI and core library
    Version,

    /// Send a command to a specific device
    Device {
        /// Target hostname or IP address
        target: String,

        /// Device protocol: klap or securepassthrough
        #[arg(long, default_value_t = ProtocolKind::Klap)]
        protocol: ProtocolKind,

        /// Target port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Timeout in seconds for each request
        #[arg(long, value_parser = parse_duration, default_value = "10")]
        timeout: Duration,

        #[command(subcommand)]
        command: DeviceCommand,
    },

    /// Tapo cloud account commands
    Cloud {
        /// Cloud API endpoint
        #[arg(long, env = "TAPO_CLOUD_URL", default_value = DEFAULT_CLOUD_URL)]
        url: String,

        #[command(subcommand)]
        command: CloudCommand,
    },
}

/// Commands available for single device operations
#[derive(Subcommand)]
pub enum DeviceCommand {
    /// Get device info
    Info,
    /// Get energy usage (energy monitoring plugs only)
    Energy,
    /// Turn the device on
    On,
    /// Turn the device off
    Off,
    /// Set bulb brightness (1-100)
    Brightness {
        level: u8,
    },
    /// Set bulb color
    Color {
        #[command(subcommand)]
        color: ColorCommand,
    },
    /// Send a raw device method
    Raw {
        /// Method name, e.g. get_device_info
        method: String,

        /// Parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ColorCommand {
    /// Hex color, e.g. 34eba4 or #34eba4
    Hex { value: String },
    /// Comma separated RGB, e.g. 52,235,164
    Rgb { value: String },
    /// White color temperature in Kelvin
    Temp { kelvin: u16 },
}

#[derive(Subcommand)]
pub enum CloudCommand {
    /// Log in and print the account token
    Login {
        /// Also request a refresh token
        #[arg(long)]
        refresh_token: bool,
    },
    /// List devices bound to the account
    Devices,
}
