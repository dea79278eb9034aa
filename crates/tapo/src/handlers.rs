use std::time::Duration;

use serde_json::{Value, json};
use tapo_core::{
    ClientConfig, CloudClient, Credentials, DeviceClient, ProtocolKind,
    transport::DeviceProtocolExt,
};
use tracing::debug;

use crate::cli::{CloudCommand, DeviceCommand};
use crate::utils::{fail, parse_color, parse_params, print_json};

/// Handle the device command.
pub async fn handle_device(
    target: String,
    protocol: ProtocolKind,
    port: u16,
    timeout: Duration,
    command: DeviceCommand,
    credentials: Credentials,
) {
    let config = ClientConfig::new()
        .with_port(port)
        .with_timeout(timeout)
        .with_protocol(protocol);
    let client = DeviceClient::new(config);

    debug!(host = %target, port, %protocol, "logging in");
    let session = match client.login_by_ip(&target, &credentials).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(host = %target, error = %e, "login failed");
            eprintln!("Error: Could not log in to {}: {}", target, e);
            if protocol == ProtocolKind::Klap {
                eprintln!();
                eprintln!("If your device runs older firmware, try:");
                eprintln!(
                    "  tapo device {} --protocol securepassthrough info",
                    target
                );
            }
            std::process::exit(1);
        }
    };

    match command {
        DeviceCommand::Info => match client.get_device_info(&session).await {
            Ok(info) => print_json(&info),
            Err(e) => fail("Failed to get device info", e),
        },
        DeviceCommand::Energy => match client.get_energy_usage(&session).await {
            Ok(usage) => print_json(&usage),
            Err(e) => fail("Failed to get energy usage", e),
        },
        DeviceCommand::On => match client.set_power(&session, true).await {
            Ok(()) => print_json(&json!({"device_on": true})),
            Err(e) => fail("Failed to turn device on", e),
        },
        DeviceCommand::Off => match client.set_power(&session, false).await {
            Ok(()) => print_json(&json!({"device_on": false})),
            Err(e) => fail("Failed to turn device off", e),
        },
        DeviceCommand::Brightness { level } => {
            match client.set_brightness(&session, level).await {
                Ok(()) => print_json(&json!({"brightness": level})),
                Err(e) => fail("Failed to set brightness", e),
            }
        }
        DeviceCommand::Color { color } => {
            let color = parse_color(&color).unwrap_or_else(|e| fail("Invalid color", e));
            match client.set_color(&session, color).await {
                Ok(()) => print_json(&json!({
                    "hue": color.hue,
                    "saturation": color.saturation,
                    "color_temp": color.color_temp,
                    "brightness": color.brightness,
                })),
                Err(e) => fail("Failed to set color", e),
            }
        }
        DeviceCommand::Raw { method, params } => {
            let params =
                parse_params(params.as_deref()).unwrap_or_else(|e| fail("Invalid params", e));
            match client.request::<Value>(&session, &method, params).await {
                Ok(result) => print_json(&result.unwrap_or(Value::Null)),
                Err(e) => fail("Command failed", e),
            }
        }
    }
}

/// Handle the cloud command.
pub async fn handle_cloud(url: String, command: CloudCommand, credentials: Credentials) {
    let cloud = CloudClient::new(url).unwrap_or_else(|e| fail("Invalid cloud settings", e));

    let refresh_token = matches!(command, CloudCommand::Login { refresh_token: true });
    let login = match cloud.login(&credentials, refresh_token).await {
        Ok(login) => login,
        Err(e) => fail("Cloud login failed", e),
    };
    debug!(account_id = %login.account_id, "logged in to cloud");

    match command {
        CloudCommand::Login { .. } => print_json(&login),
        CloudCommand::Devices => match cloud.list_devices(&login.token).await {
            Ok(devices) => {
                debug!(device_count = devices.len(), "listed devices");
                print_json(&devices);
            }
            Err(e) => fail("Failed to list devices", e),
        },
    }
}
