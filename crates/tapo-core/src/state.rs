//! `set_device_info` payloads.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// State of a plug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlugState {
    /// Whether the relay is on.
    pub device_on: bool,
}

/// State of a bulb. Unset fields are left unchanged by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BulbState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturation: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
}

impl BulbState {
    /// Switches the bulb on or off.
    pub fn power(on: bool) -> Self {
        Self {
            device_on: Some(on),
            ..Default::default()
        }
    }

    /// Sets the brightness only.
    pub fn brightness(brightness: u8) -> Self {
        Self {
            brightness: Some(brightness),
            ..Default::default()
        }
    }

    /// Applies a color, optionally switching the bulb on or off too.
    pub fn color(color: Color, device_on: Option<bool>) -> Self {
        Self {
            device_on,
            brightness: color.brightness,
            hue: color.hue,
            saturation: color.saturation,
            color_temp: color.color_temp,
        }
    }
}

/// Any state accepted by `set_device_info`.
///
/// A plug state never equals a bulb state, even when both only switch the
/// device on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum DeviceState {
    Plug(PlugState),
    Bulb(BulbState),
}

impl From<PlugState> for DeviceState {
    fn from(state: PlugState) -> Self {
        DeviceState::Plug(state)
    }
}

impl From<BulbState> for DeviceState {
    fn from(state: BulbState) -> Self {
        DeviceState::Bulb(state)
    }
}
