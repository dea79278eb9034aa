//! Typed results of device methods.
//!
//! Devices omit fields that do not apply to them (a plug has no `hue`), so
//! every field has a serde default.
//!
//! # Example
//!
//! ```
//! use tapo_core::response::DeviceInfo;
//!
//! let json = r#"{"device_id":"8022","model":"P110","device_on":true}"#;
//! let info: DeviceInfo = serde_json::from_str(json).unwrap();
//! assert_eq!(info.model, "P110");
//! assert!(info.device_on);
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Result of `get_device_info`.
///
/// `ssid` and `nickname` arrive base64-encoded; the engines decode them
/// before returning this struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub device_id: String,

    /// Firmware version, e.g. "1.1.0 Build 201016 Rel.175121".
    #[serde(default)]
    pub fw_ver: String,

    #[serde(default)]
    pub hw_ver: String,

    /// Device type, e.g. "SMART.TAPOPLUG".
    #[serde(default, rename = "type")]
    pub device_type: String,

    /// Model, e.g. "P110" or "L530".
    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub mac: String,

    #[serde(default)]
    pub hw_id: String,

    #[serde(default)]
    pub fw_id: String,

    #[serde(default)]
    pub oem_id: String,

    /// Supported white temperature range in Kelvin (bulbs only).
    #[serde(default)]
    pub color_temp_range: Option<Vec<u16>>,

    #[serde(default)]
    pub overheated: bool,

    /// IP address the device reports for itself.
    #[serde(default)]
    pub ip: String,

    /// Offset from UTC in minutes.
    #[serde(default)]
    pub time_diff: i32,

    /// WiFi network name.
    #[serde(default)]
    pub ssid: String,

    /// WiFi signal strength in dBm.
    #[serde(default)]
    pub rssi: i32,

    /// WiFi signal level, 0 (none) to 3 (strong).
    #[serde(default)]
    pub signal_level: i32,

    #[serde(default)]
    pub auto_off_status: Option<String>,

    /// Seconds until the auto-off timer fires.
    #[serde(default)]
    pub auto_off_remain_time: i64,

    #[serde(default)]
    pub latitude: i64,

    #[serde(default)]
    pub longitude: i64,

    #[serde(default)]
    pub has_set_location_info: bool,

    #[serde(default)]
    pub lang: String,

    #[serde(default)]
    pub avatar: String,

    #[serde(default)]
    pub region: String,

    #[serde(default)]
    pub specs: String,

    /// Name set in the Tapo app.
    #[serde(default)]
    pub nickname: String,

    /// Seconds since the device was switched on.
    #[serde(default)]
    pub on_time: f64,

    /// Whether the relay or lamp is on.
    #[serde(default)]
    pub device_on: bool,

    #[serde(default)]
    pub brightness: Option<u8>,

    #[serde(default)]
    pub hue: Option<u16>,

    #[serde(default)]
    pub saturation: Option<u8>,

    #[serde(default)]
    pub color_temp: Option<u16>,

    #[serde(default)]
    pub dynamic_light_effect_enable: Option<bool>,

    /// State applied when power returns after an outage.
    #[serde(default, rename = "default_states", alias = "default_state")]
    pub default_state: Option<DefaultState>,

    #[serde(default)]
    pub power_protection_status: Option<String>,

    #[serde(default)]
    pub overcurrent_status: Option<String>,
}

/// Power-on behavior of a device.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DefaultState {
    /// "last_states" or "custom".
    #[serde(default, rename = "type")]
    pub state_type: String,

    /// Device-specific state object.
    #[serde(default)]
    pub state: serde_json::Value,
}

/// Result of `get_energy_usage` (plugs with energy monitoring).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EnergyUsage {
    /// Current power draw in milliwatts.
    #[serde(default)]
    pub current_power: f64,

    /// Minutes on today.
    #[serde(default)]
    pub today_runtime: f64,

    /// Minutes on this month.
    #[serde(default)]
    pub month_runtime: f64,

    /// Watt-hours used today.
    #[serde(default)]
    pub today_energy: f64,

    /// Watt-hours used this month.
    #[serde(default)]
    pub month_energy: f64,

    /// Device local time, sent as `yyyy-MM-dd HH:mm:ss`.
    #[serde(default, with = "local_time")]
    pub local_time: Option<NaiveDateTime>,

    #[serde(default)]
    pub electricity_charge: Option<Vec<f64>>,
}

impl EnergyUsage {
    /// Returns the current power draw in watts.
    pub fn current_power_w(&self) -> f64 {
        self.current_power / 1000.0
    }
}

/// Result of `login_device`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceLogin {
    /// Bearer token for later requests.
    pub token: String,
}

/// Result of the SecurePassthrough `handshake`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HandshakeResult {
    /// Base64 RSA ciphertext of the session key and IV.
    pub key: String,
}

/// Result of `securePassthrough`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PassthroughResult {
    /// Base64 AES ciphertext of the inner response.
    pub response: String,
}

/// Serde adapter for the device's `yyyy-MM-dd HH:mm:ss` timestamps.
mod local_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_str(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => NaiveDateTime::parse_from_str(&text, FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_plug_info() {
        let json = r#"{
            "device_id": "80223B",
            "fw_ver": "1.1.0 Build 201016 Rel.175121",
            "hw_ver": "1.0",
            "type": "SMART.TAPOPLUG",
            "model": "P110",
            "mac": "00-00-00-00-00-00",
            "overheated": false,
            "ip": "192.168.1.20",
            "time_diff": 60,
            "ssid": "SG9tZQ==",
            "rssi": -45,
            "signal_level": 3,
            "nickname": "VGVzdA==",
            "on_time": 1234,
            "device_on": true,
            "default_states": {"type": "last_states", "state": {}},
            "power_protection_status": "normal"
        }"#;

        let info: DeviceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.device_type, "SMART.TAPOPLUG");
        assert_eq!(info.model, "P110");
        assert_eq!(info.rssi, -45);
        assert!(info.device_on);
        assert_eq!(info.brightness, None);
        assert_eq!(info.default_state.unwrap().state_type, "last_states");
        assert_eq!(info.power_protection_status.as_deref(), Some("normal"));
    }

    #[test]
    fn test_parse_bulb_info() {
        let json = r#"{
            "model": "L530",
            "device_on": true,
            "brightness": 80,
            "hue": 157,
            "saturation": 78,
            "color_temp": 0,
            "color_temp_range": [2500, 6500],
            "dynamic_light_effect_enable": false
        }"#;

        let info: DeviceInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.brightness, Some(80));
        assert_eq!(info.hue, Some(157));
        assert_eq!(info.color_temp_range, Some(vec![2500, 6500]));
    }

    #[test]
    fn test_parse_empty_info() {
        let info: DeviceInfo = serde_json::from_str("{}").unwrap();
        assert_eq!(info, DeviceInfo::default());
    }

    #[test]
    fn test_parse_energy_usage() {
        let json = r#"{
            "today_runtime": 306,
            "month_runtime": 4520,
            "today_energy": 1203,
            "month_energy": 17542,
            "local_time": "2024-03-09 14:27:31",
            "electricity_charge": [0, 0, 0],
            "current_power": 12345
        }"#;

        let usage: EnergyUsage = serde_json::from_str(json).unwrap();
        assert_eq!(usage.today_runtime, 306.0);
        assert_eq!(usage.current_power_w(), 12.345);
        let time = usage.local_time.unwrap();
        assert_eq!((time.year(), time.month(), time.day()), (2024, 3, 9));
        assert_eq!((time.hour(), time.minute(), time.second()), (14, 27, 31));
    }

    #[test]
    fn test_energy_local_time_round_trip() {
        let usage: EnergyUsage =
            serde_json::from_str(r#"{"local_time":"2024-01-02 03:04:05"}"#).unwrap();
        let json = serde_json::to_value(&usage).unwrap();
        assert_eq!(json["local_time"], "2024-01-02 03:04:05");
    }

    #[test]
    fn test_energy_bad_local_time() {
        assert!(serde_json::from_str::<EnergyUsage>(r#"{"local_time":"yesterday"}"#).is_err());
    }
}
