//! Bulb colors.
//!
//! Tapo bulbs take colors as hue/saturation/brightness or as a white color
//! temperature in Kelvin. [`Color`] converts RGB and hex notations into the
//! former; values are sent as-is and range checks are left to the device.

use crate::error::Error;

/// A bulb color as sent in `set_device_info`.
///
/// Equality is structural: two colors built from different notations are
/// equal when they resolve to the same fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    /// Hue in degrees, `0..360`.
    pub hue: Option<u16>,
    /// Saturation in percent, `0..=100`.
    pub saturation: Option<u8>,
    /// White color temperature in Kelvin; `0` switches the bulb to color mode.
    pub color_temp: Option<u16>,
    /// Brightness in percent, `0..=100`.
    pub brightness: Option<u8>,
}

impl Color {
    /// Converts an RGB triple to hue/saturation/brightness.
    ///
    /// ```
    /// use tapo_core::Color;
    ///
    /// let color = Color::from_rgb(52, 235, 164);
    /// assert_eq!(color.hue, Some(157));
    /// assert_eq!(color.saturation, Some(78));
    /// assert_eq!(color.brightness, Some(92));
    /// assert_eq!(color.color_temp, Some(0));
    /// ```
    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        let r = f64::from(red) / 255.0;
        let g = f64::from(green) / 255.0;
        let b = f64::from(blue) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

        Self {
            hue: Some((hue.round() as u16) % 360),
            saturation: Some(saturation.round() as u8),
            color_temp: Some(0),
            brightness: Some((max * 100.0).round() as u8),
        }
    }

    /// Parses comma-separated RGB text such as `"52, 235, 164"`.
    pub fn from_rgb_str(text: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "expected three comma-separated components, got {:?}",
                text
            )));
        };
        let component = |s: &str| {
            s.parse::<u8>()
                .map_err(|_| Error::InvalidInput(format!("invalid RGB component {:?}", s)))
        };
        Ok(Self::from_rgb(component(*r)?, component(*g)?, component(*b)?))
    }

    /// Parses a six-digit hex color, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex::decode(digits)
            .map_err(|_| Error::InvalidInput(format!("invalid hex color {:?}", hex)))?;
        let [r, g, b] = bytes.as_slice() else {
            return Err(Error::InvalidInput(format!(
                "hex color must have six digits, got {:?}",
                hex
            )));
        };
        Ok(Self::from_rgb(*r, *g, *b))
    }

    /// A white color temperature, optionally with a brightness.
    pub fn from_temperature(kelvin: u16, brightness: Option<u8>) -> Self {
        Self {
            hue: None,
            saturation: None,
            color_temp: Some(kelvin),
            brightness,
        }
    }
}

impl std::str::FromStr for Color {
    type Err = Error;

    /// Accepts hex (`#34eba4`) or RGB text (`52, 235, 164`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(',') {
            Self::from_rgb_str(s)
        } else {
            Self::from_hex(s)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_matches_rgb() {
        assert_eq!(
            Color::from_hex("34eba4").unwrap(),
            Color::from_rgb(52, 235, 164)
        );
        assert_eq!(
            Color::from_hex("#34EBA4").unwrap(),
            Color::from_rgb_str("52, 235, 164").unwrap()
        );
    }

    #[test]
    fn test_different_colors_differ() {
        assert_ne!(
            Color::from_hex("eb34ae").unwrap(),
            Color::from_rgb(52, 235, 164)
        );
    }

    #[test]
    fn test_primaries() {
        let red = Color::from_rgb(255, 0, 0);
        assert_eq!((red.hue, red.saturation, red.brightness), (Some(0), Some(100), Some(100)));
        let green = Color::from_rgb(0, 255, 0);
        assert_eq!(green.hue, Some(120));
        let blue = Color::from_rgb(0, 0, 255);
        assert_eq!(blue.hue, Some(240));
        let magenta = Color::from_rgb(255, 0, 255);
        assert_eq!(magenta.hue, Some(300));
    }

    #[test]
    fn test_gray_and_black() {
        let gray = Color::from_rgb(128, 128, 128);
        assert_eq!((gray.hue, gray.saturation, gray.brightness), (Some(0), Some(0), Some(50)));
        let black = Color::from_rgb(0, 0, 0);
        assert_eq!((black.saturation, black.brightness), (Some(0), Some(0)));
    }

    #[test]
    fn test_temperature() {
        let warm = Color::from_temperature(2700, Some(40));
        assert_eq!(warm.color_temp, Some(2700));
        assert_eq!(warm.brightness, Some(40));
        assert_eq!(warm.hue, None);
    }

    #[test]
    fn test_invalid_input() {
        assert!(Color::from_hex("34eb").is_err());
        assert!(Color::from_hex("zzzzzz").is_err());
        assert!(Color::from_rgb_str("1, 2").is_err());
        assert!(Color::from_rgb_str("1, 2, 300").is_err());
    }

    #[test]
    fn test_from_str_dispatch() {
        let hex: Color = "#34eba4".parse().unwrap();
        let rgb: Color = "52,235,164".parse().unwrap();
        assert_eq!(hex, rgb);
    }
}
