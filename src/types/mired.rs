//! Color temperature control.

use serde::{Deserialize, Serialize};

/// Color temperature in mireds, with valid values from 154 to 500.
///
/// Mireds are the reciprocal of Kelvin scaled by one million, so lower values
/// are cooler:
/// - 154: ~6500K, daylight
/// - 370: ~2700K, warm white
/// - 500: 2000K, candle-like
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i64", into = "u16")]
pub struct ColorTemperature {
    pub(crate) mired: u16,
}

impl Default for ColorTemperature {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorTemperature {
    const MIN: i64 = 154;
    const MAX: i64 = 500;

    /// The coolest supported temperature (154 mireds).
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::ColorTemperature;
    ///
    /// assert_eq!(ColorTemperature::new().mired(), 154);
    /// ```
    pub fn new() -> Self {
        ColorTemperature {
            mired: Self::MIN as u16,
        }
    }

    pub fn mired(&self) -> u16 {
        self.mired
    }

    /// Approximate temperature in Kelvin.
    pub fn kelvin(&self) -> u32 {
        1_000_000 / u32::from(self.mired.max(1))
    }

    /// Create a color temperature, clamping `mired` into 154-500.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::ColorTemperature;
    ///
    /// assert_eq!(ColorTemperature::clamped(100).mired(), 154);
    /// assert_eq!(ColorTemperature::clamped(370).mired(), 370);
    /// assert_eq!(ColorTemperature::clamped(9000).mired(), 500);
    /// ```
    pub fn clamped(mired: i64) -> Self {
        ColorTemperature {
            mired: super::clamp(mired, Self::MIN, Self::MAX) as u16,
        }
    }

    /// Create a color temperature from Kelvin, clamped to the mired range.
    pub fn from_kelvin(kelvin: u32) -> Self {
        Self::clamped(1_000_000 / i64::from(kelvin.max(1)))
    }
}

impl From<i64> for ColorTemperature {
    fn from(value: i64) -> Self {
        ColorTemperature::clamped(value)
    }
}

impl From<ColorTemperature> for u16 {
    fn from(value: ColorTemperature) -> Self {
        value.mired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_clamps() {
        let hot: ColorTemperature = serde_json::from_str("9000").unwrap();
        assert_eq!(hot.mired(), 500);

        let zero: ColorTemperature = serde_json::from_str("0").unwrap();
        assert_eq!(zero.mired(), 154);
        assert_eq!(zero.kelvin(), 6493);

        assert_eq!(serde_json::to_string(&hot).unwrap(), "500");
    }
}
