//! Hue angle on the bridge's 16-bit color wheel.

use serde::{Deserialize, Serialize};

/// Hue from 0 to 65535, where 65535 wraps back around to red.
///
/// One degree on the color wheel is roughly 182 units.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i64", into = "u16")]
pub struct Hue {
    pub(crate) value: u16,
}

impl Hue {
    const MIN: i64 = 0;
    const MAX: i64 = 65535;

    pub fn value(&self) -> u16 {
        self.value
    }

    /// Create a hue, clamping `value` into 0-65535.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Hue;
    ///
    /// assert_eq!(Hue::clamped(70000).value(), 65535);
    /// assert_eq!(Hue::clamped(-1).value(), 0);
    /// ```
    pub fn clamped(value: i64) -> Self {
        Hue {
            value: super::clamp(value, Self::MIN, Self::MAX) as u16,
        }
    }

    /// Create a hue from an angle in degrees.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Hue;
    ///
    /// assert_eq!(Hue::from_degrees(0.0).value(), 0);
    /// assert_eq!(Hue::from_degrees(360.0).value(), 65535);
    /// ```
    pub fn from_degrees(degrees: f64) -> Self {
        Self::clamped((degrees / 360.0 * Self::MAX as f64).round() as i64)
    }
}

impl From<i64> for Hue {
    fn from(value: i64) -> Self {
        Hue::clamped(value)
    }
}

impl From<Hue> for u16 {
    fn from(value: Hue) -> Self {
        value.value
    }
}
