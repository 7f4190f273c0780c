//! Brightness control.

use serde::{Deserialize, Serialize};

/// Brightness level from 0 to 255.
///
/// Out-of-range input is clamped rather than rejected.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i64", into = "u8")]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    const MIN: i64 = 0;
    const MAX: i64 = 255;

    /// Full brightness.
    pub fn new() -> Self {
        Brightness { value: u8::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a brightness, clamping `value` into 0-255.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Brightness;
    ///
    /// assert_eq!(Brightness::clamped(-5).value(), 0);
    /// assert_eq!(Brightness::clamped(999).value(), 255);
    /// assert_eq!(Brightness::clamped(128).value(), 128);
    /// ```
    pub fn clamped(value: i64) -> Self {
        Brightness {
            value: super::clamp(value, Self::MIN, Self::MAX) as u8,
        }
    }
}

impl From<i64> for Brightness {
    fn from(value: i64) -> Self {
        Brightness::clamped(value)
    }
}

impl From<Brightness> for u8 {
    fn from(value: Brightness) -> Self {
        value.value
    }
}
