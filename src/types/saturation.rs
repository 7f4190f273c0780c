//! Color saturation.

use serde::{Deserialize, Serialize};

/// Saturation from 0 (white) to 255 (fully colored).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i64", into = "u8")]
pub struct Saturation {
    pub(crate) value: u8,
}

impl Saturation {
    const MIN: i64 = 0;
    const MAX: i64 = 255;

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a saturation, clamping `value` into 0-255.
    pub fn clamped(value: i64) -> Self {
        Saturation {
            value: super::clamp(value, Self::MIN, Self::MAX) as u8,
        }
    }
}

impl From<i64> for Saturation {
    fn from(value: i64) -> Self {
        Saturation::clamped(value)
    }
}

impl From<Saturation> for u8 {
    fn from(value: Saturation) -> Self {
        value.value
    }
}
