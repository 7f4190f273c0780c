//! Transition time between states.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a lamp takes to fade to a new state, in multiples of 100ms.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "i64", into = "u16")]
pub struct TransitionTime {
    pub(crate) value: u16,
}

impl Default for TransitionTime {
    /// The bridge's own default of 400ms.
    fn default() -> Self {
        TransitionTime { value: 4 }
    }
}

impl TransitionTime {
    const MIN: i64 = 0;
    const MAX: i64 = 65535;

    pub fn value(&self) -> u16 {
        self.value
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.value) * 100)
    }

    /// Create a transition time, clamping `value` into 0-65535.
    pub fn clamped(value: i64) -> Self {
        TransitionTime {
            value: super::clamp(value, Self::MIN, Self::MAX) as u16,
        }
    }

    /// Round a duration to the nearest 100ms step.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use hue_bridge_rs::TransitionTime;
    ///
    /// assert_eq!(TransitionTime::from_duration(Duration::from_millis(1240)).value(), 12);
    /// ```
    pub fn from_duration(duration: Duration) -> Self {
        let steps = (duration.as_millis() + 50) / 100;
        Self::clamped(i64::try_from(steps).unwrap_or(i64::MAX))
    }
}

impl From<i64> for TransitionTime {
    fn from(value: i64) -> Self {
        TransitionTime::clamped(value)
    }
}

impl From<TransitionTime> for u16 {
    fn from(value: TransitionTime) -> Self {
        value.value
    }
}
