//! Client options and the bridge's own configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::queue::DeviceClass;

/// Tuning for a [`crate::Bridge`] client.
///
/// Deserializable from any serde format; missing keys take the defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hue_bridge_rs::BridgeOptions;
///
/// let options: BridgeOptions = serde_json::from_str(r#"{"group_rate": 0.5}"#).unwrap();
/// assert_eq!(options.light_rate, 10.0);
/// assert_eq!(options.group_rate, 0.5);
/// assert_eq!(options.request_timeout, Duration::from_secs(5));
/// ```
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// Maximum light commands per second.
    pub light_rate: f64,
    /// Maximum group commands per second.
    pub group_rate: f64,
    /// How long a single request may take before it fails.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    /// Number of requests and responses kept in the history.
    pub history_size: usize,
    /// Initial `hold_updates` for devices created by a bridge read.
    pub hold_updates: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions {
            light_rate: 10.0,
            group_rate: 1.0,
            request_timeout: Duration::from_secs(5),
            history_size: 100,
            hold_updates: true,
        }
    }
}

impl BridgeOptions {
    const MIN_RATE: f64 = 0.01;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn light_rate(mut self, per_second: f64) -> Self {
        self.light_rate = per_second;
        self
    }

    pub fn group_rate(mut self, per_second: f64) -> Self {
        self.group_rate = per_second;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    pub fn hold_updates(mut self, hold: bool) -> Self {
        self.hold_updates = hold;
        self
    }

    /// Minimum spacing between two dispatches of `class`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use hue_bridge_rs::{BridgeOptions, DeviceClass};
    ///
    /// let options = BridgeOptions::default();
    /// assert_eq!(options.interval(DeviceClass::Light), Duration::from_millis(100));
    /// assert_eq!(options.interval(DeviceClass::Group), Duration::from_secs(1));
    /// ```
    pub fn interval(&self, class: DeviceClass) -> Duration {
        let rate = match class {
            DeviceClass::Light => self.light_rate,
            DeviceClass::Group => self.group_rate,
        };
        let rate = if rate.is_finite() {
            rate.max(Self::MIN_RATE)
        } else {
            Self::MIN_RATE
        };
        Duration::from_secs_f64(1.0 / rate)
    }
}

/// The `config` section of the bridge's full state.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub swversion: Option<String>,
    #[serde(default)]
    pub apiversion: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ipaddress: Option<String>,
    #[serde(default)]
    pub modelid: Option<String>,
    #[serde(default)]
    pub bridgeid: Option<String>,
}
