//! Wire payloads exchanged with the bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;
use crate::field::{Field, FieldSet};
use crate::types::{
    Alert, Brightness, ColorMode, ColorTemperature, Hue, Saturation, TransitionTime, Xy,
};

type Result<T> = std::result::Result<T, Error>;

/// A state change to send to a light or group.
///
/// Only the fields that are set are serialized, using the bridge's wire
/// names. Payloads are normally built by the write path from a device's dirty
/// fields, but can be assembled by hand for schedules.
///
/// # Examples
///
/// ```
/// use hue_bridge_rs::{Brightness, Payload};
///
/// let mut payload = Payload::new();
/// assert!(payload.is_empty());
///
/// payload.on(true);
/// payload.brightness(Brightness::clamped(400));
/// assert_eq!(
///     serde_json::to_string(&payload).unwrap(),
///     r#"{"on":true,"bri":255}"#
/// );
/// ```
#[serde_with::skip_serializing_none]
#[derive(Default, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Payload {
    pub(crate) on: Option<bool>,
    #[serde(rename = "bri")]
    pub(crate) brightness: Option<Brightness>,
    pub(crate) hue: Option<Hue>,
    #[serde(rename = "sat")]
    pub(crate) saturation: Option<Saturation>,
    pub(crate) xy: Option<Xy>,
    #[serde(rename = "ct")]
    pub(crate) color_temperature: Option<ColorTemperature>,
    #[serde(rename = "transitiontime")]
    pub(crate) transition_time: Option<TransitionTime>,
    pub(crate) alert: Option<Alert>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, on: bool) {
        self.on = Some(on);
    }

    pub fn brightness(&mut self, brightness: Brightness) {
        self.brightness = Some(brightness);
    }

    pub fn hue(&mut self, hue: Hue) {
        self.hue = Some(hue);
    }

    pub fn saturation(&mut self, saturation: Saturation) {
        self.saturation = Some(saturation);
    }

    pub fn xy(&mut self, xy: Xy) {
        self.xy = Some(xy);
    }

    pub fn color_temperature(&mut self, ct: ColorTemperature) {
        self.color_temperature = Some(ct);
    }

    pub fn transition_time(&mut self, time: TransitionTime) {
        self.transition_time = Some(time);
    }

    pub fn alert(&mut self, alert: Alert) {
        self.alert = Some(alert);
    }

    /// The set of fields present in this payload.
    pub fn fields(&self) -> FieldSet {
        let present = [
            (Field::On, self.on.is_some()),
            (Field::Brightness, self.brightness.is_some()),
            (Field::Hue, self.hue.is_some()),
            (Field::Saturation, self.saturation.is_some()),
            (Field::Xy, self.xy.is_some()),
            (Field::ColorTemperature, self.color_temperature.is_some()),
            (Field::TransitionTime, self.transition_time.is_some()),
            (Field::Alert, self.alert.is_some()),
        ];
        present
            .into_iter()
            .filter_map(|(field, set)| set.then_some(field))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(Error::JsonDump)
    }
}

/// The `state` (light) or `action` (group) object as reported by the bridge.
///
/// Numbers are read wide and clamped on the way in so a misbehaving bridge
/// cannot put a device into an out-of-range state.
#[derive(Default, Debug, Deserialize, Clone)]
pub(crate) struct WireState {
    pub on: Option<bool>,
    pub bri: Option<i64>,
    pub hue: Option<i64>,
    pub sat: Option<i64>,
    pub xy: Option<[f64; 2]>,
    pub ct: Option<i64>,
    pub transitiontime: Option<i64>,
    pub alert: Option<String>,
    pub colormode: Option<String>,
    pub reachable: Option<bool>,
}

impl WireState {
    pub fn from_value(value: &Value) -> Result<Self> {
        WireState::deserialize(value).map_err(Error::JsonLoad)
    }

    pub fn color_mode(&self) -> Option<ColorMode> {
        self.colormode.as_deref().and_then(|m| m.parse().ok())
    }

    pub fn alert(&self) -> Option<Alert> {
        self.alert
            .as_deref()
            .map(|a| a.parse().unwrap_or_default())
    }
}
