//! The settable fields shared by lights and groups.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::types::{Alert, Brightness, ColorTemperature, Hue, Saturation, TransitionTime, Xy};

/// A locally settable, diff-tracked attribute.
///
/// The string form is the bridge API's wire name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
pub enum Field {
    #[strum(serialize = "on")]
    On,
    #[strum(serialize = "bri")]
    Brightness,
    #[strum(serialize = "hue")]
    Hue,
    #[strum(serialize = "sat")]
    Saturation,
    #[strum(serialize = "xy")]
    Xy,
    #[strum(serialize = "ct")]
    ColorTemperature,
    #[strum(serialize = "transitiontime")]
    TransitionTime,
    #[strum(serialize = "alert")]
    Alert,
}

impl Field {
    /// The bridge API name of this field.
    pub fn wire_name(&self) -> &'static str {
        self.into()
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// A small set of [`Field`]s.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet(u8);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every settable field.
    pub fn all() -> Self {
        Field::iter().collect()
    }

    pub fn insert(&mut self, field: Field) {
        self.0 |= field.bit();
    }

    pub fn remove(&mut self, field: Field) {
        self.0 &= !field.bit();
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the contained fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        Field::iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Field> for FieldSet {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut set = FieldSet::new();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl From<Field> for FieldSet {
    fn from(field: Field) -> Self {
        let mut set = FieldSet::new();
        set.insert(field);
        set
    }
}

/// A value for one settable field, as passed to `set`.
///
/// Numeric variants take wide integers so that out-of-range input can be
/// clamped instead of failing to convert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    On(bool),
    Brightness(i64),
    Hue(i64),
    Saturation(i64),
    Xy(f64, f64),
    ColorTemperature(i64),
    TransitionTime(i64),
    Alert(Alert),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            FieldValue::On(_) => Field::On,
            FieldValue::Brightness(_) => Field::Brightness,
            FieldValue::Hue(_) => Field::Hue,
            FieldValue::Saturation(_) => Field::Saturation,
            FieldValue::Xy(_, _) => Field::Xy,
            FieldValue::ColorTemperature(_) => Field::ColorTemperature,
            FieldValue::TransitionTime(_) => Field::TransitionTime,
            FieldValue::Alert(_) => Field::Alert,
        }
    }
}

impl From<Brightness> for FieldValue {
    fn from(value: Brightness) -> Self {
        FieldValue::Brightness(i64::from(value.value()))
    }
}

impl From<Hue> for FieldValue {
    fn from(value: Hue) -> Self {
        FieldValue::Hue(i64::from(value.value()))
    }
}

impl From<Saturation> for FieldValue {
    fn from(value: Saturation) -> Self {
        FieldValue::Saturation(i64::from(value.value()))
    }
}

impl From<Xy> for FieldValue {
    fn from(value: Xy) -> Self {
        FieldValue::Xy(value.x(), value.y())
    }
}

impl From<ColorTemperature> for FieldValue {
    fn from(value: ColorTemperature) -> Self {
        FieldValue::ColorTemperature(i64::from(value.mired()))
    }
}

impl From<TransitionTime> for FieldValue {
    fn from(value: TransitionTime) -> Self {
        FieldValue::TransitionTime(i64::from(value.value()))
    }
}

impl From<Alert> for FieldValue {
    fn from(value: Alert) -> Self {
        FieldValue::Alert(value)
    }
}
