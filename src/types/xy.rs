//! CIE 1931 chromaticity coordinates.

use serde::{Deserialize, Serialize};

/// A color as an `(x, y)` point in the CIE 1931 color space.
///
/// Both coordinates are clamped into `[0, 1]`. On the wire this is a
/// two-element array.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Xy {
    x: f64,
    y: f64,
}

impl Xy {
    /// Create a point, clamping each coordinate into `[0, 1]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hue_bridge_rs::Xy;
    ///
    /// let xy = Xy::clamped(1.5, -0.2);
    /// assert_eq!(xy.x(), 1.0);
    /// assert_eq!(xy.y(), 0.0);
    /// ```
    pub fn clamped(x: f64, y: f64) -> Self {
        Xy {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl From<[f64; 2]> for Xy {
    fn from([x, y]: [f64; 2]) -> Self {
        Xy::clamped(x, y)
    }
}

impl From<Xy> for [f64; 2] {
    fn from(xy: Xy) -> Self {
        [xy.x, xy.y]
    }
}
