//! Value types for light control parameters.

mod alert;
mod brightness;
mod color_mode;
mod hue;
mod mired;
mod saturation;
mod transition;
mod xy;

pub use alert::Alert;
pub use brightness::Brightness;
pub use color_mode::ColorMode;
pub use hue::Hue;
pub use mired::ColorTemperature;
pub use saturation::Saturation;
pub use transition::TransitionTime;
pub use xy::Xy;

fn clamp(value: i64, min: i64, max: i64) -> i64 {
    value.clamp(min, max)
}
