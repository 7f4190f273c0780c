//! Active color representation.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Which color field the lamp is currently following.
///
/// This is never set directly: it follows whichever of xy, color
/// temperature, or hue/saturation was written last.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColorMode {
    Xy,
    Ct,
    Hs,
}
