//! Individual lights.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::Device;
use crate::directory::{Directory, Lookup, Registry};
use crate::errors::Error;
use crate::payload::WireState;
use crate::queue::DeviceClass;
use crate::state::DeviceState;

type Result<T> = std::result::Result<T, Error>;

/// A single lamp known to the bridge.
///
/// Everything except the settable state is reported by the bridge and read-only
/// here. Changes go through a [`crate::LightHandle`].
///
/// # Example
///
/// ```
/// use hue_bridge_rs::{Device, Light};
/// use serde_json::json;
///
/// let mut light = Light::with_id(1);
/// light
///     .apply_wire_fields(&json!({
///         "name": "Desk",
///         "type": "Extended color light",
///         "state": {"on": true, "bri": 200, "reachable": true}
///     }))
///     .unwrap();
///
/// assert_eq!(light.name(), "Desk");
/// assert_eq!(light.state().brightness().value(), 200);
/// assert_eq!(light.reachable(), Some(true));
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Light {
    id: u32,
    name: String,
    reachable: Option<bool>,
    swversion: Option<String>,
    modelid: Option<String>,
    #[serde(rename = "type")]
    light_type: Option<String>,
    #[serde(default)]
    state: DeviceState,
}

#[derive(Deserialize)]
struct LightWire {
    name: Option<String>,
    #[serde(rename = "type")]
    light_type: Option<String>,
    modelid: Option<String>,
    swversion: Option<String>,
    state: Option<Value>,
}

impl Light {
    pub fn reachable(&self) -> Option<bool> {
        self.reachable
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.swversion.as_deref()
    }

    pub fn model_id(&self) -> Option<&str> {
        self.modelid.as_deref()
    }

    /// The bridge's product category, e.g. `Extended color light`.
    pub fn light_type(&self) -> Option<&str> {
        self.light_type.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }
}

impl Device for Light {
    const CLASS: DeviceClass = DeviceClass::Light;

    fn with_id(id: u32) -> Self {
        Light {
            id,
            name: String::new(),
            reachable: None,
            swversion: None,
            modelid: None,
            light_type: None,
            state: DeviceState::new(),
        }
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> &DeviceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn resource_path(&self) -> String {
        format!("/lights/{}", self.id)
    }

    fn state_path(&self) -> String {
        format!("/lights/{}/state", self.id)
    }

    fn to_wire_fields(&self) -> Result<Map<String, Value>> {
        let mut state = match self.state.full_payload().to_value()? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(mode) = self.state.color_mode() {
            state.insert("colormode".into(), Value::from(mode.to_string()));
        }
        if let Some(reachable) = self.reachable {
            state.insert("reachable".into(), Value::from(reachable));
        }

        let mut fields = Map::new();
        fields.insert("name".into(), Value::from(self.name.as_str()));
        let optional = [
            ("type", &self.light_type),
            ("modelid", &self.modelid),
            ("swversion", &self.swversion),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                fields.insert(key.into(), Value::from(value.as_str()));
            }
        }
        fields.insert("state".into(), Value::Object(state));
        Ok(fields)
    }

    fn apply_wire_fields(&mut self, fields: &Value) -> Result<()> {
        let wire = LightWire::deserialize(fields).map_err(Error::JsonLoad)?;
        let state = match &wire.state {
            Some(state) => WireState::from_value(state)?,
            None => WireState::default(),
        };

        if let Some(name) = wire.name {
            self.name = name;
        }
        if wire.light_type.is_some() {
            self.light_type = wire.light_type;
        }
        if wire.modelid.is_some() {
            self.modelid = wire.modelid;
        }
        if wire.swversion.is_some() {
            self.swversion = wire.swversion;
        }
        if state.reachable.is_some() {
            self.reachable = state.reachable;
        }
        self.state.apply_server_state(&state);
        Ok(())
    }

    fn registry(directory: &Directory) -> &Registry<Self> {
        directory.lights()
    }

    fn not_found(lookup: Lookup) -> Error {
        Error::LightNotFound(lookup)
    }
}
