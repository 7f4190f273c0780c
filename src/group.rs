//! Light groups.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device::Device;
use crate::directory::{Directory, Lookup, Registry};
use crate::errors::Error;
use crate::payload::WireState;
use crate::queue::DeviceClass;
use crate::state::DeviceState;

type Result<T> = std::result::Result<T, Error>;

/// A set of lights the bridge can address with one command.
///
/// Group writes go to the group's `action` and are throttled far harder than
/// light writes, roughly one per second.
///
/// # Example
///
/// ```
/// use hue_bridge_rs::{Device, Group};
/// use serde_json::json;
///
/// let mut group = Group::with_id(1);
/// group
///     .apply_wire_fields(&json!({
///         "name": "Living room",
///         "lights": ["1", "2", "4"],
///         "type": "LightGroup",
///         "action": {"on": false, "bri": 120}
///     }))
///     .unwrap();
///
/// assert_eq!(group.light_ids().iter().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
/// assert!(!group.state().on());
/// ```
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    id: u32,
    name: String,
    #[serde(default)]
    light_ids: BTreeSet<u32>,
    #[serde(rename = "type")]
    group_type: Option<String>,
    #[serde(default)]
    state: DeviceState,
}

#[derive(Deserialize)]
struct GroupWire {
    name: Option<String>,
    lights: Option<Vec<String>>,
    #[serde(rename = "type")]
    group_type: Option<String>,
    action: Option<Value>,
}

impl Group {
    pub(crate) fn new(id: u32, name: &str, light_ids: BTreeSet<u32>) -> Self {
        Group {
            name: name.to_string(),
            light_ids,
            ..Group::with_id(id)
        }
    }

    /// Ids of the member lights.
    pub fn light_ids(&self) -> &BTreeSet<u32> {
        &self.light_ids
    }

    pub fn contains(&self, light_id: u32) -> bool {
        self.light_ids.contains(&light_id)
    }

    /// The bridge's group category, e.g. `LightGroup` or `Room`.
    pub fn group_type(&self) -> Option<&str> {
        self.group_type.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn set_light_ids(&mut self, light_ids: BTreeSet<u32>) {
        self.light_ids = light_ids;
    }
}

/// The `name`/`lights` body used to create or update a group.
pub(crate) fn membership_body(name: &str, light_ids: &BTreeSet<u32>) -> Value {
    let lights: Vec<Value> = light_ids
        .iter()
        .map(|id| Value::from(id.to_string()))
        .collect();
    let mut body = Map::new();
    body.insert("name".into(), Value::from(name));
    body.insert("lights".into(), Value::Array(lights));
    Value::Object(body)
}

pub(crate) fn parse_light_ids(ids: &[String]) -> Result<BTreeSet<u32>> {
    ids.iter()
        .map(|id| {
            id.parse()
                .map_err(|_| Error::UnexpectedResponse(format!("invalid light id {id:?}")))
        })
        .collect()
}

impl Device for Group {
    const CLASS: DeviceClass = DeviceClass::Group;

    fn with_id(id: u32) -> Self {
        Group {
            id,
            name: String::new(),
            light_ids: BTreeSet::new(),
            group_type: None,
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
        format!("/groups/{}", self.id)
    }

    fn state_path(&self) -> String {
        format!("/groups/{}/action", self.id)
    }

    fn to_wire_fields(&self) -> Result<Map<String, Value>> {
        let mut action = match self.state.full_payload().to_value()? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(mode) = self.state.color_mode() {
            action.insert("colormode".into(), Value::from(mode.to_string()));
        }

        let Value::Object(mut fields) = membership_body(&self.name, &self.light_ids) else {
            return Err(Error::UnexpectedResponse("group body is not an object".into()));
        };
        if let Some(group_type) = &self.group_type {
            fields.insert("type".into(), Value::from(group_type.as_str()));
        }
        fields.insert("action".into(), Value::Object(action));
        Ok(fields)
    }

    fn apply_wire_fields(&mut self, fields: &Value) -> Result<()> {
        let wire = GroupWire::deserialize(fields).map_err(Error::JsonLoad)?;
        let action = match &wire.action {
            Some(action) => WireState::from_value(action)?,
            None => WireState::default(),
        };
        let light_ids = wire.lights.as_deref().map(parse_light_ids).transpose()?;

        if let Some(name) = wire.name {
            self.name = name;
        }
        if let Some(light_ids) = light_ids {
            self.light_ids = light_ids;
        }
        if wire.group_type.is_some() {
            self.group_type = wire.group_type;
        }
        self.state.apply_server_state(&action);
        Ok(())
    }

    fn registry(directory: &Directory) -> &Registry<Self> {
        directory.groups()
    }

    fn not_found(lookup: Lookup) -> Error {
        Error::GroupNotFound(lookup)
    }
}
