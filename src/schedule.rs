//! One-shot schedules stored on the bridge.

use chrono::NaiveDateTime;
use serde_json::{Value, json};

use crate::device::Device;
use crate::errors::Error;
use crate::payload::Payload;
use crate::transport::Method;

type Result<T> = std::result::Result<T, Error>;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The request the bridge replays when a schedule fires.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleCommand {
    /// Path below the credential, e.g. `/groups/0/action`.
    pub address: String,
    pub method: Method,
    pub body: Value,
}

impl ScheduleCommand {
    pub fn new(address: impl Into<String>, method: Method, body: Value) -> Self {
        ScheduleCommand {
            address: address.into(),
            method,
            body,
        }
    }

    /// Apply `payload` to a light's state or a group's action.
    pub fn set_state<D: Device>(device: &D, payload: &Payload) -> Result<Self> {
        Ok(Self::new(device.state_path(), Method::Put, payload.to_value()?))
    }
}

/// A command the bridge runs once at a local time.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use hue_bridge_rs::{Method, Schedule, ScheduleCommand};
/// use serde_json::json;
///
/// let at = NaiveDate::from_ymd_opt(2026, 10, 20)
///     .unwrap()
///     .and_hms_opt(7, 0, 0)
///     .unwrap();
/// let command = ScheduleCommand::new("/groups/0/action", Method::Put, json!({"on": true}));
/// let schedule = Schedule::new("Wake up", at, command).description("weekday alarm");
/// assert_eq!(schedule.time_string(), "2026-10-20T07:00:00");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub name: String,
    pub description: Option<String>,
    pub time: NaiveDateTime,
    pub command: ScheduleCommand,
}

impl Schedule {
    pub fn new(name: &str, time: NaiveDateTime, command: ScheduleCommand) -> Self {
        Schedule {
            name: name.to_string(),
            description: None,
            time,
            command,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// The firing time as the bridge expects it.
    pub fn time_string(&self) -> String {
        self.time.format(TIME_FORMAT).to_string()
    }

    /// Request body for `POST /api/<credential>/schedules`; `prefix` is
    /// `/api/<credential>` and is prepended to the command address.
    pub(crate) fn to_body(&self, prefix: &str) -> Value {
        let mut body = json!({
            "name": self.name,
            "command": {
                "address": format!("{prefix}{}", self.command.address),
                "method": self.command.method.to_string(),
                "body": self.command.body,
            },
            "time": self.time_string(),
        });
        if let Some(description) = &self.description {
            body["description"] = Value::from(description.as_str());
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Light;
    use crate::types::Brightness;
    use chrono::NaiveDate;

    fn morning() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 20)
            .unwrap()
            .and_hms_opt(6, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_body_for_light_state() {
        let mut payload = Payload::new();
        payload.on(true);
        payload.brightness(Brightness::clamped(254));
        let command = ScheduleCommand::set_state(&Light::with_id(4), &payload).unwrap();

        let body = Schedule::new("Sunrise", morning(), command).to_body("/api/user");
        assert_eq!(
            body,
            json!({
                "name": "Sunrise",
                "command": {
                    "address": "/api/user/lights/4/state",
                    "method": "PUT",
                    "body": {"on": true, "bri": 254}
                },
                "time": "2026-10-20T06:30:05"
            })
        );
    }

    #[test]
    fn test_description_is_optional() {
        let command = ScheduleCommand::new("/groups/0/action", Method::Put, json!({"on": false}));
        let schedule = Schedule::new("Off", morning(), command);
        assert!(schedule.to_body("/api/u").get("description").is_none());

        let body = schedule.description("lights out").to_body("/api/u");
        assert_eq!(body["description"], json!("lights out"));
    }
}
