//! Bridge reply parsing.
//!
//! Every mutating request is answered with a JSON array of single-key
//! objects, one per affected resource address:
//!
//! ```json
//! [
//!   {"success": {"/lights/1/state/bri": 200}},
//!   {"error": {"type": 7, "address": "/lights/1/state/hue", "description": "invalid value"}}
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::Error;
use crate::field::{Field, FieldSet};

type Result<T> = std::result::Result<T, Error>;

/// An error object reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("bridge error {kind} at {address}: {description}")]
pub struct ApiError {
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

impl ApiError {
    pub const UNAUTHORIZED_USER: u16 = 1;
    pub const RESOURCE_NOT_AVAILABLE: u16 = 3;
    pub const INVALID_VALUE: u16 = 7;
    pub const LINK_BUTTON_NOT_PRESSED: u16 = 101;

    pub fn is_unauthorized(&self) -> bool {
        self.kind == Self::UNAUTHORIZED_USER
    }

    pub fn is_link_button_not_pressed(&self) -> bool {
        self.kind == Self::LINK_BUTTON_NOT_PRESSED
    }

    /// The settable field named by the last segment of the address, if any.
    pub(crate) fn field(&self) -> Option<Field> {
        field_of_address(&self.address)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReplyItem {
    Success(Map<String, Value>),
    Error(ApiError),
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawItem {
    Success(Value),
    Error(ApiError),
}

/// Split a reply array into success and error items.
pub(crate) fn parse_items(value: &Value) -> Result<Vec<ReplyItem>> {
    let Some(items) = value.as_array() else {
        return Err(Error::UnexpectedResponse(format!(
            "expected a reply list, got {value}"
        )));
    };

    items
        .iter()
        .map(|item| {
            let raw = RawItem::deserialize(item).map_err(Error::JsonLoad)?;
            Ok(match raw {
                RawItem::Success(Value::Object(map)) => ReplyItem::Success(map),
                RawItem::Success(other) => {
                    ReplyItem::Success(Map::from_iter([(String::new(), other)]))
                }
                RawItem::Error(err) => ReplyItem::Error(err),
            })
        })
        .collect()
}

/// Fail with the first error if `value` is an error list.
///
/// Resource reads answer with a plain object on success and an error list
/// otherwise.
pub(crate) fn check_error(value: &Value) -> Result<()> {
    if !value.is_array() {
        return Ok(());
    }
    for item in parse_items(value)? {
        if let ReplyItem::Error(err) = item {
            return Err(Error::Api(err));
        }
    }
    Ok(())
}

/// Return the value of the first success entry carrying `key`.
pub(crate) fn success_value(items: &[ReplyItem], key: &str) -> Option<Value> {
    items.iter().find_map(|item| match item {
        ReplyItem::Success(map) => map.get(key).cloned(),
        ReplyItem::Error(_) => None,
    })
}

/// Return the first error, if the reply contained any.
pub(crate) fn first_error(items: &[ReplyItem]) -> Option<&ApiError> {
    items.iter().find_map(|item| match item {
        ReplyItem::Error(err) => Some(err),
        ReplyItem::Success(_) => None,
    })
}

/// Per-field outcome of a state write.
///
/// Fields the bridge did not mention as errors count as applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteReply {
    rejected: Vec<(Field, ApiError)>,
}

impl WriteReply {
    /// Parse the reply to a write of the fields in `sent`.
    ///
    /// An error that does not name one of the sent fields (an unknown
    /// resource, a bad credential) means nothing was applied and fails the
    /// whole write.
    pub(crate) fn parse(value: &Value, sent: FieldSet) -> Result<Self> {
        let mut reply = WriteReply::default();
        for item in parse_items(value)? {
            let ReplyItem::Error(err) = item else {
                continue;
            };
            match err.field() {
                Some(field) if sent.contains(field) => reply.rejected.push((field, err)),
                _ => return Err(Error::Api(err)),
            }
        }
        Ok(reply)
    }

    /// A reply in which every field was applied.
    pub fn accepted() -> Self {
        WriteReply::default()
    }

    pub fn rejected(&self) -> &[(Field, ApiError)] {
        &self.rejected
    }

    pub fn rejected_fields(&self) -> FieldSet {
        self.rejected.iter().map(|(field, _)| *field).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn reject(&mut self, field: Field, err: ApiError) {
        self.rejected.push((field, err));
    }

    pub(crate) fn into_errors(self) -> Vec<ApiError> {
        self.rejected.into_iter().map(|(_, err)| err).collect()
    }
}

fn field_of_address(address: &str) -> Option<Field> {
    address.rsplit('/').next().and_then(|name| name.parse().ok())
}
