//! What lights and groups have in common.

use serde_json::{Map, Value};

use crate::directory::{Directory, Lookup, Registry};
use crate::errors::Error;
use crate::queue::DeviceClass;
use crate::state::DeviceState;

type Result<T> = std::result::Result<T, Error>;

/// A bridge resource with settable state.
///
/// The wire mapping is explicit: [`Device::to_wire_fields`] produces the JSON
/// object the bridge would report for the resource and
/// [`Device::apply_wire_fields`] absorbs one.
pub trait Device: Clone + Send + Sync + 'static {
    /// The rate-limiting class writes to this device are queued under.
    const CLASS: DeviceClass;

    /// A blank device with the given bridge id.
    fn with_id(id: u32) -> Self;

    fn id(&self) -> u32;

    fn name(&self) -> &str;

    fn state(&self) -> &DeviceState;

    fn state_mut(&mut self) -> &mut DeviceState;

    /// Path of the resource below the credential, e.g. `/lights/1`.
    fn resource_path(&self) -> String;

    /// Path state writes are sent to, e.g. `/lights/1/state`.
    fn state_path(&self) -> String;

    /// The resource as the bridge reports it.
    fn to_wire_fields(&self) -> Result<Map<String, Value>>;

    /// Overwrite server-reported attributes and settable state from a
    /// resource object. Clears every dirty bit.
    fn apply_wire_fields(&mut self, fields: &Value) -> Result<()>;

    /// Where devices of this kind live in a bridge's directory.
    fn registry(directory: &Directory) -> &Registry<Self>;

    /// The error for a lookup that matched nothing.
    fn not_found(lookup: Lookup) -> Error;
}
