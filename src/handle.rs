//! Caller-facing access to one light or group.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::bridge::Bridge;
use crate::device::Device;
use crate::directory::{Lookup, lock};
use crate::errors::Error;
use crate::field::{Field, FieldValue};
use crate::group::Group;
use crate::light::Light;
use crate::response::check_error;
use crate::transport::Request;
use crate::types::Alert;
use crate::writer::{Pending, WriteMode, submit_write};

type Result<T> = std::result::Result<T, Error>;

/// A light or group on a [`Bridge`], by id.
///
/// A handle does not own the device. Each call resolves the id in the
/// bridge's directory, so after a full read it operates on the fresh entry,
/// and it fails with a not-found error once the device is gone.
///
/// Setters clamp and record the value locally. While the device holds
/// updates (the default) nothing is sent until [`Handle::write`]; otherwise
/// a setter that changed something queues a write of just that field and
/// returns its [`Pending`] result.
///
/// Calls that queue a request fail with [`Error::NoRuntime`] when made off
/// any async runtime on a bridge that was also created off one.
pub struct Handle<D> {
    id: u32,
    bridge: Bridge,
    _device: PhantomData<fn() -> D>,
}

pub type LightHandle = Handle<Light>;
pub type GroupHandle = Handle<Group>;

impl<D> Clone for Handle<D> {
    fn clone(&self) -> Self {
        Handle {
            id: self.id,
            bridge: self.bridge.clone(),
            _device: PhantomData,
        }
    }
}

impl<D: Device> fmt::Debug for Handle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("class", &D::CLASS)
            .field("id", &self.id)
            .finish()
    }
}

impl<D: Device> Handle<D> {
    pub(crate) fn new(id: u32, bridge: Bridge) -> Self {
        Handle {
            id,
            bridge,
            _device: PhantomData,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    fn entry(&self) -> Result<Arc<Mutex<D>>> {
        D::registry(self.bridge.directory())
            .get(self.id)
            .ok_or_else(|| D::not_found(Lookup::Id(self.id)))
    }

    /// A copy of the device as it stands locally.
    pub fn get(&self) -> Result<D> {
        let entry = self.entry()?;
        Ok(lock(&entry).clone())
    }

    pub fn name(&self) -> Result<String> {
        let entry = self.entry()?;
        Ok(lock(&entry).name().to_string())
    }

    /// Set one field. See the type docs for when this sends anything.
    pub fn set(&self, value: FieldValue) -> Result<Option<Pending<D>>> {
        let entry = self.entry()?;
        let field = value.field();
        let flush = {
            let mut device = lock(&entry);
            let changed = device.state_mut().set(value);
            let state = device.state();
            changed && !state.hold_updates() && state.is_dirty(field)
        };
        if !flush {
            return Ok(None);
        }
        self.submit(entry, WriteMode::Field(field)).map(Some)
    }

    pub fn set_on(&self, on: bool) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::On(on))
    }

    /// Brightness, clamped to `0..=255`.
    pub fn set_brightness(&self, value: i64) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::Brightness(value))
    }

    /// Hue, clamped to `0..=65535`.
    pub fn set_hue(&self, value: i64) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::Hue(value))
    }

    /// Saturation, clamped to `0..=255`.
    pub fn set_saturation(&self, value: i64) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::Saturation(value))
    }

    /// CIE xy coordinates, each clamped to `0.0..=1.0`.
    pub fn set_xy(&self, x: f64, y: f64) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::Xy(x, y))
    }

    /// Color temperature in mireds, clamped to `154..=500`.
    pub fn set_color_temperature(&self, mired: i64) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::ColorTemperature(mired))
    }

    /// Transition time in tenths of a second.
    pub fn set_transition_time(&self, value: i64) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::TransitionTime(value))
    }

    pub fn set_alert(&self, alert: Alert) -> Result<Option<Pending<D>>> {
        self.set(FieldValue::Alert(alert))
    }

    pub fn hold_updates(&self) -> Result<bool> {
        let entry = self.entry()?;
        Ok(lock(&entry).state().hold_updates())
    }

    /// Buffer changes until [`Handle::write`] (`true`) or send each change
    /// as it is made (`false`). Changing this sends nothing.
    pub fn set_hold_updates(&self, hold: bool) -> Result<()> {
        let entry = self.entry()?;
        lock(&entry).state_mut().set_hold_updates(hold);
        Ok(())
    }

    /// Send the dirty fields.
    pub fn write(&self) -> Result<Pending<D>> {
        self.submit(self.entry()?, WriteMode::Diff)
    }

    /// Send every settable field.
    pub fn write_all(&self) -> Result<Pending<D>> {
        self.submit(self.entry()?, WriteMode::Full)
    }

    /// Flash the device once.
    pub fn alert_once(&self) -> Result<Pending<D>> {
        let entry = self.entry()?;
        lock(&entry).state_mut().set_alert(Alert::Select);
        self.submit(entry, WriteMode::Field(Field::Alert))
    }

    /// Fetch the device from the bridge and overwrite local state with it.
    ///
    /// Reads bypass the command queue. Any local edits not yet written are
    /// discarded.
    pub async fn read(&self) -> Result<D> {
        let entry = self.entry()?;
        let path = format!("{}{}", self.bridge.prefix(), lock(&entry).resource_path());
        let value = self.bridge.fetch(Request::get(path)).await?;
        check_error(&value)?;

        let mut device = lock(&entry);
        device.apply_wire_fields(&value)?;
        Ok(device.clone())
    }

    fn submit(&self, entry: Arc<Mutex<D>>, mode: WriteMode) -> Result<Pending<D>> {
        submit_write(self.bridge.queue(), &self.bridge.prefix(), entry, mode)
    }
}

impl GroupHandle {
    /// Rename the group and replace its members.
    pub fn update(
        &self,
        name: &str,
        light_ids: impl IntoIterator<Item = u32>,
    ) -> Result<Pending<Group>> {
        self.bridge.update_group(self.id, name, light_ids)
    }
}
