//! Settable device state with per-field dirty tracking.
//!
//! A [`DeviceState`] keeps two copies of every settable field: the value the
//! caller last set and the value the bridge last confirmed. A field is dirty
//! while the two differ. Each field also carries a revision number that is
//! bumped on every local change, and the whole state carries a read epoch
//! bumped on every server read, so a write reply can tell whether what it is
//! confirming has moved on since the payload was built.

use serde::{Deserialize, Serialize};

use crate::field::{Field, FieldSet, FieldValue};
use crate::payload::{Payload, WireState};
use crate::response::WriteReply;
use crate::types::{
    Alert, Brightness, ColorMode, ColorTemperature, Hue, Saturation, TransitionTime, Xy,
};

const FIELD_COUNT: usize = 8;

/// The values of every settable field.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub on: bool,
    pub brightness: Brightness,
    pub hue: Hue,
    pub saturation: Saturation,
    pub xy: Xy,
    pub color_temperature: ColorTemperature,
    pub transition_time: TransitionTime,
    pub alert: Alert,
}

impl Settings {
    fn differs(&self, other: &Settings, field: Field) -> bool {
        match field {
            Field::On => self.on != other.on,
            Field::Brightness => self.brightness != other.brightness,
            Field::Hue => self.hue != other.hue,
            Field::Saturation => self.saturation != other.saturation,
            Field::Xy => self.xy != other.xy,
            Field::ColorTemperature => self.color_temperature != other.color_temperature,
            Field::TransitionTime => self.transition_time != other.transition_time,
            Field::Alert => self.alert != other.alert,
        }
    }

    fn copy_field(&mut self, from: &Settings, field: Field) {
        match field {
            Field::On => self.on = from.on,
            Field::Brightness => self.brightness = from.brightness,
            Field::Hue => self.hue = from.hue,
            Field::Saturation => self.saturation = from.saturation,
            Field::Xy => self.xy = from.xy,
            Field::ColorTemperature => self.color_temperature = from.color_temperature,
            Field::TransitionTime => self.transition_time = from.transition_time,
            Field::Alert => self.alert = from.alert,
        }
    }

    /// Build a payload carrying `fields`.
    pub fn payload(&self, fields: FieldSet) -> Payload {
        let mut payload = Payload::new();
        for field in fields.iter() {
            match field {
                Field::On => payload.on(self.on),
                Field::Brightness => payload.brightness(self.brightness),
                Field::Hue => payload.hue(self.hue),
                Field::Saturation => payload.saturation(self.saturation),
                Field::Xy => payload.xy(self.xy),
                Field::ColorTemperature => payload.color_temperature(self.color_temperature),
                Field::TransitionTime => payload.transition_time(self.transition_time),
                Field::Alert => payload.alert(self.alert),
            }
        }
        payload
    }
}

/// The fields, values and revisions captured when a write payload was built.
///
/// Reconciliation works against this snapshot rather than the live state.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    fields: FieldSet,
    values: Settings,
    revisions: [u64; FIELD_COUNT],
    epoch: u64,
}

impl StateSnapshot {
    pub fn fields(&self) -> FieldSet {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn payload(&self) -> Payload {
        self.values.payload(self.fields)
    }
}

/// Local and confirmed state of a light or group.
///
/// # Examples
///
/// ```
/// use hue_bridge_rs::{DeviceState, Field};
///
/// let mut state = DeviceState::new();
/// state.set_brightness(999);
/// assert_eq!(state.brightness().value(), 255);
/// assert!(state.is_dirty(Field::Brightness));
///
/// let diff = state.diff_payload();
/// assert_eq!(diff.fields().len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredState", into = "StoredState")]
pub struct DeviceState {
    current: Settings,
    confirmed: Settings,
    dirty: FieldSet,
    revisions: [u64; FIELD_COUNT],
    epoch: u64,
    color_mode: Option<ColorMode>,
    hold_updates: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    /// A clean state with default values that holds updates until written.
    pub fn new() -> Self {
        DeviceState {
            current: Settings::default(),
            confirmed: Settings::default(),
            dirty: FieldSet::new(),
            revisions: [0; FIELD_COUNT],
            epoch: 0,
            color_mode: None,
            hold_updates: true,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.current
    }

    pub fn on(&self) -> bool {
        self.current.on
    }

    pub fn brightness(&self) -> Brightness {
        self.current.brightness
    }

    pub fn hue(&self) -> Hue {
        self.current.hue
    }

    pub fn saturation(&self) -> Saturation {
        self.current.saturation
    }

    pub fn xy(&self) -> Xy {
        self.current.xy
    }

    pub fn color_temperature(&self) -> ColorTemperature {
        self.current.color_temperature
    }

    pub fn transition_time(&self) -> TransitionTime {
        self.current.transition_time
    }

    pub fn alert(&self) -> Alert {
        self.current.alert
    }

    pub fn color_mode(&self) -> Option<ColorMode> {
        self.color_mode
    }

    pub fn hold_updates(&self) -> bool {
        self.hold_updates
    }

    /// When `false`, every change is flushed on its own as soon as it is set.
    pub fn set_hold_updates(&mut self, hold: bool) {
        self.hold_updates = hold;
    }

    pub fn is_dirty(&self, field: Field) -> bool {
        self.dirty.contains(field)
    }

    pub fn dirty_fields(&self) -> FieldSet {
        self.dirty
    }

    /// Store a clamped value for one field.
    ///
    /// Returns `true` if the stored value changed. The field is dirty
    /// afterwards exactly when it differs from the last confirmed value.
    pub fn set(&mut self, value: FieldValue) -> bool {
        let mut next = self.current;
        match value {
            FieldValue::On(on) => next.on = on,
            FieldValue::Brightness(v) => next.brightness = Brightness::clamped(v),
            FieldValue::Hue(v) => next.hue = Hue::clamped(v),
            FieldValue::Saturation(v) => next.saturation = Saturation::clamped(v),
            FieldValue::Xy(x, y) => next.xy = Xy::clamped(x, y),
            FieldValue::ColorTemperature(v) => {
                next.color_temperature = ColorTemperature::clamped(v)
            }
            FieldValue::TransitionTime(v) => next.transition_time = TransitionTime::clamped(v),
            FieldValue::Alert(alert) => next.alert = alert,
        }

        let field = value.field();
        if !next.differs(&self.current, field) {
            return false;
        }

        self.current = next;
        self.revisions[field as usize] += 1;
        self.refresh_dirty(field);
        match field {
            Field::Xy => self.color_mode = Some(ColorMode::Xy),
            Field::ColorTemperature => self.color_mode = Some(ColorMode::Ct),
            Field::Hue | Field::Saturation => self.color_mode = Some(ColorMode::Hs),
            _ => {}
        }
        true
    }

    pub fn set_on(&mut self, on: bool) -> bool {
        self.set(FieldValue::On(on))
    }

    pub fn set_brightness(&mut self, value: i64) -> bool {
        self.set(FieldValue::Brightness(value))
    }

    pub fn set_hue(&mut self, value: i64) -> bool {
        self.set(FieldValue::Hue(value))
    }

    pub fn set_saturation(&mut self, value: i64) -> bool {
        self.set(FieldValue::Saturation(value))
    }

    pub fn set_xy(&mut self, x: f64, y: f64) -> bool {
        self.set(FieldValue::Xy(x, y))
    }

    pub fn set_color_temperature(&mut self, mired: i64) -> bool {
        self.set(FieldValue::ColorTemperature(mired))
    }

    pub fn set_transition_time(&mut self, value: i64) -> bool {
        self.set(FieldValue::TransitionTime(value))
    }

    pub fn set_alert(&mut self, alert: Alert) -> bool {
        self.set(FieldValue::Alert(alert))
    }

    /// The dirty fields, by wire name. Empty when nothing is pending.
    pub fn diff_payload(&self) -> Payload {
        self.current.payload(self.dirty)
    }

    /// Every settable field, dirty or not.
    pub fn full_payload(&self) -> Payload {
        self.current.payload(FieldSet::all())
    }

    /// Capture the dirty fields for a diff write.
    pub fn snapshot_dirty(&self) -> StateSnapshot {
        self.snapshot(self.dirty)
    }

    /// Capture every field for a full write.
    pub fn snapshot_all(&self) -> StateSnapshot {
        self.snapshot(FieldSet::all())
    }

    /// Capture the given fields.
    pub fn snapshot(&self, fields: FieldSet) -> StateSnapshot {
        StateSnapshot {
            fields,
            values: self.current,
            revisions: self.revisions,
            epoch: self.epoch,
        }
    }

    /// Overwrite the state with what the bridge reported.
    ///
    /// Fields missing from the report keep their local value but are treated
    /// as confirmed. All dirty bits are cleared; a read always wins over
    /// pending local edits.
    pub(crate) fn apply_server_state(&mut self, wire: &WireState) {
        if let Some(on) = wire.on {
            self.current.on = on;
        }
        if let Some(bri) = wire.bri {
            self.current.brightness = Brightness::clamped(bri);
        }
        if let Some(hue) = wire.hue {
            self.current.hue = Hue::clamped(hue);
        }
        if let Some(sat) = wire.sat {
            self.current.saturation = Saturation::clamped(sat);
        }
        if let Some([x, y]) = wire.xy {
            self.current.xy = Xy::clamped(x, y);
        }
        if let Some(ct) = wire.ct {
            self.current.color_temperature = ColorTemperature::clamped(ct);
        }
        if let Some(time) = wire.transitiontime {
            self.current.transition_time = TransitionTime::clamped(time);
        }
        if let Some(alert) = wire.alert() {
            self.current.alert = alert;
        }
        if let Some(mode) = wire.color_mode() {
            self.color_mode = Some(mode);
        }

        self.confirmed = self.current;
        self.dirty = FieldSet::new();
        self.epoch += 1;
    }

    /// Reconcile a write reply against the snapshot the payload was built from.
    ///
    /// Rejected fields stay dirty. Accepted fields become confirmed with the
    /// value that was sent; their dirty bit is cleared only if the field has
    /// not been changed again since the snapshot. If a read landed in the
    /// meantime the reply is stale and nothing changes. Returns the fields
    /// that were confirmed.
    pub fn apply_write_result(&mut self, snapshot: &StateSnapshot, reply: &WriteReply) -> FieldSet {
        let rejected = reply.rejected_fields();
        let mut applied = FieldSet::new();
        if self.epoch != snapshot.epoch {
            return applied;
        }

        for field in snapshot.fields.iter() {
            if rejected.contains(field) {
                continue;
            }
            let index = field as usize;
            self.confirmed.copy_field(&snapshot.values, field);
            if self.revisions[index] == snapshot.revisions[index] {
                self.dirty.remove(field);
            } else {
                self.refresh_dirty(field);
            }
            applied.insert(field);
        }
        applied
    }

    fn refresh_dirty(&mut self, field: Field) {
        if self.current.differs(&self.confirmed, field) {
            self.dirty.insert(field);
        } else {
            self.dirty.remove(field);
        }
    }
}

/// Persisted form: the visible values only. A restored state is clean.
#[derive(Serialize, Deserialize)]
struct StoredState {
    #[serde(flatten)]
    settings: Settings,
    #[serde(default)]
    color_mode: Option<ColorMode>,
    #[serde(default = "default_hold")]
    hold_updates: bool,
}

fn default_hold() -> bool {
    true
}

impl From<StoredState> for DeviceState {
    fn from(stored: StoredState) -> Self {
        DeviceState {
            current: stored.settings,
            confirmed: stored.settings,
            color_mode: stored.color_mode,
            hold_updates: stored.hold_updates,
            ..DeviceState::new()
        }
    }
}

impl From<DeviceState> for StoredState {
    fn from(state: DeviceState) -> Self {
        StoredState {
            settings: state.current,
            color_mode: state.color_mode,
            hold_updates: state.hold_updates,
        }
    }
}
