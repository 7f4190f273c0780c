//! A bridge client: directory, command queue and the bridge-level requests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::{BridgeConfig, BridgeOptions};
use crate::device::Device;
use crate::directory::{Directory, Lookup, lock};
use crate::discovery::DiscoveredBridge;
use crate::errors::Error;
use crate::group::Group;
use crate::handle::{GroupHandle, Handle, LightHandle};
use crate::history::MessageHistory;
use crate::light::Light;
use crate::queue::{CommandQueue, DeviceClass};
use crate::response::{ReplyItem, check_error, first_error, parse_items, success_value};
use crate::runtime;
use crate::schedule::Schedule;
use crate::transport::{Recorded, Request, Transport};
use crate::writer::{Pending, submit_create_group, submit_update_group};

#[cfg(feature = "http")]
use crate::transport::HttpTransport;

type Result<T> = std::result::Result<T, Error>;

/// One physical bridge and everything known about it.
///
/// `Bridge` is a cheap handle; clones share the same directory, queue and
/// history. The queue is owned per bridge, so two bridges never share a rate
/// budget. When the last clone (including those inside device handles) is
/// dropped, or on [`Bridge::shutdown`], queued commands are abandoned.
///
/// # Example
///
/// ```ignore
/// use hue_bridge_rs::Bridge;
///
/// let bridge = Bridge::connect("192.168.1.20", "my-credential");
/// bridge.read().await?;
///
/// let desk = bridge.lookup_light("Desk")?;
/// desk.set_on(true)?;
/// desk.set_brightness(200)?;
/// desk.write()?.await?;
/// ```
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    host: String,
    credential: String,
    options: BridgeOptions,
    transport: Arc<dyn Transport>,
    history: Arc<Mutex<MessageHistory>>,
    queue: CommandQueue,
    directory: Arc<Directory>,
    config: RwLock<BridgeConfig>,
    authenticated: AtomicBool,
}

/// `GET /api/<credential>`
#[derive(Deserialize)]
struct FullState {
    #[serde(default)]
    lights: BTreeMap<String, Value>,
    #[serde(default)]
    groups: BTreeMap<String, Value>,
    config: Option<BridgeConfig>,
}

/// Persisted form of a bridge.
#[derive(Serialize, Deserialize)]
struct SavedBridge {
    host: String,
    credential: String,
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    config: BridgeConfig,
    #[serde(default)]
    lights: Vec<Light>,
    #[serde(default)]
    groups: Vec<Group>,
}

impl Bridge {
    pub fn new(host: &str, credential: &str, transport: impl Transport + 'static) -> Self {
        Self::with_options(host, credential, transport, BridgeOptions::default())
    }

    pub fn with_options(
        host: &str,
        credential: &str,
        transport: impl Transport + 'static,
        options: BridgeOptions,
    ) -> Self {
        let history = Arc::new(Mutex::new(MessageHistory::with_max_entries(
            options.history_size,
        )));
        let transport: Arc<dyn Transport> =
            Arc::new(Recorded::new(Arc::new(transport), Arc::clone(&history)));
        let queue = CommandQueue::new(Arc::clone(&transport), &options);

        Bridge {
            inner: Arc::new(BridgeInner {
                host: host.to_string(),
                credential: credential.to_string(),
                options,
                transport,
                history,
                queue,
                directory: Arc::new(Directory::new()),
                config: RwLock::new(BridgeConfig::default()),
                authenticated: AtomicBool::new(false),
            }),
        }
    }

    /// Talk to `host` over HTTP with default options.
    #[cfg(feature = "http")]
    pub fn connect(host: &str, credential: &str) -> Self {
        Self::new(host, credential, HttpTransport::new(host))
    }

    /// A bridge for a discovery result. The reported id and mac are kept
    /// until the first read replaces them.
    pub fn from_discovered(
        candidate: &DiscoveredBridge,
        credential: &str,
        transport: impl Transport + 'static,
    ) -> Self {
        let bridge = Self::new(&candidate.host, credential, transport);
        {
            let mut config = bridge.write_config();
            config.bridgeid = candidate.id.clone();
            config.mac = candidate.mac.clone();
        }
        bridge
    }

    /// Ask the bridge for a new credential.
    ///
    /// The bridge only grants one within 30 seconds of its link button being
    /// pressed; until then this fails with an [`Error::Api`] for which
    /// [`crate::ApiError::is_link_button_not_pressed`] is true, and the caller
    /// may retry.
    pub async fn register(transport: &dyn Transport, devicetype: &str) -> Result<String> {
        let value = transport
            .send(Request::post("/api", json!({ "devicetype": devicetype })))
            .await?;
        let items = parse_items(&value)?;
        if let Some(err) = first_error(&items) {
            return Err(Error::Api(err.clone()));
        }
        success_value(&items, "username")
            .as_ref()
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::UnexpectedResponse(format!("no username in {value}")))
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn credential(&self) -> &str {
        &self.inner.credential
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// The bridge's `config` section as of the last read.
    pub fn config(&self) -> BridgeConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn name(&self) -> Option<String> {
        self.config().name
    }

    pub fn firmware_version(&self) -> Option<String> {
        self.config().swversion
    }

    pub fn mac(&self) -> Option<String> {
        self.config().mac
    }

    /// Whether the last full read was accepted with this credential.
    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::SeqCst)
    }

    /// A copy of the request/response history.
    pub fn history(&self) -> MessageHistory {
        self.inner
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Commands of `class` waiting for their turn.
    pub fn queued(&self, class: DeviceClass) -> usize {
        self.inner.queue.pending(class)
    }

    /// Stop dispatching. Everything still queued resolves to
    /// [`Error::Abandoned`] and later writes are dropped the same way.
    pub fn shutdown(&self) {
        debug!("shutting down bridge {}", self.inner.host);
        self.inner.queue.close();
    }

    /// Read every light, group and the config section, and swap them in.
    ///
    /// Local edits not yet written are discarded. Each device keeps its
    /// `hold_updates` setting across the swap; new devices take it from
    /// [`BridgeOptions::hold_updates`].
    pub async fn read(&self) -> Result<()> {
        let value = self.fetch(Request::get(self.prefix())).await?;
        if let Err(err) = check_error(&value) {
            if let Error::Api(api) = &err
                && api.is_unauthorized()
            {
                warn!("bridge {} rejected the credential", self.inner.host);
                self.inner.authenticated.store(false, Ordering::SeqCst);
            }
            return Err(err);
        }

        let state = FullState::deserialize(&value).map_err(Error::JsonLoad)?;
        let lights: Vec<Light> = self.build(&state.lights)?;
        let groups: Vec<Group> = self.build(&state.groups)?;
        debug!(
            "bridge {}: {} light(s), {} group(s)",
            self.inner.host,
            lights.len(),
            groups.len()
        );

        self.inner.directory.lights().replace(lights);
        self.inner.directory.groups().replace(groups);
        if let Some(config) = state.config {
            *self.write_config() = config;
        }
        self.inner.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn build<D: Device>(&self, resources: &BTreeMap<String, Value>) -> Result<Vec<D>> {
        let registry = D::registry(&self.inner.directory);
        resources
            .iter()
            .map(|(key, fields)| {
                let id: u32 = key.parse().map_err(|_| {
                    Error::UnexpectedResponse(format!("invalid {} id {key:?}", D::CLASS))
                })?;
                let hold = registry
                    .get(id)
                    .map_or(self.inner.options.hold_updates, |entry| {
                        lock(&entry).state().hold_updates()
                    });
                let mut device = D::with_id(id);
                device.state_mut().set_hold_updates(hold);
                device.apply_wire_fields(fields)?;
                Ok(device)
            })
            .collect()
    }

    /// Handles to every light, ordered by id.
    pub fn lights(&self) -> Vec<LightHandle> {
        self.handles()
    }

    /// Handles to every group, ordered by id.
    pub fn groups(&self) -> Vec<GroupHandle> {
        self.handles()
    }

    fn handles<D: Device>(&self) -> Vec<Handle<D>> {
        D::registry(&self.inner.directory)
            .ids()
            .into_iter()
            .map(|id| Handle::new(id, self.clone()))
            .collect()
    }

    /// Find a light by id or exact name.
    pub fn lookup_light(&self, lookup: impl Into<Lookup>) -> Result<LightHandle> {
        self.lookup(lookup.into())
    }

    /// Find a group by id or exact name.
    pub fn lookup_group(&self, lookup: impl Into<Lookup>) -> Result<GroupHandle> {
        self.lookup(lookup.into())
    }

    fn lookup<D: Device>(&self, lookup: Lookup) -> Result<Handle<D>> {
        match D::registry(&self.inner.directory).resolve(&lookup) {
            Some(id) => Ok(Handle::new(id, self.clone())),
            None => Err(D::not_found(lookup)),
        }
    }

    /// Queue creation of a group. It joins the directory once the bridge has
    /// allocated its id.
    pub fn create_group(
        &self,
        name: &str,
        light_ids: impl IntoIterator<Item = u32>,
    ) -> Result<Pending<Group>> {
        submit_create_group(
            &self.inner.queue,
            &self.prefix(),
            Arc::clone(&self.inner.directory),
            name,
            light_ids.into_iter().collect(),
            self.inner.options.hold_updates,
        )
    }

    /// Queue a rename and membership change for a group.
    pub fn update_group(
        &self,
        group: impl Into<Lookup>,
        name: &str,
        light_ids: impl IntoIterator<Item = u32>,
    ) -> Result<Pending<Group>> {
        let lookup = group.into();
        let entry = self
            .inner
            .directory
            .groups()
            .find(&lookup)
            .ok_or(Error::GroupNotFound(lookup))?;
        submit_update_group(
            &self.inner.queue,
            &self.prefix(),
            entry,
            name,
            light_ids.into_iter().collect(),
        )
    }

    /// Start a touchlink scan for new lamps near the bridge.
    ///
    /// Returns whether the bridge reported success.
    pub async fn trigger_touchlink(&self) -> Result<bool> {
        let request = Request::put(format!("{}/config", self.prefix()), json!({"touchlink": true}));
        let items = parse_items(&self.fetch(request).await?)?;
        if let Some(err) = first_error(&items) {
            return Err(Error::Api(err.clone()));
        }
        Ok(items
            .iter()
            .any(|item| matches!(item, ReplyItem::Success(_))))
    }

    /// Store a one-shot schedule on the bridge and return its id.
    ///
    /// Schedules are sent straight away rather than through the command
    /// queue.
    pub async fn create_schedule(&self, schedule: &Schedule) -> Result<String> {
        let prefix = self.prefix();
        let request = Request::post(format!("{prefix}/schedules"), schedule.to_body(&prefix));
        let value = self.fetch(request).await?;
        let items = parse_items(&value)?;
        if let Some(err) = first_error(&items) {
            return Err(Error::Api(err.clone()));
        }
        success_value(&items, "id")
            .and_then(|id| match id {
                Value::String(id) => Some(id),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .ok_or_else(|| Error::UnexpectedResponse(format!("no schedule id in {value}")))
    }

    /// Serialize the bridge and every light and group.
    ///
    /// Unwritten local edits are saved as values but not as pending changes.
    pub fn save(&self) -> Result<String> {
        let saved = SavedBridge {
            host: self.inner.host.clone(),
            credential: self.inner.credential.clone(),
            authenticated: self.is_authenticated(),
            config: self.config(),
            lights: self.inner.directory.lights().devices(),
            groups: self.inner.directory.groups().devices(),
        };
        serde_json::to_string(&saved).map_err(Error::JsonDump)
    }

    /// Rebuild a bridge saved with [`Bridge::save`] without contacting it.
    pub fn restore(
        json: &str,
        transport: impl Transport + 'static,
        options: BridgeOptions,
    ) -> Result<Self> {
        let saved: SavedBridge = serde_json::from_str(json).map_err(Error::JsonLoad)?;
        let bridge = Self::with_options(&saved.host, &saved.credential, transport, options);
        bridge.inner.directory.lights().replace(saved.lights);
        bridge.inner.directory.groups().replace(saved.groups);
        *bridge.write_config() = saved.config;
        bridge
            .inner
            .authenticated
            .store(saved.authenticated, Ordering::SeqCst);
        Ok(bridge)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, BridgeConfig> {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    pub(crate) fn queue(&self) -> &CommandQueue {
        &self.inner.queue
    }

    /// `/api/<credential>`
    pub(crate) fn prefix(&self) -> String {
        format!("/api/{}", self.inner.credential)
    }

    /// Send a request now, bypassing the queue.
    pub(crate) async fn fetch(&self, request: Request) -> Result<Value> {
        let path = request.path.clone();
        runtime::timeout(
            self.inner.options.request_timeout,
            self.inner.transport.send(request),
        )
        .await
        .unwrap_or_else(|_| Err(Error::timeout(&path)))
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("host", &self.inner.host)
            .field("lights", &self.inner.directory.lights().len())
            .field("groups", &self.inner.directory.groups().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::field::{Field, FieldSet};
    use crate::response::ApiError;
    use crate::schedule::ScheduleCommand;
    use crate::transport::Method;
    use crate::transport::mock::{MockTransport, accept_all};

    fn full_state() -> Value {
        json!({
            "lights": {
                "1": {
                    "name": "Desk",
                    "type": "Extended color light",
                    "modelid": "LCT015",
                    "swversion": "1.46.13",
                    "state": {
                        "on": true, "bri": 100, "hue": 8000, "sat": 120,
                        "xy": [0.45, 0.41], "ct": 366, "alert": "none",
                        "colormode": "ct", "reachable": true
                    }
                },
                "2": {
                    "name": "Kitchen",
                    "type": "Dimmable light",
                    "state": {"on": false, "bri": 10, "alert": "none", "reachable": false}
                }
            },
            "groups": {
                "1": {
                    "name": "Downstairs",
                    "lights": ["1", "2"],
                    "type": "LightGroup",
                    "action": {"on": true, "bri": 50, "colormode": "ct", "ct": 300}
                }
            },
            "config": {
                "name": "Philips hue",
                "swversion": "1941132080",
                "mac": "00:17:88:09:a1:68",
                "bridgeid": "001788FFFE09A168"
            }
        })
    }

    /// Reads answer from `full_state`, writes succeed for every field.
    fn hue(request: &Request) -> Result<Value> {
        let state = full_state();
        match (request.method, request.path.as_str()) {
            (Method::Get, "/api/user") => Ok(state),
            (Method::Get, path) => {
                let mut parts = path.trim_start_matches("/api/user/").split('/');
                let kind = parts.next().unwrap_or_default();
                let id = parts.next().unwrap_or_default();
                Ok(state[kind][id].clone())
            }
            _ => Ok(accept_all(request)),
        }
    }

    async fn connected(transport: Arc<MockTransport>) -> Bridge {
        let bridge = Bridge::new("192.168.1.20", "user", transport);
        bridge.read().await.unwrap();
        bridge
    }

    fn body(transport: &MockTransport, index: usize) -> Value {
        transport.requests()[index].body.clone().unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn test_full_read_populates_directory() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(transport).await;

        assert!(bridge.is_authenticated());
        assert_eq!(bridge.name().as_deref(), Some("Philips hue"));
        assert_eq!(bridge.firmware_version().as_deref(), Some("1941132080"));
        assert_eq!(bridge.lights().len(), 2);
        assert_eq!(bridge.groups().len(), 1);

        let kitchen = bridge.lookup_light("Kitchen").unwrap();
        assert_eq!(kitchen.id(), 2);
        assert_eq!(kitchen.name().unwrap(), "Kitchen");
        assert_eq!(kitchen.get().unwrap().reachable(), Some(false));

        let group = bridge.lookup_group(1).unwrap().get().unwrap();
        assert_eq!(group.name(), "Downstairs");
        assert!(group.contains(2));
    }

    #[tokio::test]
    async fn test_lookup_misses() {
        let bridge = connected(MockTransport::replying(hue)).await;

        let err = bridge.lookup_light("kitchen").unwrap_err();
        assert!(matches!(err, Error::LightNotFound(Lookup::Name(ref n)) if n == "kitchen"));
        assert!(matches!(
            bridge.lookup_group(9).unwrap_err(),
            Error::GroupNotFound(Lookup::Id(9))
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_read() {
        let transport = MockTransport::replying(|_| {
            Ok(json!([{"error": {"type": 1, "address": "/", "description": "unauthorized user"}}]))
        });
        let bridge = Bridge::new("192.168.1.20", "stale", transport);

        let err = bridge.read().await.unwrap_err();
        assert!(matches!(err, Error::Api(ref api) if api.is_unauthorized()));
        assert!(!bridge.is_authenticated());
        assert!(bridge.lights().is_empty());
    }

    #[tokio::test]
    async fn test_empty_write_skips_transport() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;

        let desk = bridge.lookup_light(1).unwrap();
        desk.set_brightness(100).unwrap();
        let light = desk.write().unwrap().await.unwrap();

        assert_eq!(light.state().brightness().value(), 100);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_change_during_write_stays_dirty() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;
        let desk = bridge.lookup_light("Desk").unwrap();

        desk.set_brightness(400).unwrap();
        assert_eq!(desk.get().unwrap().state().brightness().value(), 255);

        let pending = desk.write().unwrap();
        // Lands after the payload was built, before the reply is applied.
        desk.set_hue(500).unwrap();
        let light = pending.await.unwrap();

        assert_eq!(body(&transport, 1), json!({"bri": 255}));
        assert_eq!(transport.requests()[1].path, "/api/user/lights/1/state");
        assert_eq!(light.state().brightness().value(), 255);
        assert!(!light.state().is_dirty(Field::Brightness));
        assert_eq!(light.state().dirty_fields(), FieldSet::from(Field::Hue));

        desk.write().unwrap().await.unwrap();
        assert_eq!(body(&transport, 2), json!({"hue": 500}));
        assert!(desk.get().unwrap().state().dirty_fields().is_empty());
    }

    #[tokio::test]
    async fn test_partial_rejection() {
        let transport = MockTransport::replying(|request| match request.method {
            Method::Get => hue(request),
            _ => Ok(json!([
                {"success": {"/lights/1/state/bri": 200}},
                {"error": {"type": 7, "address": "/lights/1/state/hue",
                           "description": "invalid value, 70000, for parameter, hue"}}
            ])),
        });
        let bridge = connected(transport).await;
        let desk = bridge.lookup_light(1).unwrap();

        desk.set_brightness(200).unwrap();
        desk.set_hue(1000).unwrap();
        let err = desk.write().unwrap().await.unwrap_err();

        let Error::Rejected { device, errors } = err else {
            panic!("expected a rejection");
        };
        assert_eq!(device, "light 1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ApiError::INVALID_VALUE);

        let light = desk.get().unwrap();
        assert!(!light.state().is_dirty(Field::Brightness));
        assert_eq!(light.state().diff_payload().fields(), FieldSet::from(Field::Hue));
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_dirty_bits() {
        let transport = MockTransport::replying(|request| match request.method {
            Method::Get => hue(request),
            _ => Err(Error::transport("send", "connection refused")),
        });
        let bridge = connected(transport).await;
        let desk = bridge.lookup_light(1).unwrap();

        desk.set_on(false).unwrap();
        desk.set_saturation(-3).unwrap();
        let err = desk.write().unwrap().await.unwrap_err();

        assert!(err.is_transport());
        let dirty = desk.get().unwrap().state().dirty_fields();
        assert_eq!(dirty, [Field::On, Field::Saturation].into_iter().collect::<FieldSet>());
        assert_eq!(bridge.history().last_error(), Some(err.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_resource_error_fails_whole_write() {
        let transport = MockTransport::replying(|request| match request.method {
            Method::Get => hue(request),
            _ => Ok(json!([{"error": {"type": 3, "address": "/lights/1/state",
                                      "description": "resource, /lights/1/state, not available"}}])),
        });
        let bridge = connected(transport).await;
        let desk = bridge.lookup_light(1).unwrap();

        desk.set_brightness(1).unwrap();
        let err = desk.write().unwrap().await.unwrap_err();
        assert!(matches!(err, Error::Api(ref api) if api.kind == ApiError::RESOURCE_NOT_AVAILABLE));
        assert!(desk.get().unwrap().state().is_dirty(Field::Brightness));
    }

    #[tokio::test]
    async fn test_unheld_setter_flushes_single_field() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;
        let desk = bridge.lookup_light(1).unwrap();

        assert!(desk.set_brightness(20).unwrap().is_none());
        desk.set_hold_updates(false).unwrap();
        let pending = desk.set_on(false).unwrap().expect("flush queued");
        let light = pending.await.unwrap();

        assert_eq!(body(&transport, 1), json!({"on": false}));
        assert!(!light.state().is_dirty(Field::On));
        assert!(light.state().is_dirty(Field::Brightness));

        // Setting a value equal to the confirmed one sends nothing.
        assert!(desk.set_on(false).unwrap().is_none());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_write_all_sends_every_field() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;

        let group = bridge.lookup_group("Downstairs").unwrap();
        group.write_all().unwrap().await.unwrap();

        let sent = transport.requests()[1].clone();
        assert_eq!(sent.path, "/api/user/groups/1/action");
        let fields = sent.body.unwrap();
        for key in ["on", "bri", "hue", "sat", "xy", "ct", "transitiontime", "alert"] {
            assert!(fields.get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn test_alert_once() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;

        bridge.lookup_light(2).unwrap().alert_once().unwrap().await.unwrap();
        assert_eq!(body(&transport, 1), json!({"alert": "select"}));
    }

    #[tokio::test]
    async fn test_device_read_discards_local_edits() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;
        let kitchen = bridge.lookup_light("Kitchen").unwrap();

        kitchen.set_brightness(250).unwrap();
        let light = kitchen.read().await.unwrap();

        assert_eq!(transport.requests()[1].path, "/api/user/lights/2");
        assert_eq!(light.state().brightness().value(), 10);
        assert!(light.state().dirty_fields().is_empty());
    }

    #[tokio::test]
    async fn test_read_keeps_hold_setting() {
        let bridge = connected(MockTransport::replying(hue)).await;
        bridge.lookup_light(1).unwrap().set_hold_updates(false).unwrap();

        bridge.read().await.unwrap();
        assert!(!bridge.lookup_light(1).unwrap().hold_updates().unwrap());
        assert!(bridge.lookup_light(2).unwrap().hold_updates().unwrap());
    }

    #[tokio::test]
    async fn test_create_group() {
        let transport = MockTransport::replying(|request| match request.method {
            Method::Post => Ok(json!([{"success": {"id": "3"}}])),
            _ => hue(request),
        });
        let bridge = connected(Arc::clone(&transport)).await;

        let group = bridge.create_group("Hall", [2, 1]).unwrap().await.unwrap();
        assert_eq!(group.id(), 3);
        assert_eq!(bridge.lookup_group("Hall").unwrap().id(), 3);

        let sent = transport.requests()[1].clone();
        assert_eq!(sent.path, "/api/user/groups");
        assert_eq!(sent.body, Some(json!({"name": "Hall", "lights": ["1", "2"]})));
    }

    #[tokio::test]
    async fn test_update_group() {
        let transport = MockTransport::replying(|request| match request.method {
            Method::Put => Ok(json!([
                {"success": {"/groups/1/lights": ["1"]}},
                {"success": {"/groups/1/name": "Upstairs"}}
            ])),
            _ => hue(request),
        });
        let bridge = connected(Arc::clone(&transport)).await;

        let group = bridge
            .lookup_group(1)
            .unwrap()
            .update("Upstairs", [1])
            .unwrap()
            .await
            .unwrap();
        assert_eq!(group.name(), "Upstairs");
        assert_eq!(group.light_ids().len(), 1);
        assert_eq!(transport.requests()[1].path, "/api/user/groups/1");
        assert!(matches!(
            bridge.update_group("Nowhere", "x", Vec::new()).unwrap_err(),
            Error::GroupNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_save_and_restore() {
        let bridge = connected(MockTransport::replying(hue)).await;
        let desk = bridge.lookup_light(1).unwrap();
        desk.set_brightness(222).unwrap();
        desk.set_hold_updates(false).unwrap();

        let saved = bridge.save().unwrap();
        let transport = MockTransport::replying(hue);
        let restored =
            Bridge::restore(&saved, Arc::clone(&transport), BridgeOptions::default()).unwrap();

        assert_eq!(restored.credential(), "user");
        assert!(restored.is_authenticated());
        assert_eq!(restored.mac().as_deref(), Some("00:17:88:09:a1:68"));

        let light = restored.lookup_light("Desk").unwrap().get().unwrap();
        assert_eq!(light.state().brightness().value(), 222);
        assert!(light.state().dirty_fields().is_empty());
        assert!(!light.state().hold_updates());
        assert_eq!(light.model_id(), Some("LCT015"));

        let group = restored.lookup_group(1).unwrap().get().unwrap();
        assert_eq!(group.light_ids().len(), 2);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_register() {
        let transport = MockTransport::replying(|_| {
            Ok(json!([{"success": {"username": "83b7780291a6ceffbe0bd049104df"}}]))
        });
        let username = Bridge::register(&*transport, "hue-bridge-rs#test").await.unwrap();
        assert_eq!(username, "83b7780291a6ceffbe0bd049104df");
        assert_eq!(
            transport.requests()[0].body,
            Some(json!({"devicetype": "hue-bridge-rs#test"}))
        );

        let transport = MockTransport::replying(|_| {
            Ok(json!([{"error": {"type": 101, "address": "", "description": "link button not pressed"}}]))
        });
        let err = Bridge::register(&*transport, "app#dev").await.unwrap_err();
        assert!(matches!(err, Error::Api(ref api) if api.is_link_button_not_pressed()));
    }

    #[tokio::test]
    async fn test_touchlink_and_schedule() {
        let transport = MockTransport::replying(|request| match request.method {
            Method::Post => Ok(json!([{"success": {"id": "2"}}])),
            _ => Ok(accept_all(request)),
        });
        let bridge = Bridge::new("192.168.1.20", "user", Arc::clone(&transport));

        assert!(bridge.trigger_touchlink().await.unwrap());
        assert_eq!(transport.requests()[0].path, "/api/user/config");

        let time = chrono::NaiveDate::from_ymd_opt(2026, 12, 24)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let command = ScheduleCommand::new("/groups/0/action", Method::Put, json!({"on": true}));
        let id = bridge
            .create_schedule(&Schedule::new("Eve", time, command))
            .await
            .unwrap();

        assert_eq!(id, "2");
        let sent = body(&transport, 1);
        assert_eq!(sent["command"]["address"], json!("/api/user/groups/0/action"));
        assert_eq!(sent["time"], json!("2026-12-24T18:00:00"));
    }

    #[tokio::test]
    async fn test_history_records_exchanges() {
        let bridge = connected(MockTransport::replying(hue)).await;
        let history = bridge.history();
        assert_eq!(history.len(), 2);
        assert!(
            history
                .latest(crate::history::MessageType::Receive, "GET /api/user")
                .is_some()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_queued_writes() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;
        let group = bridge.lookup_group(1).unwrap();

        group.set_brightness(1).unwrap();
        group.write().unwrap().await.unwrap();

        group.set_brightness(2).unwrap();
        let second = group.write().unwrap();
        assert_eq!(bridge.queued(DeviceClass::Group), 1);
        bridge.shutdown();

        assert!(matches!(second.await, Err(Error::Abandoned)));
        assert!(group.get().unwrap().state().is_dirty(Field::Brightness));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_do_not_delay_lights() {
        let transport = MockTransport::replying(hue);
        let bridge = connected(Arc::clone(&transport)).await;
        let group = bridge.lookup_group(1).unwrap();
        let desk = bridge.lookup_light(1).unwrap();
        let start = runtime::Instant::now();

        group.set_on(false).unwrap();
        let first = group.write().unwrap();
        group.set_brightness(5).unwrap();
        let second = group.write().unwrap();
        desk.set_on(false).unwrap();
        let light = desk.write().unwrap();

        light.await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
        first.await.unwrap();
        second.await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    fn saved_desk(state: Value) -> String {
        json!({
            "host": "192.168.1.20",
            "credential": "user",
            "authenticated": true,
            "lights": [{"id": 1, "name": "Desk", "state": state}]
        })
        .to_string()
    }

    fn desk_settings() -> Value {
        json!({
            "on": true, "brightness": 100, "hue": 8000, "saturation": 120,
            "xy": [0.45, 0.41], "color_temperature": 366, "transition_time": 4,
            "alert": "none"
        })
    }

    #[test]
    fn test_write_outside_runtime_is_an_error() {
        let transport = MockTransport::replying(hue);
        let bridge = Bridge::restore(
            &saved_desk(desk_settings()),
            Arc::clone(&transport),
            BridgeOptions::default(),
        )
        .unwrap();
        let desk = bridge.lookup_light("Desk").unwrap();

        assert!(desk.set_brightness(200).unwrap().is_none());
        assert!(matches!(desk.write(), Err(Error::NoRuntime)));
        desk.set_hold_updates(false).unwrap();
        assert!(matches!(desk.set_on(false), Err(Error::NoRuntime)));

        let state = desk.get().unwrap().state().clone();
        assert!(state.is_dirty(Field::Brightness));
        assert!(state.is_dirty(Field::On));
        assert!(transport.requests().is_empty());

        // The same write goes through once a runtime is available.
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let light = rt.block_on(async { desk.write().unwrap().await }).unwrap();
        assert!(light.state().dirty_fields().is_empty());
        assert_eq!(body(&transport, 0), json!({"on": false, "bri": 200}));
    }

    #[tokio::test]
    async fn test_restore_clamps_out_of_range_values() {
        let mut settings = desk_settings();
        settings["color_temperature"] = json!(9000);
        settings["brightness"] = json!(300);
        let transport = MockTransport::replying(hue);
        let bridge = Bridge::restore(
            &saved_desk(settings),
            Arc::clone(&transport),
            BridgeOptions::default(),
        )
        .unwrap();
        let desk = bridge.lookup_light(1).unwrap();

        let light = desk.get().unwrap();
        assert_eq!(light.state().color_temperature().mired(), 500);
        assert_eq!(light.state().brightness().value(), 255);

        desk.write_all().unwrap().await.unwrap();
        let sent = body(&transport, 0);
        assert_eq!(sent["ct"], json!(500));
        assert_eq!(sent["bri"], json!(255));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_setters_from_many_threads() {
        let transport = MockTransport::replying(hue);
        let options = BridgeOptions::default()
            .light_rate(1000.0)
            .hold_updates(false);
        let bridge = Bridge::with_options("192.168.1.20", "user", Arc::clone(&transport), options);
        bridge.read().await.unwrap();
        let desk = bridge.lookup_light(1).unwrap();
        let kitchen = bridge.lookup_light(2).unwrap();

        // Each sequence only moves away from the value read above, so every
        // change differs from what the bridge last confirmed.
        let workers = [
            (desk.clone(), Field::Brightness, (101..=120).collect::<Vec<i64>>()),
            (desk.clone(), Field::Hue, (1..=20).map(|v| v * 100).collect()),
            (kitchen.clone(), Field::Brightness, (11..=30).collect()),
        ];
        let threads: Vec<_> = workers
            .into_iter()
            .map(|(handle, field, values)| {
                std::thread::spawn(move || {
                    values
                        .into_iter()
                        .map(|v| {
                            let queued = match field {
                                Field::Hue => handle.set_hue(v),
                                _ => handle.set_brightness(v),
                            };
                            queued.unwrap().expect("change flushed")
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let pending: Vec<_> = threads
            .into_iter()
            .flat_map(|thread| thread.join().unwrap())
            .collect();
        for write in pending {
            write.await.unwrap();
        }

        let requests = transport.requests();
        let sent = |path: &str, key: &str| -> Vec<i64> {
            requests
                .iter()
                .filter(|r| r.method == Method::Put && r.path == path)
                .filter_map(|r| r.body.as_ref()?.get(key)?.as_i64())
                .collect()
        };
        assert_eq!(requests.iter().filter(|r| r.method == Method::Put).count(), 60);
        assert_eq!(
            sent("/api/user/lights/1/state", "bri"),
            (101..=120).collect::<Vec<_>>()
        );
        assert_eq!(
            sent("/api/user/lights/1/state", "hue"),
            (1..=20).map(|v| v * 100).collect::<Vec<_>>()
        );
        assert_eq!(
            sent("/api/user/lights/2/state", "bri"),
            (11..=30).collect::<Vec<_>>()
        );

        let desk = desk.get().unwrap();
        assert!(desk.state().dirty_fields().is_empty());
        assert_eq!(desk.state().brightness().value(), 120);
        assert_eq!(desk.state().hue().value(), 2000);
        let kitchen = kitchen.get().unwrap();
        assert!(kitchen.state().dirty_fields().is_empty());
        assert_eq!(kitchen.state().brightness().value(), 30);
    }
}
