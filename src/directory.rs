//! The bridge's collections of lights and groups.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::device::Device;
use crate::group::Group;
use crate::light::Light;

/// How a caller names a light or group.
///
/// # Examples
///
/// ```
/// use hue_bridge_rs::Lookup;
///
/// assert_eq!(Lookup::from(3), Lookup::Id(3));
/// assert_eq!(Lookup::from("Kitchen").to_string(), "\"Kitchen\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lookup {
    Id(u32),
    /// Exact, case-sensitive name.
    Name(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "{id}"),
            Lookup::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<u32> for Lookup {
    fn from(id: u32) -> Self {
        Lookup::Id(id)
    }
}

impl From<&str> for Lookup {
    fn from(name: &str) -> Self {
        Lookup::Name(name.to_string())
    }
}

impl From<String> for Lookup {
    fn from(name: String) -> Self {
        Lookup::Name(name)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Entries<D> = Arc<BTreeMap<u32, Arc<Mutex<D>>>>;

/// Devices of one kind, keyed by bridge id.
///
/// Each device sits behind its own mutex so unrelated devices never contend.
/// The map itself is copy-on-write: a full read builds a new map and swaps
/// it in, so readers see either the old collection or the new one.
pub struct Registry<D> {
    entries: RwLock<Entries<D>>,
}

impl<D> Default for Registry<D> {
    fn default() -> Self {
        Registry {
            entries: RwLock::new(Arc::new(BTreeMap::new())),
        }
    }
}

impl<D: Device> Registry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Entries<D> {
        Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a new collection built from `devices`.
    pub(crate) fn replace(&self, devices: impl IntoIterator<Item = D>) {
        let entries: BTreeMap<_, _> = devices
            .into_iter()
            .map(|device| (device.id(), Arc::new(Mutex::new(device))))
            .collect();
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(entries);
    }

    /// Add or overwrite one device.
    pub(crate) fn insert(&self, device: D) -> Arc<Mutex<D>> {
        let id = device.id();
        let entry = Arc::new(Mutex::new(device));
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut entries = BTreeMap::clone(&guard);
        entries.insert(id, Arc::clone(&entry));
        *guard = Arc::new(entries);
        entry
    }

    pub(crate) fn get(&self, id: u32) -> Option<Arc<Mutex<D>>> {
        self.current().get(&id).cloned()
    }

    pub(crate) fn find(&self, lookup: &Lookup) -> Option<Arc<Mutex<D>>> {
        match lookup {
            Lookup::Id(id) => self.get(*id),
            Lookup::Name(name) => self
                .current()
                .values()
                .find(|entry| lock(entry).name() == name.as_str())
                .cloned(),
        }
    }

    /// Resolve `lookup` to a bridge id.
    pub fn resolve(&self, lookup: &Lookup) -> Option<u32> {
        self.find(lookup).map(|entry| lock(&entry).id())
    }

    pub fn ids(&self) -> Vec<u32> {
        self.current().keys().copied().collect()
    }

    /// Copies of every device, ordered by id.
    pub fn devices(&self) -> Vec<D> {
        self.current()
            .values()
            .map(|entry| lock(entry).clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }
}

/// Lights and groups known to one bridge.
#[derive(Default)]
pub struct Directory {
    lights: Registry<Light>,
    groups: Registry<Group>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lights(&self) -> &Registry<Light> {
        &self.lights
    }

    pub fn groups(&self) -> &Registry<Group> {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(id: u32, name: &str) -> Light {
        let mut light = Light::with_id(id);
        light.set_name(name);
        light
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let directory = Directory::new();
        directory
            .lights()
            .replace([light(1, "Desk"), light(2, "Kitchen")]);

        assert_eq!(directory.lights().resolve(&Lookup::Id(2)), Some(2));
        assert_eq!(directory.lights().resolve(&"Desk".into()), Some(1));
        assert_eq!(directory.lights().resolve(&"desk".into()), None);
        assert_eq!(directory.lights().resolve(&Lookup::Id(9)), None);
        assert!(directory.groups().is_empty());
    }

    #[test]
    fn test_replace_swaps_whole_collection() {
        let registry = Registry::new();
        registry.replace([light(1, "a"), light(2, "b")]);
        let old = registry.get(1).unwrap();

        registry.replace([light(3, "c")]);
        assert_eq!(registry.ids(), vec![3]);
        assert!(registry.get(1).is_none());
        // Entries handed out before the swap stay usable.
        assert_eq!(lock(&old).name(), "a");
    }

    #[test]
    fn test_insert_keeps_existing_entries() {
        let registry = Registry::new();
        registry.replace([light(1, "a")]);
        registry.insert(light(4, "d"));
        assert_eq!(registry.ids(), vec![1, 4]);
        assert_eq!(registry.devices()[1].name(), "d");
    }
}
