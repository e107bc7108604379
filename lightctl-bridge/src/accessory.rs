//! Accessory bindings between the smart-home framework and device channels.
//!
//! Every configured device becomes one accessory with a single boolean
//! "on" characteristic. Reads come from the shared [`ChannelStateTable`],
//! writes go through the [`CommandDispatcher`], and every status report is
//! pushed to subscribers through a `watch` channel per accessory.
//!
//! Accessories persisted by the framework's cache come back through
//! [`AccessoryRegistry::restore`], before [`AccessoryRegistry::discover`]
//! runs. The bundled binary keeps no cache and starts from discovery alone.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use lightctl_protocol::Channel;

use crate::dispatch::{CommandDispatcher, DispatchOutcome};
use crate::state::ChannelStateTable;

/// Stable external identity of an accessory.
pub type AccessoryId = Uuid;

/// Namespace for deriving accessory ids from configured device ids.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6c69_6768_7463_746c_8000_0000_0000_0001);

/// Derive the accessory id for a configured device id.
///
/// The same device id always yields the same accessory id, so accessories
/// keep their identity across restarts.
pub fn accessory_id(device_id: &str) -> AccessoryId {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, device_id.as_bytes())
}

/// One entry of the declarative device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    pub name: String,
    pub channel: Channel,
}

/// Accessory information service values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    /// Name of the lightbulb service.
    pub service_name: String,
}

impl AccessoryInfo {
    pub fn for_channel(channel: Channel) -> Self {
        Self {
            manufacturer: "Arduino".to_string(),
            model: "Light Controller".to_string(),
            serial_number: format!("Channel {}", channel),
            service_name: format!("Light Channel {}", channel),
        }
    }
}

/// An accessory handed back by the framework from its own cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAccessory {
    pub id: AccessoryId,
    pub display_name: String,
}

/// Error type for binding operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// No accessory with this id is bound.
    #[error("Unknown accessory: {0}")]
    UnknownAccessory(AccessoryId),

    /// Another accessory already owns the channel.
    #[error("Channel {channel} is already bound to accessory {existing}")]
    ChannelTaken {
        channel: Channel,
        existing: AccessoryId,
    },
}

/// A bound accessory.
#[derive(Debug)]
struct Accessory {
    id: AccessoryId,
    display_name: String,
    device: DeviceEntry,
    info: AccessoryInfo,
    on: Arc<watch::Sender<bool>>,
}

impl Accessory {
    fn update(&self, value: bool) {
        self.on.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    fn snapshot(&self) -> AccessorySnapshot {
        AccessorySnapshot {
            id: self.id,
            display_name: self.display_name.clone(),
            device_id: self.device.id.clone(),
            channel: self.device.channel,
            on: *self.on.borrow(),
            info: self.info.clone(),
        }
    }
}

/// Point-in-time view of an accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessorySnapshot {
    pub id: AccessoryId,
    pub display_name: String,
    pub device_id: String,
    pub channel: Channel,
    /// Last value pushed to the "on" characteristic.
    pub on: bool,
    pub info: AccessoryInfo,
}

/// What a discovery pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Accessories that did not exist before and must be registered.
    pub created: Vec<AccessoryId>,
    /// Accessories that were restored or already bound.
    pub updated: Vec<AccessoryId>,
    /// Device ids that could not be bound.
    pub rejected: Vec<(String, BindingError)>,
}

#[derive(Debug, Default)]
struct Bindings {
    accessories: HashMap<AccessoryId, Arc<Accessory>>,
    by_channel: BTreeMap<Channel, AccessoryId>,
}

/// Registry of accessories and their channel bindings.
#[derive(Debug)]
pub struct AccessoryRegistry {
    table: Arc<ChannelStateTable>,
    dispatcher: CommandDispatcher,
    cached: RwLock<HashMap<AccessoryId, CachedAccessory>>,
    bindings: RwLock<Bindings>,
}

impl AccessoryRegistry {
    pub fn new(table: Arc<ChannelStateTable>, dispatcher: CommandDispatcher) -> Self {
        Self {
            table,
            dispatcher,
            cached: RwLock::new(HashMap::new()),
            bindings: RwLock::new(Bindings::default()),
        }
    }

    /// Accept an accessory restored from the framework cache.
    pub fn restore(&self, accessory: CachedAccessory) {
        info!("Loading accessory from cache: {}", accessory.display_name);
        self.cached.write().insert(accessory.id, accessory);
    }

    /// Bind every configured device to an accessory.
    ///
    /// Called once all cached accessories have been restored. Existing
    /// accessories are reused by id; a channel may be bound only once.
    pub fn discover(&self, devices: &[DeviceEntry]) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let cached = self.cached.read();
        let mut guard = self.bindings.write();
        let bindings = &mut *guard;

        for device in devices {
            let id = accessory_id(&device.id);

            if let Some(existing) = bindings.by_channel.get(&device.channel) {
                if *existing != id {
                    let err = BindingError::ChannelTaken {
                        channel: device.channel,
                        existing: *existing,
                    };
                    warn!("Skipping device {}: {}", device.id, err);
                    report.rejected.push((device.id.clone(), err));
                    continue;
                }
            }

            let (display_name, existing_on) =
                match (bindings.accessories.get(&id), cached.get(&id)) {
                    (Some(bound), _) => {
                        info!("Updating accessory {}", bound.display_name);
                        let previous = bound.device.channel;
                        if previous != device.channel {
                            bindings.by_channel.remove(&previous);
                        }
                        report.updated.push(id);
                        (bound.display_name.clone(), Some(Arc::clone(&bound.on)))
                    }
                    (None, Some(restored)) => {
                        info!("Updating accessory {}", restored.display_name);
                        report.updated.push(id);
                        (restored.display_name.clone(), None)
                    }
                    (None, None) => {
                        info!("Create accessory {}", device.name);
                        report.created.push(id);
                        (device.name.clone(), None)
                    }
                };

            // Subscribers of a re-bound accessory keep their receiver.
            let current = self.table.channel(device.channel);
            let on = existing_on.unwrap_or_else(|| Arc::new(watch::channel(current).0));
            let accessory = Accessory {
                id,
                display_name,
                device: device.clone(),
                info: AccessoryInfo::for_channel(device.channel),
                on,
            };
            accessory.update(current);

            bindings.by_channel.insert(device.channel, id);
            bindings.accessories.insert(id, Arc::new(accessory));
        }

        report
    }

    fn lookup(&self, id: AccessoryId) -> Result<Arc<Accessory>, BindingError> {
        self.bindings
            .read()
            .accessories
            .get(&id)
            .cloned()
            .ok_or(BindingError::UnknownAccessory(id))
    }

    /// Current state of the accessory's channel.
    pub fn handle_get(&self, id: AccessoryId) -> Result<bool, BindingError> {
        let accessory = self.lookup(id)?;
        let channel = accessory.device.channel;
        debug!("Checking state for channel {}", channel);
        Ok(self.table.channel(channel))
    }

    /// Switch the accessory's channel.
    pub async fn handle_set(
        &self,
        id: AccessoryId,
        value: bool,
    ) -> Result<DispatchOutcome, BindingError> {
        let accessory = self.lookup(id)?;
        let channel = accessory.device.channel;

        let outcome = self.dispatcher.send_command(channel, value).await;
        accessory.update(self.table.channel(channel));

        Ok(outcome)
    }

    /// Push a freshly installed status report to every bound accessory.
    ///
    /// Values are read back from the table and always match
    /// [`handle_get`](Self::handle_get), including optimistic writes that
    /// land after the report. Bound channels the report does not mention are
    /// pushed as off. Reported channels without an accessory are ignored.
    pub fn push_states(&self) {
        let bindings = self.bindings.read();
        for (channel, id) in &bindings.by_channel {
            let value = self.table.channel(*channel);
            if let Some(accessory) = bindings.accessories.get(id) {
                trace!("Pushing channel {} = {} to {}", channel, value, accessory.display_name);
                accessory.update(value);
            }
        }
    }

    /// Watch the accessory's "on" characteristic.
    pub fn subscribe(&self, id: AccessoryId) -> Result<watch::Receiver<bool>, BindingError> {
        Ok(self.lookup(id)?.on.subscribe())
    }

    /// Snapshot of one accessory.
    pub fn get(&self, id: AccessoryId) -> Option<AccessorySnapshot> {
        self.lookup(id).ok().map(|a| a.snapshot())
    }

    /// Snapshots of every accessory, ordered by channel.
    pub fn accessories(&self) -> Vec<AccessorySnapshot> {
        let bindings = self.bindings.read();
        bindings
            .by_channel
            .values()
            .filter_map(|id| bindings.accessories.get(id))
            .map(|a| a.snapshot())
            .collect()
    }

    /// Accessory bound to `channel`, if any.
    pub fn bound_to(&self, channel: Channel) -> Option<AccessoryId> {
        self.bindings.read().by_channel.get(&channel).copied()
    }

    pub fn table(&self) -> &Arc<ChannelStateTable> {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchPolicy;
    use crate::transport::{spawn_link, LinkHandle};
    use lightctl_protocol::LineDelimiter;
    use tokio::io::AsyncReadExt;

    fn device(id: &str, channel: u32) -> DeviceEntry {
        DeviceEntry {
            id: id.to_string(),
            name: format!("Light {}", id),
            channel: Channel(channel),
        }
    }

    fn offline_registry() -> AccessoryRegistry {
        let table = Arc::new(ChannelStateTable::new());
        let dispatcher = CommandDispatcher::new(
            LinkHandle::disconnected(),
            Arc::clone(&table),
            DispatchPolicy::default(),
        );
        AccessoryRegistry::new(table, dispatcher)
    }

    #[test]
    fn test_accessory_id_is_stable() {
        assert_eq!(accessory_id("kitchen"), accessory_id("kitchen"));
        assert_ne!(accessory_id("kitchen"), accessory_id("hall"));
    }

    #[test]
    fn test_accessory_info() {
        let info = AccessoryInfo::for_channel(Channel(4));
        assert_eq!(info.manufacturer, "Arduino");
        assert_eq!(info.model, "Light Controller");
        assert_eq!(info.serial_number, "Channel 4");
        assert_eq!(info.service_name, "Light Channel 4");
    }

    #[test]
    fn test_push_to_bound_channels_only() {
        let registry = offline_registry();
        let report = registry.discover(&[device("a", 1), device("b", 3)]);
        assert_eq!(report.created.len(), 2);
        assert!(report.rejected.is_empty());

        let a = accessory_id("a");
        let b = accessory_id("b");
        let mut rx_a = registry.subscribe(a).unwrap();
        let mut rx_b = registry.subscribe(b).unwrap();

        registry.table().replace(vec![true, false, true]);
        registry.push_states();

        assert!(rx_a.has_changed().unwrap());
        assert!(*rx_a.borrow_and_update());
        assert!(*rx_b.borrow_and_update());
        assert_eq!(registry.bound_to(Channel(2)), None);
        assert!(registry.handle_get(a).unwrap());
        assert!(registry.handle_get(b).unwrap());
    }

    #[test]
    fn test_get_reads_table() {
        let registry = offline_registry();
        registry.discover(&[device("two", 2), device("three", 3)]);
        registry
            .table()
            .replace(vec![true, false, true, true, false, false, true, false]);

        assert!(registry.handle_get(accessory_id("three")).unwrap());
        assert!(!registry.handle_get(accessory_id("two")).unwrap());
    }

    #[test]
    fn test_omitted_bound_channel_pushed_as_off() {
        let registry = offline_registry();
        registry.discover(&[device("far", 6)]);
        let id = accessory_id("far");

        registry.table().replace(vec![false, false, false, false, false, true]);
        registry.push_states();
        assert!(registry.get(id).unwrap().on);

        registry.table().replace(vec![true, true]);
        registry.push_states();
        assert!(!registry.get(id).unwrap().on);
    }

    #[test]
    fn test_push_agrees_with_optimistic_write_after_report() {
        let registry = offline_registry();
        registry.discover(&[device("hall", 2)]);
        let id = accessory_id("hall");

        // Report installed, then an optimistic write lands before the push.
        registry.table().replace(vec![false, false]);
        registry.table().set_optimistic(1, true);
        registry.push_states();

        assert!(registry.get(id).unwrap().on);
        assert_eq!(registry.get(id).unwrap().on, registry.handle_get(id).unwrap());
    }

    #[test]
    fn test_channel_bound_once() {
        let registry = offline_registry();
        let report = registry.discover(&[device("a", 1), device("b", 1)]);

        assert_eq!(report.created, vec![accessory_id("a")]);
        assert_eq!(
            report.rejected,
            vec![(
                "b".to_string(),
                BindingError::ChannelTaken {
                    channel: Channel(1),
                    existing: accessory_id("a"),
                }
            )]
        );
        assert_eq!(registry.bound_to(Channel(1)), Some(accessory_id("a")));
    }

    #[test]
    fn test_restored_accessory_is_updated_not_created() {
        let registry = offline_registry();
        registry.restore(CachedAccessory {
            id: accessory_id("porch"),
            display_name: "Porch (cached)".to_string(),
        });

        let report = registry.discover(&[device("porch", 2), device("new", 5)]);
        assert_eq!(report.updated, vec![accessory_id("porch")]);
        assert_eq!(report.created, vec![accessory_id("new")]);

        let snapshot = registry.get(accessory_id("porch")).unwrap();
        assert_eq!(snapshot.display_name, "Porch (cached)");
        assert_eq!(snapshot.channel, Channel(2));
    }

    #[test]
    fn test_rediscovery_moves_channel() {
        let registry = offline_registry();
        registry.discover(&[device("a", 1)]);
        let report = registry.discover(&[device("a", 4)]);

        assert_eq!(report.updated, vec![accessory_id("a")]);
        assert_eq!(registry.bound_to(Channel(1)), None);
        assert_eq!(registry.bound_to(Channel(4)), Some(accessory_id("a")));
        assert_eq!(registry.accessories().len(), 1);
    }

    #[test]
    fn test_unknown_accessory() {
        let registry = offline_registry();
        let id = accessory_id("ghost");
        assert_eq!(registry.handle_get(id), Err(BindingError::UnknownAccessory(id)));
        assert!(registry.get(id).is_none());
    }

    #[tokio::test]
    async fn test_set_dispatches_and_reads_back() {
        let (host, mut device_end) = tokio::io::duplex(256);
        let (link, _events) = spawn_link(host, LineDelimiter::Lf);
        let table = Arc::new(ChannelStateTable::new());
        let dispatcher = CommandDispatcher::new(link, Arc::clone(&table), DispatchPolicy::default());
        let registry = AccessoryRegistry::new(table, dispatcher);
        registry.discover(&[device("desk", 3)]);
        let id = accessory_id("desk");

        let outcome = registry.handle_set(id, true).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Sent);
        assert!(registry.handle_get(id).unwrap());
        assert!(registry.get(id).unwrap().on);

        let mut buf = [0u8; 5];
        device_end.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ON 3\n");
    }

    #[tokio::test]
    async fn test_set_unknown_accessory() {
        let registry = offline_registry();
        let id = accessory_id("ghost");
        assert_eq!(
            registry.handle_set(id, true).await,
            Err(BindingError::UnknownAccessory(id))
        );
    }
}
