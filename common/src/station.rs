//! The shared mutable heart of the master: node registry, slot bank, local
//! relays, and fan state behind one aggregate. Every concurrent loop mutates
//! through a single lock around this struct; the operations here keep the
//! registry/slot invariants coordinated so callers cannot tear them apart.

use crate::registry::{NodeId, NodeRegistry, RegistryError, RegistryFile, TelemetryUpdate};
use crate::relays::{InvalidChannel, RelayBank, RELAY_COUNT};
use crate::screen::NodeCard;
use crate::slots::{SlotBank, SlotRangeError};
use crate::types::{NodeView, SlotStatus, SlotView, StatusPayload, StatusSnapshot};

/// One actuator intent to push over the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTarget {
    pub id: NodeId,
    pub on: bool,
    pub dim: u8,
}

#[derive(Debug, Clone)]
pub struct Station {
    registry: NodeRegistry,
    slots: SlotBank,
    relays: RelayBank,
    fan_on: bool,
    fan_threshold: f32,
}

impl Station {
    pub fn new(fan_threshold: f32) -> Self {
        Self {
            registry: NodeRegistry::new(),
            slots: SlotBank::new(),
            relays: RelayBank::default(),
            fan_on: false,
            fan_threshold,
        }
    }

    /// Boot-time restore: the registry seeds slot occupancy (and the on flag,
    /// which the byte-store overlay subsequently overrides).
    pub fn restore(
        registry: NodeRegistry,
        relay_boot: [bool; RELAY_COUNT],
        fan_threshold: f32,
    ) -> Self {
        let mut slots = SlotBank::new();
        for node in registry.iter() {
            slots.occupy(node.id);
            slots.seed_on(node.id, node.relay);
        }
        Self {
            registry,
            slots,
            relays: RelayBank::new(relay_boot),
            fan_on: false,
            fan_threshold,
        }
    }

    /// Applies the actuator byte store on top of the registry-seeded slots.
    /// The byte store wins for on/dim.
    pub fn overlay_slot_records(&mut self, records: &[(bool, u8)]) {
        for (index, (on, dim)) in records.iter().enumerate() {
            self.slots.overlay_actuator(index, *on, *dim);
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn slots(&self) -> &SlotBank {
        &self.slots
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry_file(&self) -> RegistryFile {
        self.registry.to_file()
    }

    // ---- node operations -------------------------------------------------

    /// Registers a node confirmed by the discovery flow and records its
    /// reply telemetry.
    pub fn add_discovered(
        &mut self,
        id: NodeId,
        label: &str,
        temperature: f32,
        uptime_secs: u32,
        now_ms: u64,
    ) -> Result<(), RegistryError> {
        self.registry.add(id, label, false)?;
        self.slots.occupy(id);
        self.slots.apply_telemetry(id, temperature, uptime_secs, now_ms);
        Ok(())
    }

    pub fn auto_add_node(&mut self, label: &str) -> Result<NodeId, RegistryError> {
        let id = self.registry.auto_add(label)?;
        self.slots.occupy(id);
        Ok(id)
    }

    /// Removes the registry entry and the slot mapping; the slot's persisted
    /// actuator fields are retained, never erased.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), RegistryError> {
        self.registry.remove(id)?;
        self.slots.vacate(id);
        Ok(())
    }

    /// An id change remaps slot occupancy. Actuator bytes stay at the old
    /// slot address and are never copied to the new one.
    pub fn edit_node(
        &mut self,
        id: NodeId,
        new_id: Option<NodeId>,
        new_label: Option<&str>,
    ) -> Result<(), RegistryError> {
        if let Some((old_id, changed_to)) = self.registry.edit(id, new_id, new_label)? {
            self.slots.vacate(old_id);
            self.slots.occupy(changed_to);
        }
        Ok(())
    }

    /// Flips the node's relay intent. Returns the command to push when the id
    /// maps to an occupied slot.
    pub fn toggle_node_relay(&mut self, id: NodeId) -> Result<Option<SyncTarget>, RegistryError> {
        let index = self.registry.find(id).ok_or(RegistryError::NotFound(id))?;
        let node = self.registry.node_mut(index);
        node.relay = !node.relay;
        let on = node.relay;

        if self.slots.set_on(id, on).is_ok() {
            if let Some(slot) = self.slots.get(id) {
                if slot.occupied() {
                    return Ok(Some(SyncTarget {
                        id,
                        on,
                        dim: slot.dim,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Stores the clamped dimmer value; works on any id in the addressable
    /// range so actuator memory survives node removal. Always yields a
    /// command for the id.
    pub fn set_node_dim(&mut self, id: NodeId, value: i64) -> Result<SyncTarget, SlotRangeError> {
        let dim = self.slots.set_dim(id, value)?;
        let on = self.slots.get(id).map(|slot| slot.on).unwrap_or(false);
        Ok(SyncTarget { id, on, dim })
    }

    /// Inbound telemetry: updates the slot (when addressable) and mirrors the
    /// report into the registry, auto-admitting unknown senders.
    pub fn handle_telemetry(
        &mut self,
        id: NodeId,
        temperature: f32,
        uptime_secs: u32,
        now_ms: u64,
    ) -> TelemetryUpdate {
        let relay = if SlotBank::index_of(id).is_some() {
            self.slots.apply_telemetry(id, temperature, uptime_secs, now_ms);
            self.slots.get(id).map(|slot| slot.on).unwrap_or(false)
        } else {
            false
        };
        // The registry's voltage/current pair mirrors the report until nodes
        // carry electrical telemetry.
        self.registry
            .update_telemetry(id, temperature, uptime_secs as f32, relay)
    }

    /// Intents for the periodic push; only occupied slots are addressable.
    pub fn sync_targets(&self) -> Vec<SyncTarget> {
        self.slots
            .occupied()
            .map(|slot| SyncTarget {
                id: slot.id,
                on: slot.on,
                dim: slot.dim,
            })
            .collect()
    }

    /// Connectivity goes unconfirmed the moment a command is sent.
    pub fn mark_sent(&mut self, id: NodeId) {
        self.slots.mark_unconfirmed(id);
    }

    /// Byte-store record for the id, when addressable.
    pub fn slot_record(&self, id: NodeId) -> Option<(usize, bool, u8)> {
        let index = SlotBank::index_of(id)?;
        let slot = self.slots.at(index)?;
        Some((index, slot.on, slot.dim))
    }

    // ---- local relays and fan --------------------------------------------

    pub fn relays(&self) -> [bool; RELAY_COUNT] {
        self.relays.states()
    }

    pub fn set_local_relay(&mut self, channel: usize, on: bool) -> Result<(), InvalidChannel> {
        self.relays.set(channel, on)
    }

    pub fn toggle_local_relay(&mut self, channel: usize) -> Result<bool, InvalidChannel> {
        self.relays.toggle(channel)
    }

    pub fn toggle_all_relays(&mut self) -> bool {
        self.relays.toggle_all()
    }

    pub fn update_fan(&mut self, temperature: f32) -> bool {
        self.fan_on = temperature >= self.fan_threshold;
        self.fan_on
    }

    pub fn fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn fan_threshold(&self) -> f32 {
        self.fan_threshold
    }

    pub fn set_fan_threshold(&mut self, threshold: f32) {
        self.fan_threshold = threshold;
    }

    // ---- views -----------------------------------------------------------

    pub fn node_card(&self, index: usize) -> Option<NodeCard> {
        let node = self.registry.by_index(index)?;
        let slot = self.slots.get(node.id);
        Some(NodeCard {
            id: node.id,
            label: node.label.clone(),
            dim: slot.map(|slot| slot.dim).unwrap_or(0),
            relay_on: node.relay,
            connected: slot.map(|slot| slot.connected).unwrap_or(false),
        })
    }

    pub fn snapshot(
        &self,
        time: String,
        temperature: f32,
        ssid: String,
        radio_available: bool,
    ) -> StatusSnapshot {
        StatusSnapshot {
            temperature,
            time,
            fan_on: self.fan_on,
            fan_threshold: self.fan_threshold,
            relays: self.relays.states(),
            nodes: self
                .registry
                .iter()
                .map(|node| NodeView {
                    id: node.id,
                    label: node.label.clone(),
                    voltage: node.voltage,
                    current: node.current,
                    relay: node.relay,
                    online: node.online,
                })
                .collect(),
            slots: self
                .slots
                .occupied()
                .map(|slot| SlotView {
                    id: slot.id,
                    temperature: slot.temperature,
                    uptime_secs: slot.uptime_secs,
                    dim: slot.dim,
                    on: slot.on,
                    connected: slot.connected,
                    last_update: slot.last_update.clone(),
                })
                .collect(),
            ssid,
            radio_available,
        }
    }

    pub fn status_payload(&self, temperature: f32) -> StatusPayload {
        StatusPayload {
            temperature,
            fan: self.fan_on,
            relays: self.relays.states(),
            nodes: self
                .slots
                .occupied()
                .map(|slot| SlotStatus {
                    id: slot.id,
                    on: slot.on,
                    dim: slot.dim,
                    connected: slot.connected,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn station_with_node(id: NodeId) -> Station {
        let mut station = Station::new(50.0);
        station
            .add_discovered(id, &format!("Node {id}"), 22.0, 60, 1_000)
            .unwrap();
        station
    }

    #[test]
    fn removal_keeps_slot_actuator_memory() {
        let mut station = station_with_node(4);
        station.set_node_dim(4, 180).unwrap();
        station.toggle_node_relay(4).unwrap();

        station.remove_node(4).unwrap();

        assert!(station.registry().get(4).is_none());
        let slot = station.slots().get(4).unwrap();
        assert!(!slot.occupied());
        assert!(slot.on);
        assert_eq!(slot.dim, 180);
    }

    #[test]
    fn edit_remaps_occupancy_without_copying_bytes() {
        let mut station = station_with_node(2);
        station.set_node_dim(2, 99).unwrap();

        station.edit_node(2, Some(5), None).unwrap();

        let old = station.slots().get(2).unwrap();
        assert!(!old.occupied());
        assert_eq!(old.dim, 99);

        let new = station.slots().get(5).unwrap();
        assert!(new.occupied());
        assert_eq!(new.dim, 0);
        assert!(!new.connected);
    }

    #[test]
    fn edit_to_unaddressable_id_keeps_node_without_slot() {
        let mut station = station_with_node(3);
        station.edit_node(3, Some(20), None).unwrap();

        assert!(station.registry().get(20).is_some());
        assert!(!station.slots().get(3).unwrap().occupied());
        assert!(station.sync_targets().is_empty());
    }

    #[test]
    fn toggle_node_relay_yields_sync_command_for_occupied_slot() {
        let mut station = station_with_node(6);
        station.set_node_dim(6, 40).unwrap();

        let target = station.toggle_node_relay(6).unwrap().unwrap();
        assert_eq!(
            target,
            SyncTarget {
                id: 6,
                on: true,
                dim: 40,
            }
        );
        assert_eq!(
            station.toggle_node_relay(99),
            Err(RegistryError::NotFound(99))
        );
    }

    #[test]
    fn dim_works_without_registry_entry() {
        let mut station = Station::new(50.0);
        let target = station.set_node_dim(7, 400).unwrap();

        assert_eq!(target.dim, 255);
        assert!(station.registry().get(7).is_none());
        assert_eq!(station.set_node_dim(0, 10), Err(SlotRangeError(0)));
        assert_eq!(station.set_node_dim(11, 10), Err(SlotRangeError(11)));
    }

    #[test]
    fn telemetry_updates_slot_and_registry_together() {
        let mut station = station_with_node(1);
        station.toggle_node_relay(1).unwrap();

        let outcome = station.handle_telemetry(1, 31.5, 900, 12_000);
        assert_eq!(outcome, TelemetryUpdate::Updated);

        let slot = station.slots().get(1).unwrap();
        assert!(slot.connected);
        assert_eq!(slot.temperature, 31.5);

        let node = station.registry().get(1).unwrap();
        assert_eq!(node.voltage, 31.5);
        assert_eq!(node.current, 900.0);
        assert!(node.relay);
        assert!(node.online);
    }

    #[test]
    fn telemetry_outside_slot_range_still_enters_registry() {
        let mut station = Station::new(50.0);
        let outcome = station.handle_telemetry(15, 20.0, 10, 500);

        assert_eq!(outcome, TelemetryUpdate::AutoAdded);
        assert_eq!(station.registry().get(15).unwrap().label, "Node 15");
        assert!(station.sync_targets().is_empty());
    }

    #[test]
    fn sync_targets_cover_only_occupied_slots() {
        let mut station = station_with_node(1);
        station.add_discovered(3, "three", 20.0, 5, 100).unwrap();
        station.set_node_dim(9, 70).unwrap(); // actuator memory, no node

        let mut ids: Vec<NodeId> = station.sync_targets().iter().map(|t| t.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn sync_send_marks_connectivity_unconfirmed() {
        let mut station = station_with_node(2);
        assert!(station.slots().get(2).unwrap().connected);

        station.mark_sent(2);
        assert!(!station.slots().get(2).unwrap().connected);
    }

    #[test]
    fn restore_seeds_occupancy_then_byte_store_wins() {
        let mut registry = NodeRegistry::new();
        registry.add(1, "one", true).unwrap();
        registry.add(2, "two", false).unwrap();

        let mut station = Station::restore(registry, [false; RELAY_COUNT], 50.0);
        // Registry relay flag seeds the on state...
        assert!(station.slots().get(1).unwrap().on);
        assert!(!station.slots().get(2).unwrap().on);

        // ...and the byte store overrides it.
        let mut records = vec![(false, 0u8); 10];
        records[0] = (false, 120);
        records[1] = (true, 33);
        station.overlay_slot_records(&records);

        let first = station.slots().get(1).unwrap();
        assert!(!first.on);
        assert_eq!(first.dim, 120);
        let second = station.slots().get(2).unwrap();
        assert!(second.on);
        assert_eq!(second.dim, 33);
    }

    #[test]
    fn auto_add_assigns_fresh_id_and_occupies_slot() {
        let mut station = station_with_node(9);
        let id = station.auto_add_node("workbench").unwrap();

        assert_eq!(id, 10);
        assert_eq!(station.registry().get(10).unwrap().label, "workbench");
        assert!(station.slots().get(10).unwrap().occupied());
    }

    #[test]
    fn fan_follows_threshold() {
        let mut station = Station::new(50.0);
        assert!(!station.update_fan(49.9));
        assert!(station.update_fan(50.0));
        assert!(station.fan_on());
    }

    #[test]
    fn node_card_merges_registry_and_slot_state() {
        let mut station = station_with_node(2);
        station.set_node_dim(2, 77).unwrap();

        let card = station.node_card(0).unwrap();
        assert_eq!(card.id, 2);
        assert_eq!(card.dim, 77);
        assert!(card.connected);
        assert!(station.node_card(1).is_none());
    }
}
