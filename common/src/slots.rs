use thiserror::Error;

use crate::registry::NodeId;

/// Number of addressable actuator slots; ids `1..=SLOT_COUNT` map to `id - 1`.
pub const SLOT_COUNT: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("node id {0} is outside the addressable slot range")]
pub struct SlotRangeError(pub NodeId);

/// Actuator-state record for one addressable node. `id == 0` means vacant;
/// `on` and `dim` are the persisted actuator intent and survive vacancy so a
/// re-added node recovers its last commanded state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    pub id: NodeId,
    pub temperature: f32,
    pub uptime_secs: u32,
    pub dim: u8,
    pub on: bool,
    pub connected: bool,
    pub last_update: String,
}

impl Slot {
    pub fn occupied(&self) -> bool {
        self.id != 0
    }
}

#[derive(Debug, Clone)]
pub struct SlotBank {
    slots: [Slot; SLOT_COUNT],
}

impl Default for SlotBank {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }
}

impl SlotBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(id: NodeId) -> Option<usize> {
        if (1..=SLOT_COUNT as NodeId).contains(&id) {
            Some(id as usize - 1)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn occupied(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.occupied())
    }

    pub fn get(&self, id: NodeId) -> Option<&Slot> {
        Self::index_of(id).map(|index| &self.slots[index])
    }

    pub fn at(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Maps the id into its slot, keeping whatever actuator state is already
    /// stored there. Connectivity starts unconfirmed.
    pub fn occupy(&mut self, id: NodeId) {
        if let Some(index) = Self::index_of(id) {
            let slot = &mut self.slots[index];
            slot.id = id;
            slot.connected = false;
        }
    }

    /// Clears the mapping and connectivity; `on`/`dim` are retained.
    pub fn vacate(&mut self, id: NodeId) {
        if let Some(index) = Self::index_of(id) {
            let slot = &mut self.slots[index];
            slot.id = 0;
            slot.connected = false;
        }
    }

    /// Seeds the on flag from the restored registry; the byte store overlay
    /// runs afterwards and wins.
    pub fn seed_on(&mut self, id: NodeId, on: bool) {
        if let Some(index) = Self::index_of(id) {
            self.slots[index].on = on;
        }
    }

    pub fn overlay_actuator(&mut self, index: usize, on: bool, dim: u8) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.on = on;
            slot.dim = dim;
        }
    }

    /// Clamps into the dimmer range. Works on any in-range id, occupied or
    /// not, so actuator memory can be written for ids without a node.
    pub fn set_dim(&mut self, id: NodeId, value: i64) -> Result<u8, SlotRangeError> {
        let index = Self::index_of(id).ok_or(SlotRangeError(id))?;
        let dim = value.clamp(0, 255) as u8;
        self.slots[index].dim = dim;
        Ok(dim)
    }

    pub fn set_on(&mut self, id: NodeId, on: bool) -> Result<(), SlotRangeError> {
        let index = Self::index_of(id).ok_or(SlotRangeError(id))?;
        self.slots[index].on = on;
        Ok(())
    }

    /// Inbound telemetry re-occupies the slot and asserts connectivity.
    pub fn apply_telemetry(&mut self, id: NodeId, temperature: f32, uptime_secs: u32, now_ms: u64) {
        if let Some(index) = Self::index_of(id) {
            let slot = &mut self.slots[index];
            slot.id = id;
            slot.temperature = temperature;
            slot.uptime_secs = uptime_secs;
            slot.connected = true;
            slot.last_update = format!("{}s", now_ms / 1000);
        }
    }

    /// Connectivity is unconfirmed from the moment a command goes out until
    /// the node is heard from again.
    pub fn mark_unconfirmed(&mut self, id: NodeId) {
        if let Some(index) = Self::index_of(id) {
            self.slots[index].connected = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_maps_id_minus_one_within_range() {
        assert_eq!(SlotBank::index_of(1), Some(0));
        assert_eq!(SlotBank::index_of(SLOT_COUNT as NodeId), Some(SLOT_COUNT - 1));
        assert_eq!(SlotBank::index_of(0), None);
        assert_eq!(SlotBank::index_of(SLOT_COUNT as NodeId + 1), None);
    }

    #[test]
    fn dim_clamps_to_byte_range() {
        let mut bank = SlotBank::new();
        assert_eq!(bank.set_dim(3, -5).unwrap(), 0);
        assert_eq!(bank.set_dim(3, 400).unwrap(), 255);
        assert_eq!(bank.set_dim(3, 128).unwrap(), 128);
        assert_eq!(bank.set_dim(11, 10), Err(SlotRangeError(11)));
    }

    #[test]
    fn vacate_keeps_actuator_state() {
        let mut bank = SlotBank::new();
        bank.occupy(2);
        bank.set_on(2, true).unwrap();
        bank.set_dim(2, 200).unwrap();

        bank.vacate(2);

        let slot = bank.get(2).unwrap();
        assert!(!slot.occupied());
        assert!(slot.on);
        assert_eq!(slot.dim, 200);
        assert!(!slot.connected);
    }

    #[test]
    fn telemetry_occupies_and_connects() {
        let mut bank = SlotBank::new();
        bank.apply_telemetry(5, 24.5, 120, 9_000);

        let slot = bank.get(5).unwrap();
        assert!(slot.occupied());
        assert!(slot.connected);
        assert_eq!(slot.temperature, 24.5);
        assert_eq!(slot.uptime_secs, 120);
        assert_eq!(slot.last_update, "9s");

        bank.mark_unconfirmed(5);
        assert!(!bank.get(5).unwrap().connected);
    }
}
