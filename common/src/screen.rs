//! Pure display model. The display loop builds a [`Screen`] every refresh and
//! hands it to the rendering adapter; drawing is not this crate's concern.

use crate::registry::NodeId;
use crate::relays::RELAY_COUNT;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCard {
    pub id: NodeId,
    pub label: String,
    pub dim: u8,
    pub relay_on: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Large clock shown after the inactivity timeout.
    Standby { clock: String },
    Data {
        clock: String,
        temperature: f32,
        relays: [bool; RELAY_COUNT],
        network_up: bool,
        node: Option<NodeCard>,
    },
    MenuTop { cursor: usize },
    TimeEdit {
        hour: u8,
        minute: u8,
        second: u8,
        field: usize,
    },
    Orientation { flip_pending: bool },
    NetworkInfo {
        ssid: Option<String>,
        broker: String,
    },
}

/// Cycles the data screen through the known nodes on a fixed cadence.
#[derive(Debug, Clone, Default)]
pub struct NodeRotation {
    last_switch_ms: u64,
    index: usize,
}

impl NodeRotation {
    pub fn current(&mut self, count: usize, rotate_ms: u64, now_ms: u64) -> Option<usize> {
        if count == 0 {
            self.index = 0;
            return None;
        }
        if now_ms.saturating_sub(self.last_switch_ms) >= rotate_ms {
            self.index = (self.index + 1) % count;
            self.last_switch_ms = now_ms;
        }
        Some(self.index % count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_advances_on_cadence() {
        let mut rotation = NodeRotation::default();

        assert_eq!(rotation.current(3, 3_000, 3_000), Some(1));
        assert_eq!(rotation.current(3, 3_000, 4_000), Some(1));
        assert_eq!(rotation.current(3, 3_000, 6_000), Some(2));
        assert_eq!(rotation.current(3, 3_000, 9_000), Some(0));
    }

    #[test]
    fn rotation_handles_empty_and_shrinking_lists() {
        let mut rotation = NodeRotation::default();
        assert_eq!(rotation.current(0, 3_000, 1_000), None);

        rotation.current(4, 3_000, 3_000);
        rotation.current(4, 3_000, 6_000);
        // List shrank below the cursor; the index stays in bounds.
        let index = rotation.current(2, 3_000, 6_500).unwrap();
        assert!(index < 2);
    }
}
