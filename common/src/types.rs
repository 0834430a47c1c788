use serde::Serialize;

use crate::registry::NodeId;
use crate::relays::RELAY_COUNT;

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub label: String,
    pub voltage: f32,
    pub current: f32,
    pub relay: bool,
    pub online: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub id: NodeId,
    pub temperature: f32,
    #[serde(rename = "uptimeSecs")]
    pub uptime_secs: u32,
    pub dim: u8,
    pub on: bool,
    pub connected: bool,
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
}

/// Full status answered on the local control surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub temperature: f32,
    pub time: String,
    #[serde(rename = "fanOn")]
    pub fan_on: bool,
    #[serde(rename = "fanThreshold")]
    pub fan_threshold: f32,
    pub relays: [bool; RELAY_COUNT],
    pub nodes: Vec<NodeView>,
    pub slots: Vec<SlotView>,
    pub ssid: String,
    #[serde(rename = "radioAvailable")]
    pub radio_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub id: NodeId,
    pub on: bool,
    pub dim: u8,
    pub connected: bool,
}

/// Compact snapshot published to the message bus on the fixed interval.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub temperature: f32,
    pub fan: bool,
    pub relays: [bool; RELAY_COUNT],
    pub nodes: Vec<SlotStatus>,
}
