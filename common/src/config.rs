use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_SYNC_WORD;
use crate::relays::RELAY_COUNT;

/// Timing and tuning constants for the controller loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub long_press_ms: u64,
    pub standby_timeout_ms: u64,
    pub discovery_window_ms: u64,
    pub sync_interval_ms: u64,
    pub status_publish_interval_ms: u64,
    pub node_rotate_ms: u64,
    pub input_poll_ms: u64,
    pub display_refresh_ms: u64,
    pub radio_poll_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            long_press_ms: 2_000,
            standby_timeout_ms: 15_000,
            discovery_window_ms: 500,
            sync_interval_ms: 5_000,
            status_publish_interval_ms: 5_000,
            node_rotate_ms: 3_000,
            input_poll_ms: 20,
            display_refresh_ms: 100,
            radio_poll_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            mqtt_host: "broker.hivemq.com".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Channel discriminator shared with the fleet; rejects cross-talk, not
    /// an authentication mechanism.
    pub sync_word: u8,
    pub listen_addr: String,
    pub peer_addr: String,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            sync_word: DEFAULT_SYNC_WORD,
            listen_addr: "127.0.0.1:47400".to_string(),
            peer_addr: "127.0.0.1:47401".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(rename = "fanThreshold")]
    pub fan_threshold: f32,
    #[serde(rename = "relayBoot")]
    pub relay_boot: [bool; RELAY_COUNT],
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            network: NetworkConfig::default(),
            radio: RadioConfig::default(),
            fan_threshold: 50.0,
            relay_boot: [false; RELAY_COUNT],
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        if !self.fan_threshold.is_finite() {
            self.fan_threshold = 50.0;
        }
        self.fan_threshold = self.fan_threshold.clamp(0.0, 100.0);

        if self.network.mqtt_host.trim().is_empty() {
            self.network.mqtt_host = NetworkConfig::default().mqtt_host;
        }
        if self.network.mqtt_port == 0 {
            self.network.mqtt_port = 1883;
        }
        if self.radio.listen_addr.trim().is_empty() {
            self.radio.listen_addr = RadioConfig::default().listen_addr;
        }
        if self.radio.peer_addr.trim().is_empty() {
            self.radio.peer_addr = RadioConfig::default().peer_addr;
        }
    }
}
