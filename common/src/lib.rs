pub mod buttons;
pub mod config;
pub mod feedback;
pub mod protocol;
pub mod registry;
pub mod relays;
pub mod screen;
pub mod slots;
pub mod station;
pub mod topics;
pub mod types;
pub mod ui;

pub use buttons::{ButtonEvent, ButtonId, ButtonTracker, BUTTON_COUNT};
pub use config::{ControllerConfig, NetworkConfig, RadioConfig, RuntimeConfig};
pub use feedback::FeedbackPulse;
pub use protocol::{CommandFrame, Frame, FrameError, TelemetryFrame};
pub use registry::{
    Node, NodeId, NodeRecord, NodeRegistry, RegistryError, RegistryFile, TelemetryUpdate,
    MAX_NODES,
};
pub use relays::{InvalidChannel, RelayBank, RELAY_COUNT};
pub use screen::{NodeCard, NodeRotation, Screen};
pub use slots::{Slot, SlotBank, SlotRangeError, SLOT_COUNT};
pub use station::{Station, SyncTarget};
pub use topics::*;
pub use types::{NodeView, SlotStatus, SlotView, StatusPayload, StatusSnapshot};
pub use ui::{MenuState, UiAction, UiEngine, MENU_ITEMS};
