//! Menu and input state machine. Button events come from the tracker; the
//! engine answers with the actions the owning loop must carry out (relay
//! toggles, feedback tones, clock commit, orientation change). Exactly one
//! menu state is active and transitions happen on button events only.

use crate::buttons::{ButtonEvent, ButtonId};

pub const MENU_ITEMS: [&str; 4] = [
    "Time Setting",
    "Screen Setting",
    "Internet Setting",
    "Exit",
];

const ITEM_TIME: usize = 0;
const ITEM_ORIENTATION: usize = 1;
const ITEM_NETWORK: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    /// Rotating status display; direct relay control on long presses.
    Idle,
    Top {
        cursor: usize,
    },
    TimeEdit {
        hour: u8,
        minute: u8,
        second: u8,
        field: usize,
    },
    Orientation {
        flip_pending: bool,
    },
    NetworkInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    ToggleRelay(usize),
    Beep { frequency_hz: u16, duration_ms: u64 },
    SetClock { hour: u8, minute: u8, second: u8 },
    ApplyOrientation { flipped: bool },
}

fn beep(frequency_hz: u16, duration_ms: u64) -> UiAction {
    UiAction::Beep {
        frequency_hz,
        duration_ms,
    }
}

#[derive(Debug, Clone)]
pub struct UiEngine {
    state: MenuState,
    flipped: bool,
    standby_timeout_ms: u64,
    last_activity_ms: u64,
}

impl UiEngine {
    pub fn new(standby_timeout_ms: u64) -> Self {
        Self {
            state: MenuState::Idle,
            flipped: false,
            standby_timeout_ms,
            last_activity_ms: 0,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn in_menu(&self) -> bool {
        self.state != MenuState::Idle
    }

    pub fn orientation_flipped(&self) -> bool {
        self.flipped
    }

    /// Standby only ever applies to the idle status display.
    pub fn is_standby(&self, now_ms: u64) -> bool {
        self.state == MenuState::Idle
            && now_ms.saturating_sub(self.last_activity_ms) >= self.standby_timeout_ms
    }

    /// `clock` is the current wall time, used to seed the time editor.
    pub fn handle_event(
        &mut self,
        event: ButtonEvent,
        now_ms: u64,
        clock: (u8, u8, u8),
    ) -> Vec<UiAction> {
        self.last_activity_ms = now_ms;

        match self.state {
            MenuState::Idle => self.handle_idle(event),
            MenuState::Top { cursor } => self.handle_top(event, cursor, clock),
            MenuState::TimeEdit {
                hour,
                minute,
                second,
                field,
            } => self.handle_time_edit(event, hour, minute, second, field),
            MenuState::Orientation { flip_pending } => self.handle_orientation(event, flip_pending),
            MenuState::NetworkInfo => self.handle_network_info(event),
        }
    }

    fn handle_idle(&mut self, event: ButtonEvent) -> Vec<UiAction> {
        match event {
            // Short presses only wake the display (activity already noted).
            ButtonEvent::Pressed(_) => Vec::new(),
            ButtonEvent::LongPress(ButtonId::Menu) => {
                self.state = MenuState::Top { cursor: 0 };
                vec![beep(1500, 120)]
            }
            ButtonEvent::LongPress(button) => match button.relay_channel() {
                Some(channel) => vec![UiAction::ToggleRelay(channel), beep(1500, 120)],
                None => Vec::new(),
            },
        }
    }

    fn handle_top(
        &mut self,
        event: ButtonEvent,
        cursor: usize,
        clock: (u8, u8, u8),
    ) -> Vec<UiAction> {
        let ButtonEvent::Pressed(button) = event else {
            return Vec::new();
        };
        match button {
            ButtonId::Up => {
                self.state = MenuState::Top {
                    cursor: (cursor + MENU_ITEMS.len() - 1) % MENU_ITEMS.len(),
                };
                vec![beep(1000, 50)]
            }
            ButtonId::Down => {
                self.state = MenuState::Top {
                    cursor: (cursor + 1) % MENU_ITEMS.len(),
                };
                vec![beep(1000, 50)]
            }
            ButtonId::Select => {
                self.state = match cursor {
                    ITEM_TIME => MenuState::TimeEdit {
                        hour: clock.0,
                        minute: clock.1,
                        second: clock.2,
                        field: 0,
                    },
                    ITEM_ORIENTATION => MenuState::Orientation {
                        flip_pending: self.flipped,
                    },
                    ITEM_NETWORK => MenuState::NetworkInfo,
                    _ => MenuState::Idle,
                };
                vec![beep(1000, 80)]
            }
            ButtonId::Back => {
                self.state = MenuState::Idle;
                vec![beep(1000, 80)]
            }
            ButtonId::Menu => Vec::new(),
        }
    }

    fn handle_time_edit(
        &mut self,
        event: ButtonEvent,
        hour: u8,
        minute: u8,
        second: u8,
        field: usize,
    ) -> Vec<UiAction> {
        let ButtonEvent::Pressed(button) = event else {
            return Vec::new();
        };
        let (mut hour, mut minute, mut second) = (hour, minute, second);
        match button {
            ButtonId::Up => {
                match field {
                    0 => hour = (hour + 1) % 24,
                    1 => minute = (minute + 1) % 60,
                    _ => second = (second + 1) % 60,
                }
                self.state = MenuState::TimeEdit {
                    hour,
                    minute,
                    second,
                    field,
                };
                vec![beep(1200, 60)]
            }
            ButtonId::Down => {
                match field {
                    0 => hour = (hour + 23) % 24,
                    1 => minute = (minute + 59) % 60,
                    _ => second = (second + 59) % 60,
                }
                self.state = MenuState::TimeEdit {
                    hour,
                    minute,
                    second,
                    field,
                };
                vec![beep(1200, 60)]
            }
            ButtonId::Select => {
                self.state = MenuState::TimeEdit {
                    hour,
                    minute,
                    second,
                    field: (field + 1) % 3,
                };
                vec![beep(1000, 60)]
            }
            ButtonId::Back => {
                self.state = MenuState::Top { cursor: 0 };
                vec![
                    UiAction::SetClock {
                        hour,
                        minute,
                        second,
                    },
                    beep(900, 80),
                ]
            }
            ButtonId::Menu => Vec::new(),
        }
    }

    fn handle_orientation(&mut self, event: ButtonEvent, flip_pending: bool) -> Vec<UiAction> {
        let ButtonEvent::Pressed(button) = event else {
            return Vec::new();
        };
        match button {
            ButtonId::Up | ButtonId::Down => {
                self.state = MenuState::Orientation {
                    flip_pending: !flip_pending,
                };
                vec![beep(1000, 50)]
            }
            ButtonId::Select => {
                self.flipped = flip_pending;
                vec![
                    UiAction::ApplyOrientation {
                        flipped: flip_pending,
                    },
                    beep(1000, 80),
                ]
            }
            ButtonId::Back => {
                self.state = MenuState::Top { cursor: 0 };
                vec![beep(900, 80)]
            }
            ButtonId::Menu => Vec::new(),
        }
    }

    fn handle_network_info(&mut self, event: ButtonEvent) -> Vec<UiAction> {
        match event {
            ButtonEvent::Pressed(ButtonId::Back) => {
                self.state = MenuState::Top { cursor: 0 };
                vec![beep(900, 80)]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CLOCK: (u8, u8, u8) = (12, 30, 0);

    fn press(engine: &mut UiEngine, button: ButtonId, now_ms: u64) -> Vec<UiAction> {
        engine.handle_event(ButtonEvent::Pressed(button), now_ms, CLOCK)
    }

    fn long_press(engine: &mut UiEngine, button: ButtonId, now_ms: u64) -> Vec<UiAction> {
        engine.handle_event(ButtonEvent::LongPress(button), now_ms, CLOCK)
    }

    #[test]
    fn long_press_menu_enters_top_at_cursor_zero() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        assert_eq!(engine.state(), MenuState::Top { cursor: 0 });
    }

    #[test]
    fn short_presses_in_idle_never_change_state() {
        let mut engine = UiEngine::new(15_000);
        for button in [
            ButtonId::Up,
            ButtonId::Select,
            ButtonId::Down,
            ButtonId::Back,
            ButtonId::Menu,
        ] {
            let actions = press(&mut engine, button, 100);
            assert!(actions.is_empty());
            assert_eq!(engine.state(), MenuState::Idle);
        }
    }

    #[test]
    fn long_press_on_direct_button_toggles_relay_in_place() {
        let mut engine = UiEngine::new(15_000);
        let actions = long_press(&mut engine, ButtonId::Down, 2_000);

        assert_eq!(actions[0], UiAction::ToggleRelay(2));
        assert_eq!(engine.state(), MenuState::Idle);
    }

    #[test]
    fn cursor_wraps_in_both_directions() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);

        press(&mut engine, ButtonId::Up, 2_100);
        assert_eq!(engine.state(), MenuState::Top { cursor: 3 });

        press(&mut engine, ButtonId::Down, 2_200);
        assert_eq!(engine.state(), MenuState::Top { cursor: 0 });
    }

    #[test]
    fn select_seeds_time_editor_from_clock() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        press(&mut engine, ButtonId::Select, 2_100);

        assert_eq!(
            engine.state(),
            MenuState::TimeEdit {
                hour: 12,
                minute: 30,
                second: 0,
                field: 0,
            }
        );
    }

    #[test]
    fn time_editor_adjusts_and_commits_on_back() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        press(&mut engine, ButtonId::Select, 2_100);

        // hour 12 -> 13, advance to minutes, 30 -> 29.
        press(&mut engine, ButtonId::Up, 2_200);
        press(&mut engine, ButtonId::Select, 2_300);
        press(&mut engine, ButtonId::Down, 2_400);

        let actions = press(&mut engine, ButtonId::Back, 2_500);
        assert_eq!(
            actions[0],
            UiAction::SetClock {
                hour: 13,
                minute: 29,
                second: 0,
            }
        );
        assert_eq!(engine.state(), MenuState::Top { cursor: 0 });
    }

    #[test]
    fn field_cursor_wraps_through_three_fields() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        press(&mut engine, ButtonId::Select, 2_100);

        for expected in [1, 2, 0] {
            press(&mut engine, ButtonId::Select, 2_200);
            let MenuState::TimeEdit { field, .. } = engine.state() else {
                panic!("expected time editor");
            };
            assert_eq!(field, expected);
        }
    }

    #[test]
    fn exit_item_returns_to_idle() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        press(&mut engine, ButtonId::Up, 2_100); // wrap to Exit
        press(&mut engine, ButtonId::Select, 2_200);
        assert_eq!(engine.state(), MenuState::Idle);
    }

    #[test]
    fn orientation_applies_only_on_select() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        press(&mut engine, ButtonId::Down, 2_100);
        press(&mut engine, ButtonId::Select, 2_200);
        assert_eq!(engine.state(), MenuState::Orientation { flip_pending: false });

        press(&mut engine, ButtonId::Up, 2_300);
        assert!(!engine.orientation_flipped());

        let actions = press(&mut engine, ButtonId::Select, 2_400);
        assert_eq!(actions[0], UiAction::ApplyOrientation { flipped: true });
        assert!(engine.orientation_flipped());
    }

    #[test]
    fn standby_engages_after_timeout_and_presses_cancel_it() {
        let mut engine = UiEngine::new(15_000);
        assert!(engine.is_standby(15_000));

        press(&mut engine, ButtonId::Up, 16_000);
        assert!(!engine.is_standby(16_100));
        assert!(engine.is_standby(31_000));
    }

    #[test]
    fn standby_never_applies_inside_menu() {
        let mut engine = UiEngine::new(15_000);
        long_press(&mut engine, ButtonId::Menu, 2_000);
        assert!(!engine.is_standby(60_000));
    }
}
