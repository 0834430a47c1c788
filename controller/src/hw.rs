//! Host-side stand-ins for the peripherals the core drives. Each trait is the
//! integration point for the real chip driver (display, buttons, relay and
//! fan lines, buzzer, RTC); the implementations here keep the control loops
//! honest without hardware attached.

use chrono::{Duration, Local, NaiveTime, Timelike};
use tracing::debug;

use fleet_common::{Screen, BUTTON_COUNT};

pub trait Clock: Send {
    fn now(&self) -> NaiveTime;
    fn adjust(&mut self, hour: u8, minute: u8, second: u8);
}

/// Wall clock with a user-settable offset, standing in for the RTC chip.
pub struct HostClock {
    offset: Duration,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            offset: Duration::zero(),
        }
    }
}

impl Clock for HostClock {
    fn now(&self) -> NaiveTime {
        Local::now().time() + self.offset
    }

    fn adjust(&mut self, hour: u8, minute: u8, second: u8) {
        let Some(target) =
            NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
        else {
            return;
        };
        self.offset = target - Local::now().time();
    }
}

pub fn clock_hms(clock: &dyn Clock) -> (u8, u8, u8) {
    let now = clock.now();
    (now.hour() as u8, now.minute() as u8, now.second() as u8)
}

pub fn clock_string(clock: &dyn Clock) -> String {
    let (hour, minute, second) = clock_hms(clock);
    format!("{hour:02}:{minute:02}:{second:02}")
}

pub trait TempProbe: Send {
    fn read_c(&mut self) -> f32;
}

/// Hardware integration point: replace with the internal temperature sensor
/// readout on the target device.
pub struct SimulatedTempProbe {
    tick: u64,
}

impl SimulatedTempProbe {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl TempProbe for SimulatedTempProbe {
    fn read_c(&mut self) -> f32 {
        self.tick = self.tick.wrapping_add(1);
        42.0 + ((self.tick % 8) as f32) * 0.4
    }
}

pub trait RelayOutputs: Send {
    fn set_relay(&mut self, channel: usize, on: bool);
    fn set_fan(&mut self, on: bool);
}

pub struct LogOutputs;

impl RelayOutputs for LogOutputs {
    fn set_relay(&mut self, channel: usize, on: bool) {
        debug!("relay {channel} -> {}", if on { "ON" } else { "OFF" });
    }

    fn set_fan(&mut self, on: bool) {
        debug!("fan -> {}", if on { "ON" } else { "OFF" });
    }
}

pub trait Buzzer: Send {
    fn start_tone(&mut self, frequency_hz: u16);
    fn stop(&mut self);
}

pub struct LogBuzzer;

impl Buzzer for LogBuzzer {
    fn start_tone(&mut self, frequency_hz: u16) {
        debug!("buzzer tone {frequency_hz} Hz");
    }

    fn stop(&mut self) {
        debug!("buzzer off");
    }
}

pub trait ButtonSource: Send {
    fn sample(&mut self) -> [bool; BUTTON_COUNT];
}

/// Hardware integration point: sample the five GPIO lines (active-low with
/// pull-ups on the target board).
pub struct IdleButtons;

impl ButtonSource for IdleButtons {
    fn sample(&mut self) -> [bool; BUTTON_COUNT] {
        [false; BUTTON_COUNT]
    }
}

pub trait DisplayAdapter: Send {
    fn set_flipped(&mut self, flipped: bool);
    fn render(&mut self, screen: &Screen);
}

/// Logs screen transitions instead of driving a panel.
pub struct ConsoleDisplay {
    flipped: bool,
    last: Option<Screen>,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self {
            flipped: false,
            last: None,
        }
    }
}

impl DisplayAdapter for ConsoleDisplay {
    fn set_flipped(&mut self, flipped: bool) {
        self.flipped = flipped;
        debug!("display orientation flipped: {flipped}");
    }

    fn render(&mut self, screen: &Screen) {
        if self.last.as_ref() == Some(screen) {
            return;
        }
        let orientation = if self.flipped { " (flipped)" } else { "" };
        debug!("screen{orientation}: {screen:?}");
        self.last = Some(screen.clone());
    }
}
