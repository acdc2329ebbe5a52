//! Simulated wire with a single DS18B20 attached, on a virtual clock.
//!
//! One `SimBus` value is handed to the driver as its pin and cloned as the
//! delay; both share the same state, so time only advances through delays and
//! the sensor reacts to the edges the master produces.

use crate::{IoWire, Mode};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error, ErrorKind};
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

const NS_PER_US: u64 = 1_000;
/// Write slots shorter than this are ones
const WRITE_1_THRESHOLD_US: u64 = 15;
const RESET_THRESHOLD_US: u64 = 480;
/// How long the sensor holds the line to answer a zero in a read slot
const READ_ZERO_HOLD_US: u64 = 30;
const CONVERSION_US: u64 = 750_000;
/// Temperature register value after power-up (85°C)
const POWER_ON_RAW: i16 = 0x0550;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A change of the level driven by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub at_us: u64,
    pub low: bool,
}

/// When the sensor answers a reset, relative to the release of the line
#[derive(Debug, Clone, Copy)]
pub struct Presence {
    pub delay_us: u64,
    pub width_us: u64,
}

impl Default for Presence {
    fn default() -> Self {
        Presence {
            delay_us: 30,
            width_us: 100,
        }
    }
}

enum Phase {
    Idle,
    Rom { byte: u8, bits: u8 },
    Function { byte: u8, bits: u8 },
    Transmit(VecDeque<bool>),
}

struct State {
    now_ns: u64,
    mode: Mode,
    level: bool,
    fall_ns: Option<u64>,
    edges: Vec<Edge>,
    written: Vec<bool>,
    commands: Vec<u8>,
    presence: Option<Presence>,
    presence_window: Option<(u64, u64)>,
    hold_until_ns: u64,
    phase: Phase,
    temperature: i16,
    scratchpad: i16,
    conversion: Option<(u64, i16)>,
    enable_fails: bool,
}

impl State {
    fn driving_low(&self) -> bool {
        self.mode == Mode::Output && !self.level
    }

    fn device_low(&self) -> bool {
        let now = self.now_ns;
        now < self.hold_until_ns
            || matches!(self.presence_window, Some((start, end)) if now >= start && now < end)
    }

    fn line_high(&self) -> bool {
        !self.driving_low() && !self.device_low()
    }

    fn update(&mut self, f: impl FnOnce(&mut Self)) {
        let before = self.driving_low();
        f(self);
        match (before, self.driving_low()) {
            (false, true) => self.falling(),
            (true, false) => self.rising(),
            _ => {}
        }
    }

    fn falling(&mut self) {
        let now = self.now_ns;
        self.fall_ns = Some(now);
        self.edges.push(Edge {
            at_us: now / NS_PER_US,
            low: true,
        });
        if let Phase::Transmit(bits) = &self.phase {
            if bits.front() == Some(&false) {
                self.hold_until_ns = now + READ_ZERO_HOLD_US * NS_PER_US;
            }
        }
    }

    fn rising(&mut self) {
        let now = self.now_ns;
        self.edges.push(Edge {
            at_us: now / NS_PER_US,
            low: false,
        });
        let Some(fall) = self.fall_ns.take() else {
            return;
        };
        let width_us = (now - fall) / NS_PER_US;
        if width_us >= RESET_THRESHOLD_US {
            self.on_reset();
            return;
        }

        if let Phase::Transmit(bits) = &mut self.phase {
            bits.pop_front();
            if bits.is_empty() {
                self.phase = Phase::Idle;
            }
            return;
        }
        let bit = width_us < WRITE_1_THRESHOLD_US;
        self.written.push(bit);
        self.on_bit(bit);
    }

    fn on_reset(&mut self) {
        self.hold_until_ns = 0;
        match self.presence {
            Some(presence) => {
                let start = self.now_ns + presence.delay_us * NS_PER_US;
                self.presence_window = Some((start, start + presence.width_us * NS_PER_US));
                self.phase = Phase::Rom { byte: 0, bits: 0 };
            }
            None => self.phase = Phase::Idle,
        }
    }

    fn on_bit(&mut self, bit: bool) {
        let in_rom = matches!(self.phase, Phase::Rom { .. });
        let received = match &mut self.phase {
            Phase::Rom { byte, bits } | Phase::Function { byte, bits } => {
                *byte >>= 1;
                if bit {
                    *byte |= 0x80;
                }
                *bits += 1;
                (*bits == 8).then_some(*byte)
            }
            _ => None,
        };
        let Some(byte) = received else {
            return;
        };
        self.commands.push(byte);

        self.phase = match (in_rom, byte) {
            (true, 0xCC) => Phase::Function { byte: 0, bits: 0 },
            (false, 0x44) => {
                self.commit_conversion();
                self.conversion = Some((self.now_ns + CONVERSION_US * NS_PER_US, self.temperature));
                Phase::Idle
            }
            (false, 0xBE) => {
                self.commit_conversion();
                let [low, high] = self.scratchpad.to_le_bytes();
                let scratchpad = [low, high, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00];
                Phase::Transmit(
                    scratchpad
                        .iter()
                        .flat_map(|&byte| (0..8).map(move |i| (byte >> i) & 1 == 1))
                        .collect(),
                )
            }
            _ => Phase::Idle,
        };
    }

    fn commit_conversion(&mut self) {
        if let Some((done_at, raw)) = self.conversion {
            if self.now_ns >= done_at {
                self.scratchpad = raw;
                self.conversion = None;
            }
        }
    }
}

#[derive(Clone)]
pub struct SimBus(Rc<RefCell<State>>);

impl SimBus {
    pub fn new(presence: Option<Presence>) -> Self {
        SimBus(Rc::new(RefCell::new(State {
            now_ns: 0,
            mode: Mode::Input,
            level: true,
            fall_ns: None,
            edges: Vec::new(),
            written: Vec::new(),
            commands: Vec::new(),
            presence,
            presence_window: None,
            hold_until_ns: 0,
            phase: Phase::Idle,
            temperature: POWER_ON_RAW,
            scratchpad: POWER_ON_RAW,
            conversion: None,
            enable_fails: false,
        })))
    }

    /// A wire with a well-behaved sensor
    pub fn with_sensor() -> Self {
        Self::new(Some(Presence::default()))
    }

    /// A wire nobody answers on
    pub fn empty() -> Self {
        Self::new(None)
    }

    /// A wire whose port cannot be enabled
    pub fn failing_clock() -> Self {
        let bus = Self::with_sensor();
        bus.0.borrow_mut().enable_fails = true;
        bus
    }

    /// Sets the value the next conversion will latch
    pub fn set_temperature(&self, raw: i16) {
        self.0.borrow_mut().temperature = raw;
    }

    /// Makes the sensor answer the following read slots with `bits`
    pub fn transmit(&self, bits: &[bool]) {
        self.0.borrow_mut().phase = Phase::Transmit(bits.iter().copied().collect());
    }

    pub fn now_us(&self) -> u64 {
        self.0.borrow().now_ns / NS_PER_US
    }

    pub fn mode(&self) -> Mode {
        self.0.borrow().mode
    }

    pub fn line_is_high(&self) -> bool {
        self.0.borrow().line_high()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.0.borrow().edges.clone()
    }

    /// Bits decoded from write slots outside of read transfers
    pub fn written(&self) -> Vec<bool> {
        self.0.borrow().written.clone()
    }

    /// Command bytes the sensor received
    pub fn commands(&self) -> Vec<u8> {
        self.0.borrow().commands.clone()
    }
}

impl IoWire for SimBus {
    type Error = SimError;

    fn enable(&mut self) -> Result<(), Self::Error> {
        if self.0.borrow().enable_fails {
            Err(SimError)
        } else {
            Ok(())
        }
    }

    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error> {
        self.0.borrow_mut().update(|state| state.mode = mode);
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.borrow().line_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow().line_high())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().update(|state| state.level = false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().update(|state| state.level = true);
        Ok(())
    }
}

impl DelayNs for SimBus {
    fn delay_ns(&mut self, ns: u32) {
        self.0.borrow_mut().now_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.0.borrow_mut().now_ns += u64::from(us) * NS_PER_US;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().now_ns += u64::from(ms) * 1_000 * NS_PER_US;
    }
}
