use crate::{Command, Error, IoWire, Mode, OpCode};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use log::{debug, warn};

/// Time the master holds the line low to reset the bus (at least 480µs)
pub const RESET_LOW_US: u32 = 750;
/// Time between releasing the reset and sampling for presence
pub const RESET_RELEASE_US: u32 = 15;
/// How long to wait for the device to pull the line low after reset
pub const PRESENCE_WAIT_US: u32 = 100;
/// Longest accepted presence pulse
pub const PRESENCE_PULSE_MAX_US: u32 = 240;

pub const WRITE_1_LOW_US: u32 = 10;
pub const WRITE_1_HIGH_US: u32 = 58;
pub const WRITE_0_LOW_US: u32 = 70;
pub const WRITE_0_HIGH_US: u32 = 2;

pub const READ_INIT_LOW_US: u32 = 10;
pub const READ_RECOVERY_US: u32 = 45;

pub struct Driver<W: IoWire> {
    io_wire: W,
}

impl<E: Debug, W: IoWire<Error = E>> Driver<W> {
    pub fn new(io_wire: W) -> Self {
        Driver { io_wire }
    }

    /// Gives the wire back
    pub fn into_inner(self) -> W {
        self.io_wire
    }

    /// Enables the pin peripheral and leaves the line driven high (idle)
    pub fn configure(&mut self) -> Result<(), Error<E>> {
        self.io_wire.enable().map_err(Error::Configuration)?;
        self.drive_output()?;
        Ok(())
    }

    pub fn reset_skip_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.skip_rom(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.skip_rom(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    /// Starts a transaction addressed to the only device on the wire
    pub fn skip_rom(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.initialize(delay)?;
        self.write_command(delay, Command::SkipRom)?;
        Ok(())
    }

    /// Performs a reset followed by the presence check
    pub fn initialize(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.check_presence(delay)
    }

    /// Like [`Driver::initialize`], but reports a missing device as `Ok(false)`
    pub fn reset_presence(&mut self, delay: &mut impl DelayNs) -> Result<bool, Error<E>> {
        self.initialize(delay).map(|_| true).or_else(|error| {
            if matches!(error, Error::NoPresence) {
                Ok(false)
            } else {
                Err(error)
            }
        })
    }

    /// Holds the line low long enough for every device to reset, then
    /// releases it. [`Driver::check_presence`] must follow immediately.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.drive_output()?;
        self.set_low()?;
        delay.delay_us(RESET_LOW_US);
        self.set_high()?;
        delay.delay_us(RESET_RELEASE_US);
        Ok(())
    }

    /// Listens for the presence pulse that follows a reset.
    ///
    /// The line must go low within [`PRESENCE_WAIT_US`] and come back high
    /// within [`PRESENCE_PULSE_MAX_US`]. The pin is left in input mode
    /// whatever the outcome.
    pub fn check_presence(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.set_mode(Mode::Input)?;

        let mut waited = 0;
        while self.is_high()? {
            if waited >= PRESENCE_WAIT_US {
                warn!("no presence pulse within {}us", PRESENCE_WAIT_US);
                return Err(Error::NoPresence);
            }
            delay.delay_us(1);
            waited += 1;
        }
        let pulse_start = waited;

        let mut width = 0;
        while self.is_low()? {
            if width >= PRESENCE_PULSE_MAX_US {
                warn!("presence pulse longer than {}us", PRESENCE_PULSE_MAX_US);
                return Err(Error::PresencePulseInvalid);
            }
            delay.delay_us(1);
            width += 1;
        }

        debug!("presence pulse after {}us, {}us wide", pulse_start, width);
        Ok(())
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Reads eight full read slots, least significant bit first
    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit(delay)? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    pub fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        self.drive_output()?;
        self.set_low()?;
        delay.delay_us(READ_INIT_LOW_US);
        self.set_mode(Mode::Input)?;
        let val = self.is_high();
        delay.delay_us(READ_RECOVERY_US);
        val
    }

    pub fn write_command(&mut self, delay: &mut impl DelayNs, cmd: impl OpCode) -> Result<(), E> {
        self.write_byte(delay, cmd.op_code())
    }

    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(delay, *b)?;
        }
        Ok(())
    }

    /// Writes eight slots, least significant bit first
    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), E> {
        self.drive_output()?;
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(delay, (byte & 0x01) == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    pub(crate) fn write_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<(), E> {
        self.set_low()?;
        delay.delay_us(if high { WRITE_1_LOW_US } else { WRITE_0_LOW_US });
        self.set_high()?;
        delay.delay_us(if high { WRITE_1_HIGH_US } else { WRITE_0_HIGH_US });
        Ok(())
    }

    /// Latches the output high before enabling it so the line never glitches low
    #[inline(always)]
    fn drive_output(&mut self) -> Result<(), E> {
        self.set_high()?;
        self.set_mode(Mode::Output)
    }

    #[inline(always)]
    pub(crate) fn set_mode(&mut self, mode: Mode) -> Result<(), E> {
        self.io_wire.set_mode(mode)
    }

    #[inline(always)]
    pub(crate) fn set_high(&mut self) -> Result<(), E> {
        self.io_wire.set_high()
    }

    #[inline(always)]
    pub(crate) fn set_low(&mut self) -> Result<(), E> {
        self.io_wire.set_low()
    }

    #[inline(always)]
    pub(crate) fn is_high(&mut self) -> Result<bool, E> {
        self.io_wire.is_high()
    }

    #[inline(always)]
    pub(crate) fn is_low(&mut self) -> Result<bool, E> {
        self.io_wire.is_low()
    }
}
