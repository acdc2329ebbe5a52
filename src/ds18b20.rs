use embedded_hal::delay::DelayNs;
use log::{debug, info, trace};

use crate::{Driver, Error, IoWire, OpCode, Sensor, Temperature};
use core::fmt::Debug;

/// Worst case conversion time at the power-on 12 bit resolution
pub const CONVERSION_TIME_MS: u16 = 750;

#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// A DS18B20 alone on its wire, addressed with Skip-ROM
pub struct Ds18b20<W: IoWire> {
    driver: Driver<W>,
}

impl<E: Debug, W: IoWire<Error = E>> Ds18b20<W> {
    pub fn new(io_wire: W) -> Self {
        Ds18b20 {
            driver: Driver::new(io_wire),
        }
    }

    pub fn driver(&mut self) -> &mut Driver<W> {
        &mut self.driver
    }

    pub fn release(self) -> W {
        self.driver.into_inner()
    }

    /// Configures the pin, resets the bus and checks that the sensor answers.
    /// Safe to call again at any time to recover from a failed transaction.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        info!("initializing DS18B20");
        self.driver.configure()?;
        debug!("resetting DS18B20");
        self.driver.initialize(delay)?;
        info!("DS18B20 present");
        Ok(())
    }

    /// Triggers a conversion. The result is readable after [`CONVERSION_TIME_MS`].
    pub fn start_conversion(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.driver
            .reset_skip_write_only(delay, &[Command::Convert.op_code()])?;
        debug!("temperature conversion started");
        Ok(())
    }

    /// Re-issues a conversion and reads the temperature register.
    ///
    /// The register still holds the previous conversion result at this point,
    /// so a reading reflects the last [`Ds18b20::start_conversion`] that had
    /// time to complete.
    pub fn read_temperature_raw(
        &mut self,
        delay: &mut impl DelayNs,
    ) -> Result<Temperature, Error<E>> {
        self.start_conversion(delay)?;

        let mut scratchpad = [0u8; 2];
        self.driver.reset_skip_write_read(
            delay,
            &[Command::ReadScratchpad.op_code()],
            &mut scratchpad[..],
        )?;
        let temperature = Temperature::from_scratchpad(&scratchpad);
        trace!("temperature register {:#06x}", temperature.raw());
        Ok(temperature)
    }

    pub fn read_temperature(&mut self, delay: &mut impl DelayNs) -> Result<f32, Error<E>> {
        self.read_temperature_raw(delay).map(|t| t.celsius())
    }
}

impl<E: Debug, W: IoWire<Error = E>> Sensor for Ds18b20<W> {
    type Error = Error<E>;

    fn start_measurement(&mut self, delay: &mut impl DelayNs) -> Result<u16, Self::Error> {
        self.start_conversion(delay)?;
        Ok(CONVERSION_TIME_MS)
    }

    fn read_measurement(&mut self, delay: &mut impl DelayNs) -> Result<f32, Self::Error> {
        self.read_temperature(delay)
    }

    fn read_measurement_raw(&mut self, delay: &mut impl DelayNs) -> Result<u16, Self::Error> {
        self.read_temperature_raw(delay).map(|t| t.raw())
    }
}
