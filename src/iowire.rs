use embedded_hal::digital::{Error, ErrorType, InputPin, OutputPin};

/// Direction of the data line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// The line is released and sampled
    Input,
    /// The line is driven by the master
    Output,
}

pub trait IoWire {
    type Error: Error;

    /// Enables the peripheral that owns the pin (e.g. its port clock)
    fn enable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Switches the pin between driving and sampling the line
    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error>;

    /// Is the input pin high?
    fn is_high(&mut self) -> Result<bool, Self::Error>;

    /// Is the input pin low?
    fn is_low(&mut self) -> Result<bool, Self::Error>;

    /// Drives the pin low
    ///
    /// *NOTE* the actual electrical state of the pin may not actually be low, e.g. due to external
    /// electrical sources
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Drives the pin high
    ///
    /// *NOTE* the actual electrical state of the pin may not actually be high, e.g. due to external
    /// electrical sources
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

/// Single open-drain line wrapper
///
/// Input mode is emulated by releasing the line to the pull-up.
impl<IO> IoWire for (IO,)
where
    IO: ErrorType + OutputPin + InputPin,
{
    type Error = IO::Error;

    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error> {
        match mode {
            Mode::Input => self.0.set_high(),
            Mode::Output => Ok(()),
        }
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }
}

/// Dual line config wrapper
impl<E, I, O> IoWire for (I, O)
where
    E: Error,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn set_mode(&mut self, mode: Mode) -> Result<(), Self::Error> {
        match mode {
            Mode::Input => self.1.set_high(),
            Mode::Output => Ok(()),
        }
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.1.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}
