use byteorder::{ByteOrder, LittleEndian};
use core::fmt::{Display, Formatter, Result as FmtResult};

/// Raw temperature register: signed fixed point with 4 fractional bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Temperature(i16);

impl Temperature {
    /// Degrees Celsius per least significant bit
    pub const RESOLUTION: f32 = 0.0625;

    /// Lowest value the sensor reports (-55°C)
    pub const MIN: Self = Temperature(-880);

    /// Highest value the sensor reports (+125°C)
    pub const MAX: Self = Temperature(2000);

    pub const fn from_raw(raw: u16) -> Self {
        Temperature(raw as i16)
    }

    /// Decodes the first two scratchpad bytes (LSB, MSB)
    pub fn from_scratchpad(scratchpad: &[u8]) -> Self {
        Temperature(LittleEndian::read_i16(&scratchpad[0..2]))
    }

    pub const fn raw(&self) -> u16 {
        self.0 as u16
    }

    pub fn celsius(&self) -> f32 {
        if self.0 < 0 {
            -(f32::from(self.0.unsigned_abs()) * Self::RESOLUTION)
        } else {
            f32::from(self.0) * Self::RESOLUTION
        }
    }

    /// Splits the value into the integer part and the fraction in ten-thousandths.
    /// Original value may be calculated as: integer + fraction/10000
    pub fn split(&self) -> (i16, i16) {
        let abs = self.0.unsigned_abs();
        let integer = (abs >> 4) as i16;
        let fraction = (abs & 0xF) as i16 * 625;
        if self.0 < 0 {
            (-integer, -fraction)
        } else {
            (integer, fraction)
        }
    }

    pub fn is_in_range(&self) -> bool {
        (Self::MIN..=Self::MAX).contains(self)
    }
}

impl From<Temperature> for f32 {
    fn from(temperature: Temperature) -> Self {
        temperature.celsius()
    }
}

impl Display for Temperature {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let (integer, fraction) = self.split();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:04}", integer.abs(), fraction.abs())
    }
}
