use embedded_hal::delay::DelayNs;

pub trait Sensor {
    type Error;

    /// returns the milliseconds required to wait until the measurement finished
    fn start_measurement(&mut self, delay: &mut impl DelayNs) -> Result<u16, Self::Error>;

    /// returns the measured value
    fn read_measurement(&mut self, delay: &mut impl DelayNs) -> Result<f32, Self::Error>;

    fn read_measurement_raw(&mut self, delay: &mut impl DelayNs) -> Result<u16, Self::Error>;
}
