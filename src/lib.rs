#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

mod command;
mod driver;
#[cfg(feature = "ds18b20")]
pub mod ds18b20;
mod iowire;
mod result;
mod sensor;
#[cfg(test)]
mod sim;
mod temperature;

pub use command::{Command, OpCode};
pub use driver::{
    Driver, PRESENCE_PULSE_MAX_US, PRESENCE_WAIT_US, READ_INIT_LOW_US, READ_RECOVERY_US,
    RESET_LOW_US, RESET_RELEASE_US, WRITE_0_HIGH_US, WRITE_0_LOW_US, WRITE_1_HIGH_US,
    WRITE_1_LOW_US,
};
pub use iowire::{IoWire, Mode};
pub use result::Error;
pub use sensor::Sensor;
pub use temperature::Temperature;
