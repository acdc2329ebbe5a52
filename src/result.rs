use core::fmt::{Debug, Display, Formatter, Result as FmtResult};

/// Error type
#[derive(Debug)]
pub enum Error<E: Sized + Debug> {
    /// The pin peripheral could not be enabled
    Configuration(E),
    /// No presence on wire
    NoPresence,
    /// Presence pulse held low for too long
    PresencePulseInvalid,
    PortError(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Error::Configuration(e) => write!(f, "pin configuration failed: {:?}", e),
            Error::NoPresence => f.write_str("no presence pulse"),
            Error::PresencePulseInvalid => f.write_str("presence pulse too long"),
            Error::PortError(e) => write!(f, "pin error: {:?}", e),
        }
    }
}
