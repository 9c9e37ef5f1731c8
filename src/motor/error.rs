use embedded_hal::digital::v2::OutputPin;

use crate::PulseOutput;

/// Error type of a [`MotorDriver`](super::MotorDriver) driving `P` and `R`.
pub type DriverError<P, R> = Error<<P as PulseOutput>::Error, <R as OutputPin>::Error>;

/// A motor driver error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<PE, RE> {
    /// The ESC output failed.
    Pwm(PE),

    /// The relay pin failed.
    Relay(RE),

    /// A command was issued before the outputs were bound.
    NotConfigured,

    /// The request was outside the admissible range.
    /// The clamped value was still applied.
    OutOfRange { requested: i32, applied: i32 },

    /// The thrust range must be non-zero.
    InvalidThrustRange,

    /// The pulse width range must satisfy `min < max`.
    InvalidPulseRange { max: i32, min: i32 },
}

impl<PE, RE> Error<PE, RE> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Pwm(_) => ErrorKind::Pwm,
            Error::Relay(_) => ErrorKind::Relay,
            Error::NotConfigured => ErrorKind::NotConfigured,
            Error::OutOfRange { .. } => ErrorKind::OutOfRange,
            Error::InvalidThrustRange => ErrorKind::InvalidThrustRange,
            Error::InvalidPulseRange { .. } => ErrorKind::InvalidPulseRange,
        }
    }
}

/// The category of an [`Error`], without the hardware error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Pwm,
    Relay,
    NotConfigured,
    OutOfRange,
    InvalidThrustRange,
    InvalidPulseRange,
}

impl ErrorKind {
    /// Returns true for errors that leave the motor output in an unknown state.
    pub fn is_fault(self) -> bool {
        matches!(
            self,
            ErrorKind::Pwm | ErrorKind::Relay | ErrorKind::NotConfigured
        )
    }
}
