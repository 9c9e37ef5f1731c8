use embedded_time::duration::Microseconds;

mod servo;
pub use servo::{PulseError, ServoPwm, DEFAULT_PERIOD};

/// A device that accepts a generic integer command.
///
/// Actuators and sensors expose this so a control loop can drive them
/// without knowing the concrete device type.
pub trait Commandable {
    /// The label used to identify this device in diagnostics.
    fn id(&self) -> &str;

    /// Apply a new command value.
    fn set_value(&mut self, value: i32);
}

impl<T> Commandable for &mut T
where
    T: Commandable + ?Sized,
{
    fn id(&self) -> &str {
        (**self).id()
    }

    fn set_value(&mut self, value: i32) {
        (&mut **self).set_value(value)
    }
}

/// An output that emits pulses of a given width, such as the signal line of an ESC.
pub trait PulseOutput {
    type Error;

    /// Bind and enable this output.
    /// Called once before the first pulse is written.
    fn attach(&mut self) -> Result<(), Self::Error>;

    /// Emit pulses of `width`.
    fn write_pulse(&mut self, width: Microseconds<u32>) -> Result<(), Self::Error>;
}

impl<T> PulseOutput for &mut T
where
    T: PulseOutput + ?Sized,
{
    type Error = T::Error;

    fn attach(&mut self) -> Result<(), Self::Error> {
        (&mut **self).attach()
    }

    fn write_pulse(&mut self, width: Microseconds<u32>) -> Result<(), Self::Error> {
        (&mut **self).write_pulse(width)
    }
}
