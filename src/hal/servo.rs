use embedded_hal::PwmPin;
use embedded_time::duration::Microseconds;
use embedded_time::rate::Hertz;
use num_traits::{NumCast, ToPrimitive};

use super::PulseOutput;

/// Frame period of a standard 50hz servo or ESC signal.
pub const DEFAULT_PERIOD: Microseconds<u32> = Microseconds(20_000);

/// Errors produced while converting a pulse width into a duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PulseError {
    /// The frame period is zero (or the frequency is above 1 MHz).
    InvalidPeriod,
    /// The requested pulse is longer than one frame.
    PulseExceedsPeriod { width: u32, period: u32 },
    /// The duty cycle could not be represented by the pin's duty type.
    DutyConversion,
}

/// A [`PulseOutput`] for any duty-cycle based [`PwmPin`].
pub struct ServoPwm<T: PwmPin> {
    pin: T,
    period: Microseconds<u32>,
}

impl<T> ServoPwm<T>
where
    T: PwmPin,
    T::Duty: NumCast + ToPrimitive + Copy,
{
    /// Wrap `pin`, assuming it runs at the [`DEFAULT_PERIOD`].
    pub fn new(pin: T) -> Self {
        Self {
            pin,
            period: DEFAULT_PERIOD,
        }
    }

    /// Wrap `pin`, which has been configured with a frame of `period`.
    pub fn with_period(pin: T, period: Microseconds<u32>) -> Result<Self, PulseError> {
        if period.0 == 0 {
            return Err(PulseError::InvalidPeriod);
        }
        Ok(Self { pin, period })
    }

    /// Wrap `pin`, which has been configured to run at `frequency`.
    pub fn with_frequency(pin: T, frequency: Hertz<u32>) -> Result<Self, PulseError> {
        if frequency.0 == 0 {
            return Err(PulseError::InvalidPeriod);
        }
        Self::with_period(pin, Microseconds(1_000_000 / frequency.0))
    }

    /// The length of one PWM frame.
    pub fn period(&self) -> Microseconds<u32> {
        self.period
    }

    /// The duty cycle that produces a pulse of `width`.
    pub fn duty_for(&self, width: Microseconds<u32>) -> Result<T::Duty, PulseError> {
        if width.0 > self.period.0 {
            return Err(PulseError::PulseExceedsPeriod {
                width: width.0,
                period: self.period.0,
            });
        }

        let max = self
            .pin
            .get_max_duty()
            .to_f64()
            .ok_or(PulseError::DutyConversion)?;
        let duty = width.0 as f64 * max / self.period.0 as f64;
        <T::Duty as NumCast>::from(duty).ok_or(PulseError::DutyConversion)
    }

    /// Give back the wrapped pin.
    pub fn release(self) -> T {
        self.pin
    }
}

impl<T> PulseOutput for ServoPwm<T>
where
    T: PwmPin,
    T::Duty: NumCast + ToPrimitive + Copy,
{
    type Error = PulseError;

    fn attach(&mut self) -> Result<(), Self::Error> {
        self.pin.enable();
        Ok(())
    }

    fn write_pulse(&mut self, width: Microseconds<u32>) -> Result<(), Self::Error> {
        let duty = self.duty_for(width)?;
        self.pin.set_duty(duty);
        Ok(())
    }
}
