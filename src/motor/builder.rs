use embedded_hal::digital::v2::OutputPin;

use super::{
    CommandDomain, Direction, DriverError, MotorDriver, PulseWidthRange, RelayPolarity,
    DEFAULT_PULSE_WIDTH_RANGE, DEFAULT_THRUST_RANGE,
};
use crate::PulseOutput;

pub struct Builder {
    id: &'static str,
    thrust_range: u32,
    pulse_range: PulseWidthRange,
    domain: CommandDomain,
    polarity: RelayPolarity,
}

impl Builder {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            thrust_range: DEFAULT_THRUST_RANGE,
            pulse_range: DEFAULT_PULSE_WIDTH_RANGE,
            domain: CommandDomain::default(),
            polarity: RelayPolarity::default(),
        }
    }

    pub fn thrust_range(mut self, max: u32) -> Self {
        self.thrust_range = max;
        self
    }

    pub fn pulse_width_range(mut self, max: i32, min: i32) -> Self {
        self.pulse_range = PulseWidthRange::new(max, min);
        self
    }

    pub fn command_domain(mut self, domain: CommandDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn relay_polarity(mut self, polarity: RelayPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Create the driver without binding any outputs.
    pub fn unconfigured<P, R>(self) -> MotorDriver<P, R> {
        MotorDriver {
            id: self.id,
            thrust_range: self.thrust_range,
            pulse_range: self.pulse_range,
            current_pulse_width: self.pulse_range.min,
            control: None,
            relay: None,
            relay_level: None,
            direction: Direction::Forward,
            domain: self.domain,
            polarity: self.polarity,
            fault: None,
        }
    }

    /// Create the driver and bind it to the ESC `control` output and the `relay` pin.
    pub fn build<P, R>(self, control: P, relay: R) -> Result<MotorDriver<P, R>, DriverError<P, R>>
    where
        P: PulseOutput,
        R: OutputPin,
    {
        let mut motor = self.unconfigured();
        motor.set_control_pin(control)?;
        motor.set_relay_pin(relay)?;
        Ok(motor)
    }
}
