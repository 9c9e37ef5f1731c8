/// Thrust command magnitude used when no range is given.
pub const DEFAULT_THRUST_RANGE: u32 = 100;

/// Pulse widths accepted by a typical hobby ESC.
pub const DEFAULT_PULSE_WIDTH_RANGE: PulseWidthRange = PulseWidthRange::new(2000, 1000);

/// Direction of current through the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    Forward,
    Reversed,
}

/// How a thrust command encodes direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandDomain {
    /// Commands span `[-range, range]` and negative values reverse the motor.
    #[default]
    Signed,
    /// Commands span `[0, range]` and direction is set separately
    /// with [`MotorDriver::set_direction`](super::MotorDriver::set_direction).
    Magnitude,
}

impl CommandDomain {
    pub(crate) fn direction(self, thrust: i32, current: Direction) -> Direction {
        match self {
            CommandDomain::Signed if thrust < 0 => Direction::Reversed,
            CommandDomain::Signed => Direction::Forward,
            CommandDomain::Magnitude => current,
        }
    }

    pub(crate) fn magnitude(self, thrust: i32) -> u32 {
        match self {
            CommandDomain::Signed => thrust.unsigned_abs(),
            CommandDomain::Magnitude => thrust.max(0) as u32,
        }
    }

    /// Re-apply the sign of `thrust` to a clamped magnitude that is known to fit.
    pub(crate) fn command(self, thrust: i32, magnitude: u32) -> i32 {
        let magnitude = magnitude.min(i32::MAX as u32) as i32;
        match self {
            CommandDomain::Signed if thrust < 0 => -magnitude,
            _ => magnitude,
        }
    }
}

/// Relay level that selects reversed thrust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayPolarity {
    /// The relay pin is driven high to reverse.
    #[default]
    ActiveHigh,
    /// The relay pin is driven low to reverse.
    ActiveLow,
}

impl RelayPolarity {
    /// Returns true if the relay pin should be high for `direction`.
    pub fn is_high(self, direction: Direction) -> bool {
        match self {
            RelayPolarity::ActiveHigh => direction == Direction::Reversed,
            RelayPolarity::ActiveLow => direction == Direction::Forward,
        }
    }
}

/// Physical pulse width bounds of an ESC, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseWidthRange {
    pub max: i32,
    pub min: i32,
}

impl PulseWidthRange {
    pub const fn new(max: i32, min: i32) -> Self {
        Self { max, min }
    }

    pub fn is_valid(&self) -> bool {
        self.min < self.max
    }

    /// Limit `width` to this range.
    ///
    /// An inverted range never panics, it just saturates.
    pub fn clamp(&self, width: i32) -> i32 {
        if width > self.max {
            self.max
        } else if width < self.min {
            self.min
        } else {
            width
        }
    }

    /// Linearly map `magnitude` in `[0, thrust_range]` onto `[min, max]`.
    pub fn scale(&self, magnitude: u32, thrust_range: u32) -> i32 {
        if thrust_range == 0 {
            return self.min;
        }
        let magnitude = magnitude.min(thrust_range) as i128;
        let span = self.max as i128 - self.min as i128;
        let width = self.min as i128 + magnitude * span / thrust_range as i128;

        // Between min and max, so this fits
        width as i32
    }
}

impl Default for PulseWidthRange {
    fn default() -> Self {
        DEFAULT_PULSE_WIDTH_RANGE
    }
}
