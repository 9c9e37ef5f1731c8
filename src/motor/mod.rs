use embedded_hal::digital::v2::OutputPin;
use embedded_time::duration::Microseconds;

use crate::{Commandable, PulseOutput};

mod builder;
pub use builder::Builder;

mod config;
pub use config::{
    CommandDomain, Direction, PulseWidthRange, RelayPolarity, DEFAULT_PULSE_WIDTH_RANGE,
    DEFAULT_THRUST_RANGE,
};

mod error;
pub use error::{DriverError, Error, ErrorKind};

/// A brushless motor driven by an ESC, with a relay that reverses
/// the current through it.
///
/// Thrust commands are mapped linearly from `[0, thrust_range]` onto the
/// ESC's pulse width range. Out-of-range commands are clamped.
pub struct MotorDriver<P, R> {
    id: &'static str,
    thrust_range: u32,
    pulse_range: PulseWidthRange,
    current_pulse_width: i32,

    /// ESC signal output
    control: Option<P>,

    relay: Option<R>,

    /// Last level written to the relay, `None` until the first write.
    relay_level: Option<bool>,

    direction: Direction,
    domain: CommandDomain,
    polarity: RelayPolarity,
    fault: Option<ErrorKind>,
}

impl<P, R> MotorDriver<P, R> {
    /// Create a driver with the default ranges and no outputs bound.
    /// The control and relay pins must be set before commands have any effect.
    pub fn unconfigured(id: &'static str) -> Self {
        Builder::new(id).unconfigured()
    }

    /// Start configuring a driver, e.g. `MotorDriver::<Esc, Relay>::builder("port")`.
    pub fn builder(id: &'static str) -> Builder {
        Builder::new(id)
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn thrust_range(&self) -> u32 {
        self.thrust_range
    }

    pub fn pulse_width_range(&self) -> PulseWidthRange {
        self.pulse_range
    }

    /// The last pulse width written to the ESC, in microseconds.
    pub fn current_pulse_width(&self) -> i32 {
        self.current_pulse_width
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_reversed(&self) -> bool {
        self.direction == Direction::Reversed
    }

    pub fn command_domain(&self) -> CommandDomain {
        self.domain
    }

    pub fn relay_polarity(&self) -> RelayPolarity {
        self.polarity
    }

    /// Returns true once both the control output and the relay are bound.
    pub fn is_configured(&self) -> bool {
        self.control.is_some() && self.relay.is_some()
    }

    /// The most recent hardware or configuration fault, if any.
    pub fn fault(&self) -> Option<ErrorKind> {
        self.fault
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// Set the magnitude of the largest admissible thrust command.
    ///
    /// A range of zero maps every command to the minimum pulse width.
    pub fn set_thrust_range(&mut self, max: u32) {
        self.thrust_range = max;
    }

    /// Set the ESC pulse width bounds in microseconds.
    ///
    /// The range is not checked, see [`Self::try_set_pulse_width_range`].
    pub fn set_pulse_width_range(&mut self, max: i32, min: i32) {
        self.pulse_range = PulseWidthRange::new(max, min);
    }

    pub fn set_command_domain(&mut self, domain: CommandDomain) {
        self.domain = domain;
    }

    /// Takes effect on the next relay write.
    pub fn set_relay_polarity(&mut self, polarity: RelayPolarity) {
        self.polarity = polarity;
    }

    /// Unbind and return the outputs.
    pub fn release(self) -> (Option<P>, Option<R>) {
        (self.control, self.relay)
    }
}

impl<P, R> MotorDriver<P, R>
where
    P: PulseOutput,
    R: OutputPin,
{
    /// Create a driver and bind it to its outputs.
    pub fn new(
        id: &'static str,
        thrust_range: u32,
        max_pulse_width: i32,
        min_pulse_width: i32,
        control: P,
        relay: R,
    ) -> Result<Self, DriverError<P, R>> {
        Builder::new(id)
            .thrust_range(thrust_range)
            .pulse_width_range(max_pulse_width, min_pulse_width)
            .build(control, relay)
    }

    /// Create a driver with [`DEFAULT_THRUST_RANGE`] and [`DEFAULT_PULSE_WIDTH_RANGE`].
    pub fn with_defaults(
        id: &'static str,
        control: P,
        relay: R,
    ) -> Result<Self, DriverError<P, R>> {
        Builder::new(id).build(control, relay)
    }

    pub fn try_set_thrust_range(&mut self, max: u32) -> Result<(), DriverError<P, R>> {
        if max == 0 {
            return Err(Error::InvalidThrustRange);
        }
        self.set_thrust_range(max);
        Ok(())
    }

    pub fn try_set_pulse_width_range(&mut self, max: i32, min: i32) -> Result<(), DriverError<P, R>> {
        let range = PulseWidthRange::new(max, min);
        if !range.is_valid() {
            return Err(Error::InvalidPulseRange { max, min });
        }
        self.pulse_range = range;
        Ok(())
    }

    /// Attach `control` as the ESC output, returning the previous output.
    ///
    /// `control` is consumed even if attaching it fails. The previously bound
    /// output stays in place in that case.
    pub fn set_control_pin(&mut self, mut control: P) -> Result<Option<P>, DriverError<P, R>> {
        control.attach().map_err(Error::Pwm)?;
        debug!("{}: control output attached", self.id);

        Ok(self.control.replace(control))
    }

    /// Use `relay` as the reversing relay, returning the previous pin.
    /// The new relay is driven to the current direction.
    ///
    /// `relay` is consumed even if that write fails. The previously bound
    /// relay stays in place in that case.
    pub fn set_relay_pin(&mut self, mut relay: R) -> Result<Option<R>, DriverError<P, R>> {
        let level = self.polarity.is_high(self.direction);
        drive(&mut relay, level).map_err(Error::Relay)?;
        self.relay_level = Some(level);
        debug!("{}: relay bound", self.id);

        Ok(self.relay.replace(relay))
    }

    /// Command a new thrust.
    ///
    /// The relay is switched first if the direction changed, then the clamped
    /// magnitude is written to the ESC. Failures are recorded in [`Self::fault`].
    pub fn set_value(&mut self, thrust: i32) {
        let _ = self.try_set_value(thrust);
    }

    /// Command a new thrust, reporting errors.
    ///
    /// An out of range command is still clamped and written before
    /// [`Error::OutOfRange`] is returned.
    pub fn try_set_value(&mut self, thrust: i32) -> Result<(), DriverError<P, R>> {
        let result = self.command(thrust);
        self.record(result)
    }

    /// Write a raw pulse width in microseconds, clamped to the pulse width range.
    pub fn set_pulse_width(&mut self, width: i32) {
        let _ = self.try_set_pulse_width(width);
    }

    pub fn try_set_pulse_width(&mut self, width: i32) -> Result<(), DriverError<P, R>> {
        let result = self.write_pulse_width(width).and_then(|applied| {
            if applied == width {
                Ok(())
            } else {
                Err(Error::OutOfRange {
                    requested: width,
                    applied,
                })
            }
        });
        self.record(result)
    }

    /// Switch the relay to `direction` immediately.
    ///
    /// In the [`CommandDomain::Signed`] domain the next command overrides this.
    pub fn set_direction(&mut self, direction: Direction) {
        let _ = self.try_set_direction(direction);
    }

    pub fn try_set_direction(&mut self, direction: Direction) -> Result<(), DriverError<P, R>> {
        let result = self.switch(direction);
        self.record(result)
    }

    /// Drop to the minimum pulse width, leaving the relay as is.
    pub fn stop(&mut self) {
        let min = self.pulse_range.min;
        self.set_pulse_width(min);
    }

    fn command(&mut self, thrust: i32) -> Result<(), DriverError<P, R>> {
        if !self.is_configured() {
            return Err(Error::NotConfigured);
        }

        let direction = self.domain.direction(thrust, self.direction);
        self.switch(direction)?;

        let magnitude = self.domain.magnitude(thrust);
        let width = self.pulse_range.scale(magnitude, self.thrust_range);
        self.write_pulse_width(width)?;

        let admissible = magnitude.min(self.thrust_range);
        let reversed_magnitude = thrust < 0 && self.domain == CommandDomain::Magnitude;
        if admissible != magnitude || reversed_magnitude {
            let applied = self.domain.command(thrust, admissible);
            trace!("{}: thrust {} clamped to {}", self.id, thrust, applied);
            return Err(Error::OutOfRange {
                requested: thrust,
                applied,
            });
        }
        Ok(())
    }

    fn switch(&mut self, direction: Direction) -> Result<(), DriverError<P, R>> {
        let relay = self.relay.as_mut().ok_or(Error::NotConfigured)?;

        let level = self.polarity.is_high(direction);
        if self.relay_level != Some(level) {
            drive(relay, level).map_err(Error::Relay)?;
            self.relay_level = Some(level);
        }

        if self.direction != direction {
            debug!("{}: direction {}", self.id, direction);
            self.direction = direction;
        }
        Ok(())
    }

    /// Clamp, write and store `width`, returning the width applied.
    fn write_pulse_width(&mut self, width: i32) -> Result<i32, DriverError<P, R>> {
        let control = self.control.as_mut().ok_or(Error::NotConfigured)?;

        let applied = self.pulse_range.clamp(width);
        control
            .write_pulse(Microseconds(applied.max(0) as u32))
            .map_err(Error::Pwm)?;

        self.current_pulse_width = applied;
        Ok(applied)
    }

    fn record(&mut self, result: Result<(), DriverError<P, R>>) -> Result<(), DriverError<P, R>> {
        if let Err(error) = &result {
            let kind = error.kind();
            if kind.is_fault() {
                warn!("{}: {}", self.id, kind);
                self.fault = Some(kind);
            }
        }
        result
    }
}

impl<P, R> Default for MotorDriver<P, R> {
    fn default() -> Self {
        Self::unconfigured("")
    }
}

impl<P, R> Commandable for MotorDriver<P, R>
where
    P: PulseOutput,
    R: OutputPin,
{
    fn id(&self) -> &str {
        self.id
    }

    fn set_value(&mut self, value: i32) {
        MotorDriver::set_value(self, value)
    }
}

fn drive<R: OutputPin>(relay: &mut R, high: bool) -> Result<(), R::Error> {
    if high {
        relay.set_high()
    } else {
        relay.set_low()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc, vec::Vec};

    use embedded_hal::digital::v2::OutputPin;
    use embedded_time::duration::Microseconds;

    use super::{Builder, CommandDomain, Direction, Error, ErrorKind, MotorDriver, RelayPolarity};
    use crate::{Commandable, PulseOutput};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Write {
        Attach,
        Pulse(u32),
        High,
        Low,
    }

    type Log = Rc<RefCell<Vec<Write>>>;

    #[derive(Default)]
    struct Esc {
        log: Log,
        fail_attach: bool,
        fail_write: bool,
    }

    impl PulseOutput for Esc {
        type Error = ();

        fn attach(&mut self) -> Result<(), ()> {
            if self.fail_attach {
                return Err(());
            }
            self.log.borrow_mut().push(Write::Attach);
            Ok(())
        }

        fn write_pulse(&mut self, width: Microseconds<u32>) -> Result<(), ()> {
            if self.fail_write {
                return Err(());
            }
            self.log.borrow_mut().push(Write::Pulse(width.0));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Relay {
        log: Log,
        fail: bool,
    }

    impl OutputPin for Relay {
        type Error = ();

        fn set_low(&mut self) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.log.borrow_mut().push(Write::Low);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.log.borrow_mut().push(Write::High);
            Ok(())
        }
    }

    fn outputs() -> (Esc, Relay, Log) {
        let log = Log::default();
        let esc = Esc {
            log: log.clone(),
            ..Default::default()
        };
        let relay = Relay {
            log: log.clone(),
            ..Default::default()
        };
        (esc, relay, log)
    }

    fn motor() -> (MotorDriver<Esc, Relay>, Log) {
        let (esc, relay, log) = outputs();
        let motor = MotorDriver::new("test", 100, 2000, 1000, esc, relay).unwrap();
        (motor, log)
    }

    fn relay_writes(log: &Log) -> usize {
        log.borrow()
            .iter()
            .filter(|w| matches!(w, Write::High | Write::Low))
            .count()
    }

    #[test]
    fn half_thrust_in_both_directions() {
        let (mut motor, _) = motor();

        motor.set_value(50);
        assert_eq!(motor.current_pulse_width(), 1500);
        assert!(!motor.is_reversed());

        motor.set_value(-50);
        assert_eq!(motor.current_pulse_width(), 1500);
        assert!(motor.is_reversed());

        motor.set_value(200);
        assert_eq!(motor.current_pulse_width(), 2000);
        assert!(!motor.is_reversed());
    }

    #[test]
    fn binds_outputs_before_writing_pulses() {
        let (mut motor, log) = motor();
        assert!(motor.is_configured());
        assert_eq!(*log.borrow(), [Write::Attach, Write::Low]);

        motor.set_value(-100);
        assert_eq!(
            *log.borrow(),
            [Write::Attach, Write::Low, Write::High, Write::Pulse(2000)]
        );
    }

    #[test]
    fn admissible_commands_are_monotonic_and_bounded() {
        let (mut motor, _) = motor();

        let mut last = [1000; 2];
        for magnitude in 0..=100 {
            for (i, thrust) in [magnitude, -magnitude].into_iter().enumerate() {
                motor.set_value(thrust);
                let width = motor.current_pulse_width();
                assert!((1000..=2000).contains(&width));
                assert!(width >= last[i]);
                last[i] = width;
            }
        }
        assert_eq!(last, [2000, 2000]);
    }

    #[test]
    fn excessive_commands_are_clamped() {
        let (mut motor, _) = motor();

        for thrust in [101, 1000, i32::MAX, -101, i32::MIN] {
            motor.set_value(thrust);
            assert_eq!(motor.current_pulse_width(), 2000);
            assert_eq!(motor.is_reversed(), thrust < 0);
        }
        assert_eq!(motor.fault(), None);
    }

    #[test]
    fn full_integer_range() {
        let (mut motor, _) = motor();
        motor.set_thrust_range(u32::MAX);

        assert_eq!(motor.try_set_value(i32::MIN), Ok(()));
        assert_eq!(motor.current_pulse_width(), 1500);
        assert!(motor.is_reversed());
    }

    #[test]
    fn zero_is_idle_in_either_direction() {
        let (mut motor, _) = motor();

        motor.set_value(-80);
        motor.set_value(0);
        assert_eq!(motor.current_pulse_width(), 1000);
        assert!(!motor.is_reversed());
    }

    #[test]
    fn relay_is_only_written_on_direction_change() {
        let (mut motor, log) = motor();

        for thrust in [10, 20, 30] {
            motor.set_value(thrust);
        }
        assert_eq!(relay_writes(&log), 1);

        for thrust in [-10, -20, -30] {
            motor.set_value(thrust);
        }
        assert_eq!(relay_writes(&log), 2);

        motor.set_value(5);
        assert_eq!(relay_writes(&log), 3);
    }

    #[test]
    fn pulse_width_is_stored_exactly_or_clamped() {
        let (mut motor, log) = motor();

        motor.set_pulse_width(1234);
        assert_eq!(motor.current_pulse_width(), 1234);

        motor.set_pulse_width(2500);
        assert_eq!(motor.current_pulse_width(), 2000);

        motor.set_pulse_width(-7);
        assert_eq!(motor.current_pulse_width(), 1000);
        assert_eq!(log.borrow().last(), Some(&Write::Pulse(1000)));
    }

    #[test]
    fn fallible_commands_report_clamping() {
        let (mut motor, _) = motor();

        assert_eq!(motor.try_set_value(-100), Ok(()));
        assert_eq!(
            motor.try_set_value(-300),
            Err(Error::OutOfRange {
                requested: -300,
                applied: -100
            })
        );
        assert_eq!(motor.current_pulse_width(), 2000);
        assert!(motor.is_reversed());

        assert_eq!(
            motor.try_set_pulse_width(900),
            Err(Error::OutOfRange {
                requested: 900,
                applied: 1000
            })
        );
        assert_eq!(motor.current_pulse_width(), 1000);
        assert_eq!(motor.fault(), None);
    }

    #[test]
    fn unconfigured_driver_ignores_commands() {
        let mut motor: MotorDriver<Esc, Relay> = MotorDriver::default();
        assert!(!motor.is_configured());

        motor.set_value(50);
        assert_eq!(motor.current_pulse_width(), 1000);
        assert_eq!(motor.fault(), Some(ErrorKind::NotConfigured));
        assert_eq!(motor.try_set_pulse_width(1500), Err(Error::NotConfigured));

        let (esc, relay, _) = outputs();
        motor.set_control_pin(esc).unwrap();
        motor.set_relay_pin(relay).unwrap();
        motor.clear_fault();

        motor.set_value(50);
        assert_eq!(motor.current_pulse_width(), 1500);
        assert_eq!(motor.fault(), None);
    }

    #[test]
    fn magnitude_domain_uses_explicit_direction() {
        let (esc, relay, log) = outputs();
        let mut motor = MotorDriver::<Esc, Relay>::builder("test")
            .command_domain(CommandDomain::Magnitude)
            .build(esc, relay)
            .unwrap();

        motor.set_direction(Direction::Reversed);
        assert_eq!(log.borrow().last(), Some(&Write::High));

        motor.set_value(50);
        assert_eq!(motor.current_pulse_width(), 1500);
        assert!(motor.is_reversed());

        assert_eq!(
            motor.try_set_value(-20),
            Err(Error::OutOfRange {
                requested: -20,
                applied: 0
            })
        );
        assert_eq!(motor.current_pulse_width(), 1000);
        assert!(motor.is_reversed());
    }

    #[test]
    fn active_low_relay() {
        let (esc, relay, log) = outputs();
        let mut motor = Builder::new("test")
            .relay_polarity(RelayPolarity::ActiveLow)
            .build(esc, relay)
            .unwrap();
        assert_eq!(log.borrow().last(), Some(&Write::High));

        motor.set_value(-1);
        assert!(log.borrow().contains(&Write::Low));
    }

    #[test]
    fn hardware_failures_set_the_fault_flag() {
        let (mut esc, relay, _) = outputs();
        esc.fail_write = true;
        let mut motor = MotorDriver::with_defaults("test", esc, relay).unwrap();

        motor.set_value(50);
        assert_eq!(motor.current_pulse_width(), 1000);
        assert_eq!(motor.fault(), Some(ErrorKind::Pwm));

        motor.clear_fault();
        assert_eq!(motor.fault(), None);
    }

    #[test]
    fn construction_fails_when_binding_fails() {
        let (mut esc, relay, _) = outputs();
        esc.fail_attach = true;
        assert!(matches!(
            MotorDriver::with_defaults("test", esc, relay),
            Err(Error::Pwm(()))
        ));

        let (esc, mut relay, _) = outputs();
        relay.fail = true;
        assert!(matches!(
            MotorDriver::with_defaults("test", esc, relay),
            Err(Error::Relay(()))
        ));
    }

    #[test]
    fn range_setters() {
        let (mut motor, _) = motor();

        assert_eq!(motor.try_set_thrust_range(0), Err(Error::InvalidThrustRange));
        motor.set_thrust_range(0);
        motor.set_value(5);
        assert_eq!(motor.current_pulse_width(), 1000);

        motor.set_thrust_range(10);
        motor.set_value(5);
        assert_eq!(motor.current_pulse_width(), 1500);

        assert_eq!(
            motor.try_set_pulse_width_range(1000, 2000),
            Err(Error::InvalidPulseRange {
                max: 1000,
                min: 2000
            })
        );
        motor.try_set_pulse_width_range(1900, 1100).unwrap();
        motor.set_value(10);
        assert_eq!(motor.current_pulse_width(), 1900);

        // Inverted ranges are accepted silently and saturate
        motor.set_pulse_width_range(1000, 2000);
        motor.set_value(5);
        assert_eq!(motor.current_pulse_width(), 1000);
    }

    #[test]
    fn failed_rebinding_keeps_previous_outputs() {
        let (mut motor, log) = motor();
        let (mut esc, mut relay, other) = outputs();
        esc.fail_attach = true;
        relay.fail = true;

        assert_eq!(motor.set_control_pin(esc).err(), Some(Error::Pwm(())));
        assert_eq!(motor.set_relay_pin(relay).err(), Some(Error::Relay(())));
        assert!(motor.is_configured());
        assert!(other.borrow().is_empty());

        motor.set_value(-30);
        assert_eq!(log.borrow().last(), Some(&Write::Pulse(1300)));
        assert_eq!(relay_writes(&log), 2);
    }

    #[test]
    fn polarity_change_rewrites_relay_once() {
        let (mut motor, log) = motor();

        motor.set_value(10);
        assert_eq!(relay_writes(&log), 1);

        motor.set_relay_polarity(RelayPolarity::ActiveLow);
        assert_eq!(relay_writes(&log), 1);

        motor.set_value(20);
        motor.set_value(30);
        assert_eq!(relay_writes(&log), 2);
        assert_eq!(motor.relay_polarity(), RelayPolarity::ActiveLow);
        assert!(log.borrow().contains(&Write::High));
        assert!(!motor.is_reversed());
    }

    #[test]
    fn rebinding_returns_previous_outputs() {
        let (mut motor, _) = motor();
        let (esc, relay, log) = outputs();

        assert!(motor.set_control_pin(esc).unwrap().is_some());
        assert!(motor.set_relay_pin(relay).unwrap().is_some());
        assert_eq!(*log.borrow(), [Write::Attach, Write::Low]);

        motor.set_value(20);
        assert_eq!(log.borrow().last(), Some(&Write::Pulse(1200)));
    }

    #[test]
    fn stop_keeps_direction() {
        let (mut motor, log) = motor();

        motor.set_value(-60);
        motor.stop();
        assert_eq!(motor.current_pulse_width(), 1000);
        assert!(motor.is_reversed());
        assert_eq!(relay_writes(&log), 2);
    }

    fn command_all<C: Commandable>(devices: &mut [C], value: i32) {
        for device in devices {
            device.set_value(value);
        }
    }

    #[test]
    fn commandable_trait_object() {
        let (mut motor, _) = motor();

        {
            let device: &mut dyn Commandable = &mut motor;
            assert_eq!(device.id(), "test");
            device.set_value(-100);
        }
        assert_eq!(motor.current_pulse_width(), 2000);
        assert!(motor.is_reversed());

        command_all(&mut [&mut motor], 0);
        assert_eq!(motor.current_pulse_width(), 1000);

        let (esc, relay) = motor.release();
        assert!(esc.is_some() && relay.is_some());
    }
}
