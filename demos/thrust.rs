use embedded_hal::digital::v2::OutputPin;
use embedded_hal::PwmPin;
use embedded_thrust::{Commandable, MotorDriver, ServoPwm};

struct ExamplePwm(u16);

impl PwmPin for ExamplePwm {
    type Duty = u16;

    fn disable(&mut self) {}

    fn enable(&mut self) {
        dbg!("attached");
    }

    fn get_duty(&self) -> u16 {
        self.0
    }

    fn get_max_duty(&self) -> u16 {
        u16::MAX
    }

    fn set_duty(&mut self, duty: u16) {
        self.0 = dbg!(duty);
    }
}

struct ExampleRelay;

impl OutputPin for ExampleRelay {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        dbg!("relay forward");
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        dbg!("relay reversed");
        Ok(())
    }
}

fn main() {
    let esc = ServoPwm::new(ExamplePwm(0));
    let mut motor = MotorDriver::new("port", 100, 2000, 1000, esc, ExampleRelay)
        .expect("failed to bind motor outputs");

    let thrusters: &mut [&mut dyn Commandable] = &mut [&mut motor];
    for thrust in [0, 50, 100, -50, 200] {
        for thruster in thrusters.iter_mut() {
            thruster.set_value(thrust);
        }
    }

    dbg!(motor.current_pulse_width(), motor.is_reversed());
}
