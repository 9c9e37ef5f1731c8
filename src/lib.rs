//! # embedded-thrust
//! A `#![no_std]` driver for a brushless motor with a reversing relay.
//!
//! A thrust command is mapped linearly onto the pulse width sent to the ESC,
//! and the sign of the command (or an explicit [`Direction`]) selects the relay
//! state that reverses current through the motor.
//!
//! # Hardware
//! [`hal`] contains the capabilities the driver consumes:
//! a [`PulseOutput`] for the ESC signal (see [`ServoPwm`] to adapt any
//! [`embedded_hal::PwmPin`]) and an [`embedded_hal::digital::v2::OutputPin`] for the relay.
//!
//! # Example
//! ```ignore
//! use embedded_thrust::{Commandable, MotorDriver};
//! use embedded_thrust::hal::ServoPwm;
//!
//! let esc = ServoPwm::new(pwm_channel);
//! let mut motor = MotorDriver::new("port", 100, 2000, 1000, esc, relay_pin)?;
//!
//! // Half thrust, reversed
//! motor.set_value(-50);
//! assert_eq!(motor.current_pulse_width(), 1500);
//! assert!(motor.is_reversed());
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod hal;
pub use hal::{Commandable, PulseOutput, ServoPwm};

pub mod motor;
pub use motor::{CommandDomain, Direction, Error, ErrorKind, MotorDriver, RelayPolarity};
