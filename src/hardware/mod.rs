//! Hardware capability traits.
//!
//! The door core never touches GPIO directly; it reads sensors and fires
//! relays through these traits so the state machine and controller stay
//! host-testable. [`gpio`] provides the rppal-backed implementations used
//! on the device.

pub mod gpio;

use crate::door::state::SensorReading;
use crate::error::Result;

pub use gpio::{GpioActuator, GpioSensors};

/// Which relay output to pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relay {
    Open,
    Close,
}

/// Source of endpoint sensor observations.
pub trait SensorSource {
    /// Sample both endpoint sensors as one observation.
    fn read(&mut self) -> Result<SensorReading>;
}

/// Sink for relay trigger pulses.
pub trait ActuatorSink {
    /// Pulse the given relay: assert, hold briefly, release. Blocks for the
    /// duration of the pulse; runs to completion once started.
    fn pulse(&mut self, relay: Relay) -> Result<()>;
}
