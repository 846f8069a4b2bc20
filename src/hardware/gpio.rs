//! rppal-backed sensor and relay implementations.
//!
//! Wiring: the endpoint reed switches pull their line to ground when the
//! door sits at that travel limit, so inputs use the internal pull-up and
//! read active-low. The relay board inputs are likewise active-low; the
//! output lines idle high and a trigger pulse drives them low for
//! [`PULSE_HOLD`] before releasing.

use std::thread;
use std::time::Duration;

use log::debug;
use rppal::gpio::{Gpio, InputPin, OutputPin};

use super::{ActuatorSink, Relay, SensorSource};
use crate::config::GpioConfig;
use crate::door::state::SensorReading;
use crate::error::Result;

/// How long a relay trigger is held asserted.
pub const PULSE_HOLD: Duration = Duration::from_millis(25);

/// Endpoint sensor inputs. Acquiring the lines fails fast at startup;
/// reads themselves cannot fail afterwards.
pub struct GpioSensors {
    closed_pin: InputPin,
    open_pin: InputPin,
}

impl GpioSensors {
    pub fn new(config: &GpioConfig) -> Result<Self> {
        let gpio = Gpio::new()?;
        let closed_pin = gpio.get(config.closed_sensor_pin)?.into_input_pullup();
        let open_pin = gpio.get(config.open_sensor_pin)?.into_input_pullup();
        debug!(
            "sensor lines acquired: closed=GPIO{} open=GPIO{}",
            config.closed_sensor_pin, config.open_sensor_pin
        );
        Ok(Self {
            closed_pin,
            open_pin,
        })
    }
}

impl SensorSource for GpioSensors {
    fn read(&mut self) -> Result<SensorReading> {
        // Active low: the switch shorts the line to ground at the limit.
        Ok(SensorReading::new(
            self.closed_pin.is_low(),
            self.open_pin.is_low(),
        ))
    }
}

/// Relay trigger outputs for the motor controller.
pub struct GpioActuator {
    open_relay: OutputPin,
    close_relay: OutputPin,
}

impl GpioActuator {
    pub fn new(config: &GpioConfig) -> Result<Self> {
        let gpio = Gpio::new()?;
        // Idle high: relay inputs are active low.
        let open_relay = gpio.get(config.open_relay_pin)?.into_output_high();
        let close_relay = gpio.get(config.close_relay_pin)?.into_output_high();
        debug!(
            "relay lines acquired: open=GPIO{} close=GPIO{}",
            config.open_relay_pin, config.close_relay_pin
        );
        Ok(Self {
            open_relay,
            close_relay,
        })
    }
}

impl ActuatorSink for GpioActuator {
    fn pulse(&mut self, relay: Relay) -> Result<()> {
        let pin = match relay {
            Relay::Open => &mut self.open_relay,
            Relay::Close => &mut self.close_relay,
        };
        debug!("pulsing {:?} relay", relay);
        pin.set_low();
        // Blocking hold is acceptable: actuation is rare and the loop
        // tolerates a brief stall.
        thread::sleep(PULSE_HOLD);
        pin.set_high();
        Ok(())
    }
}
