//! The bus client loop.
//!
//! One task owns all mutable door state. The rumqttc event loop runs in a
//! sibling task and only forwards inbound control messages over a channel,
//! so the state machine and command handler never run concurrently with
//! each other. Each tick: sample sensors, advance the state machine,
//! publish the diff. Inbound commands wake the loop immediately.

use std::time::{Duration, Instant};

use log::{error, info, warn};
use rumqttc::{AsyncClient, QoS};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::door::{CommandDispatch, DoorController, DoorState, SensorReading};
use crate::error::{BridgeError, Result};
use crate::hardware::{ActuatorSink, GpioActuator, GpioSensors, Relay, SensorSource};
use crate::mqtt::{self, MqttClient, MqttMessage};

/// Door controller plus its hardware, independent of the bus transport.
///
/// Generic over the hardware traits so the whole command/observe/actuate
/// cycle can be driven by tests on the host.
pub struct DoorBridge<S: SensorSource, A: ActuatorSink> {
    controller: DoorController,
    sensors: S,
    actuator: A,
    last_reading: SensorReading,
}

impl<S: SensorSource, A: ActuatorSink> DoorBridge<S, A> {
    pub fn new(sensors: S, actuator: A) -> Self {
        Self {
            controller: DoorController::new(),
            sensors,
            actuator,
            last_reading: SensorReading::new(false, false),
        }
    }

    pub fn state(&self) -> DoorState {
        self.controller.state()
    }

    /// Sample the sensors and reconcile through the state machine.
    /// Returns the state to publish, if it changed.
    pub fn poll(&mut self, now: Instant) -> Option<DoorState> {
        let reading = self.sample();
        self.controller.observe(reading, now)
    }

    /// Dispatch an inbound control payload. The caller must perform the
    /// publish before calling [`actuate`](Self::actuate) with the pulse.
    pub fn handle_payload(&mut self, payload: &[u8], now: Instant) -> Option<CommandDispatch> {
        self.controller.handle_payload(payload, now)
    }

    pub fn actuate(&mut self, relay: Relay) -> Result<()> {
        self.actuator.pulse(relay)
    }

    pub fn confirm_published(&mut self, state: DoorState) {
        self.controller.confirm_published(state);
    }

    /// Read the sensors, keeping the previous observation on a read
    /// failure (a transient read error must not fabricate motion).
    fn sample(&mut self) -> SensorReading {
        match self.sensors.read() {
            Ok(reading) => {
                self.last_reading = reading;
                reading
            }
            Err(e) => {
                warn!("sensor read failed, keeping last observation: {e}");
                self.last_reading
            }
        }
    }
}

/// Run the bridge until a shutdown signal arrives.
///
/// Fatal conditions (GPIO line acquisition, publish failures, protocol
/// faults) are returned as errors; broker disconnects are retried inside
/// the MQTT task and never surface here.
pub async fn run(config: Config) -> Result<()> {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    let state_topic = mqtt::state_topic(&hostname);
    let control_topic = mqtt::control_topic(&hostname);

    // Fail fast: a controller that cannot see its sensors must not run.
    let sensors = GpioSensors::new(&config.gpio)?;
    let actuator = GpioActuator::new(&config.gpio)?;
    let mut bridge = DoorBridge::new(sensors, actuator);

    let mqtt_client = MqttClient::new(&config.mqtt, vec![control_topic.clone()]);
    let client = mqtt_client.client();

    let (msg_tx, mut msg_rx) = mpsc::channel::<MqttMessage>(64);
    let reconnect_delay = Duration::from_secs(config.door.reconnect_delay_secs);
    let mut mqtt_loop = tokio::spawn(async move { mqtt_client.run(msg_tx, reconnect_delay).await });

    info!(
        "state topic = {}, control topic = {}",
        state_topic, control_topic
    );

    let mut tick =
        tokio::time::interval(Duration::from_secs(config.door.poll_interval_secs.max(1)));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = Instant::now();
                if let Some(state) = bridge.poll(now) {
                    publish_state(&client, &state_topic, state).await?;
                    bridge.confirm_published(state);
                }
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    // The event loop task ended; surface its verdict.
                    return match (&mut mqtt_loop).await {
                        Ok(Ok(())) => Err(BridgeError::MqttLoopClosed),
                        Ok(Err(e)) => Err(e),
                        Err(join_err) => {
                            error!("MQTT task panicked: {join_err}");
                            Err(BridgeError::MqttLoopClosed)
                        }
                    };
                };
                if msg.topic != control_topic {
                    continue;
                }
                let now = Instant::now();
                if let Some(dispatch) = bridge.handle_payload(&msg.payload, now) {
                    // Intent is published before the relay fires.
                    if let Some(state) = dispatch.publish {
                        publish_state(&client, &state_topic, state).await?;
                        bridge.confirm_published(state);
                    }
                    if let Some(relay) = dispatch.pulse {
                        bridge.actuate(relay)?;
                    }
                }
                // Immediate re-evaluation, so e.g. a reset resolves from
                // the sensors without waiting for the next tick.
                if let Some(state) = bridge.poll(now) {
                    publish_state(&client, &state_topic, state).await?;
                    bridge.confirm_published(state);
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    mqtt_loop.abort();
    info!("Bridge stopped");
    Ok(())
}

/// Publish a state value, retained. A failed publish is fatal: a bridge
/// that cannot report state must not keep driving a physical door.
async fn publish_state(client: &AsyncClient, topic: &str, state: DoorState) -> Result<()> {
    client
        .publish(topic, QoS::AtMostOnce, true, state.as_str().as_bytes())
        .await?;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM. Checked once per loop iteration; an
/// in-flight relay pulse always runs to completion first.
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {e}");
            // Fall back to ctrl-c only.
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {e}");
            }
            return;
        }
    };

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                error!("Failed to listen for ctrl-c: {e}");
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted sensor source: replays queued readings, then repeats the
    /// last one. `Err` entries simulate transient read failures.
    struct FakeSensors {
        script: VecDeque<std::result::Result<SensorReading, ()>>,
        last: std::result::Result<SensorReading, ()>,
    }

    impl FakeSensors {
        fn new(script: Vec<std::result::Result<SensorReading, ()>>) -> Self {
            Self {
                script: script.into(),
                last: Ok(SensorReading::new(false, false)),
            }
        }
    }

    impl SensorSource for FakeSensors {
        fn read(&mut self) -> Result<SensorReading> {
            if let Some(entry) = self.script.pop_front() {
                self.last = entry;
            }
            match self.last {
                Ok(reading) => Ok(reading),
                Err(()) => Err(std::io::Error::other("sensor read failed").into()),
            }
        }
    }

    /// Records every relay pulse.
    #[derive(Default)]
    struct FakeActuator {
        pulses: Vec<Relay>,
    }

    impl ActuatorSink for FakeActuator {
        fn pulse(&mut self, relay: Relay) -> Result<()> {
            self.pulses.push(relay);
            Ok(())
        }
    }

    fn closed() -> std::result::Result<SensorReading, ()> {
        Ok(SensorReading::new(true, false))
    }

    fn open() -> std::result::Result<SensorReading, ()> {
        Ok(SensorReading::new(false, true))
    }

    fn in_between() -> std::result::Result<SensorReading, ()> {
        Ok(SensorReading::new(false, false))
    }

    #[test]
    fn test_startup_resolves_initial_state() {
        let sensors = FakeSensors::new(vec![closed()]);
        let mut bridge = DoorBridge::new(sensors, FakeActuator::default());

        let now = Instant::now();
        // The machine resolves Initializing before the first publish, so
        // "closed" is the first state on the wire.
        let action = bridge.poll(now);
        assert_eq!(action, Some(DoorState::Closed));
        bridge.confirm_published(DoorState::Closed);
        assert_eq!(bridge.poll(now), None);
    }

    #[test]
    fn test_open_command_end_to_end() {
        let sensors = FakeSensors::new(vec![closed(), in_between(), open()]);
        let mut bridge = DoorBridge::new(sensors, FakeActuator::default());
        let now = Instant::now();

        // Settle into Closed.
        let state = bridge.poll(now).unwrap();
        bridge.confirm_published(state);
        assert_eq!(bridge.state(), DoorState::Closed);

        // '1' arrives: publish "opening" first, then one open-relay pulse.
        let dispatch = bridge.handle_payload(b"1", now).unwrap();
        assert_eq!(dispatch.publish, Some(DoorState::Opening));
        bridge.confirm_published(DoorState::Opening);
        let relay = dispatch.pulse.unwrap();
        bridge.actuate(relay).unwrap();
        assert_eq!(bridge.actuator.pulses, vec![Relay::Open]);

        // Door leaves the closed limit: still opening, nothing to publish.
        assert_eq!(bridge.poll(now), None);

        // Door reaches the open limit: exactly one publish of "open".
        let action = bridge.poll(now);
        assert_eq!(action, Some(DoorState::Open));
        bridge.confirm_published(DoorState::Open);
        assert_eq!(bridge.poll(now), None);
        assert_eq!(bridge.actuator.pulses, vec![Relay::Open]);
    }

    #[test]
    fn test_close_while_closed_is_silent() {
        let sensors = FakeSensors::new(vec![closed()]);
        let mut bridge = DoorBridge::new(sensors, FakeActuator::default());
        let now = Instant::now();
        let state = bridge.poll(now).unwrap();
        bridge.confirm_published(state);

        assert!(bridge.handle_payload(b"0", now).is_none());
        assert!(bridge.actuator.pulses.is_empty());
        assert_eq!(bridge.poll(now), None);
    }

    #[test]
    fn test_reset_reinitializes_from_sensors() {
        let sensors = FakeSensors::new(vec![Ok(SensorReading::new(true, true)), closed()]);
        let mut bridge = DoorBridge::new(sensors, FakeActuator::default());
        let now = Instant::now();

        // Sensor fault puts the door into Error.
        let state = bridge.poll(now).unwrap();
        assert_eq!(state, DoorState::Error);
        bridge.confirm_published(state);

        // 'q' forces Initializing, no pulse; the follow-up poll resolves.
        let dispatch = bridge.handle_payload(b"q", now).unwrap();
        assert_eq!(dispatch.publish, Some(DoorState::Initializing));
        assert!(dispatch.pulse.is_none());
        bridge.confirm_published(DoorState::Initializing);
        assert_eq!(bridge.poll(now), Some(DoorState::Closed));
    }

    #[test]
    fn test_sensor_failure_keeps_last_observation() {
        let sensors = FakeSensors::new(vec![closed(), Err(())]);
        let mut bridge = DoorBridge::new(sensors, FakeActuator::default());
        let now = Instant::now();

        let state = bridge.poll(now).unwrap();
        bridge.confirm_published(state);
        assert_eq!(bridge.state(), DoorState::Closed);

        // Read failure: no fabricated departure from Closed.
        assert_eq!(bridge.poll(now), None);
        assert_eq!(bridge.state(), DoorState::Closed);
    }
}
