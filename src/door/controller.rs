//! Door controller context: current state, pending-command bookkeeping and
//! last-published memory, owned by the bridge loop. No ambient globals.

use std::time::Instant;

use log::{info, warn};

use super::command::{self, Command};
use super::machine;
use super::state::{DoorState, PendingCommand, SensorReading};
use crate::hardware::Relay;

/// Side effects the bridge loop must carry out after dispatching a command.
/// Ordering matters: the publish happens before the relay pulse so bus
/// observers see the intended transition immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDispatch {
    pub publish: Option<DoorState>,
    pub pulse: Option<Relay>,
}

/// All mutable door state, in one place.
pub struct DoorController {
    state: DoorState,
    pending: Option<PendingCommand>,
    last_published: Option<DoorState>,
}

impl Default for DoorController {
    fn default() -> Self {
        Self::new()
    }
}

impl DoorController {
    pub fn new() -> Self {
        Self {
            state: DoorState::Initializing,
            pending: None,
            last_published: None,
        }
    }

    pub fn state(&self) -> DoorState {
        self.state
    }

    /// Reconcile a fresh sensor observation through the state machine.
    /// Returns the state to publish, if it changed since the last publish.
    pub fn observe(&mut self, reading: SensorReading, now: Instant) -> Option<DoorState> {
        let (next, pending) = machine::advance(self.state, reading, self.pending, now);
        self.state = next;
        self.pending = pending;
        self.publish_action()
    }

    /// Dispatch an inbound control command. Returns `None` for no-ops.
    pub fn handle_command(&mut self, cmd: Command, now: Instant) -> Option<CommandDispatch> {
        let effect = command::handle(cmd, self.state, now)?;
        match cmd {
            Command::Close => info!("closing door"),
            Command::Open => info!("opening door"),
            Command::Reset => info!("cancelling command and error state"),
        }
        self.state = effect.state;
        self.pending = effect.pending;
        Some(CommandDispatch {
            publish: self.publish_action(),
            pulse: effect.pulse,
        })
    }

    /// Parse and dispatch a raw control payload. Invalid payloads are
    /// logged and ignored; nothing is published back.
    pub fn handle_payload(&mut self, payload: &[u8], now: Instant) -> Option<CommandDispatch> {
        match Command::parse(payload) {
            Ok(cmd) => self.handle_command(cmd, now),
            Err(e) => {
                warn!("rejected control message: {e}");
                None
            }
        }
    }

    /// State to publish, if it differs from the last successful publish.
    /// De-duplication is by value equality only.
    pub fn publish_action(&self) -> Option<DoorState> {
        (self.last_published != Some(self.state)).then_some(self.state)
    }

    /// Record a successful bus write. Called by the publisher only.
    pub fn confirm_published(&mut self, state: DoorState) {
        info!("published state info: {state}");
        self.last_published = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_wants_publishing() {
        let ctl = DoorController::new();
        assert_eq!(ctl.state(), DoorState::Initializing);
        assert_eq!(ctl.publish_action(), Some(DoorState::Initializing));
    }

    #[test]
    fn test_publish_is_idempotent() {
        let mut ctl = DoorController::new();
        let now = Instant::now();

        let action = ctl.observe(SensorReading::new(true, false), now);
        assert_eq!(action, Some(DoorState::Closed));
        ctl.confirm_published(DoorState::Closed);

        // Same observation again: exactly zero further bus writes.
        let action = ctl.observe(SensorReading::new(true, false), now);
        assert_eq!(action, None);
        assert_eq!(ctl.publish_action(), None);
    }

    #[test]
    fn test_unconfirmed_publish_stays_due() {
        let mut ctl = DoorController::new();
        let now = Instant::now();

        // Publish action repeats until the write is confirmed.
        ctl.observe(SensorReading::new(true, false), now);
        assert_eq!(ctl.publish_action(), Some(DoorState::Closed));
        assert_eq!(ctl.publish_action(), Some(DoorState::Closed));
    }

    #[test]
    fn test_noop_command_produces_nothing() {
        let mut ctl = DoorController::new();
        let now = Instant::now();
        ctl.observe(SensorReading::new(true, false), now);
        ctl.confirm_published(DoorState::Closed);

        assert!(ctl.handle_command(Command::Close, now).is_none());
        assert_eq!(ctl.publish_action(), None);
    }

    #[test]
    fn test_open_command_publishes_intent_and_pulses() {
        let mut ctl = DoorController::new();
        let now = Instant::now();
        ctl.observe(SensorReading::new(true, false), now);
        ctl.confirm_published(DoorState::Closed);

        let dispatch = ctl.handle_command(Command::Open, now).unwrap();
        assert_eq!(dispatch.publish, Some(DoorState::Opening));
        assert_eq!(dispatch.pulse, Some(Relay::Open));
    }

    #[test]
    fn test_invalid_payload_is_ignored() {
        let mut ctl = DoorController::new();
        let now = Instant::now();
        assert!(ctl.handle_payload(b"2", now).is_none());
        assert!(ctl.handle_payload(b"", now).is_none());
        assert!(ctl.handle_payload(b"10", now).is_none());
        assert_eq!(ctl.state(), DoorState::Initializing);
    }

    #[test]
    fn test_commanded_motion_confirms_via_sensors() {
        let mut ctl = DoorController::new();
        let now = Instant::now();
        ctl.observe(SensorReading::new(true, false), now);
        ctl.confirm_published(DoorState::Closed);

        let dispatch = ctl.handle_payload(b"1", now).unwrap();
        ctl.confirm_published(dispatch.publish.unwrap());

        // Door reaches the open limit on a later tick.
        let action = ctl.observe(SensorReading::new(false, true), now);
        assert_eq!(action, Some(DoorState::Open));
    }
}
