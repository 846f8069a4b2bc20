//! Door state types shared by the state machine, command handler and bridge.

use std::fmt;
use std::time::Instant;

/// Discrete position state of the garage door.
///
/// `Initializing` is the only legal start state; it is also the target of an
/// explicit reset command, which is how an `Error` state is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Closed,
    Opening,
    Open,
    Closing,
    Error,
    Initializing,
}

impl DoorState {
    /// Wire representation published on the state topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoorState::Closed => "closed",
            DoorState::Opening => "opening",
            DoorState::Open => "open",
            DoorState::Closing => "closing",
            DoorState::Error => "error",
            DoorState::Initializing => "initializing",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of both endpoint sensors, sampled together.
///
/// The sensors only assert at the travel limits; `closed` and `open` both
/// false means the door is somewhere in between. Both true at once is a
/// wiring or sensor fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorReading {
    pub closed: bool,
    pub open: bool,
}

impl SensorReading {
    pub fn new(closed: bool, open: bool) -> Self {
        Self { closed, open }
    }
}

/// Bookkeeping for an in-flight motion command.
///
/// Exists only while the door state is `Opening` or `Closing` as the result
/// of an explicit command; cleared when the commanded endpoint sensor
/// confirms arrival, or when the motion times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand {
    /// Terminal state the command is driving towards (`Open` or `Closed`).
    pub target: DoorState,
    /// When the command was accepted.
    pub issued_at: Instant,
}

impl PendingCommand {
    pub fn new(target: DoorState, issued_at: Instant) -> Self {
        Self { target, issued_at }
    }
}
