//! Inbound control commands and their effect on the door.
//!
//! Commands arrive as single-byte MQTT payloads. Handling a command never
//! touches hardware or the bus directly; it mutates bookkeeping and reports
//! the side effects the bridge loop must carry out, in order: publish the
//! intended transitional state first, then pulse the relay. Observers see
//! intent immediately even if actuation or sensor confirmation lags.

use std::time::Instant;

use super::state::{DoorState, PendingCommand};
use crate::hardware::Relay;

/// Parsed control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `'0'`: drive the door closed.
    Close,
    /// `'1'`: drive the door open.
    Open,
    /// `'q'`: cancel any pending command, clear errors, re-read state.
    Reset,
}

impl Command {
    /// Parse a raw control payload. Anything but a recognised single byte
    /// is rejected.
    pub fn parse(payload: &[u8]) -> Result<Self, InvalidCommand> {
        if payload.len() != 1 {
            return Err(InvalidCommand::BadLength(payload.len()));
        }
        match payload[0] {
            b'0' => Ok(Command::Close),
            b'1' => Ok(Command::Open),
            b'q' => Ok(Command::Reset),
            other => Err(InvalidCommand::UnknownByte(other)),
        }
    }
}

/// Rejected control payload. Logged by the caller; never published back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidCommand {
    #[error("invalid payload length: {0}")]
    BadLength(usize),
    #[error("invalid command byte: {0:#04x}")]
    UnknownByte(u8),
}

/// Outcome of handling a command: the new state plus the side effects the
/// bridge loop must perform, in order (publish before pulse).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEffect {
    pub state: DoorState,
    pub pending: Option<PendingCommand>,
    /// Relay to pulse, if the command calls for actuation.
    pub pulse: Option<Relay>,
}

/// Apply a command against the current state.
///
/// Returns `None` for no-ops: a close while already closed or closing, an
/// open while already open or opening. No relay fires and nothing is
/// published for a no-op.
pub fn handle(cmd: Command, current: DoorState, now: Instant) -> Option<CommandEffect> {
    match cmd {
        Command::Close => {
            if matches!(current, DoorState::Closed | DoorState::Closing) {
                return None;
            }
            Some(CommandEffect {
                state: DoorState::Closing,
                pending: Some(PendingCommand::new(DoorState::Closed, now)),
                pulse: Some(Relay::Close),
            })
        }
        Command::Open => {
            if matches!(current, DoorState::Open | DoorState::Opening) {
                return None;
            }
            Some(CommandEffect {
                state: DoorState::Opening,
                pending: Some(PendingCommand::new(DoorState::Open, now)),
                pulse: Some(Relay::Open),
            })
        }
        Command::Reset => {
            // Unconditional: aborts a stuck command and clears Error.
            Some(CommandEffect {
                state: DoorState::Initializing,
                pending: None,
                pulse: None,
            })
        }
    }
}
