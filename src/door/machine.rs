//! Pure door state machine.
//!
//! Maps noisy two-sensor endpoint input onto a stable [`DoorState`]. The
//! sensors only report "at closed limit" / "at open limit"; when both are
//! false the door is somewhere in between, so motion direction has to be
//! inferred from the previous state plus which endpoint sensor dropped out.
//!
//! `advance` is a pure function of its arguments and carries no I/O, which
//! is what keeps it unit-testable on the host.

use std::time::{Duration, Instant};

use super::state::{DoorState, PendingCommand, SensorReading};
use log::warn;

/// Window within which a commanded motion must reach its endpoint sensor.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(150);

/// Compute the next door state from the current state and a fresh sensor
/// observation.
///
/// Returns the next state together with the surviving pending command, if
/// any. Rules are evaluated in precedence order; the both-sensors fault
/// check comes first and overrides everything else.
pub fn advance(
    current: DoorState,
    reading: SensorReading,
    pending: Option<PendingCommand>,
    now: Instant,
) -> (DoorState, Option<PendingCommand>) {
    // Both endpoint sensors asserted at once is a wiring/sensor fault.
    if reading.closed && reading.open {
        warn!("invalid sensor data: both closed and open asserted");
        return (DoorState::Error, None);
    }

    match current {
        DoorState::Initializing => {
            if reading.closed {
                (DoorState::Closed, pending)
            } else if reading.open {
                (DoorState::Open, pending)
            } else {
                // Door ajar or mid-travel: position unknown, keep waiting.
                (DoorState::Initializing, pending)
            }
        }
        DoorState::Closed => {
            if reading.closed {
                (DoorState::Closed, pending)
            } else if reading.open {
                // Left the closed limit and already at the open limit;
                // the in-between observation was missed entirely.
                warn!("door no longer closed");
                (DoorState::Open, pending)
            } else {
                warn!("door no longer closed");
                (DoorState::Opening, pending)
            }
        }
        DoorState::Open => {
            if reading.open {
                (DoorState::Open, pending)
            } else if reading.closed {
                warn!("door no longer open");
                (DoorState::Closed, pending)
            } else {
                warn!("door no longer open");
                (DoorState::Closing, pending)
            }
        }
        DoorState::Opening => {
            if reading.open {
                // Command fulfilled.
                (DoorState::Open, None)
            } else {
                check_timeout(DoorState::Opening, pending, now)
            }
        }
        DoorState::Closing => {
            if reading.closed {
                (DoorState::Closed, None)
            } else {
                check_timeout(DoorState::Closing, pending, now)
            }
        }
        DoorState::Error => (DoorState::Error, pending),
    }
}

/// Fault a commanded motion that failed to reach its endpoint in time.
///
/// Only fires while a pending command exists; an uncommanded transition
/// (someone used the wall button) can sit in `Opening`/`Closing` forever
/// without faulting.
fn check_timeout(
    current: DoorState,
    pending: Option<PendingCommand>,
    now: Instant,
) -> (DoorState, Option<PendingCommand>) {
    match pending {
        Some(cmd) if now.duration_since(cmd.issued_at) > COMMAND_TIMEOUT => {
            warn!(
                "command towards {} did not finish within {}s",
                cmd.target,
                COMMAND_TIMEOUT.as_secs()
            );
            (DoorState::Error, None)
        }
        other => (current, other),
    }
}
