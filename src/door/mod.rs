//! Door domain: state types, the pure state machine, command handling and
//! the controller context that ties them together.

pub mod command;
pub mod controller;
pub mod machine;
pub mod state;

pub use command::Command;
pub use controller::{CommandDispatch, DoorController};
pub use state::{DoorState, PendingCommand, SensorReading};
