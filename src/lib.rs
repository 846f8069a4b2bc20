//! Garage door MQTT bridge library.
//!
//! Polls a pair of GPIO endpoint sensors, infers a discrete door state and
//! bridges it to an MQTT broker: state changes go out retained on
//! `/<hostname>/door/state`, single-byte commands come in on
//! `/<hostname>/door/control`.

pub mod bridge;
pub mod config;
pub mod door;
pub mod error;
pub mod hardware;
pub mod mqtt;
