//! Device discovery, connection lifecycle, and command protocol core for
//! the Dolphin robotic arm.
//!
//! The crate sits between a UI and the physical arm: it scans for nearby
//! peripherals and ranges them by signal strength, drives a single
//! connection state machine with bounded timeouts, encodes motion intents
//! into the arm's fixed-format binary frames, and dispatches them with
//! acknowledged or best-effort delivery, including deduplication and
//! periodic re-issue for continuous jog motion.
//!
//! [`ArmLink`] is the entry point; it owns every component for one arm and
//! talks to the radio only through the [`ArmTransport`] seam, for which
//! [`BluestTransport`] is the stock BLE implementation.

pub mod config;
pub mod link;

pub use config::{BleConfig, LinkConfig};
pub use link::{
    ArmLink, ArmTransport, BluestTransport, ConnectionStatus, DeliveryMode, DiscoverySnapshot,
    DispatchOutcome, JogVector, LinkError, MotionIntent, PeripheralDescriptor, PeripheralId,
    Sighting,
};
