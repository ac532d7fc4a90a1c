//! The arm link core: peripheral discovery, connection lifecycle, and the
//! command protocol layered on top of a minimal radio transport seam.

mod ble;
mod connection;
mod discovery;
mod dispatch;
mod error;
mod frame;
mod jog;
mod manager;
mod ranging;
mod transport;

pub use ble::BluestTransport;
pub use connection::{ConnectionStatus, ConnectionSupervisor};
pub use discovery::{DiscoveryController, DiscoverySnapshot, PeripheralDescriptor};
pub use dispatch::{CommandDispatcher, DispatchOutcome, DispatchStatsSnapshot};
pub use error::LinkError;
pub use frame::{
    CMD_GRIPPER, CMD_JOG, CMD_LINEAR_AXIS, CMD_POSE, FRAME_SYNC, Frame, MotionIntent, encode,
};
pub use jog::{JogScheduler, JogVector};
pub use manager::ArmLink;
pub use ranging::{DISTANCE_UNKNOWN, RangingParams, estimate_distance, smooth};
pub use transport::{ArmTransport, DeliveryMode, PeripheralId, Sighting};
