//! Error taxonomy for the link core.
//!
//! Every condition here is local and recoverable: the caller gets the error
//! back from the operation that hit it, and a fresh attempt is always
//! possible afterwards. Stale asynchronous callbacks are discarded silently
//! rather than surfaced through this type.

use thiserror::Error;

use crate::link::connection::ConnectionStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("a discovery session is already running")]
    AlreadyScanning,

    #[error("connect is only valid while idle (current status: {0:?})")]
    InvalidState(ConnectionStatus),

    #[error("no arm is connected")]
    NotConnected,

    #[error("the transport did not complete in time")]
    TransportTimeout,

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("write failed: {0}")]
    WriteFailure(String),
}
