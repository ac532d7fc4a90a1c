//! The seam between the link core and the underlying radio stack.
//!
//! The core depends on exactly four transport primitives: a scan that
//! yields sightings until cancelled, a connect, a disconnect, and a write
//! with a delivery-mode flag. Nothing else about the radio (service
//! topology, pairing, adapters) leaks above this trait.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::link::error::LinkError;

/// Opaque unique identity of a discoverable peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralId(pub String);

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One sighting reported by the transport scan.
#[derive(Debug, Clone)]
pub struct Sighting {
    pub id: PeripheralId,
    pub name: Option<String>,
    /// Received signal strength in dBm.
    pub rssi: i16,
}

/// Whether a frame's transmission is confirmed by the transport or only
/// submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// The write completes only after the transport confirms it.
    Acknowledged,
    /// The write completes as soon as it is submitted to the radio.
    BestEffort,
}

#[async_trait]
pub trait ArmTransport: Send + Sync + 'static {
    /// Runs a scan until `cancel` fires, pushing every sighting into
    /// `sightings`. Repeat sightings of the same peripheral are expected;
    /// the discovery layer deduplicates them.
    async fn scan(
        &self,
        sightings: mpsc::UnboundedSender<Sighting>,
        cancel: CancellationToken,
    ) -> Result<(), LinkError>;

    /// Establishes the link to `id`, returning once the peripheral is
    /// connected or the transport gives up. The caller bounds the wait.
    async fn connect(&self, id: &PeripheralId) -> Result<(), LinkError>;

    /// Tears the link down. Safe to call for an already-dropped link.
    async fn disconnect(&self, id: &PeripheralId) -> Result<(), LinkError>;

    /// Hands one encoded frame to the radio's single write channel.
    async fn write(&self, bytes: &[u8], mode: DeliveryMode) -> Result<(), LinkError>;
}
