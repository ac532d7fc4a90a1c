//! The arm link façade.
//!
//! One explicitly constructed instance owns the discovery controller, the
//! connection supervisor, the dispatcher, and the jog scheduler for a
//! single arm, and is handed by reference to whichever part of the
//! application drives it. Creation, reset, and teardown are all explicit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};

use crate::config::LinkConfig;
use crate::link::connection::{ConnectionStatus, ConnectionSupervisor};
use crate::link::discovery::{DiscoveryController, DiscoverySnapshot, PeripheralDescriptor};
use crate::link::dispatch::{CommandDispatcher, DispatchOutcome, DispatchStatsSnapshot};
use crate::link::error::LinkError;
use crate::link::frame::MotionIntent;
use crate::link::jog::{JogScheduler, JogVector};
use crate::link::transport::{ArmTransport, DeliveryMode};

pub struct ArmLink {
    discovery: DiscoveryController,
    connection: ConnectionSupervisor,
    dispatcher: CommandDispatcher,
    jog: JogScheduler,
}

impl ArmLink {
    pub fn new(transport: Arc<dyn ArmTransport>, config: &LinkConfig) -> Self {
        let connection = ConnectionSupervisor::new(
            transport.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        );
        let dispatcher = CommandDispatcher::new(transport.clone(), connection.subscribe());
        let jog = JogScheduler::new(
            dispatcher.clone(),
            Duration::from_millis(config.jog_period_ms),
        );
        let discovery =
            DiscoveryController::new(transport, config.scan_duration_secs, config.ranging);
        Self {
            discovery,
            connection,
            dispatcher,
            jog,
        }
    }

    // Discovery

    pub fn start_discovery(&self) -> Result<(), LinkError> {
        self.discovery.start()
    }

    pub fn stop_discovery(&self) {
        self.discovery.stop()
    }

    pub fn discovery_snapshot(&self) -> DiscoverySnapshot {
        self.discovery.snapshot()
    }

    pub fn watch_discovery(&self) -> watch::Receiver<DiscoverySnapshot> {
        self.discovery.subscribe()
    }

    // Connection

    pub async fn connect(&self, descriptor: &PeripheralDescriptor) -> Result<(), LinkError> {
        self.connection.connect(&descriptor.id).await
    }

    /// Tears down the link: stops any running jog stream, settles the
    /// state machine in idle, and clears the per-connection dispatch state.
    pub async fn disconnect(&self) {
        self.jog.release();
        self.connection.disconnect().await;
        self.dispatcher.reset();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    // Commands

    pub fn enqueue(
        &self,
        intent: &MotionIntent,
        mode: DeliveryMode,
    ) -> Result<oneshot::Receiver<DispatchOutcome>, LinkError> {
        self.dispatcher.enqueue(intent, mode)
    }

    /// Returns the arm to its origin: home pose plus the linear rail at
    /// zero, the same pair of commands the stock controller sends.
    pub async fn go_home(&self) -> Result<(), LinkError> {
        let pose = self
            .dispatcher
            .enqueue(&MotionIntent::HOME, DeliveryMode::BestEffort)?;
        let rail = self
            .dispatcher
            .enqueue(&MotionIntent::LinearAxisMove { position: 0 }, DeliveryMode::BestEffort)?;
        let _ = pose.await;
        let _ = rail.await;
        Ok(())
    }

    pub fn dispatch_stats(&self) -> DispatchStatsSnapshot {
        self.dispatcher.stats()
    }

    // Jog

    pub fn jog_press(&self, vector: JogVector) {
        self.jog.press(vector)
    }

    pub fn jog_release(&self) {
        self.jog.release()
    }

    pub fn is_jogging(&self) -> bool {
        self.jog.is_active()
    }
}
