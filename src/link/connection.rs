//! Connection lifecycle for the single active arm link.
//!
//! One attempt at a time, tagged with a generation counter so an outcome
//! arriving after a timeout or a disconnect is discarded instead of
//! resurrecting a dead attempt. Every transition is published as a single
//! status value through a watch channel.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{Mutex, watch};

use crate::link::error::LinkError;
use crate::link::transport::{ArmTransport, PeripheralId};

/// Published state of the arm link. Exactly one value at a time,
/// mutated only by the [`ConnectionSupervisor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Failed,
    TimedOut,
}

struct Inner {
    status: ConnectionStatus,
    /// Bumped on every attempt and on disconnect; stale outcomes carry an
    /// older generation and are ignored.
    generation: u64,
    peripheral: Option<PeripheralId>,
    last_failure: Option<String>,
}

pub struct ConnectionSupervisor {
    transport: Arc<dyn ArmTransport>,
    connect_timeout: Duration,
    inner: Arc<Mutex<Inner>>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionSupervisor {
    pub fn new(transport: Arc<dyn ArmTransport>, connect_timeout: Duration) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            transport,
            connect_timeout,
            inner: Arc::new(Mutex::new(Inner {
                status: ConnectionStatus::Idle,
                generation: 0,
                peripheral: None,
                last_failure: None,
            })),
            status_tx,
        }
    }

    /// Attempts to connect to `id`. Only valid from `Idle`; the attempt
    /// settles into exactly one of connected, failed, or timed out within
    /// the configured timeout.
    pub async fn connect(&self, id: &PeripheralId) -> Result<(), LinkError> {
        let generation = {
            let mut inner = self.inner.lock().await;
            if inner.status != ConnectionStatus::Idle {
                return Err(LinkError::InvalidState(inner.status));
            }
            inner.generation += 1;
            inner.status = ConnectionStatus::Connecting;
            inner.peripheral = Some(id.clone());
            inner.last_failure = None;
            self.status_tx.send_replace(ConnectionStatus::Connecting);
            inner.generation
        };
        info!("Connecting to {id} (attempt {generation})");

        let transport = self.transport.clone();
        let target = id.clone();
        let inner = self.inner.clone();
        let status_tx = self.status_tx.clone();
        tokio::spawn(async move {
            let (outcome, failure) = match transport.connect(&target).await {
                Ok(()) => (ConnectionStatus::Connected, None),
                Err(e) => {
                    warn!("Transport connect to {target} failed: {e}");
                    (ConnectionStatus::Failed, Some(e.to_string()))
                }
            };
            commit(&inner, &status_tx, generation, outcome, failure).await;
        });

        // Wait for the attempt to settle, bounded by the timeout. The
        // in-flight transport call is abandoned on timeout; its eventual
        // outcome is rejected by the generation check.
        let mut status_rx = self.status_tx.subscribe();
        let settled = tokio::time::timeout(
            self.connect_timeout,
            status_rx.wait_for(|s| *s != ConnectionStatus::Connecting),
        )
        .await
        .is_ok();
        if !settled {
            warn!("Connect attempt {generation} to {id} timed out");
            commit(
                &self.inner,
                &self.status_tx,
                generation,
                ConnectionStatus::TimedOut,
                None,
            )
            .await;
        }

        // Copy the status out so no watch read guard lives across an await.
        let status = *self.status_tx.borrow();
        match status {
            ConnectionStatus::Connected => {
                info!("Connected to {id}");
                Ok(())
            }
            ConnectionStatus::TimedOut => Err(LinkError::TransportTimeout),
            ConnectionStatus::Failed => {
                let message = self
                    .inner
                    .lock()
                    .await
                    .last_failure
                    .take()
                    .unwrap_or_else(|| "connection rejected".to_string());
                Err(LinkError::TransportFailure(message))
            }
            // A concurrent disconnect superseded this attempt.
            status => Err(LinkError::InvalidState(status)),
        }
    }

    /// Tears the link down from any non-idle state and settles in `Idle`.
    /// A no-op when already idle.
    pub async fn disconnect(&self) {
        let peripheral = {
            let mut inner = self.inner.lock().await;
            if inner.status == ConnectionStatus::Idle {
                return;
            }
            // Invalidate any in-flight attempt before dropping the link.
            inner.generation += 1;
            inner.status = ConnectionStatus::Idle;
            inner.last_failure = None;
            self.status_tx.send_replace(ConnectionStatus::Idle);
            inner.peripheral.take()
        };
        if let Some(id) = peripheral {
            info!("Disconnecting from {id}");
            if let Err(e) = self.transport.disconnect(&id).await {
                warn!("Transport disconnect from {id} failed: {e}");
            }
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }
}

async fn commit(
    inner: &Mutex<Inner>,
    status_tx: &watch::Sender<ConnectionStatus>,
    generation: u64,
    outcome: ConnectionStatus,
    failure: Option<String>,
) {
    let mut inner = inner.lock().await;
    if inner.generation != generation || inner.status != ConnectionStatus::Connecting {
        debug!("Discarding stale outcome {outcome:?} for attempt {generation}");
        return;
    }
    inner.status = outcome;
    inner.last_failure = failure;
    if outcome != ConnectionStatus::Connected {
        inner.peripheral = None;
    }
    status_tx.send_replace(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::transport::mock::{ConnectBehavior, MockTransport};

    const TIMEOUT: Duration = Duration::from_secs(8);

    fn supervisor(behavior: ConnectBehavior) -> Arc<ConnectionSupervisor> {
        Arc::new(ConnectionSupervisor::new(
            Arc::new(MockTransport::new(behavior)),
            TIMEOUT,
        ))
    }

    fn arm() -> PeripheralId {
        PeripheralId("arm-1".to_string())
    }

    #[test]
    fn connect_future_can_move_across_threads() {
        fn assert_send<T: Send>(_: &T) {}
        let supervisor = supervisor(ConnectBehavior::Hang);
        let id = arm();
        let fut = supervisor.connect(&id);
        assert_send(&fut);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_passes_through_connecting_to_connected() {
        let supervisor = supervisor(ConnectBehavior::After(Duration::from_secs(1)));
        let task = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.connect(&arm()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(supervisor.status(), ConnectionStatus::Connecting);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(supervisor.status(), ConnectionStatus::Connected);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connect_settles_in_failed() {
        let supervisor = supervisor(ConnectBehavior::Refuse);
        let result = supervisor.connect(&arm()).await;
        assert!(matches!(result, Err(LinkError::TransportFailure(_))));
        assert_eq!(supervisor.status(), ConnectionStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_connect_times_out_within_the_bound() {
        let supervisor = supervisor(ConnectBehavior::Hang);
        let result = supervisor.connect(&arm()).await;
        assert_eq!(result, Err(LinkError::TransportTimeout));
        assert_eq!(supervisor.status(), ConnectionStatus::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn late_success_after_timeout_is_discarded() {
        let supervisor = supervisor(ConnectBehavior::After(TIMEOUT + Duration::from_secs(4)));
        let result = supervisor.connect(&arm()).await;
        assert_eq!(result, Err(LinkError::TransportTimeout));
        assert_eq!(supervisor.status(), ConnectionStatus::TimedOut);

        // The abandoned attempt completes well after the timeout; its
        // outcome must not flip the published status.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(supervisor.status(), ConnectionStatus::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_rejected_unless_idle() {
        let supervisor = supervisor(ConnectBehavior::After(Duration::from_secs(2)));
        let task = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.connect(&arm()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = supervisor.connect(&arm()).await;
        assert_eq!(
            second,
            Err(LinkError::InvalidState(ConnectionStatus::Connecting))
        );

        task.await.unwrap().unwrap();
        let third = supervisor.connect(&arm()).await;
        assert_eq!(
            third,
            Err(LinkError::InvalidState(ConnectionStatus::Connected))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_resets_to_idle_and_allows_a_fresh_attempt() {
        let supervisor = supervisor(ConnectBehavior::Immediate);
        supervisor.connect(&arm()).await.unwrap();
        assert_eq!(supervisor.status(), ConnectionStatus::Connected);

        supervisor.disconnect().await;
        assert_eq!(supervisor.status(), ConnectionStatus::Idle);

        supervisor.connect(&arm()).await.unwrap();
        assert_eq!(supervisor.status(), ConnectionStatus::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_supersedes_an_in_flight_attempt() {
        let supervisor = supervisor(ConnectBehavior::After(Duration::from_secs(2)));
        let task = {
            let supervisor = supervisor.clone();
            tokio::spawn(async move { supervisor.connect(&arm()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        supervisor.disconnect().await;
        assert_eq!(supervisor.status(), ConnectionStatus::Idle);

        // The superseded attempt completes later and must stay discarded.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(supervisor.status(), ConnectionStatus::Idle);
        assert!(task.await.unwrap().is_err());
    }
}
