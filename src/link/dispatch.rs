//! Outbound command queue.
//!
//! A single worker task drains the queue in enqueue order, so frames reach
//! the transport exactly as the caller issued them. Consecutive identical
//! jog frames are suppressed on the wire but still complete, keeping the
//! periodic jog stream non-blocking. One-shot commands always transmit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error};
use tokio::sync::{mpsc, oneshot, watch};

use crate::link::connection::ConnectionStatus;
use crate::link::error::LinkError;
use crate::link::frame::{self, Frame, MotionIntent};
use crate::link::transport::{ArmTransport, DeliveryMode};

/// Terminal result of one enqueued request, signaled exactly once.
#[derive(Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The frame was handed to the transport (or suppressed as a duplicate
    /// of the last transmitted jog frame).
    Sent,
    /// The transport rejected the write. Requests are never retried.
    Failed(LinkError),
}

/// Running counters for the outbound stream.
#[derive(Debug, Default)]
pub struct DispatchStats {
    sent: AtomicU64,
    suppressed: AtomicU64,
    failed: AtomicU64,
}

/// Value copy of the counters at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub sent: u64,
    pub suppressed: u64,
    pub failed: u64,
}

struct OutboundRequest {
    frame: Frame,
    mode: DeliveryMode,
    done: oneshot::Sender<DispatchOutcome>,
}

enum WorkerMessage {
    Transmit(OutboundRequest),
    /// Clears the jog dedup memory, issued on link teardown.
    ClearDedup,
}

#[derive(Clone)]
pub struct CommandDispatcher {
    queue: mpsc::UnboundedSender<WorkerMessage>,
    status: watch::Receiver<ConnectionStatus>,
    stats: Arc<DispatchStats>,
}

impl CommandDispatcher {
    pub fn new(
        transport: Arc<dyn ArmTransport>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(DispatchStats::default());
        tokio::spawn(run_worker(transport, rx, stats.clone()));
        Self {
            queue,
            status,
            stats,
        }
    }

    /// Encodes `intent` and appends it to the outbound queue. Fails with
    /// [`LinkError::NotConnected`] unless the link is up. The returned
    /// receiver resolves once, when the request settles.
    pub fn enqueue(
        &self,
        intent: &MotionIntent,
        mode: DeliveryMode,
    ) -> Result<oneshot::Receiver<DispatchOutcome>, LinkError> {
        if *self.status.borrow() != ConnectionStatus::Connected {
            return Err(LinkError::NotConnected);
        }
        let frame = frame::encode(intent);
        let (done, done_rx) = oneshot::channel();
        self.queue
            .send(WorkerMessage::Transmit(OutboundRequest { frame, mode, done }))
            .map_err(|_| LinkError::TransportFailure("dispatch worker stopped".to_string()))?;
        Ok(done_rx)
    }

    /// Drops the per-connection dedup state. Called on disconnect so a new
    /// link starts with a clean jog stream.
    pub fn reset(&self) {
        let _ = self.queue.send(WorkerMessage::ClearDedup);
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            sent: self.stats.sent.load(Ordering::Relaxed),
            suppressed: self.stats.suppressed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker(
    transport: Arc<dyn ArmTransport>,
    mut queue: mpsc::UnboundedReceiver<WorkerMessage>,
    stats: Arc<DispatchStats>,
) {
    // Last jog-class frame actually handed to the transport.
    let mut last_jog: Option<Frame> = None;

    while let Some(message) = queue.recv().await {
        let request = match message {
            WorkerMessage::Transmit(request) => request,
            WorkerMessage::ClearDedup => {
                last_jog = None;
                continue;
            }
        };

        if request.frame.is_jog() && last_jog.as_ref() == Some(&request.frame) {
            debug!("Suppressing duplicate jog frame");
            stats.suppressed.fetch_add(1, Ordering::Relaxed);
            let _ = request.done.send(DispatchOutcome::Sent);
            continue;
        }

        let outcome = match transport
            .write(request.frame.as_bytes(), request.mode)
            .await
        {
            Ok(()) => {
                if request.frame.is_jog() {
                    last_jog = Some(request.frame.clone());
                }
                stats.sent.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Sent
            }
            Err(e) => {
                error!("Frame write failed: {e}");
                stats.failed.fetch_add(1, Ordering::Relaxed);
                DispatchOutcome::Failed(e)
            }
        };
        let _ = request.done.send(outcome);
    }
    debug!("Dispatch worker stopped");
}
