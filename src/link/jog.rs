//! Periodic re-issue of jog frames while a directional input is held.
//!
//! At most one timer task is alive: the first press spawns it, further
//! presses only swap the jog vector (picked up on the next tick), and
//! release cancels the task and enqueues exactly one all-zero stop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::link::dispatch::CommandDispatcher;
use crate::link::frame::MotionIntent;
use crate::link::transport::DeliveryMode;

/// Jog step currently held, each axis clamped to a unit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JogVector {
    pub dx: i8,
    pub dy: i8,
    pub dz: i8,
}

impl JogVector {
    pub const ZERO: JogVector = JogVector { dx: 0, dy: 0, dz: 0 };

    fn clamped(self) -> Self {
        Self {
            dx: self.dx.clamp(-1, 1),
            dy: self.dy.clamp(-1, 1),
            dz: self.dz.clamp(-1, 1),
        }
    }

    fn intent(self) -> MotionIntent {
        MotionIntent::RelativeJog {
            dx: self.dx,
            dy: self.dy,
            dz: self.dz,
        }
    }
}

pub struct JogScheduler {
    dispatcher: CommandDispatcher,
    period: Duration,
    vector: Arc<Mutex<JogVector>>,
    active: Mutex<Option<CancellationToken>>,
}

impl JogScheduler {
    pub fn new(dispatcher: CommandDispatcher, period: Duration) -> Self {
        Self {
            dispatcher,
            period,
            vector: Arc::new(Mutex::new(JogVector::ZERO)),
            active: Mutex::new(None),
        }
    }

    /// Registers a held directional input. The first press starts the
    /// periodic stream; while active, a press only updates the vector,
    /// which takes effect on the next tick.
    pub fn press(&self, vector: JogVector) {
        *self.vector.lock().unwrap() = vector.clamped();

        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        *active = Some(cancel.clone());

        let dispatcher = self.dispatcher.clone();
        let shared = self.vector.clone();
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let current = *shared.lock().unwrap();
                        match dispatcher.enqueue(&current.intent(), DeliveryMode::BestEffort) {
                            Ok(done) => drop(done),
                            // The jog stream is best-effort; a dropped tick
                            // is not worth surfacing.
                            Err(e) => debug!("Jog tick dropped: {e}"),
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    /// Ends the held input: cancels the periodic stream and enqueues one
    /// stop intent with all axes zero. A no-op when not active.
    pub fn release(&self) {
        let token = self.active.lock().unwrap().take();
        let Some(token) = token else {
            return;
        };
        token.cancel();
        *self.vector.lock().unwrap() = JogVector::ZERO;
        match self
            .dispatcher
            .enqueue(&MotionIntent::JOG_STOP, DeliveryMode::BestEffort)
        {
            Ok(done) => drop(done),
            Err(e) => debug!("Jog stop dropped: {e}"),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::connection::ConnectionStatus;
    use crate::link::transport::mock::{ConnectBehavior, MockTransport};
    use tokio::sync::watch;

    const PERIOD: Duration = Duration::from_millis(100);
    const RIGHT: JogVector = JogVector { dx: 1, dy: 0, dz: 0 };
    const UP: JogVector = JogVector { dx: 0, dy: 1, dz: 0 };

    fn scheduler(
        status: ConnectionStatus,
    ) -> (
        Arc<MockTransport>,
        JogScheduler,
        CommandDispatcher,
        watch::Sender<ConnectionStatus>,
    ) {
        let transport = Arc::new(MockTransport::new(ConnectBehavior::Immediate));
        let (status_tx, status_rx) = watch::channel(status);
        let dispatcher = CommandDispatcher::new(transport.clone(), status_rx);
        let jog = JogScheduler::new(dispatcher.clone(), PERIOD);
        (transport, jog, dispatcher, status_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn holding_dispatches_periodically_and_release_stops_once() {
        let (transport, jog, dispatcher, _status) = scheduler(ConnectionStatus::Connected);

        jog.press(RIGHT);
        tokio::time::sleep(Duration::from_millis(350)).await;
        jog.release();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Ticks at 0, 100, 200 and 300 ms: four dispatches, of which the
        // first reaches the wire and the rest are suppressed as duplicates.
        let stats = dispatcher.stats();
        assert!(stats.sent + stats.suppressed >= 4);
        assert!(stats.suppressed >= 3);

        let written = transport.written_frames();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0], vec![0xA5, 0xA5, 0x02, 0x01, 0x00, 0x00]);
        assert_eq!(written[1], vec![0xA5, 0xA5, 0x02, 0x00, 0x00, 0x00]);

        // A second release must not issue another stop.
        jog.release();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.written_frames().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn a_press_while_active_updates_the_vector_without_a_second_timer() {
        let (transport, jog, _dispatcher, _status) = scheduler(ConnectionStatus::Connected);

        jog.press(RIGHT);
        tokio::time::sleep(Duration::from_millis(150)).await;
        jog.press(UP);
        assert!(jog.is_active());
        tokio::time::sleep(Duration::from_millis(150)).await;
        jog.release();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let written = transport.written_frames();
        assert_eq!(
            written,
            vec![
                vec![0xA5, 0xA5, 0x02, 0x01, 0x00, 0x00],
                vec![0xA5, 0xA5, 0x02, 0x00, 0x01, 0x00],
                vec![0xA5, 0xA5, 0x02, 0x00, 0x00, 0x00],
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn jogging_while_disconnected_transmits_nothing() {
        let (transport, jog, _dispatcher, _status) = scheduler(ConnectionStatus::Idle);

        jog.press(RIGHT);
        tokio::time::sleep(Duration::from_millis(250)).await;
        jog.release();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(transport.written_frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_without_a_press_is_a_no_op() {
        let (transport, jog, _dispatcher, _status) = scheduler(ConnectionStatus::Connected);
        jog.release();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(transport.written_frames().is_empty());
    }
}
