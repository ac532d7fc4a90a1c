//! Bounded-duration peripheral discovery.
//!
//! One session at a time: `start` opens a fresh session, runs the transport
//! scan under a cancellation token, and counts down at one-second
//! resolution. Sightings upsert into the session's peripheral list in
//! insertion order. When the countdown reaches zero or `stop` is called the
//! list freezes and stays readable until the next `start`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::link::error::LinkError;
use crate::link::ranging::{self, RangingParams};
use crate::link::transport::{ArmTransport, PeripheralId, Sighting};

/// One discovered peripheral, owned by the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct PeripheralDescriptor {
    pub id: PeripheralId,
    pub name: Option<String>,
    /// Latest signal-strength sample in dBm.
    pub rssi: i16,
    /// Smoothed distance estimate in metres, negative when unknown.
    pub distance_m: f64,
}

/// Value snapshot published on every tick or sighting.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySnapshot {
    /// Peripherals in insertion order.
    pub peripherals: Vec<PeripheralDescriptor>,
    pub remaining_secs: u32,
    pub searching: bool,
}

pub struct DiscoveryController {
    transport: Arc<dyn ArmTransport>,
    ranging: RangingParams,
    scan_duration_secs: u32,
    snapshot_tx: watch::Sender<DiscoverySnapshot>,
    session: Mutex<Option<CancellationToken>>,
    /// Bumped on every `start`; publishes from superseded sessions are
    /// dropped so a stale task can never overwrite a newer session.
    generation: Arc<Mutex<u64>>,
}

impl DiscoveryController {
    pub fn new(
        transport: Arc<dyn ArmTransport>,
        scan_duration_secs: u32,
        ranging: RangingParams,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(DiscoverySnapshot::default());
        Self {
            transport,
            ranging,
            scan_duration_secs,
            snapshot_tx,
            session: Mutex::new(None),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Opens a new discovery session. Fails while a session is still live;
    /// results of a previous, finished session are discarded.
    pub fn start(&self) -> Result<(), LinkError> {
        let mut session = self.session.lock().unwrap();
        if let Some(token) = session.as_ref() {
            if !token.is_cancelled() {
                return Err(LinkError::AlreadyScanning);
            }
        }

        let cancel = CancellationToken::new();
        *session = Some(cancel.clone());

        // Publish the fresh session before any task runs so observers never
        // see the previous session's frozen snapshot after `start` returns.
        let my_gen = {
            let mut generation = self.generation.lock().unwrap();
            *generation += 1;
            self.snapshot_tx.send_replace(DiscoverySnapshot {
                peripherals: Vec::new(),
                remaining_secs: self.scan_duration_secs,
                searching: true,
            });
            *generation
        };

        let (sighting_tx, sighting_rx) = mpsc::unbounded_channel();

        let transport = self.transport.clone();
        let scan_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.scan(sighting_tx, scan_cancel).await {
                error!("Transport scan failed: {e}");
            }
        });

        let session = SessionHandle {
            snapshot_tx: self.snapshot_tx.clone(),
            generation: self.generation.clone(),
            my_gen,
        };
        let ranging = self.ranging;
        let total_secs = self.scan_duration_secs;
        tokio::spawn(run_session(session, sighting_rx, cancel, ranging, total_secs));

        info!("Discovery session started ({total_secs}s window)");
        Ok(())
    }

    /// Ends the active session early. The collected list stays readable.
    pub fn stop(&self) {
        let session = self.session.lock().unwrap();
        if let Some(token) = session.as_ref() {
            if !token.is_cancelled() {
                info!("Discovery session stopped early");
                token.cancel();
            }
        }
    }

    /// Current session state as an owned value copy.
    pub fn snapshot(&self) -> DiscoverySnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribes to session updates.
    pub fn subscribe(&self) -> watch::Receiver<DiscoverySnapshot> {
        self.snapshot_tx.subscribe()
    }
}

/// A session task's handle for publishing into the shared snapshot channel.
struct SessionHandle {
    snapshot_tx: watch::Sender<DiscoverySnapshot>,
    generation: Arc<Mutex<u64>>,
    my_gen: u64,
}

impl SessionHandle {
    fn publish(&self, peripherals: &[PeripheralDescriptor], remaining_secs: u32, searching: bool) {
        let current = self.generation.lock().unwrap();
        if *current != self.my_gen {
            return;
        }
        self.snapshot_tx.send_replace(DiscoverySnapshot {
            peripherals: peripherals.to_vec(),
            remaining_secs,
            searching,
        });
    }
}

async fn run_session(
    session: SessionHandle,
    mut sightings: mpsc::UnboundedReceiver<Sighting>,
    cancel: CancellationToken,
    ranging: RangingParams,
    total_secs: u32,
) {
    let mut peripherals: Vec<PeripheralDescriptor> = Vec::new();
    let mut remaining = total_secs;
    let mut sightings_open = true;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    // The first tick completes immediately; consume it so the countdown
    // starts one second from now.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                remaining = remaining.saturating_sub(1);
                session.publish(&peripherals, remaining, true);
                if remaining == 0 {
                    break;
                }
            }
            maybe = sightings.recv(), if sightings_open => {
                match maybe {
                    Some(sighting) => {
                        upsert(&mut peripherals, sighting, &ranging);
                        session.publish(&peripherals, remaining, true);
                    }
                    None => sightings_open = false,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    session.publish(&peripherals, remaining, false);
    cancel.cancel();
    info!(
        "Discovery session ended with {} peripheral(s)",
        peripherals.len()
    );
}

fn upsert(
    peripherals: &mut Vec<PeripheralDescriptor>,
    sighting: Sighting,
    ranging: &RangingParams,
) {
    let estimate = ranging::estimate_distance(sighting.rssi, ranging);
    if let Some(existing) = peripherals.iter_mut().find(|p| p.id == sighting.id) {
        existing.rssi = sighting.rssi;
        existing.distance_m = ranging::smooth(existing.distance_m, estimate, ranging);
        if existing.name.is_none() {
            existing.name = sighting.name;
        }
        debug!(
            "Updated sighting of {} (rssi {}, ~{:.2} m)",
            existing.id, existing.rssi, existing.distance_m
        );
    } else {
        debug!(
            "New peripheral {} ({:?}, rssi {})",
            sighting.id, sighting.name, sighting.rssi
        );
        peripherals.push(PeripheralDescriptor {
            id: sighting.id,
            name: sighting.name,
            rssi: sighting.rssi,
            distance_m: estimate,
        });
    }
}
