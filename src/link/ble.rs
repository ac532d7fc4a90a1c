//! BLE transport backed by `bluest`.
//!
//! The arm's controller board exposes a UART-style service with a single
//! write characteristic; this adapter maps the four transport primitives
//! onto it and keeps the device handles the scan produced so a later
//! connect can resolve a peripheral id back to a device.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device};
use futures_util::StreamExt;
use log::{debug, info};
use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::BleConfig;
use crate::link::error::LinkError;
use crate::link::transport::{ArmTransport, DeliveryMode, PeripheralId, Sighting};

struct ActiveLink {
    device: Device,
    write_char: Characteristic,
}

pub struct BluestTransport {
    adapter: Adapter,
    service_uuid: Uuid,
    write_char_uuid: Uuid,
    name_filter: Option<String>,
    /// Device handles collected by the most recent scan.
    devices: StdMutex<HashMap<PeripheralId, Device>>,
    active: Mutex<Option<ActiveLink>>,
}

impl BluestTransport {
    pub async fn new(config: &BleConfig) -> Result<Self, LinkError> {
        let service_uuid = parse_uuid(&config.service_uuid)?;
        let write_char_uuid = parse_uuid(&config.write_char_uuid)?;

        let adapter = Adapter::default()
            .await
            .ok_or_else(|| LinkError::TransportFailure("no Bluetooth adapter found".into()))?;
        adapter
            .wait_available()
            .await
            .map_err(transport_failure)?;
        info!("Bluetooth adapter is available");

        Ok(Self {
            adapter,
            service_uuid,
            write_char_uuid,
            name_filter: config.name_filter.clone(),
            devices: StdMutex::new(HashMap::new()),
            active: Mutex::new(None),
        })
    }

    fn matches_filter(&self, name: &str) -> bool {
        match &self.name_filter {
            Some(filter) => name.contains(filter.as_str()),
            None => true,
        }
    }
}

#[async_trait]
impl ArmTransport for BluestTransport {
    async fn scan(
        &self,
        sightings: mpsc::UnboundedSender<Sighting>,
        cancel: CancellationToken,
    ) -> Result<(), LinkError> {
        self.devices.lock().unwrap().clear();

        info!("Starting BLE scan");
        let mut stream = self.adapter.scan(&[]).await.map_err(transport_failure)?;

        loop {
            tokio::select! {
                discovered = stream.next() => {
                    let Some(discovered) = discovered else {
                        info!("BLE scan stream ended");
                        break;
                    };
                    let device = discovered.device;
                    let name = device.name().ok();
                    if !self.matches_filter(name.as_deref().unwrap_or("")) {
                        continue;
                    }

                    let id = PeripheralId(device.id().to_string());
                    let rssi = discovered.rssi.unwrap_or(0);
                    debug!(
                        "Sighted {} ({:?}, rssi {}, mac {})",
                        id,
                        name,
                        rssi,
                        extract_mac_address(&id.0).unwrap_or_else(|| "n/a".into()),
                    );
                    self.devices.lock().unwrap().insert(id.clone(), device);

                    if sightings.send(Sighting { id, name, rssi }).is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    info!("BLE scan cancelled");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<(), LinkError> {
        let device = self
            .devices
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| {
                LinkError::TransportFailure(format!("peripheral {id} not seen by the last scan"))
            })?;

        if !device.is_connected().await {
            self.adapter
                .connect_device(&device)
                .await
                .map_err(transport_failure)?;
        }

        info!("Link established, discovering the arm service");
        let services = device.services().await.map_err(transport_failure)?;
        let service = services
            .iter()
            .find(|s| s.uuid() == self.service_uuid)
            .ok_or_else(|| {
                for service in &services {
                    debug!("Available service: {}", service.uuid());
                }
                LinkError::TransportFailure(format!("arm service {} not found", self.service_uuid))
            })?;

        let write_char = service
            .characteristics()
            .await
            .map_err(transport_failure)?
            .into_iter()
            .find(|c| c.uuid() == self.write_char_uuid)
            .ok_or_else(|| {
                LinkError::TransportFailure(format!(
                    "write characteristic {} not found",
                    self.write_char_uuid
                ))
            })?;

        *self.active.lock().await = Some(ActiveLink { device, write_char });
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<(), LinkError> {
        let Some(link) = self.active.lock().await.take() else {
            debug!("Disconnect for {id} with no active link");
            return Ok(());
        };
        if link.device.is_connected().await {
            self.adapter
                .disconnect_device(&link.device)
                .await
                .map_err(transport_failure)?;
            info!("Disconnected from {id}");
        }
        Ok(())
    }

    async fn write(&self, bytes: &[u8], mode: DeliveryMode) -> Result<(), LinkError> {
        let active = self.active.lock().await;
        let link = active.as_ref().ok_or(LinkError::NotConnected)?;
        let result = match mode {
            DeliveryMode::Acknowledged => link.write_char.write(bytes).await,
            DeliveryMode::BestEffort => link.write_char.write_without_response(bytes).await,
        };
        result.map_err(|e| LinkError::WriteFailure(e.to_string()))
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, LinkError> {
    Uuid::parse_str(value)
        .map_err(|e| LinkError::TransportFailure(format!("bad UUID {value:?}: {e}")))
}

fn transport_failure(e: bluest::Error) -> LinkError {
    LinkError::TransportFailure(e.to_string())
}

fn extract_mac_address(device_id: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").unwrap();
    re.find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_is_pulled_from_a_platform_device_id() {
        assert_eq!(
            extract_mac_address("/org/bluez/hci0/dev_aa_bb_cc_dd_ee_ff#aa:bb:cc:dd:ee:ff"),
            Some("AA:BB:CC:DD:EE:FF".to_string())
        );
        assert_eq!(extract_mac_address("0E8AA1F0-1234"), None);
    }

    #[test]
    fn uuid_parsing_rejects_garbage() {
        assert!(parse_uuid("0000ffe0-0000-1000-8000-00805f9b34fb").is_ok());
        assert!(parse_uuid("not-a-uuid").is_err());
    }
}
