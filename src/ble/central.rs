//! SoftDevice central: scan for the hub, connect, discover its service.
//!
//! `SoftdeviceLink` is the embedded `Link`. A connection attempt is one
//! bounded scan for an advertiser carrying the panel service UUID,
//! a connect to that exact address, and a single service discovery
//! that records the value handle of every known characteristic. Reads
//! and writes then go straight to those handles.

use embassy_time::{with_timeout, Duration};
use nrf_softdevice::ble::gatt_client::{self, DiscoverError};
use nrf_softdevice::ble::{central, Address, Connection, HvxType, Uuid};
use nrf_softdevice::{raw, Softdevice};

use crate::ble::adv_parser::{contains_service_uuid, extract_device_name};
use crate::ble::{Characteristic, GattClient, Link, SERVICE_UUID16};
use crate::config::{
    BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_SCAN_WINDOW_MS, BLE_SLAVE_LATENCY,
    BLE_SUP_TIMEOUT,
};
use crate::error::{BleError, CharError};
use crate::fmt::{debug, info, warn};

/// BLE central on the SoftDevice.
pub struct SoftdeviceLink {
    sd: &'static Softdevice,
}

impl SoftdeviceLink {
    pub fn new(sd: &'static Softdevice) -> Self {
        Self { sd }
    }

    async fn scan(&self) -> Result<Address, BleError> {
        let config = central::ScanConfig::default();
        let scan = central::scan(self.sd, &config, |params| {
            let data =
                unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };
            if contains_service_uuid(data, SERVICE_UUID16) {
                if let Some(name) = extract_device_name(data) {
                    info!("Hub advertises as {}", name.as_str());
                }
                Some(Address::from_raw(params.peer_addr))
            } else {
                None
            }
        });

        match with_timeout(Duration::from_millis(BLE_SCAN_WINDOW_MS), scan).await {
            Ok(Ok(address)) => Ok(address),
            Ok(Err(_)) => Err(BleError::ScanFailed),
            Err(_) => Err(BleError::ScanTimeout),
        }
    }
}

impl Link for SoftdeviceLink {
    type Client = HubClient;

    async fn connect(&mut self) -> Result<HubClient, BleError> {
        let address = self.scan().await?;
        info!("Hub found at {:?}", address);

        let whitelist = [&address];
        let conn_cfg = central::ConnectConfig {
            scan_config: central::ScanConfig {
                whitelist: Some(&whitelist),
                ..Default::default()
            },
            conn_params: raw::ble_gap_conn_params_t {
                min_conn_interval: BLE_CONN_INTERVAL_MIN,
                max_conn_interval: BLE_CONN_INTERVAL_MAX,
                slave_latency: BLE_SLAVE_LATENCY,
                conn_sup_timeout: BLE_SUP_TIMEOUT,
            },
            ..Default::default()
        };
        let conn = central::connect(self.sd, &conn_cfg)
            .await
            .map_err(|_| BleError::ConnectFailed)?;

        gatt_client::discover::<HubClient>(&conn)
            .await
            .map_err(|_| BleError::ServiceNotFound)
    }
}

/// Discovered hub service on one connection.
///
/// Disconnects when dropped, so a session never leaves the link open.
pub struct HubClient {
    conn: Connection,
    handles: [Option<u16>; Characteristic::ALL.len()],
}

impl HubClient {
    fn handle(&self, characteristic: Characteristic) -> Result<u16, CharError> {
        self.handles[characteristic.index()].ok_or(CharError::NotFound)
    }
}

impl gatt_client::Client for HubClient {
    type Event = ();

    fn uuid() -> Uuid {
        Uuid::new_16(SERVICE_UUID16)
    }

    fn new_undiscovered(conn: Connection) -> Self {
        Self {
            conn,
            handles: [None; Characteristic::ALL.len()],
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &gatt_client::Characteristic,
        _descriptors: &[gatt_client::Descriptor],
    ) {
        let Some(uuid) = characteristic.uuid else {
            return;
        };
        if let Some(known) = Characteristic::ALL
            .iter()
            .find(|c| uuid == Uuid::new_16(c.uuid16()))
        {
            debug!("{:?} at handle {}", known, characteristic.handle_value);
            self.handles[known.index()] = Some(characteristic.handle_value);
        }
    }

    /// Missing characteristics are skipped per read, not here.
    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        let found = self.handles.iter().filter(|h| h.is_some()).count();
        info!("Hub service: {} of {} characteristics", found, self.handles.len());
        Ok(())
    }

    fn on_hvx(&self, _conn: &Connection, _type: HvxType, _handle: u16, _data: &[u8]) -> Option<()> {
        None
    }
}

impl GattClient for HubClient {
    async fn read(&mut self, characteristic: Characteristic, buf: &mut [u8]) -> Result<usize, CharError> {
        let handle = self.handle(characteristic)?;
        gatt_client::read(&self.conn, handle, buf).await.map_err(|_| {
            warn!("Read {:?} failed", characteristic);
            CharError::Io
        })
    }

    async fn write(&mut self, characteristic: Characteristic, data: &[u8]) -> Result<(), CharError> {
        let handle = self.handle(characteristic)?;
        gatt_client::write(&self.conn, handle, data).await.map_err(|_| {
            warn!("Write {:?} failed", characteristic);
            CharError::Io
        })
    }
}

impl Drop for HubClient {
    fn drop(&mut self) {
        let _ = self.conn.disconnect();
    }
}
