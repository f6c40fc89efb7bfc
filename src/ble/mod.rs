//! Bluetooth Low Energy subsystem.
//!
//! The panel is a BLE **central** talking to exactly one peripheral, the
//! home hub:
//!
//! 1. **Scan** - find the hub by its advertised service UUID.
//! 2. **Connect** - open the panel service and resolve characteristic
//!    handles.
//! 3. **Sync session** - read every characteristic into the device state
//!    store and flush the outbox (see `session.rs`).
//!
//! The radio is reached through the `Link` and `GattClient` traits so
//! the session runs unchanged against a mock on the host. The SoftDevice
//! implementation lives in `central.rs`.

pub mod adv_parser;
#[cfg(feature = "embedded")]
pub mod central;
pub mod codec;
pub mod session;

use crate::error::{BleError, CharError};

/// 16-bit UUID of the panel service (Bluetooth base UUID).
pub const SERVICE_UUID16: u16 = 0x0A00;

/// Characteristics of the panel service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Characteristic {
    Clock,
    Temperature,
    Humidity,
    OutdoorTemperature,
    OutdoorHumidity,
    PartyMode,
    Presence,
    Windows,
    Garbage,
    Audio,
    Transit,
}

impl Characteristic {
    pub const ALL: [Characteristic; 11] = [
        Characteristic::Clock,
        Characteristic::Temperature,
        Characteristic::Humidity,
        Characteristic::OutdoorTemperature,
        Characteristic::OutdoorHumidity,
        Characteristic::PartyMode,
        Characteristic::Presence,
        Characteristic::Windows,
        Characteristic::Garbage,
        Characteristic::Audio,
        Characteristic::Transit,
    ];

    /// 16-bit UUID in the Bluetooth base UUID.
    pub const fn uuid16(self) -> u16 {
        match self {
            Characteristic::Clock => 0x2A2B,
            Characteristic::Temperature => 0x2A1F,
            Characteristic::Humidity => 0x2A6F,
            Characteristic::OutdoorTemperature => 0x3A1F,
            Characteristic::OutdoorHumidity => 0x3A6F,
            Characteristic::PartyMode => 0xD379,
            Characteristic::Presence => 0xD380,
            Characteristic::Windows => 0xD390,
            Characteristic::Garbage => 0xD392,
            Characteristic::Audio => 0xD3A0,
            Characteristic::Transit => 0xD3B0,
        }
    }

    pub fn from_uuid16(uuid: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.uuid16() == uuid)
    }

    /// Position in `ALL`, used to index handle tables.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// GATT access to the opened panel service.
pub trait GattClient {
    /// Read a characteristic value into `buf`, returning its length.
    async fn read(&mut self, characteristic: Characteristic, buf: &mut [u8])
        -> Result<usize, CharError>;

    /// Write with response; `Ok` means the hub acknowledged it.
    async fn write(&mut self, characteristic: Characteristic, data: &[u8])
        -> Result<(), CharError>;
}

/// Scans for the hub, connects and opens the panel service.
pub trait Link {
    type Client: GattClient;

    async fn connect(&mut self) -> Result<Self::Client, BleError>;
}
