//! Device state store - last-known values synced from the hub.
//!
//! The sync session is the only writer of `DeviceState`; the dispatch
//! loop reads snapshots for rendering and writes the outbox. Both go
//! through `SharedStore`, one short lock per operation.
//!
//! The whole store (plus the last known time) is what survives a power
//! cycle. See `Retained` and `storage.rs`.

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::DateTime;
use crate::config::RETAINED_MAX_SIZE;
use crate::error::Error;
use crate::outbox::{Outbox, PendingWrite};

/// Number of rooms reporting a window contact.
pub const ROOM_COUNT: usize = 10;

/// Number of transit departures the hub reports.
pub const DEPARTURE_COUNT: usize = 2;

// ═══════════════════════════════════════════════════════════════════════════
// Field types
// ═══════════════════════════════════════════════════════════════════════════

/// Temperature in tenths of a degree Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Celsius(pub i16);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WindowState {
    #[default]
    Closed,
    Open,
    Tilted,
    Unknown,
}

impl WindowState {
    /// Decodes the low two bits of a window byte.
    pub const fn from_raw(raw: u8) -> Self {
        match raw & 0x03 {
            0 => WindowState::Closed,
            1 => WindowState::Open,
            2 => WindowState::Tilted,
            _ => WindowState::Unknown,
        }
    }

    /// Open or tilted. Unknown never counts as open.
    pub const fn is_open(self) -> bool {
        matches!(self, WindowState::Open | WindowState::Tilted)
    }
}

/// Rooms in window-array order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Room {
    Living,
    Dining,
    Kitchen,
    Bedroom,
    BathGround,
    CorridorGround,
    BathUpper,
    CorridorUpper,
    Nursery,
    Study,
}

impl Room {
    pub const ALL: [Room; ROOM_COUNT] = [
        Room::Living,
        Room::Dining,
        Room::Kitchen,
        Room::Bedroom,
        Room::BathGround,
        Room::CorridorGround,
        Room::BathUpper,
        Room::CorridorUpper,
        Room::Nursery,
        Room::Study,
    ];

    /// Short label for the window summary line.
    pub const fn short_name(self) -> &'static str {
        match self {
            Room::Living => "Living",
            Room::Dining => "Dining",
            Room::Kitchen => "Kitch",
            Room::Bedroom => "Bed",
            Room::BathGround => "Bath",
            Room::CorridorGround => "Hall",
            Room::BathUpper => "Bath2",
            Room::CorridorUpper => "Hall2",
            Room::Nursery => "Kids",
            Room::Study => "Study",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GarbageCategory {
    Organic,
    Residual,
    Paper,
    Plastic,
    #[default]
    Undefined,
}

impl GarbageCategory {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => GarbageCategory::Organic,
            1 => GarbageCategory::Residual,
            2 => GarbageCategory::Paper,
            3 => GarbageCategory::Plastic,
            _ => GarbageCategory::Undefined,
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            GarbageCategory::Organic => "Organic",
            GarbageCategory::Residual => "Residual",
            GarbageCategory::Paper => "Paper",
            GarbageCategory::Plastic => "Plastic",
            GarbageCategory::Undefined => "---",
        }
    }
}

/// Next garbage collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Garbage {
    pub category: GarbageCategory,
    pub days: u8,
}

impl Garbage {
    /// `days` value of a record never read from the hub.
    pub const NOT_SYNCED: u8 = 255;

    pub const fn unsynced() -> Self {
        Self {
            category: GarbageCategory::Undefined,
            days: Self::NOT_SYNCED,
        }
    }

    pub const fn is_synced(&self) -> bool {
        self.days != Self::NOT_SYNCED
    }

    /// `"day"` or `"days"` for the remaining count.
    pub const fn day_unit(&self) -> &'static str {
        if self.days == 1 {
            "day"
        } else {
            "days"
        }
    }
}

impl Default for Garbage {
    fn default() -> Self {
        Self::unsynced()
    }
}

/// One transit connection, times in minutes after midnight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Departure {
    pub departure: u16,
    pub arrival: u16,
    pub line: u16,
}

// ═══════════════════════════════════════════════════════════════════════════
// Device state
// ═══════════════════════════════════════════════════════════════════════════

/// Everything read from the hub. `None` means never synchronized.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    pub temperature: Option<Celsius>,
    pub humidity: Option<u8>,
    pub outdoor_temperature: Option<Celsius>,
    pub outdoor_humidity: Option<u8>,
    pub windows: [WindowState; ROOM_COUNT],
    pub garbage: Garbage,
    pub departures: [Departure; DEPARTURE_COUNT],
}

impl DeviceState {
    pub const fn new() -> Self {
        Self {
            temperature: None,
            humidity: None,
            outdoor_temperature: None,
            outdoor_humidity: None,
            windows: [WindowState::Closed; ROOM_COUNT],
            garbage: Garbage::unsynced(),
            departures: [Departure {
                departure: 0,
                arrival: 0,
                line: 0,
            }; DEPARTURE_COUNT],
        }
    }

    /// Rooms with an open or tilted window, in room order.
    pub fn open_rooms(&self) -> impl Iterator<Item = Room> + '_ {
        self.windows
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_open())
            .map(|(i, _)| Room::ALL[i])
    }
}

/// In-memory store shared by the sync task and the dispatch loop.
pub struct DeviceStore {
    device: DeviceState,
    outbox: Outbox,
    /// Dirty flag - true if the retained snapshot differs from flash.
    dirty: bool,
}

impl DeviceStore {
    pub const fn new() -> Self {
        Self {
            device: DeviceState::new(),
            outbox: Outbox::new(),
            dirty: false,
        }
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Overwrite device fields. Only the sync session calls this.
    pub fn update(&mut self, f: impl FnOnce(&mut DeviceState)) {
        f(&mut self.device);
        self.dirty = true;
    }

    /// Queue a write for the next sync.
    pub fn request(&mut self, write: PendingWrite) {
        self.outbox.request(write);
        self.dirty = true;
    }

    /// Mark a write delivered. See `Outbox::confirm`.
    pub fn confirm(&mut self, write: PendingWrite) -> bool {
        let confirmed = self.outbox.confirm(write);
        self.dirty |= confirmed;
        confirmed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Snapshot for persisting.
    pub fn retained(&self, clock: Option<DateTime>) -> Retained {
        Retained {
            device: self.device.clone(),
            outbox: self.outbox.clone(),
            clock,
        }
    }

    /// Replace the contents with a loaded snapshot.
    pub fn restore(&mut self, retained: Retained) {
        self.device = retained.device;
        self.outbox = retained.outbox;
        self.dirty = false;
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Store shared between tasks.
pub type SharedStore = Mutex<CriticalSectionRawMutex, DeviceStore>;

/// The application store.
pub static STORE: SharedStore = Mutex::new(DeviceStore::new());

// ═══════════════════════════════════════════════════════════════════════════
// Retained snapshot
// ═══════════════════════════════════════════════════════════════════════════

const RETAINED_MAGIC: u8 = 0x5A;
const RETAINED_VERSION: u8 = 1;

/// What survives a power cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retained {
    pub device: DeviceState,
    pub outbox: Outbox,
    /// Last known time; stale after a reset but good enough for the
    /// garbage read decision until the next sync.
    pub clock: Option<DateTime>,
}

impl Retained {
    /// Encode as `[magic, version, postcard...]`. Returns the used length.
    pub fn encode(&self, buf: &mut [u8; RETAINED_MAX_SIZE]) -> Result<usize, Error> {
        buf[0] = RETAINED_MAGIC;
        buf[1] = RETAINED_VERSION;
        let used = postcard::to_slice(self, &mut buf[2..])?.len();
        Ok(used + 2)
    }

    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        match data {
            [RETAINED_MAGIC, RETAINED_VERSION, rest @ ..] => Ok(postcard::from_bytes(rest)?),
            _ => Err(Error::Snapshot),
        }
    }

    /// Decode, falling back to defaults on any error.
    pub fn decode_or_default(data: &[u8]) -> Self {
        Self::decode(data).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{AudioMode, PartyEnd, Presence};

    #[test]
    fn window_low_bits() {
        assert_eq!(WindowState::from_raw(0b01), WindowState::Open);
        assert_eq!(WindowState::from_raw(0b00), WindowState::Closed);
        assert_eq!(WindowState::from_raw(0b10), WindowState::Tilted);
        assert_eq!(WindowState::from_raw(0b11), WindowState::Unknown);
        assert_eq!(WindowState::from_raw(0b1111_0101), WindowState::Open);
        assert!(!WindowState::Unknown.is_open());
        assert!(WindowState::Tilted.is_open());
    }

    #[test]
    fn celsius_display() {
        use std::string::ToString;
        assert_eq!(Celsius(250).to_string(), "25.0");
        assert_eq!(Celsius(-200).to_string(), "-20.0");
        assert_eq!(Celsius(-5).to_string(), "-0.5");
        assert_eq!(Celsius(217).to_string(), "21.7");
    }

    #[test]
    fn garbage_units_and_sentinel() {
        let g = Garbage {
            category: GarbageCategory::from_raw(2),
            days: 3,
        };
        assert_eq!(g.category.index(), 2);
        assert_eq!(g.category.label(), "Paper");
        assert_eq!(g.day_unit(), "days");
        assert_eq!(Garbage { days: 1, ..g }.day_unit(), "day");
        assert!(!Garbage::default().is_synced());
        assert_eq!(GarbageCategory::from_raw(9), GarbageCategory::Undefined);
    }

    #[test]
    fn open_rooms_in_order() {
        let mut device = DeviceState::new();
        device.windows[2] = WindowState::Tilted;
        device.windows[0] = WindowState::Open;
        device.windows[5] = WindowState::Unknown;
        let rooms: heapless::Vec<Room, ROOM_COUNT> = device.open_rooms().collect();
        assert_eq!(rooms.as_slice(), &[Room::Living, Room::Kitchen]);
    }

    #[test]
    fn store_tracks_dirty() {
        let mut store = DeviceStore::new();
        assert!(!store.is_dirty());
        store.update(|d| d.humidity = Some(40));
        assert!(store.is_dirty());
        store.mark_clean();
        store.request(PendingWrite::Audio(AudioMode::Off));
        assert!(store.is_dirty());
    }

    #[test]
    fn snapshot_restores_outbox_verbatim() {
        let mut store = DeviceStore::new();
        store.update(|d| {
            d.temperature = Some(Celsius(-35));
            d.windows[9] = WindowState::Open;
            d.garbage = Garbage {
                category: GarbageCategory::Plastic,
                days: 4,
            };
            d.departures[1] = Departure {
                departure: 452,
                arrival: 475,
                line: 12,
            };
        });
        store.request(PendingWrite::PartyMode(PartyEnd::from_tenths(25)));
        store.request(PendingWrite::Presence(Presence::Home));
        store.confirm(PendingWrite::Presence(Presence::Home));

        let time = DateTime::new(2024, 6, 15, 10, 30, 0);
        let snapshot = store.retained(time);
        let mut buf = [0u8; RETAINED_MAX_SIZE];
        let len = snapshot.encode(&mut buf).unwrap();

        let decoded = Retained::decode(&buf[..len]).unwrap();
        assert_eq!(decoded, snapshot);

        let mut restored = DeviceStore::new();
        restored.restore(decoded);
        assert_eq!(restored.outbox(), store.outbox());
        assert_eq!(restored.device(), store.device());
        assert!(!restored.is_dirty());
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_defaults() {
        assert_eq!(Retained::decode(&[]), Err(Error::Snapshot));
        assert_eq!(Retained::decode(&[0x00, 0x01, 0x02]), Err(Error::Snapshot));
        let fallback = Retained::decode_or_default(&[RETAINED_MAGIC, RETAINED_VERSION, 0xFF]);
        assert_eq!(fallback.device.garbage.days, Garbage::NOT_SYNCED);
        assert!(fallback.outbox.pending().is_empty());
    }
}
