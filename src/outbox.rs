//! Pending writes towards the hub.
//!
//! One entry per writable characteristic. A screen request replaces the
//! pending value and clears `sent`; the sync session sets `sent` only
//! after the hub acknowledged the write. Entries survive disconnects and
//! power-down as part of the retained snapshot.

use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::ble::Characteristic;

pub type OutboxSignal = Signal<CriticalSectionRawMutex, ()>;

/// Raised when a screen queues a write, so it goes out on its own
/// connection instead of waiting for the next scheduled sync.
pub static OUTBOX_READY: OutboxSignal = Signal::new();

/// Largest encoded write value ("absent").
pub const MAX_WRITE_LEN: usize = 8;

/// End of party mode, written as `"HH:MM"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartyEnd {
    pub hour: u8,
    pub minute: u8,
}

impl PartyEnd {
    /// Decodes the heating screen's tens-of-minutes value: `v/10` hours and
    /// `(v%10)*6` minutes.
    pub const fn from_tenths(value: u8) -> Self {
        Self {
            hour: value / 10,
            minute: (value % 10) * 6,
        }
    }

    pub fn format(&self) -> String<MAX_WRITE_LEN> {
        let mut s = String::new();
        // Five bytes, always fits.
        write!(s, "{:02}:{:02}", self.hour, self.minute).ok();
        s
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Presence {
    Home,
    Absent,
}

impl Presence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Presence::Home => "home",
            Presence::Absent => "absent",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioMode {
    On,
    Off,
}

impl AudioMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            AudioMode::On => "on",
            AudioMode::Off => "off",
        }
    }
}

/// A value a screen wants delivered to the hub.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingWrite {
    PartyMode(PartyEnd),
    Presence(Presence),
    Audio(AudioMode),
}

impl PendingWrite {
    pub const fn characteristic(&self) -> Characteristic {
        match self {
            PendingWrite::PartyMode(_) => Characteristic::PartyMode,
            PendingWrite::Presence(_) => Characteristic::Presence,
            PendingWrite::Audio(_) => Characteristic::Audio,
        }
    }

    /// ASCII payload as written to the characteristic.
    pub fn encode(&self) -> Vec<u8, MAX_WRITE_LEN> {
        let text = match self {
            PendingWrite::PartyMode(end) => end.format(),
            PendingWrite::Presence(p) => String::try_from(p.as_str()).unwrap_or_default(),
            PendingWrite::Audio(a) => String::try_from(a.as_str()).unwrap_or_default(),
        };
        Vec::from_slice(text.as_bytes()).unwrap_or_default()
    }
}

/// Delivery state of one outbox entry, as shown on the screens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeliveryStatus {
    /// Nothing was ever requested.
    Idle,
    /// Waiting for the next successful sync.
    Pending,
    Delivered,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry<T> {
    pub value: Option<T>,
    pub sent: bool,
}

impl<T: Copy + PartialEq> Entry<T> {
    pub const fn empty() -> Self {
        Self {
            value: None,
            sent: false,
        }
    }

    fn request(&mut self, value: T) {
        self.value = Some(value);
        self.sent = false;
    }

    fn unsent(&self) -> Option<T> {
        match self.value {
            Some(v) if !self.sent => Some(v),
            _ => None,
        }
    }

    fn confirm(&mut self, delivered: T) -> bool {
        if self.unsent() == Some(delivered) {
            self.sent = true;
            true
        } else {
            false
        }
    }

    fn status(&self) -> DeliveryStatus {
        match (self.value, self.sent) {
            (None, _) => DeliveryStatus::Idle,
            (Some(_), false) => DeliveryStatus::Pending,
            (Some(_), true) => DeliveryStatus::Delivered,
        }
    }
}

/// The three writable fields, flushed in declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbox {
    pub party_mode: Entry<PartyEnd>,
    pub presence: Entry<Presence>,
    pub audio: Entry<AudioMode>,
}

impl Outbox {
    pub const fn new() -> Self {
        Self {
            party_mode: Entry::empty(),
            presence: Entry::empty(),
            audio: Entry::empty(),
        }
    }

    /// Replace the pending value for the write's characteristic.
    pub fn request(&mut self, write: PendingWrite) {
        match write {
            PendingWrite::PartyMode(v) => self.party_mode.request(v),
            PendingWrite::Presence(v) => self.presence.request(v),
            PendingWrite::Audio(v) => self.audio.request(v),
        }
    }

    /// Unsent values in flush order: party mode, presence, audio.
    pub fn pending(&self) -> Vec<PendingWrite, 3> {
        let mut out = Vec::new();
        if let Some(v) = self.party_mode.unsent() {
            let _ = out.push(PendingWrite::PartyMode(v));
        }
        if let Some(v) = self.presence.unsent() {
            let _ = out.push(PendingWrite::Presence(v));
        }
        if let Some(v) = self.audio.unsent() {
            let _ = out.push(PendingWrite::Audio(v));
        }
        out
    }

    /// Mark `write` as delivered.
    ///
    /// Returns `false` if the entry changed while the write was in flight;
    /// the newer value stays pending.
    pub fn confirm(&mut self, write: PendingWrite) -> bool {
        match write {
            PendingWrite::PartyMode(v) => self.party_mode.confirm(v),
            PendingWrite::Presence(v) => self.presence.confirm(v),
            PendingWrite::Audio(v) => self.audio.confirm(v),
        }
    }

    pub fn status(&self, characteristic: Characteristic) -> DeliveryStatus {
        match characteristic {
            Characteristic::PartyMode => self.party_mode.status(),
            Characteristic::Presence => self.presence.status(),
            Characteristic::Audio => self.audio.status(),
            _ => DeliveryStatus::Idle,
        }
    }
}

impl Default for Outbox {
    fn default() -> Self {
        Self::new()
    }
}
