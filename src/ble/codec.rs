//! Wire layouts of the panel service characteristics.
//!
//! All multi-byte fields are little-endian. Decoders take fixed-size
//! arrays; the session rejects short values before calling them.

use crate::clock::DateTime;
use crate::state::{
    Celsius, Departure, Garbage, GarbageCategory, WindowState, DEPARTURE_COUNT, ROOM_COUNT,
};

pub const CLOCK_LEN: usize = 7;
pub const TEMPERATURE_LEN: usize = 2;
pub const HUMIDITY_LEN: usize = 2;
pub const WINDOWS_LEN: usize = ROOM_COUNT;
pub const GARBAGE_LEN: usize = 2;
pub const TRANSIT_LEN: usize = DEPARTURE_COUNT * 6;

/// `[year lo, year hi, month, day, hour, minute, second]`.
///
/// `None` for an out-of-range date.
pub fn decode_clock(raw: &[u8; CLOCK_LEN]) -> Option<DateTime> {
    let year = u16::from_le_bytes([raw[0], raw[1]]);
    DateTime::new(year, raw[2], raw[3], raw[4], raw[5], raw[6])
}

pub fn encode_clock(time: &DateTime) -> [u8; CLOCK_LEN] {
    let [lo, hi] = time.year.to_le_bytes();
    [lo, hi, time.month, time.day, time.hour, time.minute, time.second]
}

/// Signed tenths of a degree.
pub fn decode_temperature(raw: &[u8; TEMPERATURE_LEN]) -> Celsius {
    Celsius(i16::from_le_bytes(*raw))
}

/// Hundredths of a percent, truncated to whole percent.
pub fn decode_humidity(raw: &[u8; HUMIDITY_LEN]) -> u8 {
    let pct = u16::from_le_bytes(*raw) / 100;
    pct.min(u8::MAX as u16) as u8
}

pub fn decode_windows(raw: &[u8; WINDOWS_LEN]) -> [WindowState; ROOM_COUNT] {
    raw.map(WindowState::from_raw)
}

/// `[category, days]`.
pub fn decode_garbage(raw: &[u8; GARBAGE_LEN]) -> Garbage {
    Garbage {
        category: GarbageCategory::from_raw(raw[0]),
        days: raw[1],
    }
}

/// Six u16: `departure, arrival, line` for each of the two connections.
pub fn decode_transit(raw: &[u8; TRANSIT_LEN]) -> [Departure; DEPARTURE_COUNT] {
    let word = |i: usize| u16::from_le_bytes([raw[2 * i], raw[2 * i + 1]]);
    core::array::from_fn(|n| Departure {
        departure: word(3 * n),
        arrival: word(3 * n + 1),
        line: word(3 * n + 2),
    })
}

pub fn encode_transit(departures: &[Departure; DEPARTURE_COUNT]) -> [u8; TRANSIT_LEN] {
    let mut out = [0u8; TRANSIT_LEN];
    for (n, d) in departures.iter().enumerate() {
        for (k, v) in [d.departure, d.arrival, d.line].iter().enumerate() {
            let at = 6 * n + 2 * k;
            out[at..at + 2].copy_from_slice(&v.to_le_bytes());
        }
    }
    out
}
