//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Event queue

/// Number of events the dispatch loop queue can hold.
pub const EVENT_QUEUE_CAPACITY: usize = 4;

/// How long a producer waits for a free queue slot before dropping (ms).
pub const EVENT_POST_TIMEOUT_MS: u64 = 200;

/// How long the dispatch loop blocks on an empty queue per wake (ms).
pub const EVENT_RECEIVE_TIMEOUT_MS: u64 = 100;

/// Follow-up events one dispatched event may raise (softkey translation).
pub const FOLLOW_UP_DEPTH: usize = 4;

// Timers

/// No key press for this long returns the UI to the main screen (ms).
pub const IDLE_TIMEOUT_MS: u64 = 5_000;

/// Delay between the last UI activity and power-down (ms).
pub const SLEEP_TIMEOUT_MS: u64 = 2_000;

/// Delay before an intermediate repeat of a multi-pass render (ms).
pub const REDRAW_DELAY_MS: u64 = 200;

/// Delay before the final repeat of a multi-pass render (ms).
pub const FINAL_REDRAW_DELAY_MS: u64 = 800;

/// Number of passes used when a screen is activated.
pub const ACTIVATION_RENDER_PASSES: u8 = 2;

// Touch electrodes
//
// Four capacitive pads sampled through the SAADC, left to right:
//
//   Key 0  → AIN0 (P0.02)
//   Key 1  → AIN1 (P0.03)
//   Key 2  → AIN2 (P0.04)
//   Key 3  → AIN3 (P0.05)

/// Number of softkeys below the display.
pub const SOFTKEY_COUNT: usize = 4;

/// Raw level below which a pad counts as touched, per key.
pub const TOUCH_THRESHOLDS: [u16; SOFTKEY_COUNT] = [60, 60, 65, 70];

/// A release is only reported after the pad read "released" this long (ms).
pub const TOUCH_SETTLE_MS: u64 = 30;

/// Touch sampling period (ms).
pub const TOUCH_POLL_MS: u64 = 10;

/// Touch sampling period while the panel sleeps (ms).
pub const TOUCH_SLEEP_POLL_MS: u64 = 100;

// BLE

/// Duration of the scan window for the hub peripheral (ms).
pub const BLE_SCAN_WINDOW_MS: u64 = 2_000;

/// BLE connection interval range (in 1.25 ms units).
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Largest characteristic value the session reads.
pub const BLE_MAX_VALUE_LEN: usize = 20;

// Sync schedule

/// Minutes to sleep between automatic syncs, indexed by hour of day.
///
/// Short intervals around the morning and evening commute, long ones at
/// night to save battery. Index 24 is a fallback for an unknown clock.
pub const SYNC_INTERVAL_MINUTES: [u8; 25] = [
    10, 10, 15, 20, 30, 30, 10, 2, 2, 5, 5, 10, 5, 3, 5, 5, 5, 5, 3, 4, 4, 4, 4, 4, 10,
];

// Retained-state storage

/// Flash page index where the retained snapshot starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for the retained snapshot.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

/// Upper bound for an encoded retained snapshot.
pub const RETAINED_MAX_SIZE: usize = 128;
